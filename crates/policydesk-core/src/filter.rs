use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{PolicyShort, PolicyStatus, PolicyType};

/// Inclusive date bounds; a missing bound is open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        DateRange { from, to }
    }

    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }

    /// A missing date only passes an unbounded range.
    fn admits(&self, date: Option<NaiveDate>) -> bool {
        match date {
            Some(date) => self.contains(date),
            None => self.is_unbounded(),
        }
    }
}

/// Column filters of the policy list. Every constraint left empty passes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyFilter {
    pub number: Option<String>,
    pub holder: Option<String>,
    /// Matched against the car model and the plate.
    pub car: Option<String>,
    pub start_date: DateRange,
    pub end_date: DateRange,
    pub policy_types: Vec<PolicyType>,
    pub statuses: Vec<PolicyStatus>,
}

impl PolicyFilter {
    pub fn is_empty(&self) -> bool {
        *self == PolicyFilter::default()
    }

    pub fn matches(&self, row: &PolicyShort) -> bool {
        contains_text(&self.number, Some(&row.number))
            && contains_text(&self.holder, Some(&row.holder_name))
            && (contains_text(&self.car, row.car_model.as_deref())
                || contains_text(&self.car, row.car_plate.as_deref()))
            && self.start_date.admits(Some(row.start_date))
            && self.end_date.admits(row.end_date)
            && (self.policy_types.is_empty() || self.policy_types.contains(&row.policy_type))
            && (self.statuses.is_empty() || self.statuses.contains(&row.status))
    }

    pub fn apply<'a>(&self, rows: impl IntoIterator<Item = &'a PolicyShort>) -> Vec<&'a PolicyShort> {
        rows.into_iter().filter(|row| self.matches(row)).collect()
    }
}

fn contains_text(needle: &Option<String>, haystack: Option<&str>) -> bool {
    let Some(needle) = needle.as_deref().map(str::trim).filter(|n| !n.is_empty()) else {
        return true;
    };
    haystack.is_some_and(|h| h.to_lowercase().contains(&needle.to_lowercase()))
}
