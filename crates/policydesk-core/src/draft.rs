//! Policy request assembly.
//!
//! A draft is a set of groups filled in independently: the general header, the
//! holder slot and a type-specific group with its car or member slots. Nothing
//! is sent until every group validates.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::editor::Outcome;
use crate::form::{FieldRule, FormErrors, FormValues};
use crate::{
    CarInsurancePeriodUnit, CarNew, CarRef, CreatePolicyRequest, GreenCardData,
    MedassistanceData, OsagoData, OsagoZone, PersonNew, PersonRef, PolicyData, PolicyDetails,
    PolicyFull, PolicyStatus, PolicyType, Reference, UpdatePolicyRequest,
};

pub const POLICY_STATUS_OPTIONS: &[&str] = &[
    "Active",
    "Project",
    "Prolonged",
    "Rejected",
    "Stopped",
    "Postponed",
    "Cancelled",
    "Replaced",
    "Expired",
];
pub const PERIOD_UNIT_OPTIONS: &[&str] = &["Day", "Month", "Year"];
pub const OSAGO_ZONE_OPTIONS: &[&str] = &["Zone1", "Zone2", "Zone3", "Zone4", "Zone5", "Outside"];

pub const GENERAL_RULES: &[FieldRule] = &[
    FieldRule::text("series").required(),
    FieldRule::text("number").required(),
    FieldRule::date("start_date").required(),
    FieldRule::date("end_date"),
    FieldRule::choice("status", POLICY_STATUS_OPTIONS).required(),
];

pub const GREEN_CARD_RULES: &[FieldRule] = &[
    FieldRule::text("territory").required(),
    FieldRule::integer("period_in_units").required(),
    FieldRule::choice("period_unit", PERIOD_UNIT_OPTIONS).required(),
    FieldRule::integer("premium").required(),
];

pub const MEDASSISTANCE_RULES: &[FieldRule] = &[
    FieldRule::text("territory").required(),
    FieldRule::integer("period_days").required(),
    FieldRule::integer("premium").required(),
    FieldRule::integer("payout").required(),
    FieldRule::text("program").required(),
];

pub const OSAGO_RULES: &[FieldRule] = &[
    FieldRule::integer("period_in_units").required(),
    FieldRule::choice("period_unit", PERIOD_UNIT_OPTIONS).required(),
    FieldRule::choice("zone", OSAGO_ZONE_OPTIONS).required(),
    FieldRule::text("exempt").required(),
    FieldRule::integer("premium").required(),
];

pub fn terms_rules(policy_type: PolicyType) -> &'static [FieldRule] {
    match policy_type {
        PolicyType::GreenCard => GREEN_CARD_RULES,
        PolicyType::Medassistance => MEDASSISTANCE_RULES,
        PolicyType::Osago => OSAGO_RULES,
    }
}

// --- Typed group contents ---

#[derive(Debug, Serialize, Deserialize)]
struct GeneralFields {
    series: String,
    number: String,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    status: PolicyStatus,
}

#[derive(Debug, Deserialize)]
struct GreenCardTerms {
    territory: String,
    period_in_units: i32,
    period_unit: CarInsurancePeriodUnit,
    premium: i32,
}

#[derive(Debug, Deserialize)]
struct MedassistanceTerms {
    territory: String,
    period_days: i32,
    premium: i32,
    payout: i32,
    program: String,
}

#[derive(Debug, Deserialize)]
struct OsagoTerms {
    period_in_units: i32,
    period_unit: CarInsurancePeriodUnit,
    zone: OsagoZone,
    exempt: String,
    premium: i32,
}

// --- Errors ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftGroup {
    General,
    Holder,
    Details,
    Car,
    Member(usize),
    /// The member list as a whole (e.g. empty).
    Members,
}

impl fmt::Display for DraftGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DraftGroup::General => f.write_str("general"),
            DraftGroup::Holder => f.write_str("holder"),
            DraftGroup::Details => f.write_str("details"),
            DraftGroup::Car => f.write_str("car"),
            DraftGroup::Member(i) => write!(f, "member #{}", i + 1),
            DraftGroup::Members => f.write_str("members"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupProblem {
    Invalid(FormErrors),
    /// A reference slot has no usable value.
    Unresolved,
    Empty,
}

impl fmt::Display for GroupProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupProblem::Invalid(errors) => errors.fmt(f),
            GroupProblem::Unresolved => f.write_str("no valid selection"),
            GroupProblem::Empty => f.write_str("at least one entry is required"),
        }
    }
}

/// Every group that kept the draft from assembling.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", render(.failures))]
pub struct AssemblyError {
    pub failures: Vec<(DraftGroup, GroupProblem)>,
}

fn render(failures: &[(DraftGroup, GroupProblem)]) -> String {
    failures
        .iter()
        .map(|(group, problem)| format!("{group}: {problem}"))
        .collect::<Vec<_>>()
        .join("; ")
}

impl AssemblyError {
    pub fn groups(&self) -> impl Iterator<Item = DraftGroup> + '_ {
        self.failures.iter().map(|(group, _)| *group)
    }

    pub fn has(&self, group: DraftGroup) -> bool {
        self.groups().any(|g| g == group)
    }
}

// --- Draft ---

#[derive(Debug, Clone, PartialEq)]
pub enum DetailsDraft {
    GreenCard {
        terms: FormValues,
        car: Outcome<CarNew>,
    },
    Medassistance {
        terms: FormValues,
        members: Vec<Outcome<PersonNew>>,
    },
    Osago {
        terms: FormValues,
        car: Outcome<CarNew>,
    },
}

impl DetailsDraft {
    pub fn new(policy_type: PolicyType) -> Self {
        match policy_type {
            PolicyType::GreenCard => DetailsDraft::GreenCard {
                terms: FormValues::new(),
                car: Outcome::none(),
            },
            PolicyType::Medassistance => DetailsDraft::Medassistance {
                terms: FormValues::new(),
                members: Vec::new(),
            },
            PolicyType::Osago => DetailsDraft::Osago {
                terms: FormValues::new(),
                car: Outcome::none(),
            },
        }
    }

    pub fn policy_type(&self) -> PolicyType {
        match self {
            DetailsDraft::GreenCard { .. } => PolicyType::GreenCard,
            DetailsDraft::Medassistance { .. } => PolicyType::Medassistance,
            DetailsDraft::Osago { .. } => PolicyType::Osago,
        }
    }

    pub fn terms(&self) -> &FormValues {
        match self {
            DetailsDraft::GreenCard { terms, .. }
            | DetailsDraft::Medassistance { terms, .. }
            | DetailsDraft::Osago { terms, .. } => terms,
        }
    }

    pub fn terms_mut(&mut self) -> &mut FormValues {
        match self {
            DetailsDraft::GreenCard { terms, .. }
            | DetailsDraft::Medassistance { terms, .. }
            | DetailsDraft::Osago { terms, .. } => terms,
        }
    }

    /// The car slot, for the types that have one.
    pub fn car_mut(&mut self) -> Option<&mut Outcome<CarNew>> {
        match self {
            DetailsDraft::GreenCard { car, .. } | DetailsDraft::Osago { car, .. } => Some(car),
            DetailsDraft::Medassistance { .. } => None,
        }
    }

    pub fn members_mut(&mut self) -> Option<&mut Vec<Outcome<PersonNew>>> {
        match self {
            DetailsDraft::Medassistance { members, .. } => Some(members),
            _ => None,
        }
    }

    fn assemble(&self, failures: &mut Vec<(DraftGroup, GroupProblem)>) -> Option<PolicyData> {
        let rules = terms_rules(self.policy_type());
        match self {
            DetailsDraft::GreenCard { terms, car } => {
                let terms = group(
                    DraftGroup::Details,
                    terms.to_entity::<GreenCardTerms>(rules),
                    failures,
                );
                let car = slot(DraftGroup::Car, car, failures);
                let (terms, car) = (terms?, car?);
                Some(PolicyData::GreenCard(GreenCardData {
                    territory: terms.territory,
                    period_in_units: terms.period_in_units,
                    period_unit: terms.period_unit,
                    premium: terms.premium,
                    car,
                }))
            }
            DetailsDraft::Medassistance { terms, members } => {
                let terms = group(
                    DraftGroup::Details,
                    terms.to_entity::<MedassistanceTerms>(rules),
                    failures,
                );
                if members.is_empty() {
                    failures.push((DraftGroup::Members, GroupProblem::Empty));
                }
                let refs: Vec<Option<PersonRef>> = members
                    .iter()
                    .enumerate()
                    .map(|(i, member)| slot(DraftGroup::Member(i), member, failures))
                    .collect();
                let terms = terms?;
                let members = refs.into_iter().collect::<Option<Vec<_>>>()?;
                if members.is_empty() {
                    return None;
                }
                Some(PolicyData::Medassistance(MedassistanceData {
                    territory: terms.territory,
                    period_days: terms.period_days,
                    premium: terms.premium,
                    payout: terms.payout,
                    program: terms.program,
                    members,
                }))
            }
            DetailsDraft::Osago { terms, car } => {
                let terms = group(
                    DraftGroup::Details,
                    terms.to_entity::<OsagoTerms>(rules),
                    failures,
                );
                let car = slot(DraftGroup::Car, car, failures);
                let (terms, car) = (terms?, car?);
                Some(PolicyData::Osago(OsagoData {
                    period_in_units: terms.period_in_units,
                    period_unit: terms.period_unit,
                    zone: terms.zone,
                    exempt: terms.exempt,
                    premium: terms.premium,
                    car,
                }))
            }
        }
    }
}

fn existing<D>(id: i32) -> Outcome<D> {
    Outcome::ready(Reference::Existing { id })
}

fn group<T>(
    which: DraftGroup,
    result: Result<T, FormErrors>,
    failures: &mut Vec<(DraftGroup, GroupProblem)>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(errors) => {
            failures.push((which, GroupProblem::Invalid(errors)));
            None
        }
    }
}

fn slot<D: Clone>(
    which: DraftGroup,
    outcome: &Outcome<D>,
    failures: &mut Vec<(DraftGroup, GroupProblem)>,
) -> Option<Reference<D>> {
    let value = outcome.usable().cloned();
    if value.is_none() {
        failures.push((which, GroupProblem::Unresolved));
    }
    value
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolicyDraft {
    pub general: FormValues,
    pub agent_ids: Vec<i32>,
    pub holder: Outcome<PersonNew>,
    pub details: DetailsDraft,
}

impl PolicyDraft {
    pub fn new(policy_type: PolicyType) -> Self {
        PolicyDraft {
            general: FormValues::new().with("status", "Project"),
            agent_ids: Vec::new(),
            holder: Outcome::none(),
            details: DetailsDraft::new(policy_type),
        }
    }

    /// A draft describing `policy` unchanged: every slot points at the
    /// existing records.
    pub fn from_policy(policy: &PolicyFull) -> Result<Self, serde_json::Error> {
        let general = FormValues::from_entity(
            GENERAL_RULES,
            &GeneralFields {
                series: policy.series.clone(),
                number: policy.number.clone(),
                start_date: policy.start_date,
                end_date: policy.end_date,
                status: policy.status,
            },
        )?;
        let rules = terms_rules(policy.details.policy_type());
        let details = match &policy.details {
            PolicyDetails::GreenCard(d) => DetailsDraft::GreenCard {
                terms: FormValues::from_entity(rules, d)?,
                car: existing(d.car.id),
            },
            PolicyDetails::Medassistance(d) => DetailsDraft::Medassistance {
                terms: FormValues::from_entity(rules, d)?,
                members: d.members.iter().map(|m| existing(m.id)).collect(),
            },
            PolicyDetails::Osago(d) => DetailsDraft::Osago {
                terms: FormValues::from_entity(rules, d)?,
                car: existing(d.car.id),
            },
        };
        Ok(PolicyDraft {
            general,
            agent_ids: Vec::new(),
            holder: existing(policy.holder.id),
            details,
        })
    }

    pub fn policy_type(&self) -> PolicyType {
        self.details.policy_type()
    }

    /// Validate every group and build the create body. Reports all failing
    /// groups at once.
    pub fn assemble(&self) -> Result<CreatePolicyRequest, AssemblyError> {
        let mut failures = Vec::new();
        let general = group(
            DraftGroup::General,
            self.general.to_entity::<GeneralFields>(GENERAL_RULES),
            &mut failures,
        );
        let holder: Option<PersonRef> = slot(DraftGroup::Holder, &self.holder, &mut failures);
        let data = self.details.assemble(&mut failures);

        match (general, holder, data) {
            (Some(general), Some(holder), Some(data)) if failures.is_empty() => {
                Ok(CreatePolicyRequest {
                    holder,
                    series: general.series,
                    number: general.number,
                    start_date: general.start_date,
                    end_date: general.end_date,
                    status: general.status,
                    agent_ids: self.agent_ids.clone(),
                    data,
                })
            }
            _ => Err(AssemblyError { failures }),
        }
    }

    pub fn assemble_update(&self) -> Result<UpdatePolicyRequest, AssemblyError> {
        self.assemble()
    }
}
