//! Declarative field constraints and the text-level form state they apply to.
//!
//! A form is a flat map of field name to text, as typed by the user. Empty
//! text and "no value" are the same thing here: `FormValues::set` drops empty
//! strings, so a round-tripped `null` never looks like an edit.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{LazyLock, Mutex};

use chrono::NaiveDate;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    /// ISO `YYYY-MM-DD`.
    Date,
    Choice(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    /// Regex the whole value must match, checked after the kind.
    pub pattern: Option<&'static str>,
}

impl FieldRule {
    pub const fn text(name: &'static str) -> Self {
        FieldRule {
            name,
            kind: FieldKind::Text,
            required: false,
            pattern: None,
        }
    }

    pub const fn integer(name: &'static str) -> Self {
        FieldRule {
            kind: FieldKind::Integer,
            ..Self::text(name)
        }
    }

    pub const fn date(name: &'static str) -> Self {
        FieldRule {
            kind: FieldKind::Date,
            ..Self::text(name)
        }
    }

    pub const fn choice(name: &'static str, options: &'static [&'static str]) -> Self {
        FieldRule {
            kind: FieldKind::Choice(options),
            ..Self::text(name)
        }
    }

    pub const fn required(self) -> Self {
        FieldRule {
            required: true,
            ..self
        }
    }

    pub const fn pattern(self, pattern: &'static str) -> Self {
        FieldRule {
            pattern: Some(pattern),
            ..self
        }
    }
}

pub const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("is required")]
    Required,
    #[error("does not match the expected format")]
    Pattern,
    #[error("is not a whole number")]
    NotAnInteger,
    #[error("is not a date (YYYY-MM-DD)")]
    NotADate,
    #[error("must be one of: {}", .0.join(", "))]
    NotAChoice(&'static [&'static str]),
    #[error("is malformed: {0}")]
    Malformed(String),
}

/// Every failing field of a form, in rule order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    fields: Vec<(String, FieldError)>,
}

impl FormErrors {
    pub fn single(field: impl Into<String>, error: FieldError) -> Self {
        FormErrors {
            fields: vec![(field.into(), error)],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn get(&self, field: &str) -> Option<&FieldError> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, e)| e)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldError)> {
        self.fields.iter().map(|(name, e)| (name.as_str(), e))
    }

    fn push(&mut self, field: &str, error: FieldError) {
        self.fields.push((field.to_string(), error));
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|(name, e)| format!("{name} {e}"))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

impl std::error::Error for FormErrors {}

/// Text values of a form keyed by field name. Empty strings are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormValues(BTreeMap<String, String>);

impl FormValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Set or clear a field. `Some("")` clears it, same as `None`.
    pub fn set(&mut self, name: &str, value: Option<&str>) {
        match value.filter(|v| !v.is_empty()) {
            Some(v) => {
                self.0.insert(name.to_string(), v.to_string());
            }
            None => {
                self.0.remove(name);
            }
        }
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.set(name, Some(value));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Render a typed entity as form text, one value per rule.
    pub fn from_entity<T: Serialize>(
        rules: &[FieldRule],
        entity: &T,
    ) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_value(entity)?;
        let mut values = FormValues::new();
        for rule in rules {
            let text = match json.get(rule.name) {
                None | Some(Value::Null) => None,
                Some(Value::String(s)) => Some(s.clone()),
                Some(other) => Some(other.to_string()),
            };
            values.set(rule.name, text.as_deref());
        }
        Ok(values)
    }

    /// Validate against `rules`, then build the typed entity.
    pub fn to_entity<T: DeserializeOwned>(&self, rules: &[FieldRule]) -> Result<T, FormErrors> {
        validate(rules, self)?;
        let mut map = Map::new();
        for rule in rules {
            let value = match (self.get(rule.name), rule.kind) {
                (None, _) => Value::Null,
                (Some(text), FieldKind::Integer) => text
                    .parse::<i64>()
                    .map(Value::from)
                    .map_err(|_| FormErrors::single(rule.name, FieldError::NotAnInteger))?,
                (Some(text), _) => Value::String(text.to_string()),
            };
            map.insert(rule.name.to_string(), value);
        }
        serde_json::from_value(Value::Object(map))
            .map_err(|e| FormErrors::single("form", FieldError::Malformed(e.to_string())))
    }
}

/// Check every rule against the form. Pure; no I/O, no UI state.
pub fn validate(rules: &[FieldRule], values: &FormValues) -> Result<(), FormErrors> {
    let mut errors = FormErrors::default();
    for rule in rules {
        let Some(value) = values.get(rule.name) else {
            if rule.required {
                errors.push(rule.name, FieldError::Required);
            }
            continue;
        };
        if let Some(e) = check_kind(rule.kind, value) {
            errors.push(rule.name, e);
            continue;
        }
        if let Some(pattern) = rule.pattern {
            if !matches_pattern(pattern, value) {
                errors.push(rule.name, FieldError::Pattern);
            }
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_kind(kind: FieldKind, value: &str) -> Option<FieldError> {
    match kind {
        FieldKind::Text => None,
        FieldKind::Integer => value.parse::<i32>().err().map(|_| FieldError::NotAnInteger),
        FieldKind::Date => NaiveDate::parse_from_str(value, DATE_FORMAT)
            .err()
            .map(|_| FieldError::NotADate),
        FieldKind::Choice(options) => {
            (!options.contains(&value)).then_some(FieldError::NotAChoice(options))
        }
    }
}

/// Compiled field patterns, built once per pattern. A pattern that fails to
/// compile is remembered as `None` and never matches.
static PATTERNS: LazyLock<Mutex<HashMap<&'static str, Option<Regex>>>> =
    LazyLock::new(Default::default);

fn matches_pattern(pattern: &'static str, value: &str) -> bool {
    let mut patterns = PATTERNS.lock().unwrap();
    let compiled = patterns.entry(pattern).or_insert_with(|| match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::error!(pattern, error = %e, "field pattern does not compile");
            None
        }
    });
    compiled.as_ref().is_some_and(|re| re.is_match(value))
}

/// Names of the fields whose (null-normalized) values differ from `snapshot`.
pub fn diff(rules: &[FieldRule], values: &FormValues, snapshot: &FormValues) -> Vec<&'static str> {
    rules
        .iter()
        .filter(|rule| values.get(rule.name) != snapshot.get(rule.name))
        .map(|rule| rule.name)
        .collect()
}
