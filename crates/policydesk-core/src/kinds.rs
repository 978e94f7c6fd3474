use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::form::{FieldRule, FormValues, EMAIL_PATTERN};
use crate::{CarFull, CarNew, PersonFull, PersonNew};

/// What happens to the detail form once an existing entity is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistingMode {
    /// Fields stay editable; edits are diffed against the snapshot and
    /// emitted as `ExistingWithUpdates`.
    Editable,
    /// Fields are disabled; the value is always `Existing`.
    Locked,
}

/// An entity that can be referenced from a policy form.
pub trait ReferenceKind: Send + Sync + 'static {
    /// Editable attributes, the payload of `New` / `ExistingWithUpdates`.
    type Draft: Serialize + DeserializeOwned + Clone + PartialEq + fmt::Debug + Send + Sync + 'static;
    /// Full record as returned by `GET /{collection}/{id}`.
    type Record: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static;

    const NAME: &'static str;
    /// Path segment of the backend collection.
    const COLLECTION: &'static str;
    const EXISTING: ExistingMode;

    fn rules() -> &'static [FieldRule];
    fn record_id(record: &Self::Record) -> i32;
    fn record_draft(record: &Self::Record) -> &Self::Draft;
    fn label(record: &Self::Record) -> String;

    /// Form state after a reset.
    fn blank_form() -> FormValues {
        FormValues::new()
    }
}

pub const SEX_OPTIONS: &[&str] = &["M", "F", "Unknown"];
pub const PERSON_STATUS_OPTIONS: &[&str] = &["Active", "Inactive", "Archived"];

pub const PERSON_RULES: &[FieldRule] = &[
    FieldRule::text("first_name").required(),
    FieldRule::text("first_name_lat"),
    FieldRule::text("last_name").required(),
    FieldRule::text("last_name_lat"),
    FieldRule::text("patronymic_name"),
    FieldRule::text("patronymic_name_lat"),
    FieldRule::choice("sex", SEX_OPTIONS).required(),
    FieldRule::date("birth_date").required(),
    FieldRule::text("tax_number").required(),
    FieldRule::text("phone").required(),
    FieldRule::text("phone2"),
    FieldRule::text("email").required().pattern(EMAIL_PATTERN),
    FieldRule::choice("status", PERSON_STATUS_OPTIONS).required(),
];

pub const CAR_RULES: &[FieldRule] = &[
    FieldRule::text("chassis").required(),
    FieldRule::text("make").required(),
    FieldRule::text("model").required(),
    FieldRule::text("registration").required(),
    FieldRule::text("plate").required(),
    FieldRule::integer("year").required(),
    FieldRule::integer("engine_displacement_litres").required(),
    FieldRule::integer("mileage_km").required(),
    FieldRule::integer("unladen_weight").required(),
    FieldRule::integer("laden_weight").required(),
    FieldRule::integer("seats").required(),
];

#[derive(Debug, Clone, Copy)]
pub struct PersonKind;

impl ReferenceKind for PersonKind {
    type Draft = PersonNew;
    type Record = PersonFull;

    const NAME: &'static str = "person";
    const COLLECTION: &'static str = "people";
    const EXISTING: ExistingMode = ExistingMode::Editable;

    fn rules() -> &'static [FieldRule] {
        PERSON_RULES
    }

    fn record_id(record: &PersonFull) -> i32 {
        record.id
    }

    fn record_draft(record: &PersonFull) -> &PersonNew {
        &record.data
    }

    fn label(record: &PersonFull) -> String {
        record.label()
    }

    fn blank_form() -> FormValues {
        FormValues::new().with("status", "Active")
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CarKind;

impl ReferenceKind for CarKind {
    type Draft = CarNew;
    type Record = CarFull;

    const NAME: &'static str = "car";
    const COLLECTION: &'static str = "cars";
    const EXISTING: ExistingMode = ExistingMode::Locked;

    fn rules() -> &'static [FieldRule] {
        CAR_RULES
    }

    fn record_id(record: &CarFull) -> i32 {
        record.id
    }

    fn record_draft(record: &CarFull) -> &CarNew {
        &record.data
    }

    fn label(record: &CarFull) -> String {
        record.label()
    }
}
