//! Turning tool arguments into policy requests.
//!
//! Each holder / car / member argument is driven through its own reference
//! slot, so lookups, diffing and validation behave exactly like the editor.

use std::collections::BTreeMap;
use std::sync::Arc;

use policydesk_client::{Directory, ReferenceSlot};
use policydesk_core::draft::{terms_rules, PolicyDraft, GENERAL_RULES};
use policydesk_core::editor::{Outcome, SlotStatus};
use policydesk_core::form::FormErrors;
use policydesk_core::kinds::{CarKind, PersonKind, ReferenceKind};
use rmcp::schemars;
use serde::de::DeserializeOwned;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct SlotInput {
    /// Id of an existing record to reference. Omit to describe a new record.
    pub existing_id: Option<i32>,
    /// Field values by snake_case name. With `existing_id` these are edits to
    /// the loaded person (cars cannot be edited in place); without it they
    /// must describe the complete new record. `null` or "" clears a field.
    #[serde(default)]
    pub fields: BTreeMap<String, Option<String>>,
}

/// Fields shared by create and update. On update every omitted field keeps
/// its current value.
#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct PolicyInput {
    /// Policy series, e.g. "EP"
    pub series: Option<String>,
    /// Policy number within the series
    pub number: Option<String>,
    /// First day of cover, YYYY-MM-DD
    pub start_date: Option<String>,
    /// Last day of cover, YYYY-MM-DD. "" clears it (open-ended).
    pub end_date: Option<String>,
    /// Active, Project, Prolonged, Rejected, Stopped, Postponed, Cancelled, Replaced or Expired
    pub status: Option<String>,
    /// The policy holder
    pub holder: Option<SlotInput>,
    /// Type-specific terms. GreenCard: territory, period_in_units, period_unit (Day/Month/Year), premium. Medassistance: territory, period_days, premium, payout, program. Osago: period_in_units, period_unit, zone (Zone1..Zone5/Outside), exempt, premium.
    #[serde(default)]
    pub terms: BTreeMap<String, Option<String>>,
    /// Insured car (GreenCard and Osago)
    pub car: Option<SlotInput>,
    /// Insured people (Medassistance). Replaces the whole member list.
    pub members: Option<Vec<SlotInput>>,
}

pub struct SlotReport<D> {
    pub outcome: Outcome<D>,
    pub errors: Option<FormErrors>,
}

/// Run one slot to completion. Broken references and editor misuse are
/// errors; invalid field values are reported alongside the outcome.
pub async fn drive<K, D>(
    label: &str,
    directory: Arc<D>,
    input: &SlotInput,
) -> Result<SlotReport<K::Draft>, String>
where
    K: ReferenceKind,
    D: Directory<K> + 'static,
{
    let slot = ReferenceSlot::<K, D>::new(directory);
    if input.existing_id.is_some() {
        slot.select(input.existing_id);
        match slot.resolved().await.status {
            SlotStatus::Missing { id } => {
                return Err(format!("{label}: {} {id} does not exist", K::NAME))
            }
            SlotStatus::Unreachable { id, reason } => {
                return Err(format!("{label}: could not load {} {id}: {reason}", K::NAME))
            }
            _ => {}
        }
    }
    for (name, value) in &input.fields {
        slot.set_field(name, value.as_deref())
            .map_err(|e| format!("{label}: {e}"))?;
    }
    let outcome = slot.outcome();
    let errors = if outcome.valid {
        None
    } else {
        slot.with_editor(|editor| editor.errors())
    };
    Ok(SlotReport { outcome, errors })
}

fn take<D>(label: &str, report: SlotReport<D>, notes: &mut Vec<String>) -> Outcome<D> {
    if let Some(errors) = report.errors {
        notes.push(format!("{label}: {errors}"));
    }
    report.outcome
}

/// Parse a PascalCase enum name the way the backend spells it.
pub fn parse_choice<T: DeserializeOwned>(what: &str, raw: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|_| format!("unknown {what} '{raw}'"))
}

/// Overlay `input` on `draft`. Returns notes on invalid slot fields, which
/// explain a later assembly failure.
pub async fn apply<P, C>(
    people: &Arc<P>,
    cars: &Arc<C>,
    draft: &mut PolicyDraft,
    input: &PolicyInput,
) -> Result<Vec<String>, String>
where
    P: Directory<PersonKind> + 'static,
    C: Directory<CarKind> + 'static,
{
    let general = [
        ("series", &input.series),
        ("number", &input.number),
        ("start_date", &input.start_date),
        ("end_date", &input.end_date),
        ("status", &input.status),
    ];
    for (name, value) in general {
        debug_assert!(GENERAL_RULES.iter().any(|rule| rule.name == name));
        if let Some(value) = value.as_deref() {
            draft.general.set(name, Some(value));
        }
    }

    let policy_type = draft.policy_type();
    let rules = terms_rules(policy_type);
    for (name, value) in &input.terms {
        if !rules.iter().any(|rule| rule.name == name.as_str()) {
            return Err(format!("{policy_type:?} policies have no term '{name}'"));
        }
        draft.details.terms_mut().set(name, value.as_deref());
    }

    let mut notes = Vec::new();
    if let Some(holder) = &input.holder {
        let report = drive::<PersonKind, P>("holder", people.clone(), holder).await?;
        draft.holder = take("holder", report, &mut notes);
    }
    if let Some(car) = &input.car {
        let report = drive::<CarKind, C>("car", cars.clone(), car).await?;
        let Some(slot) = draft.details.car_mut() else {
            return Err(format!("{policy_type:?} policies have no car"));
        };
        *slot = take("car", report, &mut notes);
    }
    if let Some(members) = &input.members {
        let mut outcomes = Vec::with_capacity(members.len());
        for (i, member) in members.iter().enumerate() {
            let label = format!("member #{}", i + 1);
            let report = drive::<PersonKind, P>(&label, people.clone(), member).await?;
            outcomes.push(take(&label, report, &mut notes));
        }
        let Some(slot) = draft.details.members_mut() else {
            return Err(format!("{policy_type:?} policies have no members"));
        };
        *slot = outcomes;
    }
    Ok(notes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use policydesk_client::MemoryDirectory;
    use policydesk_core::{
        CarFull, CarNew, PersonFull, PersonNew, PersonStatus, PolicyData, PolicyType, Reference,
        Sex,
    };
    use pretty_assertions::assert_eq;

    fn person(id: i32) -> PersonFull {
        PersonFull {
            id,
            data: PersonNew {
                first_name: "Ann".to_string(),
                first_name_lat: None,
                last_name: "Lee".to_string(),
                last_name_lat: None,
                patronymic_name: None,
                patronymic_name_lat: None,
                sex: Sex::F,
                birth_date: NaiveDate::from_ymd_opt(1990, 4, 12).unwrap(),
                tax_number: "1234567890".to_string(),
                phone: "+380501112233".to_string(),
                phone2: None,
                email: "ann@example.com".to_string(),
                status: PersonStatus::Active,
            },
        }
    }

    fn car(id: i32) -> CarFull {
        CarFull {
            id,
            data: CarNew {
                chassis: "CH".to_string(),
                make: "Skoda".to_string(),
                model: "Octavia".to_string(),
                registration: "REG".to_string(),
                plate: "AA1234BB".to_string(),
                year: 2015,
                engine_displacement_litres: 2,
                mileage_km: 150_000,
                unladen_weight: 1300,
                laden_weight: 1800,
                seats: 5,
            },
        }
    }

    fn directories() -> (
        Arc<MemoryDirectory<PersonKind>>,
        Arc<MemoryDirectory<CarKind>>,
    ) {
        (
            Arc::new(MemoryDirectory::new(vec![person(5)])),
            Arc::new(MemoryDirectory::new(vec![car(3)])),
        )
    }

    fn osago_input() -> PolicyInput {
        let terms = [
            ("period_in_units", "12"),
            ("period_unit", "Month"),
            ("zone", "Zone1"),
            ("exempt", "none"),
            ("premium", "2400"),
        ];
        PolicyInput {
            series: Some("EP".to_string()),
            number: Some("1".to_string()),
            start_date: Some("2025-01-01".to_string()),
            status: Some("Active".to_string()),
            holder: Some(SlotInput {
                existing_id: Some(5),
                fields: BTreeMap::from([("phone".to_string(), Some("+380671234567".to_string()))]),
            }),
            terms: terms
                .into_iter()
                .map(|(k, v)| (k.to_string(), Some(v.to_string())))
                .collect(),
            car: Some(SlotInput {
                existing_id: Some(3),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn slots_resolve_and_edits_become_updates() {
        let (people, cars) = directories();
        let mut draft = PolicyDraft::new(PolicyType::Osago);
        let notes = apply(&people, &cars, &mut draft, &osago_input()).await.unwrap();
        assert!(notes.is_empty());

        let request = draft.assemble().unwrap();
        let Reference::ExistingWithUpdates { id, data } = &request.holder else {
            panic!("expected holder updates, got {:?}", request.holder);
        };
        assert_eq!(*id, 5);
        assert_eq!(data.phone, "+380671234567");
        let PolicyData::Osago(osago) = &request.data else {
            panic!("wrong policy type");
        };
        assert_eq!(osago.car, Reference::Existing { id: 3 });
    }

    #[tokio::test]
    async fn missing_reference_is_an_error() {
        let (people, cars) = directories();
        let mut input = osago_input();
        input.car = Some(SlotInput {
            existing_id: Some(99),
            ..Default::default()
        });
        let mut draft = PolicyDraft::new(PolicyType::Osago);
        let err = apply(&people, &cars, &mut draft, &input).await.unwrap_err();
        assert_eq!(err, "car: car 99 does not exist");
    }

    #[tokio::test]
    async fn existing_car_cannot_be_edited() {
        let (people, cars) = directories();
        let mut input = osago_input();
        input.car = Some(SlotInput {
            existing_id: Some(3),
            fields: BTreeMap::from([("plate".to_string(), Some("XX".to_string()))]),
        });
        let mut draft = PolicyDraft::new(PolicyType::Osago);
        let err = apply(&people, &cars, &mut draft, &input).await.unwrap_err();
        assert!(err.starts_with("car: car form is locked"));
    }

    #[tokio::test]
    async fn invalid_new_member_is_explained() {
        let (people, cars) = directories();
        let input = PolicyInput {
            members: Some(vec![SlotInput {
                existing_id: None,
                fields: BTreeMap::from([("first_name".to_string(), Some("Iryna".to_string()))]),
            }]),
            ..Default::default()
        };
        let mut draft = PolicyDraft::new(PolicyType::Medassistance);
        let notes = apply(&people, &cars, &mut draft, &input).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert!(notes[0].starts_with("member #1: last_name is required"));
    }

    #[tokio::test]
    async fn terms_are_checked_against_the_policy_type() {
        let (people, cars) = directories();
        let input = PolicyInput {
            terms: BTreeMap::from([("zone".to_string(), Some("Zone1".to_string()))]),
            ..Default::default()
        };
        let mut draft = PolicyDraft::new(PolicyType::GreenCard);
        let err = apply(&people, &cars, &mut draft, &input).await.unwrap_err();
        assert_eq!(err, "GreenCard policies have no term 'zone'");
    }

    #[test]
    fn choices_parse_by_backend_name() {
        assert_eq!(parse_choice::<PolicyType>("policy type", "Osago"), Ok(PolicyType::Osago));
        assert_eq!(
            parse_choice::<PolicyType>("policy type", "Life"),
            Err("unknown policy type 'Life'".to_string())
        );
    }
}
