use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use policydesk_core::editor::{LookupError, Outcome, ReferenceEditor, Resolution, SlotStatus};
use policydesk_core::form::{self, FieldError, FormValues};
use policydesk_core::kinds::{CarKind, PersonKind, ReferenceKind, PERSON_RULES};
use policydesk_core::{
    CarFull, CarNew, EditorError, PersonFull, PersonNew, PersonStatus, Reference, Sex,
};
use pretty_assertions::assert_eq;

fn person(id: i32, first_name: &str) -> PersonFull {
    PersonFull {
        id,
        data: PersonNew {
            first_name: first_name.to_string(),
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
            chassis: "WVWZZZ1JZXW000001".to_string(),
            make: "Skoda".to_string(),
            model: "Octavia".to_string(),
            registration: "CXE123456".to_string(),
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

fn resolved_person(id: i32, first_name: &str) -> ReferenceEditor<PersonKind> {
    let mut editor = ReferenceEditor::<PersonKind>::new();
    let ticket = editor.select(Some(id)).unwrap();
    assert_eq!(editor.resolve(ticket, Ok(person(id, first_name))), Resolution::Applied);
    editor
}

#[test]
fn snapshot_diff_against_itself_is_empty() {
    let snapshot = FormValues::from_entity(PERSON_RULES, &person(5, "Ann").data).unwrap();
    assert!(form::diff(PERSON_RULES, &snapshot, &snapshot).is_empty());
}

#[test]
fn empty_text_over_null_field_is_not_a_change() {
    let mut editor = resolved_person(5, "Ann");
    editor.set_field("first_name_lat", Some("")).unwrap();
    editor.set_field("phone2", None).unwrap();

    assert!(editor.changed_fields().is_empty());
    assert_eq!(editor.value(), Some(&Reference::Existing { id: 5 }));
}

#[test]
fn unmodified_selection_emits_existing() {
    let editor = resolved_person(5, "Ann");
    assert_eq!(editor.status(), &SlotStatus::Resolved { id: 5 });
    assert_eq!(editor.value(), Some(&Reference::Existing { id: 5 }));
    assert!(editor.is_valid());
    assert!(!editor.is_locked());
}

#[test]
fn edited_selection_emits_existing_with_updates() {
    let mut editor = resolved_person(5, "Ann");
    editor.set_field("first_name", Some("Anna")).unwrap();

    let mut expected = person(5, "Ann").data;
    expected.first_name = "Anna".to_string();
    assert_eq!(editor.changed_fields(), vec!["first_name"]);
    assert_eq!(
        editor.value(),
        Some(&Reference::ExistingWithUpdates {
            id: 5,
            data: expected
        })
    );
    assert!(editor.is_valid());
}

#[test]
fn invalid_edit_keeps_existing_but_reports_invalid() {
    let mut editor = resolved_person(5, "Ann");
    editor.set_field("email", Some("not-an-email")).unwrap();

    assert_eq!(editor.value(), Some(&Reference::Existing { id: 5 }));
    assert!(!editor.is_valid());
    assert_eq!(editor.outcome().usable(), None);
    assert_eq!(
        editor.errors().unwrap().get("email"),
        Some(&FieldError::Pattern)
    );
}

#[test]
fn reverting_an_edit_goes_back_to_existing() {
    let mut editor = resolved_person(5, "Ann");
    editor.set_field("first_name", Some("Anna")).unwrap();
    editor.set_field("first_name", Some("Ann")).unwrap();
    assert_eq!(editor.value(), Some(&Reference::Existing { id: 5 }));

    editor.set_field("last_name", Some("Park")).unwrap();
    editor.reset_form().unwrap();
    assert_eq!(editor.value(), Some(&Reference::Existing { id: 5 }));
}

#[test]
fn complete_new_entry_emits_new() {
    let mut editor = ReferenceEditor::<PersonKind>::new();
    let data = person(0, "Olena").data;
    let values = FormValues::from_entity(PERSON_RULES, &data).unwrap();
    for (name, value) in values.iter() {
        editor.set_field(name, Some(value)).unwrap();
    }
    assert_eq!(editor.value(), Some(&Reference::New(data)));
    assert!(editor.is_valid());

    editor.set_field("tax_number", None).unwrap();
    assert_eq!(editor.value(), None);
    assert!(!editor.is_valid());
}

#[test]
fn late_reply_for_abandoned_selection_is_discarded() {
    let mut editor = ReferenceEditor::<PersonKind>::new();
    let slow = editor.select(Some(1)).unwrap();
    let fast = editor.select(Some(2)).unwrap();

    assert_eq!(editor.resolve(fast, Ok(person(2, "Bohdan"))), Resolution::Applied);
    assert_eq!(editor.resolve(slow, Ok(person(1, "Anton"))), Resolution::Stale);

    assert_eq!(editor.status(), &SlotStatus::Resolved { id: 2 });
    assert_eq!(editor.form().get("first_name"), Some("Bohdan"));
    assert_eq!(editor.value(), Some(&Reference::Existing { id: 2 }));
}

#[test]
fn reply_after_clearing_is_discarded() {
    let mut editor = ReferenceEditor::<PersonKind>::new();
    let ticket = editor.select(Some(1)).unwrap();
    assert_eq!(editor.select(None), None);

    assert_eq!(editor.resolve(ticket, Ok(person(1, "Anton"))), Resolution::Stale);
    assert_eq!(editor.status(), &SlotStatus::Empty);
    assert_eq!(editor.form().get("first_name"), None);
}

#[test]
fn pending_selection_emits_nothing() {
    let mut editor = resolved_person(5, "Ann");
    editor.select(Some(6)).unwrap();
    assert!(editor.status().is_pending());
    assert_eq!(editor.value(), None);
    assert!(!editor.is_valid());
}

#[test]
fn missing_record_is_fatal_and_leaves_form_alone() {
    let mut editor = ReferenceEditor::<PersonKind>::new();
    let ticket = editor.select(Some(9)).unwrap();

    assert_eq!(editor.resolve(ticket, Err(LookupError::NotFound)), Resolution::Missing);
    assert_eq!(editor.status(), &SlotStatus::Missing { id: 9 });
    assert!(editor.status().is_fatal());
    assert_eq!(editor.value(), None);
    assert!(!editor.is_valid());
    assert_eq!(editor.form(), &PersonKind::blank_form());
    assert_eq!(editor.snapshot(), None);
}

#[test]
fn unreachable_backend_can_be_retried() {
    let mut editor = ReferenceEditor::<PersonKind>::new();
    let ticket = editor.select(Some(5)).unwrap();
    let outcome = editor.resolve(ticket, Err(LookupError::Unavailable("timeout".into())));

    assert_eq!(outcome, Resolution::Unreachable);
    assert!(!editor.status().is_fatal());
    assert_eq!(editor.value(), None);

    let retry = editor.select(Some(5)).unwrap();
    assert_eq!(editor.resolve(retry, Ok(person(5, "Ann"))), Resolution::Applied);
    assert_eq!(editor.value(), Some(&Reference::Existing { id: 5 }));
}

#[test]
fn clearing_resets_form_and_snapshot() {
    let mut editor = resolved_person(5, "Ann");
    editor.set_field("first_name", Some("Anna")).unwrap();
    editor.select(None);

    assert_eq!(editor.status(), &SlotStatus::Empty);
    assert_eq!(editor.form(), &PersonKind::blank_form());
    assert_eq!(editor.snapshot(), None);
    assert_eq!(editor.value(), None);
    editor.set_field("first_name", Some("Iryna")).unwrap();
}

#[test]
fn selected_car_is_locked_and_always_existing() {
    let mut editor = ReferenceEditor::<CarKind>::new();
    let ticket = editor.select(Some(3)).unwrap();
    editor.resolve(ticket, Ok(car(3)));

    assert!(editor.is_locked());
    assert!(matches!(
        editor.set_field("plate", Some("BB0000CC")),
        Err(EditorError::Locked { kind: "car" })
    ));
    assert_eq!(editor.value(), Some(&Reference::Existing { id: 3 }));
    assert!(editor.changed_fields().is_empty());

    editor.select(None);
    assert!(!editor.is_locked());
    editor.set_field("plate", Some("BB0000CC")).unwrap();
}

#[test]
fn unknown_field_is_rejected() {
    let mut editor = ReferenceEditor::<CarKind>::new();
    let err = editor.set_field("colour", Some("red")).unwrap_err();
    assert_eq!(err.to_string(), "car form has no field named 'colour'");
}

#[test]
fn written_updates_are_reapplied_after_load() {
    let mut editor = ReferenceEditor::<PersonKind>::new();
    let mut edited = person(5, "Ann").data;
    edited.phone = "+380679998877".to_string();

    let ticket = editor
        .write_value(Some(Reference::ExistingWithUpdates {
            id: 5,
            data: edited.clone(),
        }))
        .unwrap()
        .unwrap();
    assert_eq!(editor.value(), None);

    editor.resolve(ticket, Ok(person(5, "Ann")));
    assert_eq!(editor.changed_fields(), vec!["phone"]);
    assert_eq!(
        editor.value(),
        Some(&Reference::ExistingWithUpdates { id: 5, data: edited })
    );
}

#[test]
fn written_updates_can_clear_optional_fields() {
    let mut stored = person(5, "Ann");
    stored.data.phone2 = Some("+380671112233".to_string());
    let mut edited = stored.data.clone();
    edited.phone = "+380679998877".to_string();
    edited.phone2 = None;

    let mut editor = ReferenceEditor::<PersonKind>::new();
    let ticket = editor
        .write_value(Some(Reference::ExistingWithUpdates {
            id: 5,
            data: edited.clone(),
        }))
        .unwrap()
        .unwrap();
    editor.resolve(ticket, Ok(stored));

    assert_eq!(editor.form().get("phone2"), None);
    assert_eq!(editor.changed_fields(), vec!["phone", "phone2"]);
    assert_eq!(
        editor.value(),
        Some(&Reference::ExistingWithUpdates { id: 5, data: edited })
    );
}

#[test]
fn written_new_value_fills_the_form() {
    let mut editor = ReferenceEditor::<CarKind>::new();
    let data = car(0).data;
    let ticket = editor.write_value(Some(Reference::New(data.clone()))).unwrap();

    assert_eq!(ticket, None);
    assert_eq!(editor.form().get("year"), Some("2015"));
    assert_eq!(editor.value(), Some(&Reference::New(data)));
}

#[test]
fn subscribers_see_each_change_once() {
    let seen: Arc<Mutex<Vec<Outcome<PersonNew>>>> = Arc::default();
    let sink = seen.clone();
    let mut editor = ReferenceEditor::<PersonKind>::new();
    editor.subscribe(move |outcome| sink.lock().unwrap().push(outcome.clone()));

    let ticket = editor.select(Some(5)).unwrap();
    editor.resolve(ticket, Ok(person(5, "Ann")));
    editor.set_field("first_name_lat", Some("")).unwrap();
    editor.set_field("first_name", Some("Anna")).unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], Outcome::ready(Reference::Existing { id: 5 }));
    assert!(matches!(
        seen[1].value,
        Some(Reference::ExistingWithUpdates { id: 5, .. })
    ));
    assert_eq!(editor.revision(), 2);
}
