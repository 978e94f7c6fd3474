//! The reference editor: pick an existing entity, edit it in place, or type a
//! new one, and always expose a single `Reference` (or nothing) to the host.
//!
//! The editor is synchronous and owns no I/O. Selecting an id hands out a
//! [`FetchTicket`]; whoever performs the lookup feeds the result back through
//! [`ReferenceEditor::resolve`]. Tickets carry a generation number, so a reply
//! for an abandoned selection is recognised and dropped.

use std::marker::PhantomData;

use crate::error::EditorError;
use crate::form::{self, FormErrors, FormValues};
use crate::kinds::{ExistingMode, ReferenceKind};
use crate::reference::Reference;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    id: i32,
    generation: u64,
}

impl FetchTicket {
    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Why a lookup by id produced no record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// The id does not resolve. The reference is broken.
    NotFound,
    /// The backend could not be reached or answered with an error.
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotStatus {
    /// Nothing selected; the form describes a new entity.
    Empty,
    Pending { id: i32 },
    Resolved { id: i32 },
    /// The selected id does not exist. Blocks submission.
    Missing { id: i32 },
    /// The lookup failed for another reason; reselecting retries it.
    Unreachable { id: i32, reason: String },
}

impl SlotStatus {
    pub fn selected_id(&self) -> Option<i32> {
        match self {
            SlotStatus::Empty => None,
            SlotStatus::Pending { id }
            | SlotStatus::Resolved { id }
            | SlotStatus::Missing { id }
            | SlotStatus::Unreachable { id, .. } => Some(*id),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, SlotStatus::Pending { .. })
    }

    /// A broken reference: the host must not submit.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SlotStatus::Missing { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Applied,
    /// The ticket belongs to a superseded selection; nothing changed.
    Stale,
    Missing,
    Unreachable,
}

/// What the editor currently exposes to its host form.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<D> {
    pub value: Option<Reference<D>>,
    pub valid: bool,
}

impl<D> Outcome<D> {
    pub fn none() -> Self {
        Outcome {
            value: None,
            valid: false,
        }
    }

    pub fn ready(value: Reference<D>) -> Self {
        Outcome {
            value: Some(value),
            valid: true,
        }
    }

    /// A value that may be submitted.
    pub fn usable(&self) -> Option<&Reference<D>> {
        if self.valid {
            self.value.as_ref()
        } else {
            None
        }
    }
}

type Listener<D> = Box<dyn FnMut(&Outcome<D>) + Send>;

pub struct ReferenceEditor<K: ReferenceKind> {
    status: SlotStatus,
    generation: u64,
    form: FormValues,
    snapshot: Option<FormValues>,
    locked: bool,
    /// Field values to re-apply once the pending snapshot arrives.
    carried: Option<FormValues>,
    outcome: Outcome<K::Draft>,
    revision: u64,
    listeners: Vec<Listener<K::Draft>>,
    _kind: PhantomData<fn() -> K>,
}

impl<K: ReferenceKind> Default for ReferenceEditor<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ReferenceKind> ReferenceEditor<K> {
    pub fn new() -> Self {
        let mut editor = ReferenceEditor {
            status: SlotStatus::Empty,
            generation: 0,
            form: K::blank_form(),
            snapshot: None,
            locked: false,
            carried: None,
            outcome: Outcome::none(),
            revision: 0,
            listeners: Vec::new(),
            _kind: PhantomData,
        };
        editor.outcome = editor.decide();
        editor
    }

    // --- Identity selector ---

    /// Point the selector at `id`, or clear it with `None`.
    ///
    /// Returns the ticket for the lookup the caller must perform. Any ticket
    /// handed out earlier becomes stale.
    pub fn select(&mut self, id: Option<i32>) -> Option<FetchTicket> {
        self.generation += 1;
        self.carried = None;
        let Some(id) = id else {
            self.clear();
            return None;
        };
        tracing::debug!(kind = K::NAME, id, generation = self.generation, "selecting");
        self.status = SlotStatus::Pending { id };
        self.snapshot = None;
        self.recompute();
        Some(FetchTicket {
            id,
            generation: self.generation,
        })
    }

    /// Apply the result of the lookup issued for `ticket`.
    pub fn resolve(
        &mut self,
        ticket: FetchTicket,
        result: Result<K::Record, LookupError>,
    ) -> Resolution {
        if ticket.generation != self.generation {
            tracing::debug!(
                kind = K::NAME,
                id = ticket.id,
                generation = ticket.generation,
                current = self.generation,
                "discarding stale lookup"
            );
            return Resolution::Stale;
        }
        let id = ticket.id;
        match result {
            Ok(record) => match FormValues::from_entity(K::rules(), K::record_draft(&record)) {
                Ok(snapshot) => {
                    self.load_snapshot(K::record_id(&record), snapshot);
                    Resolution::Applied
                }
                Err(e) => {
                    self.fail(SlotStatus::Unreachable {
                        id,
                        reason: e.to_string(),
                    });
                    Resolution::Unreachable
                }
            },
            Err(LookupError::NotFound) => {
                tracing::warn!(kind = K::NAME, id, "referenced record does not exist");
                self.fail(SlotStatus::Missing { id });
                Resolution::Missing
            }
            Err(LookupError::Unavailable(reason)) => {
                tracing::warn!(kind = K::NAME, id, %reason, "lookup failed");
                self.fail(SlotStatus::Unreachable { id, reason });
                Resolution::Unreachable
            }
        }
    }

    fn load_snapshot(&mut self, id: i32, snapshot: FormValues) {
        self.form = snapshot.clone();
        self.locked = K::EXISTING == ExistingMode::Locked;
        // A written value is a whole entity, cleared fields included.
        if let Some(carried) = self.carried.take() {
            if !self.locked {
                self.form = carried;
            }
        }
        self.snapshot = Some(snapshot);
        self.status = SlotStatus::Resolved { id };
        self.recompute();
    }

    fn fail(&mut self, status: SlotStatus) {
        self.carried = None;
        self.snapshot = None;
        self.status = status;
        self.recompute();
    }

    fn clear(&mut self) {
        self.status = SlotStatus::Empty;
        self.form = K::blank_form();
        self.snapshot = None;
        self.locked = false;
        self.recompute();
    }

    // --- Detail form ---

    pub fn set_field(&mut self, name: &str, value: Option<&str>) -> Result<(), EditorError> {
        if !K::rules().iter().any(|rule| rule.name == name) {
            return Err(EditorError::UnknownField {
                kind: K::NAME,
                field: name.to_string(),
            });
        }
        if self.locked {
            return Err(EditorError::Locked { kind: K::NAME });
        }
        self.form.set(name, value);
        self.recompute();
        Ok(())
    }

    /// Drop unsaved edits: back to the snapshot, or to a blank form.
    pub fn reset_form(&mut self) -> Result<(), EditorError> {
        if self.locked {
            return Err(EditorError::Locked { kind: K::NAME });
        }
        self.form = self.snapshot.clone().unwrap_or_else(K::blank_form);
        self.recompute();
        Ok(())
    }

    /// Programmatic counterpart of user input, used to initialise the editor
    /// from an existing request.
    pub fn write_value(
        &mut self,
        value: Option<Reference<K::Draft>>,
    ) -> Result<Option<FetchTicket>, EditorError> {
        match value {
            None => Ok(self.select(None)),
            Some(Reference::Existing { id }) => Ok(self.select(Some(id))),
            Some(Reference::ExistingWithUpdates { id, data }) => {
                let carried = self.encode(&data)?;
                let ticket = self.select(Some(id));
                self.carried = Some(carried);
                Ok(ticket)
            }
            Some(Reference::New(data)) => {
                let form = self.encode(&data)?;
                self.select(None);
                self.form = form;
                self.recompute();
                Ok(None)
            }
        }
    }

    fn encode(&self, data: &K::Draft) -> Result<FormValues, EditorError> {
        FormValues::from_entity(K::rules(), data).map_err(|source| EditorError::Encode {
            kind: K::NAME,
            source,
        })
    }

    // --- Value emitter ---

    /// The single decision both the emitted value and the validity come from.
    fn decide(&self) -> Outcome<K::Draft> {
        match self.status {
            SlotStatus::Resolved { id } => {
                if self.changed_fields().is_empty() {
                    return Outcome::ready(Reference::Existing { id });
                }
                match self.form.to_entity(K::rules()) {
                    Ok(data) => Outcome::ready(Reference::ExistingWithUpdates { id, data }),
                    Err(_) => Outcome {
                        value: Some(Reference::Existing { id }),
                        valid: false,
                    },
                }
            }
            SlotStatus::Empty => match self.form.to_entity(K::rules()) {
                Ok(data) => Outcome::ready(Reference::New(data)),
                Err(_) => Outcome::none(),
            },
            SlotStatus::Pending { .. }
            | SlotStatus::Missing { .. }
            | SlotStatus::Unreachable { .. } => Outcome::none(),
        }
    }

    fn recompute(&mut self) {
        let next = self.decide();
        if next == self.outcome {
            return;
        }
        self.outcome = next;
        self.revision += 1;
        for listener in &mut self.listeners {
            listener(&self.outcome);
        }
    }

    /// Call `listener` every time the emitted value or validity changes.
    pub fn subscribe(&mut self, listener: impl FnMut(&Outcome<K::Draft>) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    // --- Accessors ---

    pub fn value(&self) -> Option<&Reference<K::Draft>> {
        self.outcome.value.as_ref()
    }

    pub fn is_valid(&self) -> bool {
        self.outcome.valid
    }

    pub fn outcome(&self) -> &Outcome<K::Draft> {
        &self.outcome
    }

    /// Incremented on every change of the outcome.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn status(&self) -> &SlotStatus {
        &self.status
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn form(&self) -> &FormValues {
        &self.form
    }

    pub fn snapshot(&self) -> Option<&FormValues> {
        self.snapshot.as_ref()
    }

    /// Fields edited since the snapshot was loaded. Always empty for locked
    /// kinds and while nothing is resolved.
    pub fn changed_fields(&self) -> Vec<&'static str> {
        match (&self.snapshot, self.locked) {
            (Some(snapshot), false) => form::diff(K::rules(), &self.form, snapshot),
            _ => Vec::new(),
        }
    }

    pub fn errors(&self) -> Option<FormErrors> {
        form::validate(K::rules(), &self.form).err()
    }
}
