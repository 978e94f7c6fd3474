use serde::{Deserialize, Serialize};

use crate::{CarNew, PersonNew};

/// The value a reference editor hands to its host form: use an existing
/// entity, use it with field changes, or create a new one.
///
/// Serialized with a `kind` discriminator and the entity fields flattened
/// alongside it, which is exactly what the backend accepts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind")]
pub enum Reference<D> {
    Existing {
        id: i32,
    },
    ExistingWithUpdates {
        id: i32,
        #[serde(flatten)]
        data: D,
    },
    New(D),
}

impl<D> Reference<D> {
    /// Id of the referenced entity, `None` for a new one.
    pub fn id(&self) -> Option<i32> {
        match self {
            Reference::Existing { id } | Reference::ExistingWithUpdates { id, .. } => Some(*id),
            Reference::New(_) => None,
        }
    }

    pub fn data(&self) -> Option<&D> {
        match self {
            Reference::Existing { .. } => None,
            Reference::ExistingWithUpdates { data, .. } | Reference::New(data) => Some(data),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Reference::Existing { .. } => "Existing",
            Reference::ExistingWithUpdates { .. } => "ExistingWithUpdates",
            Reference::New(_) => "New",
        }
    }
}

pub type PersonRef = Reference<PersonNew>;
pub type CarRef = Reference<CarNew>;
