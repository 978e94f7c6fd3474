pub mod client;
pub mod directory;
pub mod error;
pub mod feed;
pub mod slot;

use std::sync::Arc;
use std::time::Duration;

use policydesk_core::kinds::{CarKind, PersonKind};
use policydesk_core::Settings;

pub use client::BackendClient;
pub use directory::{Directory, HttpDirectory, MemoryDirectory};
pub use error::ClientError;
pub use feed::{SuggestionFeed, SuggestionList};
pub use slot::{ReferenceSlot, SlotState};

pub type PersonSlot = ReferenceSlot<PersonKind, HttpDirectory<PersonKind>>;
pub type CarSlot = ReferenceSlot<CarKind, HttpDirectory<CarKind>>;

/// Everything a policy editor needs to talk to the backend.
#[derive(Debug, Clone)]
pub struct Backend {
    pub client: BackendClient,
    pub people: Arc<HttpDirectory<PersonKind>>,
    pub cars: Arc<HttpDirectory<CarKind>>,
    pub search_debounce: Duration,
}

impl Backend {
    pub fn connect(settings: &Settings) -> Result<Self, ClientError> {
        let client = BackendClient::new(settings)?;
        tracing::info!(api_url = %client.base_url(), "backend configured");
        Ok(Backend {
            people: Arc::new(HttpDirectory::new(client.clone())),
            cars: Arc::new(HttpDirectory::new(client.clone())),
            client,
            search_debounce: Duration::from_millis(settings.search_debounce_ms),
        })
    }

    pub fn person_slot(&self) -> PersonSlot {
        ReferenceSlot::new(self.people.clone())
    }

    pub fn car_slot(&self) -> CarSlot {
        ReferenceSlot::new(self.cars.clone())
    }

    pub fn people_feed(&self) -> SuggestionFeed<PersonKind, HttpDirectory<PersonKind>> {
        SuggestionFeed::new(self.people.clone(), self.search_debounce)
    }

    pub fn car_feed(&self) -> SuggestionFeed<CarKind, HttpDirectory<CarKind>> {
        SuggestionFeed::new(self.cars.clone(), self.search_debounce)
    }
}
