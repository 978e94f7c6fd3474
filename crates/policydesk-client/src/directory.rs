use std::marker::PhantomData;
use std::sync::Mutex;

use async_trait::async_trait;
use policydesk_core::kinds::ReferenceKind;
use policydesk_core::Suggestion;

use crate::client::BackendClient;
use crate::error::ClientError;

/// Where a reference slot looks entities up.
#[async_trait]
pub trait Directory<K: ReferenceKind>: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<Suggestion>, ClientError>;

    /// `ClientError::NotFound` when the id does not resolve.
    async fn fetch(&self, id: i32) -> Result<K::Record, ClientError>;
}

/// Directory backed by the REST collection of `K`.
#[derive(Debug, Clone)]
pub struct HttpDirectory<K> {
    client: BackendClient,
    _kind: PhantomData<fn() -> K>,
}

impl<K: ReferenceKind> HttpDirectory<K> {
    pub fn new(client: BackendClient) -> Self {
        HttpDirectory {
            client,
            _kind: PhantomData,
        }
    }
}

#[async_trait]
impl<K: ReferenceKind> Directory<K> for HttpDirectory<K> {
    async fn search(&self, query: &str) -> Result<Vec<Suggestion>, ClientError> {
        self.client.search(K::COLLECTION, query).await
    }

    async fn fetch(&self, id: i32) -> Result<K::Record, ClientError> {
        self.client.fetch(K::COLLECTION, id).await
    }
}

/// In-process directory: case-insensitive substring search on the display
/// label. Used offline and in tests.
pub struct MemoryDirectory<K: ReferenceKind> {
    records: Mutex<Vec<K::Record>>,
}

impl<K: ReferenceKind> Default for MemoryDirectory<K> {
    fn default() -> Self {
        MemoryDirectory {
            records: Mutex::new(Vec::new()),
        }
    }
}

impl<K: ReferenceKind> MemoryDirectory<K> {
    pub fn new(records: Vec<K::Record>) -> Self {
        MemoryDirectory {
            records: Mutex::new(records),
        }
    }

    /// Add or replace a record by id.
    pub fn upsert(&self, record: K::Record) {
        let mut records = self.records.lock().unwrap();
        let id = K::record_id(&record);
        match records.iter_mut().find(|r| K::record_id(r) == id) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
    }

    pub fn remove(&self, id: i32) -> Option<K::Record> {
        let mut records = self.records.lock().unwrap();
        let index = records.iter().position(|r| K::record_id(r) == id)?;
        Some(records.remove(index))
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl<K: ReferenceKind> Directory<K> for MemoryDirectory<K> {
    async fn search(&self, query: &str) -> Result<Vec<Suggestion>, ClientError> {
        let needle = query.trim().to_lowercase();
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .map(|r| Suggestion {
                value: K::record_id(r),
                label: K::label(r),
            })
            .filter(|s| s.label.to_lowercase().contains(&needle))
            .collect())
    }

    async fn fetch(&self, id: i32) -> Result<K::Record, ClientError> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| K::record_id(r) == id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("{}/{id}", K::COLLECTION)))
    }
}
