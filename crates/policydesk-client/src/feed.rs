use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use policydesk_core::kinds::ReferenceKind;
use policydesk_core::Suggestion;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::directory::Directory;

/// The suggestions published for one query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuggestionList {
    pub query: String,
    pub items: Vec<Suggestion>,
    pub error: Option<String>,
}

/// Debounced autocomplete over a directory. Only the list belonging to the
/// latest query is ever published.
pub struct SuggestionFeed<K: ReferenceKind, D: Directory<K>> {
    directory: Arc<D>,
    debounce: Duration,
    sequence: Arc<AtomicU64>,
    pending: Mutex<Option<JoinHandle<()>>>,
    list: Arc<watch::Sender<SuggestionList>>,
    _kind: PhantomData<fn() -> K>,
}

impl<K: ReferenceKind, D: Directory<K> + 'static> SuggestionFeed<K, D> {
    pub fn new(directory: Arc<D>, debounce: Duration) -> Self {
        let (list, _) = watch::channel(SuggestionList::default());
        SuggestionFeed {
            directory,
            debounce,
            sequence: Arc::new(AtomicU64::new(0)),
            pending: Mutex::new(None),
            list: Arc::new(list),
            _kind: PhantomData,
        }
    }

    /// Supersede any earlier query with `text`. A blank query clears the
    /// list right away without asking the directory.
    pub fn query(&self, text: &str) {
        let mut pending = self.pending.lock().unwrap();
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(previous) = pending.take() {
            previous.abort();
        }
        let query = text.trim().to_string();
        if query.is_empty() {
            self.list.send_replace(SuggestionList {
                query,
                ..Default::default()
            });
            return;
        }

        let directory = self.directory.clone();
        let sequence = self.sequence.clone();
        let list = self.list.clone();
        let debounce = self.debounce;
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if sequence.load(Ordering::SeqCst) != seq {
                return;
            }
            let result = directory.search(&query).await;
            list.send_if_modified(|current| {
                if sequence.load(Ordering::SeqCst) != seq {
                    tracing::debug!(%query, "dropping superseded suggestions");
                    return false;
                }
                *current = match result {
                    Ok(items) => SuggestionList {
                        query,
                        items,
                        error: None,
                    },
                    Err(e) => {
                        tracing::warn!(%query, error = %e, "suggestion search failed");
                        SuggestionList {
                            query,
                            items: Vec::new(),
                            error: Some(e.to_string()),
                        }
                    }
                };
                true
            });
        }));
    }

    pub fn current(&self) -> SuggestionList {
        self.list.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SuggestionList> {
        self.list.subscribe()
    }

    /// Wait for the list published for `query` (compared trimmed).
    pub async fn results_for(&self, query: &str) -> SuggestionList {
        let query = query.trim();
        let mut rx = self.list.subscribe();
        let list = match rx.wait_for(|list| list.query == query).await {
            Ok(list) => list.clone(),
            Err(_) => self.current(),
        };
        list
    }
}

impl<K: ReferenceKind, D: Directory<K>> Drop for SuggestionFeed<K, D> {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(task) = pending.take() {
                task.abort();
            }
        }
    }
}
