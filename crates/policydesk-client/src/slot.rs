use std::sync::{Arc, Mutex};

use policydesk_core::editor::{FetchTicket, LookupError, Outcome, ReferenceEditor, SlotStatus};
use policydesk_core::kinds::ReferenceKind;
use policydesk_core::{EditorError, Reference, Suggestion};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::directory::Directory;
use crate::error::ClientError;

/// Snapshot of a slot as seen by its host.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotState<D> {
    pub status: SlotStatus,
    pub outcome: Outcome<D>,
}

type Shared<K> = Arc<Mutex<ReferenceEditor<K>>>;

/// Drives a [`ReferenceEditor`] against a directory.
///
/// Every selection aborts the fetch still running for the previous one; the
/// editor's ticket check drops whatever slips through. Must be used from
/// within a tokio runtime.
pub struct ReferenceSlot<K: ReferenceKind, D: Directory<K>> {
    editor: Shared<K>,
    directory: Arc<D>,
    inflight: Mutex<Option<JoinHandle<()>>>,
    state: Arc<watch::Sender<SlotState<K::Draft>>>,
}

impl<K: ReferenceKind, D: Directory<K> + 'static> ReferenceSlot<K, D> {
    pub fn new(directory: Arc<D>) -> Self {
        let editor = ReferenceEditor::<K>::new();
        let (state, _) = watch::channel(snapshot(&editor));
        ReferenceSlot {
            editor: Arc::new(Mutex::new(editor)),
            directory,
            inflight: Mutex::new(None),
            state: Arc::new(state),
        }
    }

    pub fn select(&self, id: Option<i32>) {
        let mut inflight = self.inflight.lock().unwrap();
        let ticket = self.mutate(|editor| editor.select(id));
        self.restart_fetch(&mut inflight, ticket);
    }

    pub fn set_field(&self, name: &str, value: Option<&str>) -> Result<(), EditorError> {
        self.mutate(|editor| editor.set_field(name, value))
    }

    pub fn reset_form(&self) -> Result<(), EditorError> {
        self.mutate(|editor| editor.reset_form())
    }

    pub fn write_value(&self, value: Option<Reference<K::Draft>>) -> Result<(), EditorError> {
        let mut inflight = self.inflight.lock().unwrap();
        let ticket = self.mutate(|editor| editor.write_value(value))?;
        self.restart_fetch(&mut inflight, ticket);
        Ok(())
    }

    pub async fn search(&self, query: &str) -> Result<Vec<Suggestion>, ClientError> {
        self.directory.search(query).await
    }

    pub fn state(&self) -> SlotState<K::Draft> {
        self.state.borrow().clone()
    }

    pub fn outcome(&self) -> Outcome<K::Draft> {
        self.state.borrow().outcome.clone()
    }

    /// Changes of status or outcome.
    pub fn subscribe(&self) -> watch::Receiver<SlotState<K::Draft>> {
        self.state.subscribe()
    }

    /// Wait until no fetch is pending and return the state at that point.
    pub async fn resolved(&self) -> SlotState<K::Draft> {
        let mut rx = self.state.subscribe();
        let state = match rx.wait_for(|s| !s.status.is_pending()).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        state
    }

    /// Read access to the editor, e.g. for its form or field errors.
    pub fn with_editor<R>(&self, f: impl FnOnce(&ReferenceEditor<K>) -> R) -> R {
        f(&self.editor.lock().unwrap())
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut ReferenceEditor<K>) -> R) -> R {
        let mut editor = self.editor.lock().unwrap();
        let result = f(&mut editor);
        publish(&editor, &self.state);
        result
    }

    /// Callers hold `inflight` across the editor change that issued
    /// `ticket`, so the task kept is always the one for the newest ticket.
    fn restart_fetch(&self, inflight: &mut Option<JoinHandle<()>>, ticket: Option<FetchTicket>) {
        if let Some(previous) = inflight.take() {
            previous.abort();
        }
        let Some(ticket) = ticket else {
            return;
        };
        let editor = self.editor.clone();
        let directory = self.directory.clone();
        let state = self.state.clone();
        *inflight = Some(tokio::spawn(async move {
            let result = directory
                .fetch(ticket.id())
                .await
                .map_err(LookupError::from);
            let mut editor = editor.lock().unwrap();
            editor.resolve(ticket, result);
            publish(&editor, &state);
        }));
    }
}

impl<K: ReferenceKind, D: Directory<K>> Drop for ReferenceSlot<K, D> {
    fn drop(&mut self) {
        if let Ok(mut inflight) = self.inflight.lock() {
            if let Some(task) = inflight.take() {
                task.abort();
            }
        }
    }
}

fn snapshot<K: ReferenceKind>(editor: &ReferenceEditor<K>) -> SlotState<K::Draft> {
    SlotState {
        status: editor.status().clone(),
        outcome: editor.outcome().clone(),
    }
}

fn publish<K: ReferenceKind>(
    editor: &ReferenceEditor<K>,
    state: &watch::Sender<SlotState<K::Draft>>,
) {
    let next = snapshot(editor);
    state.send_if_modified(|current| {
        if *current == next {
            return false;
        }
        *current = next;
        true
    });
}
