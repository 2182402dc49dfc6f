use std::collections::HashSet;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::domain::MoleculeId;
use crate::record::MoleculeRecord;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestionState {
    pub records: Vec<MoleculeRecord>,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Reset,
    Started,
    Appended(MoleculeRecord),
    Completed,
    Failed(String),
}

#[derive(Debug, Default)]
struct Inner {
    state: IngestionState,
    seen: HashSet<MoleculeId>,
    subscribers: Vec<Sender<StoreEvent>>,
}

impl Inner {
    fn publish(&mut self, event: StoreEvent) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    /// Drops records and the dedup index; `loading` and `error` are left
    /// to the caller.
    fn reset(&mut self) {
        self.state.records.clear();
        self.seen.clear();
        self.publish(StoreEvent::Reset);
    }
}

/// Shared ingestion state. Clones are handles to the same store; every
/// mutation happens under one lock so readers never see a partial update.
#[derive(Debug, Clone, Default)]
pub struct MoleculeStore {
    inner: Arc<Mutex<Inner>>,
}

impl MoleculeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Mutations complete before anything that can panic.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends `record` unless its molecule id is already present.
    pub fn append(&self, record: MoleculeRecord) -> bool {
        let mut inner = self.lock();
        if !inner.seen.insert(record.molecule_id.clone()) {
            return false;
        }
        inner.state.records.push(record.clone());
        inner.publish(StoreEvent::Appended(record));
        true
    }

    pub fn reset(&self) {
        self.lock().reset();
    }

    /// Clears records and error and enters the loading state in one step.
    pub fn begin(&self) {
        let mut inner = self.lock();
        inner.reset();
        inner.state.loading = true;
        inner.state.error = None;
        inner.publish(StoreEvent::Started);
    }

    pub fn complete(&self) {
        let mut inner = self.lock();
        inner.state.loading = false;
        inner.state.error = None;
        inner.publish(StoreEvent::Completed);
    }

    /// Leaves already ingested records in place.
    pub fn fail(&self, message: impl Into<String>) {
        let message = message.into();
        let mut inner = self.lock();
        inner.state.loading = false;
        inner.state.error = Some(message.clone());
        inner.publish(StoreEvent::Failed(message));
    }

    pub fn snapshot(&self) -> IngestionState {
        self.lock().state.clone()
    }

    pub fn records(&self) -> Vec<MoleculeRecord> {
        self.lock().state.records.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().state.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Events are delivered in the same order the state changed.
    pub fn subscribe(&self) -> Receiver<StoreEvent> {
        let (tx, rx) = mpsc::channel();
        self.lock().subscribers.push(tx);
        rx
    }
}
