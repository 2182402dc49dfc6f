use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::decoder::RecordDecoder;
use crate::domain::UploadedStructure;
use crate::error::MolgenError;
use crate::filters::FilterConfig;
use crate::record::{Verdict, classify};
use crate::service::{GenerationRequest, GenerationService};
use crate::state::MoleculeStore;

#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u128,
    pub total_records: usize,
    pub accepted: usize,
    pub duplicates: usize,
    pub rejected: usize,
    pub incomplete: usize,
    pub malformed: usize,
    pub discarded_tail_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Shared flag checked between records; setting it ends the run and
/// drops the response body.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
pub struct App<S: GenerationService> {
    store: MoleculeStore,
    service: S,
}

impl<S: GenerationService> App<S> {
    pub fn new(store: MoleculeStore, service: S) -> Self {
        Self { store, service }
    }

    pub fn store(&self) -> &MoleculeStore {
        &self.store
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn run(
        &self,
        structures: &[UploadedStructure],
        filters: &FilterConfig,
        cancel: &Cancellation,
        sink: &dyn ProgressSink,
    ) -> Result<RunOutcome, MolgenError> {
        sink.event(ProgressEvent {
            message: format!("phase=Validate; {} structure(s)", structures.len()),
            elapsed: None,
        });
        if structures.is_empty() {
            let err = MolgenError::NoInput;
            self.store.fail(err.to_string());
            return Err(err);
        }

        self.store.begin();
        let result = self.ingest(structures, filters, cancel, sink);
        match &result {
            Ok(outcome) => {
                self.store.complete();
                info!(
                    accepted = outcome.accepted,
                    duplicates = outcome.duplicates,
                    malformed = outcome.malformed,
                    "generation finished"
                );
                sink.event(ProgressEvent {
                    message: format!("phase=Done; {} molecule(s)", outcome.accepted),
                    elapsed: Some(Duration::from_millis(outcome.elapsed_ms as u64)),
                });
            }
            Err(err) => {
                self.store.fail(err.to_string());
                sink.event(ProgressEvent {
                    message: format!("phase=Failed; {err}"),
                    elapsed: None,
                });
            }
        }
        result
    }

    fn ingest(
        &self,
        structures: &[UploadedStructure],
        filters: &FilterConfig,
        cancel: &Cancellation,
        sink: &dyn ProgressSink,
    ) -> Result<RunOutcome, MolgenError> {
        let started_at = Utc::now();
        let started = Instant::now();

        sink.event(ProgressEvent {
            message: "phase=Request; uploading structures".to_string(),
            elapsed: None,
        });
        let request = GenerationRequest::new(structures, filters);
        let body = self.service.generate(&request)?;
        sink.event(ProgressEvent {
            message: format!("phase=Stream; latency_ms={}", started.elapsed().as_millis()),
            elapsed: Some(started.elapsed()),
        });

        let mut outcome = RunOutcome {
            started_at,
            elapsed_ms: 0,
            total_records: 0,
            accepted: 0,
            duplicates: 0,
            rejected: 0,
            incomplete: 0,
            malformed: 0,
            discarded_tail_bytes: 0,
        };

        let mut decoder = RecordDecoder::new(body);
        loop {
            if cancel.is_cancelled() {
                return Err(MolgenError::Cancelled);
            }
            let Some(item) = decoder.next() else {
                break;
            };
            let value = item?;
            outcome.total_records += 1;
            match classify(value) {
                Verdict::Accepted(record) => {
                    if self.store.append(record) {
                        outcome.accepted += 1;
                        sink.event(ProgressEvent {
                            message: format!("phase=Stream; accepted={}", outcome.accepted),
                            elapsed: Some(started.elapsed()),
                        });
                    } else {
                        outcome.duplicates += 1;
                    }
                }
                Verdict::NotSuccess => outcome.rejected += 1,
                Verdict::Incomplete => outcome.incomplete += 1,
            }
        }

        let stats = decoder.stats();
        outcome.malformed = stats.malformed;
        outcome.discarded_tail_bytes = stats.discarded_tail_bytes;
        outcome.elapsed_ms = started.elapsed().as_millis();
        Ok(outcome)
    }
}
