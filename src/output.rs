use std::io::{self, Write};

use camino::Utf8Path;
use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink, RunOutcome};
use crate::error::MolgenError;
use crate::filters::FilterConfig;
use crate::fs_util::write_bytes_atomic;
use crate::record::MoleculeRecord;
use crate::state::IngestionState;
use crate::viewer::StructureSummary;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

#[derive(Debug, Serialize)]
pub struct GenerateReport<'a> {
    pub outcome: Option<&'a RunOutcome>,
    pub loading: bool,
    pub error: Option<&'a str>,
    pub records: &'a [MoleculeRecord],
}

impl<'a> GenerateReport<'a> {
    pub fn new(
        outcome: Option<&'a RunOutcome>,
        state: &'a IngestionState,
        records: &'a [MoleculeRecord],
    ) -> Self {
        Self {
            outcome,
            loading: state.loading,
            error: state.error.as_deref(),
            records,
        }
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_report(report: &GenerateReport<'_>) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_filters(filters: &FilterConfig) -> io::Result<()> {
        Self::print_json(filters)
    }

    pub fn print_summaries(summaries: &[StructureSummary]) -> io::Result<()> {
        Self::print_json(&summaries)
    }

    pub fn save_records(path: &Utf8Path, records: &[MoleculeRecord]) -> Result<(), MolgenError> {
        let content = serde_json::to_vec_pretty(records)
            .map_err(|err| MolgenError::Filesystem(err.to_string()))?;
        write_bytes_atomic(path, &content)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

/// Progress for non-interactive runs: phase lines to stderr, leaving
/// stdout for JSON.
pub struct StderrProgress;

impl ProgressSink for StderrProgress {
    fn event(&self, event: ProgressEvent) {
        if event.message.contains("accepted=") {
            return;
        }
        let _ = writeln!(io::stderr(), "molgen: {}", event.message);
    }
}
