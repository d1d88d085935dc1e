use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::BatchError;
use crate::config::{DOCX_REQUEST_DELAY, PDF_REQUEST_DELAY, SEVERE_ERROR_COOLDOWN};
use crate::pipeline::extraction::{SourceDocument, SourceKind};
use crate::pipeline::structuring::PolicyRecord;

/// Turns one source document into a record.
pub trait DocumentProcessor {
    /// Which files this processor accepts.
    fn kind(&self) -> SourceKind;

    fn process(&self, doc: &SourceDocument) -> Result<PolicyRecord, BatchError>;
}

/// Sleeps between provider calls. Abstracted so tests run instantly.
pub trait Pacer {
    fn pause(&self, duration: Duration);
}

pub struct ThreadSleepPacer;

impl Pacer for ThreadSleepPacer {
    fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Directories and pacing for one batch run.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Pause after every attempted file.
    pub request_delay: Duration,
    /// Pause after a severe failure, in place of `request_delay`.
    pub severe_cooldown: Duration,
}

impl BatchConfig {
    /// Default pacing for the given source kind.
    pub fn for_kind(kind: SourceKind, input_dir: PathBuf, output_dir: PathBuf) -> Self {
        let request_delay = match kind {
            SourceKind::Pdf => PDF_REQUEST_DELAY,
            SourceKind::Docx => DOCX_REQUEST_DELAY,
        };
        Self {
            input_dir,
            output_dir,
            request_delay,
            severe_cooldown: SEVERE_ERROR_COOLDOWN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Written { output: PathBuf },
    Skipped,
    Failed { error: String, severe: bool },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReport {
    pub file_name: String,
    #[serde(flatten)]
    pub outcome: FileOutcome,
    pub duration_ms: u64,
}

/// Result of a whole batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub files: Vec<FileReport>,
}

impl BatchSummary {
    pub fn record(&mut self, report: FileReport) {
        match report.outcome {
            FileOutcome::Written { .. } => self.written += 1,
            FileOutcome::Skipped => self.skipped += 1,
            FileOutcome::Failed { .. } => self.failed += 1,
        }
        self.files.push(report);
    }
}
