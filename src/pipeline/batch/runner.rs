use std::path::{Path, PathBuf};
use std::time::Instant;

use super::gate::{is_processed, output_path_for};
use super::types::*;
use super::BatchError;
use crate::pipeline::extraction::{SourceDocument, SourceKind};
use crate::pipeline::structuring::PolicyRecord;

/// Runs one processor over every matching file of a directory.
pub struct BatchRunner {
    processor: Box<dyn DocumentProcessor + Send + Sync>,
    pacer: Box<dyn Pacer + Send + Sync>,
    config: BatchConfig,
}

impl BatchRunner {
    pub fn new(processor: Box<dyn DocumentProcessor + Send + Sync>, config: BatchConfig) -> Self {
        Self {
            processor,
            pacer: Box::new(ThreadSleepPacer),
            config,
        }
    }

    pub fn with_pacer(mut self, pacer: Box<dyn Pacer + Send + Sync>) -> Self {
        self.pacer = pacer;
        self
    }

    /// Process the whole input directory.
    ///
    /// Only an unusable output directory aborts the run; every per-file
    /// failure is recorded in the summary.
    pub fn run(&self) -> Result<BatchSummary, BatchError> {
        let start = Instant::now();
        let kind = self.processor.kind();

        let sources = match list_sources(&self.config.input_dir, kind) {
            Ok(sources) => sources,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    dir = %self.config.input_dir.display(),
                    "Input directory does not exist, nothing to do"
                );
                return Ok(BatchSummary::default());
            }
            Err(e) => return Err(e.into()),
        };

        std::fs::create_dir_all(&self.config.output_dir).map_err(|e| BatchError::OutputDir {
            path: self.config.output_dir.display().to_string(),
            reason: e.to_string(),
        })?;

        let total = sources.len();
        tracing::info!(
            kind = %kind,
            total,
            input = %self.config.input_dir.display(),
            output = %self.config.output_dir.display(),
            "Starting batch"
        );

        let mut summary = BatchSummary {
            total,
            ..BatchSummary::default()
        };

        for (i, path) in sources.iter().enumerate() {
            let report = self.run_one(path, i + 1, total);
            summary.record(report);
        }

        summary.duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            total = summary.total,
            written = summary.written,
            skipped = summary.skipped,
            failed = summary.failed,
            duration_ms = summary.duration_ms,
            "Batch complete"
        );
        Ok(summary)
    }

    fn run_one(&self, path: &Path, position: usize, total: usize) -> FileReport {
        let start = Instant::now();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if is_processed(&self.config.output_dir, &file_name) {
            tracing::info!(file = %file_name, "[{position}/{total}] Already processed, skipping");
            return FileReport {
                file_name,
                outcome: FileOutcome::Skipped,
                duration_ms: 0,
            };
        }

        tracing::info!(file = %file_name, "[{position}/{total}] Processing");
        let output = output_path_for(&self.config.output_dir, &file_name);

        let result = SourceDocument::from_path(path)
            .map_err(|e| BatchError::Unreadable {
                file: file_name.clone(),
                reason: e.to_string(),
            })
            .and_then(|doc| self.processor.process(&doc))
            .and_then(|record| write_record(&output, &record).map(|()| record));

        let duration_ms = start.elapsed().as_millis() as u64;
        let (outcome, pause) = match result {
            Ok(record) => {
                tracing::info!(
                    file = %file_name,
                    output = %output.display(),
                    product = %record.basic_info.product_name,
                    duration_ms,
                    "Record written"
                );
                (FileOutcome::Written { output }, self.config.request_delay)
            }
            Err(e) => {
                let severe = e.is_severe();
                tracing::error!(file = %file_name, error = %e, severe, "File failed");
                let pause = if severe {
                    self.config.severe_cooldown
                } else {
                    self.config.request_delay
                };
                (
                    FileOutcome::Failed {
                        error: e.to_string(),
                        severe,
                    },
                    pause,
                )
            }
        };

        self.pacer.pause(pause);

        FileReport {
            file_name,
            outcome,
            duration_ms,
        }
    }
}

/// Files in `dir` of the given kind, sorted by name.
pub fn list_sources(dir: &Path, kind: SourceKind) -> std::io::Result<Vec<PathBuf>> {
    let mut sources = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && kind.matches(&path) {
            sources.push(path);
        }
    }
    sources.sort();
    Ok(sources)
}

/// Pretty-printed UTF-8 JSON; non-ASCII text is written as-is.
///
/// Written to a sibling temp file first so an interrupted write never
/// leaves a truncated `<stem>.json` that the gate would accept.
pub fn write_record(path: &Path, record: &PolicyRecord) -> Result<(), BatchError> {
    let json = serde_json::to_string_pretty(record)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, json.as_bytes())?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
