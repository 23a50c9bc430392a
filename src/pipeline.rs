//! The per-file path every candidate takes, whichever way it was found:
//! read → analyze → emit → archive.

use crate::analysis::{Analyzer, Judgement};
use crate::archive;
use crate::report_store::{self, Candidate};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Receives judgements. The only thing that writes to primary output.
pub trait JudgementSink: Send + Sync {
    fn emit(&self, candidate: &Candidate, judgement: &Judgement);
}

/// Prints each judgement to stdout as one line group.
#[derive(Debug, Default)]
pub struct StdoutSink {
    lock: Mutex<()>,
}

impl JudgementSink for StdoutSink {
    fn emit(&self, _candidate: &Candidate, judgement: &Judgement) {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut out = io::stdout().lock();
        if let Err(err) = writeln!(out, "{judgement}").and_then(|_| out.flush()) {
            tracing::error!(error = %err, "Could not write judgement to stdout");
        }
    }
}

/// Keeps judgements in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemorySink {
    items: Mutex<Vec<(PathBuf, Judgement)>>,
}

impl MemorySink {
    pub fn items(&self) -> Vec<(PathBuf, Judgement)> {
        self.items.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl JudgementSink for MemorySink {
    fn emit(&self, candidate: &Candidate, judgement: &Judgement) {
        self.items
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((candidate.path.clone(), judgement.clone()));
    }
}

/// What happened to one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Judgement emitted. `archived_to` is `None` when the move failed or
    /// no archive was requested.
    Analyzed { archived_to: Option<PathBuf> },
    ReadFailed,
    AnalysisFailed,
}

/// Running totals for a batch or a watch session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub found: usize,
    pub analyzed: usize,
    pub skipped: usize,
    pub moved: usize,
    pub move_failures: usize,
}

impl RunStats {
    pub fn record(&mut self, outcome: &FileOutcome, archive_requested: bool) {
        match outcome {
            FileOutcome::Analyzed { archived_to } => {
                self.analyzed += 1;
                match archived_to {
                    Some(_) => self.moved += 1,
                    None if archive_requested => self.move_failures += 1,
                    None => {}
                }
            }
            FileOutcome::ReadFailed | FileOutcome::AnalysisFailed => self.skipped += 1,
        }
    }

    pub fn log_summary(&self, label: &str) {
        tracing::info!(
            found = self.found,
            analyzed = self.analyzed,
            skipped = self.skipped,
            moved = self.moved,
            move_failures = self.move_failures,
            "{label} finished"
        );
    }
}

/// Shared, cheaply cloneable handle on the analyzer and output sink.
#[derive(Clone)]
pub struct Pipeline {
    analyzer: Arc<dyn Analyzer>,
    sink: Arc<dyn JudgementSink>,
}

impl Pipeline {
    pub fn new(analyzer: Arc<dyn Analyzer>, sink: Arc<dyn JudgementSink>) -> Self {
        Self { analyzer, sink }
    }

    /// Run one candidate through the whole path. Never fails the caller:
    /// read and analysis failures skip the file and leave it in place, a move
    /// failure is a warning and the file still counts as analyzed.
    pub fn process(&self, candidate: &Candidate, archive_dir: Option<&Path>) -> FileOutcome {
        tracing::info!(path = %candidate.path.display(), source = ?candidate.source, "Processing");

        let document = match report_store::read_report(candidate) {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(path = %candidate.path.display(), error = %err, "Skipping unreadable report");
                return FileOutcome::ReadFailed;
            }
        };

        let judgement = match self.analyzer.analyze(&document) {
            Ok(j) => j,
            Err(err) => {
                tracing::error!(path = %candidate.path.display(), error = %err, "Failed to analyze");
                return FileOutcome::AnalysisFailed;
            }
        };

        self.sink.emit(candidate, &judgement);

        let archived_to = archive_dir.and_then(|dir| {
            archive::move_to_archive(&candidate.path, dir)
                .map_err(|err| {
                    tracing::warn!(
                        path = %candidate.path.display(),
                        error = %err,
                        "Could not move file to processed directory"
                    );
                })
                .ok()
        });

        FileOutcome::Analyzed { archived_to }
    }
}
