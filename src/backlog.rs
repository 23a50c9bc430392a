use crate::archive;
use crate::dedup::DedupTracker;
use crate::pipeline::{Pipeline, RunStats};
use crate::report_store::{Candidate, DiscoverySource};
use crate::shutdown::Shutdown;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Result of draining the files already present at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BacklogReport {
    /// Every candidate path the scan routed, including ones that failed.
    pub touched: Vec<PathBuf>,
    pub stats: RunStats,
    /// Set when an interrupt stopped the drain before the last file.
    pub interrupted: bool,
}

impl BacklogReport {
    pub fn found_any(&self) -> bool {
        self.stats.found > 0
    }
}

/// Direct children of `dir` with a recognized suffix, sorted by file name.
/// The archive subdirectory is never descended into.
pub fn scan_backlog(dir: &Path) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                tracing::warn!(error = %err, "Warning during scan");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(c) = Candidate::in_watched_dir(entry.path(), dir, DiscoverySource::Backlog) {
            candidates.push(c);
        }
    }
    candidates
}

/// Route every backlog file through the pipeline, one at a time, in scan
/// order. A failing file never stops the scan; an interrupt does, between
/// files.
pub fn drain_backlog(
    dir: &Path,
    pipeline: &Pipeline,
    tracker: &DedupTracker,
    shutdown: &Shutdown,
) -> BacklogReport {
    let archive_dir = archive::archive_dir_for(dir);
    tracing::info!(archive = %archive_dir.display(), "Processed files will be moved to");

    let candidates = scan_backlog(dir);
    let mut report = BacklogReport::default();
    report.stats.found = candidates.len();

    if candidates.is_empty() {
        tracing::info!("No existing reports found in directory");
        return report;
    }
    tracing::info!(count = candidates.len(), "Found report(s) to process...");

    for candidate in candidates {
        if shutdown.is_triggered() {
            tracing::warn!("Interrupted, leaving remaining backlog in place");
            report.interrupted = true;
            break;
        }
        report.touched.push(candidate.path.clone());
        if !tracker.mark_seen(&candidate.path) {
            tracing::debug!(path = %candidate.path.display(), "Already seen, skipping");
            continue;
        }
        let outcome = pipeline.process(&candidate, Some(&archive_dir));
        report.stats.record(&outcome, true);
    }

    report
}
