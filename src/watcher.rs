//! Live watching of the inbox directory for newly arriving reports.

use crate::archive;
use crate::dedup::DedupTracker;
use crate::error::RunError;
use crate::pipeline::{Pipeline, RunStats};
use crate::report_store::{Candidate, DiscoverySource};
use crate::shutdown::Shutdown;
use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);
// Upper bound on how long a stop request waits for the event loop to notice.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Watches one directory (non-recursively) and runs each new report through
/// the pipeline on a dedicated thread, one file at a time.
pub struct LiveWatcher {
    dir: PathBuf,
    pipeline: Pipeline,
    tracker: DedupTracker,
    settle: Duration,
}

/// Running watcher. Dropping it without [`WatchHandle::join`] detaches the
/// thread.
pub struct WatchHandle {
    thread: JoinHandle<RunStats>,
}

impl WatchHandle {
    /// Wait for the watcher thread to stop (it stops once the shutdown token
    /// fires and any in-flight file is finished).
    pub fn join(self) -> RunStats {
        self.thread.join().unwrap_or_else(|_| {
            tracing::error!("Watcher thread panicked");
            RunStats::default()
        })
    }
}

impl LiveWatcher {
    pub fn new(dir: PathBuf, pipeline: Pipeline, tracker: DedupTracker) -> Self {
        Self {
            dir,
            pipeline,
            tracker,
            settle: DEFAULT_SETTLE_DELAY,
        }
    }

    pub fn with_settle_delay(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Register the OS watch, then hand the event loop to a new thread. The
    /// watch is live when this returns, so files created afterwards are seen.
    pub fn spawn(self, shutdown: Shutdown) -> Result<WatchHandle, RunError> {
        let dir = self.dir.clone();
        let watch_err = move |source: notify::Error| RunError::Watch {
            path: dir.clone(),
            source,
        };

        let (event_tx, event_rx) = mpsc::channel::<notify::Result<Event>>();
        let mut watcher = notify::recommended_watcher(move |event| {
            if event_tx.send(event).is_err() {
                tracing::debug!("watch event dropped because worker channel is closed");
            }
        })
        .map_err(&watch_err)?;
        watcher
            .watch(&self.dir, RecursiveMode::NonRecursive)
            .map_err(&watch_err)?;

        tracing::info!(
            dir = %self.dir.display(),
            "Monitoring for new DMARC reports... (Press Ctrl+C to stop)"
        );

        let thread = thread::Builder::new()
            .name("dmarcwatch-watcher".to_string())
            .spawn(move || self.run_loop(watcher, event_rx, shutdown))
            .map_err(|err| watch_err(notify::Error::io(err)))?;

        Ok(WatchHandle { thread })
    }

    fn run_loop(
        self,
        watcher: RecommendedWatcher,
        events: Receiver<notify::Result<Event>>,
        shutdown: Shutdown,
    ) -> RunStats {
        let archive_dir = archive::archive_dir_for(&self.dir);
        let mut stats = RunStats::default();

        while !shutdown.is_triggered() {
            match events.recv_timeout(POLL_INTERVAL) {
                Ok(Ok(event)) => {
                    for candidate in arrivals(&event, &self.dir) {
                        self.handle_arrival(&candidate, &archive_dir, &shutdown, &mut stats);
                    }
                }
                Ok(Err(err)) => tracing::warn!(error = %err, "Watch backend error"),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        tracing::info!("Stopping monitor...");
        drop(watcher);
        stats
    }

    fn handle_arrival(
        &self,
        candidate: &Candidate,
        archive_dir: &Path,
        shutdown: &Shutdown,
        stats: &mut RunStats,
    ) {
        if candidate.path.is_dir() {
            return;
        }
        if !self.tracker.mark_seen(&candidate.path) {
            tracing::debug!(path = %candidate.path.display(), "Already seen, ignoring event");
            return;
        }

        // Let the producer finish writing before we read. An interrupt during
        // the wait leaves the file untouched.
        if shutdown.wait_timeout(self.settle) {
            tracing::info!(path = %candidate.path.display(), "Interrupted before processing, leaving file in place");
            return;
        }
        stats.found += 1;

        let outcome = self.pipeline.process(candidate, Some(archive_dir));
        stats.record(&outcome, true);
    }
}

/// Candidates announced by one notify event: creations and renames into the
/// directory, minus directories and non-report suffixes.
pub fn arrivals(event: &Event, dir: &Path) -> Vec<Candidate> {
    let paths: &[PathBuf] = match event.kind {
        EventKind::Create(CreateKind::Folder) => &[],
        EventKind::Create(_) => event.paths.as_slice(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event.paths.as_slice(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            event.paths.get(1..).unwrap_or(&[])
        }
        _ => &[],
    };
    paths
        .iter()
        .filter_map(|p| Candidate::in_watched_dir(p, dir, DiscoverySource::Watch))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(event: Event) -> Vec<String> {
        arrivals(&event, Path::new("/inbox"))
            .into_iter()
            .map(|c| c.file_name())
            .collect()
    }

    #[test]
    fn file_creation_is_an_arrival() {
        let ev = Event::new(EventKind::Create(CreateKind::File)).add_path("/inbox/r.xml".into());
        assert_eq!(names(ev), vec!["r.xml"]);
    }

    #[test]
    fn folder_creation_and_other_kinds_are_ignored() {
        let folder =
            Event::new(EventKind::Create(CreateKind::Folder)).add_path("/inbox/x.xml".into());
        assert!(names(folder).is_empty());

        let modify = Event::new(EventKind::Modify(ModifyKind::Any)).add_path("/inbox/r.xml".into());
        assert!(names(modify).is_empty());

        let remove = Event::new(EventKind::Remove(notify::event::RemoveKind::File))
            .add_path("/inbox/r.xml".into());
        assert!(names(remove).is_empty());
    }

    #[test]
    fn non_matching_suffix_and_nested_paths_are_ignored() {
        let ev = Event::new(EventKind::Create(CreateKind::Any))
            .add_path("/inbox/r.xml.part".into())
            .add_path("/inbox/processed/r.xml".into())
            .add_path("/elsewhere/r.xml".into());
        assert!(names(ev).is_empty());
    }

    #[test]
    fn rename_into_directory_counts_destination_only() {
        let both = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path("/inbox/r.xml.part".into())
            .add_path("/inbox/r.xml".into());
        assert_eq!(names(both), vec!["r.xml"]);

        let to = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::To)))
            .add_path("/inbox/r.gz".into());
        assert_eq!(names(to), vec!["r.gz"]);

        let from = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::From)))
            .add_path("/inbox/r.gz".into());
        assert!(names(from).is_empty());
    }
}
