//! Batch-then-watch state machine for directory mode.
//!
//! ```text
//! Init -> Draining -> WatchOnly ------------> Watching -> Stopped
//!                  \-> AwaitingConfirmation -/
//!                                          \-> Exited
//! ```

use crate::backlog::{self, BacklogReport};
use crate::decisions::{DecisionProvider, WatchAnswer};
use crate::dedup::DedupTracker;
use crate::error::RunError;
use crate::pipeline::{Pipeline, RunStats};
use crate::shutdown::Shutdown;
use crate::watcher::{DEFAULT_SETTLE_DELAY, LiveWatcher};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeState {
    Init,
    Draining,
    AwaitingConfirmation,
    WatchOnly,
    Watching,
    Stopped,
    Exited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    BatchOnly,
    BatchThenWatch,
    WatchOnly,
}

/// State after the backlog drain: an empty backlog goes straight to watching.
pub fn after_drain(backlog: &BacklogReport) -> ModeState {
    if backlog.interrupted {
        ModeState::Exited
    } else if backlog.found_any() {
        ModeState::AwaitingConfirmation
    } else {
        ModeState::WatchOnly
    }
}

/// State after the prompt. Everything except an explicit yes means exit.
pub fn after_confirmation(answer: WatchAnswer) -> ModeState {
    if answer.wants_watch() {
        ModeState::Watching
    } else {
        ModeState::Exited
    }
}

pub fn validate_watch_dir(dir: &Path) -> Result<(), RunError> {
    if !dir.exists() {
        return Err(RunError::WatchDirMissing {
            path: dir.to_path_buf(),
        });
    }
    if !dir.is_dir() {
        return Err(RunError::NotADirectory {
            path: dir.to_path_buf(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct CoordinatorReport {
    /// Every state visited, in order, starting with `Init`.
    pub states: Vec<ModeState>,
    pub mode: RunMode,
    pub backlog: BacklogReport,
    pub answer: Option<WatchAnswer>,
    pub watch: Option<RunStats>,
}

pub struct ModeCoordinator<'a> {
    dir: PathBuf,
    pipeline: Pipeline,
    tracker: DedupTracker,
    decisions: &'a mut dyn DecisionProvider,
    shutdown: Shutdown,
    confirm_timeout: Duration,
    settle: Duration,
    states: Vec<ModeState>,
}

impl<'a> ModeCoordinator<'a> {
    pub fn new(
        dir: PathBuf,
        pipeline: Pipeline,
        decisions: &'a mut dyn DecisionProvider,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            dir,
            pipeline,
            tracker: DedupTracker::new(),
            decisions,
            shutdown,
            confirm_timeout: DEFAULT_CONFIRM_TIMEOUT,
            settle: DEFAULT_SETTLE_DELAY,
            states: Vec::new(),
        }
    }

    pub fn with_confirm_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_timeout = timeout;
        self
    }

    pub fn with_settle_delay(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    fn enter(&mut self, state: ModeState) {
        tracing::debug!(?state, "mode transition");
        self.states.push(state);
    }

    /// Drain the backlog, then watch or exit. Returns once the run is over:
    /// immediately after an exit decision, or after the watcher has been
    /// stopped by the shutdown token and joined.
    pub fn run(mut self) -> Result<CoordinatorReport, RunError> {
        validate_watch_dir(&self.dir)?;

        self.enter(ModeState::Init);
        self.enter(ModeState::Draining);
        let backlog =
            backlog::drain_backlog(&self.dir, &self.pipeline, &self.tracker, &self.shutdown);
        backlog.stats.log_summary("Backlog");

        let mut answer = None;
        let next = after_drain(&backlog);
        self.enter(next);
        let mode = match next {
            ModeState::WatchOnly => RunMode::WatchOnly,
            ModeState::AwaitingConfirmation => {
                let a = self
                    .decisions
                    .confirm_watch(self.confirm_timeout, &self.shutdown);
                answer = Some(a);
                match after_confirmation(a) {
                    ModeState::Watching => RunMode::BatchThenWatch,
                    _ => RunMode::BatchOnly,
                }
            }
            _ => RunMode::BatchOnly,
        };

        if mode == RunMode::BatchOnly {
            if self.states.last() != Some(&ModeState::Exited) {
                self.enter(ModeState::Exited);
            }
            tracing::info!("Exiting");
            return Ok(CoordinatorReport {
                states: self.states,
                mode,
                backlog,
                answer,
                watch: None,
            });
        }

        self.enter(ModeState::Watching);
        let handle = LiveWatcher::new(self.dir.clone(), self.pipeline.clone(), self.tracker.clone())
            .with_settle_delay(self.settle)
            .spawn(self.shutdown.clone())?;
        let watch = handle.join();
        watch.log_summary("Watch");
        self.enter(ModeState::Stopped);

        Ok(CoordinatorReport {
            states: self.states,
            mode,
            backlog,
            answer,
            watch: Some(watch),
        })
    }
}
