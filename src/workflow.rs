use crate::analysis::OllamaAnalyzer;
use crate::archive;
use crate::cli::Cli;
use crate::config::{self, ConfigStore};
use crate::coordinator::{self, ModeCoordinator};
use crate::decisions::TerminalDecisions;
use crate::dedup::DedupTracker;
use crate::error::RunError;
use crate::model_select;
use crate::ollama::OllamaClient;
use crate::pipeline::{Pipeline, RunStats, StdoutSink};
use crate::report_store::{Candidate, DiscoverySource};
use crate::shutdown::Shutdown;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// `~/Downloads/dmarc-report-inbox`.
pub fn default_watch_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Downloads")
        .join("dmarc-report-inbox")
}

/// Run each explicitly named file once, archiving next to the file itself.
/// Missing paths and directories are reported and skipped.
pub fn run_direct_files(files: &[PathBuf], pipeline: &Pipeline, shutdown: &Shutdown) -> RunStats {
    let mut stats = RunStats::default();
    let listed = DedupTracker::new();

    for file in files {
        if shutdown.is_triggered() {
            tracing::warn!("Interrupted, remaining files left unprocessed");
            break;
        }
        let path = match file.canonicalize() {
            Ok(p) => p,
            Err(_) => {
                tracing::error!(path = %file.display(), "File not found");
                continue;
            }
        };
        if path.is_dir() {
            tracing::error!(path = %path.display(), "Is a directory, not a report file");
            continue;
        }
        if !listed.mark_seen(&path) {
            tracing::debug!(path = %path.display(), "Listed more than once, skipping repeat");
            continue;
        }
        stats.found += 1;

        let archive_dir = archive::archive_dir_for(path.parent().unwrap_or(Path::new(".")));
        let candidate = Candidate::new(path, DiscoverySource::Explicit);
        let outcome = pipeline.process(&candidate, Some(&archive_dir));
        stats.record(&outcome, true);
    }

    stats
}

// Main orchestrator: connect, pick a model, then direct-file or directory mode.
pub fn run_dmarcwatch(cli_args: Cli) -> Result<()> {
    let shutdown = Shutdown::new();
    shutdown
        .install_signal_handler()
        .context("Failed to install the interrupt handler")?;

    // Step 1: Make sure the backend is there before anything else.
    let client = OllamaClient::new(&cli_args.ollama_url);
    if !client.check_connection() {
        return Err(RunError::Connectivity {
            url: client.base_url().to_string(),
        }
        .into());
    }

    // Step 2: Choose the model (configured default, --model, or ask).
    let mut config = ConfigStore::load(
        cli_args
            .config
            .clone()
            .unwrap_or_else(config::default_config_path),
    );
    let mut decisions = TerminalDecisions;
    let models = client.list_models();
    let model = model_select::select_model(
        &models,
        &mut config,
        &mut decisions,
        cli_args.model.as_deref(),
    )?;

    let pipeline = Pipeline::new(
        Arc::new(OllamaAnalyzer::new(client, model)),
        Arc::new(StdoutSink::default()),
    );

    // Step 3: Explicit files bypass the batch/watch state machine.
    if !cli_args.files.is_empty() {
        let stats = run_direct_files(&cli_args.files, &pipeline, &shutdown);
        stats.log_summary("Run");
        return Ok(());
    }

    // Step 4: Directory mode.
    let dir = cli_args.dir.clone().unwrap_or_else(default_watch_dir);
    coordinator::validate_watch_dir(&dir)?;
    let dir = dir.canonicalize().unwrap_or(dir);

    ModeCoordinator::new(dir, pipeline, &mut decisions, shutdown)
        .with_confirm_timeout(Duration::from_secs(cli_args.confirm_timeout))
        .with_settle_delay(Duration::from_millis(cli_args.settle_ms))
        .run()?;

    Ok(())
}
