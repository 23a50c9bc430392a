//! Watch an inbox for DMARC aggregate reports, have a local Ollama model
//! judge each one, and archive what was analyzed.

pub mod analysis;
pub mod archive;
pub mod backlog;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod decisions;
pub mod dedup;
pub mod error;
pub mod logging;
pub mod model_select;
pub mod ollama;
pub mod pipeline;
pub mod report_store;
pub mod shutdown;
pub mod tui;
pub mod watcher;
pub mod workflow;
