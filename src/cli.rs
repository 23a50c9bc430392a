use crate::ollama::DEFAULT_BASE_URL;
use clap::Parser;
use std::path::PathBuf;

/// dmarcwatch – have a local Ollama model review DMARC aggregate reports
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Report files to analyze (.xml or .gz). Without any, the inbox
    /// directory is drained and then watched.
    #[arg(value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Ollama API base URL
    #[arg(long, env = "DMARCWATCH_OLLAMA_URL", default_value = DEFAULT_BASE_URL)]
    pub ollama_url: String,

    /// Inbox directory to watch (defaults to ~/Downloads/dmarc-report-inbox)
    #[arg(long, env = "DMARCWATCH_DIR", value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Config file holding the default model (defaults to ~/.dmarcwatch_config.json)
    #[arg(long, env = "DMARCWATCH_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Use this model for this run only, without prompting or saving a default
    #[arg(long, value_name = "NAME")]
    pub model: Option<String>,

    /// Seconds to wait for an answer before declining to keep watching
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub confirm_timeout: u64,

    /// Milliseconds to let a newly arrived file settle before reading it
    #[arg(long, value_name = "MS", default_value_t = 500)]
    pub settle_ms: u64,

    /// Log debug details
    #[arg(short, long)]
    pub verbose: bool,
}
