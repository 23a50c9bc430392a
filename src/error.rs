use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Why a candidate could not be turned into document text.
///
/// All variants are per-file: the run continues with the next candidate.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("could not read {}: {source}", path.display())]
    NotReadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} is not a valid gzip file: {source}", path.display())]
    NotValidCompression {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not decode {} as UTF-8: {source}", path.display())]
    NotValidText {
        path: PathBuf,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("invalid XML in {}: {reason}", path.display())]
    NotWellFormedMarkup { path: PathBuf, reason: String },
}

/// Failures talking to the judgement backend.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("error communicating with backend: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("backend answered with status {status}")]
    Status { status: reqwest::StatusCode },

    #[error("could not decode backend response: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("backend returned an empty response")]
    EmptyResponse,
}

/// Failures relocating an analyzed file into the archive.
#[derive(Debug, Error)]
pub enum MoveError {
    #[error("could not create archive directory {}: {source}", dir.display())]
    CreateArchiveDir {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not move {} to {}: {source}", from.display(), to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no free archive name left for {}", path.display())]
    CollisionsExhausted { path: PathBuf },

    #[error("{} has no file name", path.display())]
    NoFileName { path: PathBuf },
}

/// Errors that abort the whole run with a non-zero exit code.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("cannot connect to Ollama service at {url}. Is it running?")]
    Connectivity { url: String },

    #[error("no Ollama models found. Please install at least one model")]
    NoModelAvailable,

    #[error("no model selected")]
    NoModelSelected,

    #[error("directory {} does not exist", path.display())]
    WatchDirMissing { path: PathBuf },

    #[error("{} is not a directory", path.display())]
    NotADirectory { path: PathBuf },

    #[error("could not watch {}: {source}", path.display())]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}
