use std::path::PathBuf;

/// Startup failures. Any of these aborts process initialisation.
#[derive(Debug, thiserror::Error)]
pub enum FatalError {
    #[error("Compute device unavailable: requested {requested}: {reason}")]
    DeviceUnavailable { requested: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Required {what} file not found at {path:?}")]
    MissingFile { what: &'static str, path: PathBuf },

    #[error("I/O failure on {path:?}: {operation}: {source}")]
    FileOperation {
        operation: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to load tokenizer from {path:?}: {message}")]
    Tokenizer { path: PathBuf, message: String },

    #[error("Failed to fetch weights {filename} from {repo}: {message}")]
    WeightsDownload {
        repo: String,
        filename: String,
        message: String,
    },

    #[error("Failed to construct model: {0}")]
    ModelConstruction(String),
}
