use std::path::PathBuf;

use bindserve_core::Modality;
use bindserve_error::{Error as BindError, FatalError, InferenceError};
use candle_core::Error as CandleError;
use hf_hub::api::sync::ApiError as HubError;
use thiserror::Error;
use tokenizers::Error as TokenizerError;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Tokenization failed: {0}")]
    Tokenizer(#[from] TokenizerError),
    #[error("Tokenizer at {path:?} could not be loaded: {message}")]
    TokenizerFile { path: PathBuf, message: String },
    #[error("Model download failed for {repo}/{filename}: {source}")]
    ModelDownload {
        repo: String,
        filename: String,
        #[source]
        source: HubError,
    },
    #[error("I/O operation failed on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Tensor operation failed: {0}")]
    Tensor(#[from] CandleError),
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Image decoding failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("WAV decoding failed: {0}")]
    Wav(#[from] hound::Error),
    #[error("Invalid model configuration: {0}")]
    Config(String),
    #[error("Required {what} file not found at {path:?}")]
    MissingFile { what: &'static str, path: PathBuf },
    #[error("Compute device {requested} unavailable: {reason}")]
    DeviceUnavailable { requested: String, reason: String },
    #[error("Failed to decode {modality} item {index}: {message}")]
    Decode {
        modality: Modality,
        index: usize,
        message: String,
    },
    #[error("Dimension mismatch: {0}")]
    Dimension(String),
}

impl ModelError {
    /// Attach the batch position to a payload decoding failure.
    pub fn at_item(self, modality: Modality, index: usize) -> Self {
        match self {
            ModelError::Image(_) | ModelError::Wav(_) | ModelError::Dimension(_) => {
                ModelError::Decode {
                    modality,
                    index,
                    message: self.to_string(),
                }
            }
            other => other,
        }
    }

    /// Reclassify a failure raised while loading. Anything that goes wrong
    /// before the first request aborts startup.
    pub fn into_fatal(self) -> FatalError {
        match self {
            ModelError::DeviceUnavailable { requested, reason } => {
                FatalError::DeviceUnavailable { requested, reason }
            }
            ModelError::MissingFile { what, path } => FatalError::MissingFile { what, path },
            ModelError::TokenizerFile { path, message } => FatalError::Tokenizer { path, message },
            ModelError::ModelDownload {
                repo,
                filename,
                source,
            } => FatalError::WeightsDownload {
                repo,
                filename,
                message: source.to_string(),
            },
            ModelError::Io { path, source } => FatalError::FileOperation {
                operation: "read",
                path,
                source,
            },
            ModelError::Config(msg) => FatalError::Config(msg),
            ModelError::Serialization(e) => FatalError::Config(e.to_string()),
            other => FatalError::ModelConstruction(other.to_string()),
        }
    }
}

impl From<ModelError> for BindError {
    fn from(error: ModelError) -> Self {
        match error {
            // Setup problems stay fatal wherever they surface
            ModelError::DeviceUnavailable { .. }
            | ModelError::MissingFile { .. }
            | ModelError::TokenizerFile { .. }
            | ModelError::ModelDownload { .. }
            | ModelError::Io { .. }
            | ModelError::Config(_)
            | ModelError::Serialization(_) => error.into_fatal().into(),

            ModelError::Decode {
                modality,
                index,
                message,
            } => InferenceError::Decode {
                modality: modality.to_string(),
                index,
                message,
            }
            .into(),
            // Single-item callers never attach an index
            ModelError::Image(e) => InferenceError::Decode {
                modality: Modality::Vision.to_string(),
                index: 0,
                message: e.to_string(),
            }
            .into(),
            ModelError::Wav(e) => InferenceError::Decode {
                modality: Modality::Audio.to_string(),
                index: 0,
                message: e.to_string(),
            }
            .into(),
            ModelError::Tokenizer(e) => InferenceError::Tokenization(e.to_string()).into(),
            ModelError::Tensor(e) => InferenceError::Tensor(e.to_string()).into(),
            ModelError::Dimension(msg) => InferenceError::Tensor(msg).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_failures_carry_item_position() {
        let err = ModelError::Dimension("empty waveform".into()).at_item(Modality::Audio, 2);
        let bind: BindError = err.into();
        let msg = bind.to_string();
        assert!(msg.contains("audio item 2"), "{msg}");
        assert!(!bind.is_fatal());
    }

    #[test]
    fn setup_failures_are_fatal() {
        let err = ModelError::MissingFile {
            what: "tokenizer",
            path: PathBuf::from("/srv/data/tokenizer.json"),
        };
        let bind: BindError = err.into();
        assert!(bind.is_fatal());
    }

    #[test]
    fn tensor_errors_become_fatal_only_at_load() {
        let err = ModelError::Tensor(CandleError::Msg("missing weight".into()));
        assert!(matches!(err.into_fatal(), FatalError::ModelConstruction(_)));
        let err = ModelError::Tensor(CandleError::Msg("oom".into()));
        let bind: BindError = err.into();
        assert!(matches!(bind, BindError::Inference(InferenceError::Tensor(_))));
    }
}
