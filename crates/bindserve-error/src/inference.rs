/// Failures surfacing from the model call. Never retried locally.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Failed to decode {modality} item {index}: {message}")]
    Decode {
        modality: String,
        index: usize,
        message: String,
    },

    #[error("Tokenization failed: {0}")]
    Tokenization(String),

    #[error("Tensor operation failed: {0}")]
    Tensor(String),

    #[error("Model returned {actual} {modality} embeddings for {expected} inputs")]
    CountMismatch {
        modality: String,
        expected: usize,
        actual: usize,
    },

    #[error("Model returned no embeddings for requested modality {0}")]
    MissingOutput(String),
}
