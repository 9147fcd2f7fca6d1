#[derive(Debug, thiserror::Error)]
pub enum InternalError {
    #[error("Unexpected state: {0}")]
    InvalidState(String),

    #[error("Failed to serialize result: {0}")]
    Serialization(String),
}
