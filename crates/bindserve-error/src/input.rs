/// Request payload rejected before any model invocation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("model_input must be {expected}, found {found}")]
    InvalidShape {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Invalid key '{key}' in model_input. Expected keys are: {expected:?}")]
    UnknownKey { key: String, expected: Vec<String> },

    #[error("Values for the '{key}' key should be {expected}")]
    TypeMismatch { key: String, expected: &'static str },

    #[error(
        "All values for the '{key}' key should be valid Base64 encoded strings (element {index} is not)"
    )]
    InvalidEncoding { key: String, index: usize },
}

impl InputError {
    /// The modality key the failure refers to, when there is one.
    pub fn key(&self) -> Option<&str> {
        match self {
            InputError::InvalidShape { .. } => None,
            InputError::UnknownKey { key, .. }
            | InputError::TypeMismatch { key, .. }
            | InputError::InvalidEncoding { key, .. } => Some(key),
        }
    }
}
