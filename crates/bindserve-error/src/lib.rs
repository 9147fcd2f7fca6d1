//! Workspace-wide error type for bindserve.
//!
//! Each crate keeps its own `thiserror` enum close to the code that raises it and
//! converts into [`Error`] at its boundary. The four top-level variants are the
//! closed taxonomy a serving host needs to translate failures into responses:
//!
//! - [`Error::Fatal`]: startup could not complete (device, tokenizer, weights).
//! - [`Error::Input`]: the request payload was malformed; nothing ran.
//! - [`Error::Inference`]: the model call itself failed.
//! - [`Error::Internal`]: an invariant inside this workspace was violated.
pub mod fatal;
pub mod inference;
pub mod input;
pub mod internal;
pub mod policy;
pub mod result_ext;
pub mod severity;

// public exports
pub use fatal::FatalError;
pub use inference::InferenceError;
pub use input::InputError;
pub use internal::InternalError;
pub use policy::{CombinedPolicy, ErrorPolicy, NoopPolicy};
#[cfg(feature = "tracing")]
pub use policy::TracingPolicy;
pub use result_ext::ResultExt;
pub use severity::Severity;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Fatal(#[from] FatalError),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl Error {
    /// Default coarse classification used by the provided policies.
    pub fn severity(&self) -> Severity {
        match self {
            Error::Input(_) => Severity::Warning,
            Error::Inference(_) | Error::Internal(_) => Severity::Error,
            Error::Fatal(_) => Severity::Fatal,
        }
    }

    /// True when the caller sent something this service will never accept.
    ///
    /// Hosts map this to a 4xx-style response; everything else is a server fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Input(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Fatal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn input_errors_are_client_errors() {
        let err: Error = InputError::InvalidShape {
            expected: "a JSON object",
            found: "string",
        }
        .into();
        assert!(err.is_client_error());
        assert_eq!(err.severity(), Severity::Warning);
        assert!(!err.is_fatal());
    }

    #[test]
    fn startup_failures_are_fatal() {
        let err: Error = FatalError::MissingFile {
            what: "tokenizer",
            path: PathBuf::from("/data/tokenizer.json"),
        }
        .into();
        assert!(err.is_fatal());
        assert!(!err.is_client_error());
        assert_eq!(err.severity(), Severity::Fatal);
        assert!(err.to_string().contains("/data/tokenizer.json"));
    }

    #[test]
    fn inference_failures_are_server_errors() {
        let err: Error = InferenceError::Tensor("out of memory".into()).into();
        assert!(!err.is_client_error());
        assert_eq!(err.severity(), Severity::Error);
    }

    #[test]
    fn display_is_transparent() {
        let inner = InputError::UnknownKey {
            key: "depth".into(),
            expected: vec!["text".into(), "vision".into(), "audio".into()],
        };
        let msg = inner.to_string();
        let err: Error = inner.into();
        assert_eq!(err.to_string(), msg);
    }
}
