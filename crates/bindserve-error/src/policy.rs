//! Policies for classifying and emitting errors.
//!
//! Library crates return [`crate::Result`] and never log failures themselves; the
//! serving layer installs an [`ErrorPolicy`] to decide how errors are reported
//! (tracing, metrics, a host callback).
//!
//! Example
//! ```rust
//! use bindserve_error::{Error, ErrorPolicy, Severity};
//!
//! struct PrintPolicy;
//! impl ErrorPolicy for PrintPolicy {
//!     fn classify(&self, e: &Error) -> Severity { e.severity() }
//!     fn emit(&self, e: &Error) { eprintln!("[{:?}] {e}", self.classify(e)); }
//! }
//! ```
use super::{Error, Severity};

pub trait ErrorPolicy: Send + Sync {
    /// Classify the error's severity
    fn classify(&self, error: &Error) -> Severity;

    /// Emit the error according to the policy
    fn emit(&self, error: &Error);
}

/// A policy that classifies by default severity and emits nothing.
#[derive(Debug, Clone, Default)]
pub struct NoopPolicy;

impl ErrorPolicy for NoopPolicy {
    fn classify(&self, error: &Error) -> Severity {
        error.severity()
    }

    fn emit(&self, _error: &Error) {}
}

/// Emits through `tracing` at a level matching the error's severity.
#[cfg(feature = "tracing")]
#[derive(Debug, Clone, Default)]
pub struct TracingPolicy;

#[cfg(feature = "tracing")]
impl ErrorPolicy for TracingPolicy {
    fn classify(&self, error: &Error) -> Severity {
        error.severity()
    }

    fn emit(&self, error: &Error) {
        use tracing::{Level, event};

        match error.severity() {
            Severity::Warning => {
                event!(target: "bindserve", Level::WARN, error = %error, client = true)
            }
            Severity::Error | Severity::Fatal => {
                event!(target: "bindserve", Level::ERROR, error = %error, client = false)
            }
        }
    }
}

/// Delegates to several policies.
///
/// - classify: the highest severity any inner policy reports (the error's own
///   severity when empty).
/// - emit: every inner policy, in insertion order.
#[derive(Default)]
pub struct CombinedPolicy {
    policies: Vec<Box<dyn ErrorPolicy>>,
}

impl CombinedPolicy {
    pub fn new() -> Self {
        Self {
            policies: Vec::new(),
        }
    }

    /// Add a policy by value. Builder-style.
    pub fn push<P: ErrorPolicy + 'static>(mut self, policy: P) -> Self {
        self.policies.push(Box::new(policy));
        self
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl ErrorPolicy for CombinedPolicy {
    fn classify(&self, error: &Error) -> Severity {
        self.policies
            .iter()
            .map(|p| p.classify(error))
            .max()
            .unwrap_or_else(|| error.severity())
    }

    fn emit(&self, error: &Error) {
        for p in &self.policies {
            p.emit(error);
        }
    }
}
