//! Coarse-grained classification for programmatic handling of errors.
//!
//! Typical mappings:
//! - Warning: the request was bad, the service is fine
//! - Error: the request failed inside the service
//! - Fatal: the service cannot start or continue
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
    Fatal,
}
