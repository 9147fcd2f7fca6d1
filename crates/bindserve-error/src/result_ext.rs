use super::{ErrorPolicy, Result};

/// Extension trait for `Result` enabling policy-driven emission without mixing
/// side-effects into control flow.
///
/// Call `emit_event` at the serving boundary; the result is returned
/// unchanged for the caller to propagate.
///
/// ```rust
/// use bindserve_error::{InputError, NoopPolicy, Result, ResultExt};
///
/// fn handle(policy: &NoopPolicy) -> Result<()> {
///     let r: Result<()> = Err(InputError::InvalidShape {
///         expected: "a JSON object",
///         found: "string",
///     }
///     .into());
///     r.emit_event(policy)
/// }
/// assert!(handle(&NoopPolicy).is_err());
/// ```
pub trait ResultExt<T> {
    /// Emit any error through the policy.
    fn emit_event(self, policy: &impl ErrorPolicy) -> Self;
}

impl<T> ResultExt<T> for Result<T> {
    fn emit_event(self, policy: &impl ErrorPolicy) -> Self {
        if let Err(ref e) = self {
            policy.emit(e);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, FatalError, Severity};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        emitted: Mutex<Vec<String>>,
    }

    impl ErrorPolicy for Recording {
        fn classify(&self, error: &Error) -> Severity {
            error.severity()
        }

        fn emit(&self, error: &Error) {
            self.emitted
                .lock()
                .expect("recording policy poisoned")
                .push(error.to_string());
        }
    }

    #[test]
    fn errors_are_emitted_and_returned_unchanged() {
        let policy = Recording::default();
        let fatal: Result<()> = Err(FatalError::Config("no data dir".into()).into());

        let err = fatal.emit_event(&policy).unwrap_err();
        assert!(err.is_fatal());

        let emitted = policy.emitted.lock().unwrap();
        assert_eq!(emitted.len(), 1);
        assert!(emitted[0].contains("no data dir"));
    }

    #[test]
    fn ok_results_emit_nothing() {
        let policy = Recording::default();
        let ok: Result<u8> = Ok(7);
        assert_eq!(ok.emit_event(&policy).unwrap(), 7);
        assert!(policy.emitted.lock().unwrap().is_empty());
    }
}
