//! Bounded-latency wrapper for any [`TextGenerator`].
//!
//! The wrapped call runs on its own thread; if it has not produced a result
//! when the deadline passes, the caller gets [`LlmError::Timeout`] and the
//! worker's eventual result is discarded.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::{LlmError, LlmResult, OutputContract, TextGenerator};

/// Enforces a per-call timeout on an inner generator.
pub struct Deadline {
    inner: Arc<dyn TextGenerator>,
    timeout: Duration,
}

impl Deadline {
    pub fn new(inner: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl TextGenerator for Deadline {
    fn generate(&self, prompt: &str, contract: Option<&OutputContract>) -> LlmResult<String> {
        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let prompt = prompt.to_string();
        let contract = contract.cloned();

        thread::Builder::new()
            .name("kg-llm-call".into())
            .spawn(move || {
                // The receiver is gone if the deadline already passed.
                let _ = tx.send(inner.generate(&prompt, contract.as_ref()));
            })
            .map_err(|e| LlmError::RequestFailed {
                message: format!("failed to spawn generator thread: {e}"),
            })?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
                tracing::warn!(generator = self.inner.name(), timeout_ms, "generator call timed out");
                Err(LlmError::Timeout { timeout_ms })
            }
            Err(RecvTimeoutError::Disconnected) => Err(LlmError::RequestFailed {
                message: "generator thread ended without a result".into(),
            }),
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

impl std::fmt::Debug for Deadline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deadline")
            .field("inner", &self.inner.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sleepy(Duration);

    impl TextGenerator for Sleepy {
        fn generate(&self, prompt: &str, _contract: Option<&OutputContract>) -> LlmResult<String> {
            thread::sleep(self.0);
            Ok(prompt.to_string())
        }
    }

    struct Panics;

    impl TextGenerator for Panics {
        fn generate(&self, _prompt: &str, _contract: Option<&OutputContract>) -> LlmResult<String> {
            panic!("provider bug");
        }
    }

    #[test]
    fn fast_call_passes_through() {
        let d = Deadline::new(Arc::new(Sleepy(Duration::ZERO)), Duration::from_secs(5));
        assert_eq!(d.timeout(), Duration::from_secs(5));
        assert_eq!(d.generate("hello", None).unwrap(), "hello");
    }

    #[test]
    fn slow_call_times_out() {
        let d = Deadline::new(
            Arc::new(Sleepy(Duration::from_millis(500))),
            Duration::from_millis(20),
        );
        match d.generate("hello", None) {
            Err(LlmError::Timeout { timeout_ms }) => assert_eq!(timeout_ms, 20),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn panicking_generator_is_an_error_not_a_panic() {
        let d = Deadline::new(Arc::new(Panics), Duration::from_secs(5));
        assert!(matches!(
            d.generate("x", None),
            Err(LlmError::RequestFailed { .. })
        ));
    }
}
