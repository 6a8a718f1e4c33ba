//! Deadline guard for recognition calls.
//!
//! [`with_deadline`] races a suspending operation against a millisecond
//! budget.  If the deadline expires first the inner future is dropped, so a
//! late completion can never retroactively settle an already-decided call,
//! and the caller receives the stable [`RecognizeError::Timeout`] failure.
//! Each invocation owns its own timer: concurrent guarded calls share no
//! state, and the timer is freed on every exit path.

use std::future::Future;
use std::time::Duration;

use crate::recognition::error::RecognizeError;

/// Run `operation`, giving it at most `deadline` to settle.
///
/// `what` names the operation in the expiry log line only; the returned
/// error is the fixed [`RecognizeError::Timeout`] regardless.
pub async fn with_deadline<T, F>(
    what: &str,
    deadline: Duration,
    operation: F,
) -> Result<T, RecognizeError>
where
    F: Future<Output = Result<T, RecognizeError>>,
{
    match tokio::time::timeout(deadline, operation).await {
        Ok(outcome) => outcome,
        Err(_elapsed) => {
            log::warn!(
                "{what} did not settle within {} ms",
                deadline.as_millis()
            );
            Err(RecognizeError::Timeout)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
