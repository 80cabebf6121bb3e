//! Bounded retry for call sites that tolerate repeated dispatch.

use std::time::Duration;

use reqwest::Method;
use serde_json::Value;
use tokio_retry::RetryIf;

use crate::config::{RETRY_BACKOFF_STEP, RETRY_MAX_ATTEMPTS};
use crate::error_handling::RelayError;

use super::{DispatchOptions, DispatcherState};

/// Linearly increasing backoff between attempts: one step after the first
/// failure, two after the second.
fn backoff_steps() -> impl Iterator<Item = Duration> {
    (1..RETRY_MAX_ATTEMPTS as u32).map(|attempt| RETRY_BACKOFF_STEP * attempt)
}

/// Dispatches with up to [`RETRY_MAX_ATTEMPTS`] total attempts.
///
/// Only transient failures are retried; a risk-control rejection fails on
/// its first occurrence so the user sees the remediation guidance
/// immediately instead of after several futile round trips.
pub async fn dispatch_with_retry(
    state: &DispatcherState,
    path: &str,
    method: Method,
    payload: Option<&Value>,
    opts: &DispatchOptions,
) -> Result<Value, RelayError> {
    RetryIf::spawn(
        backoff_steps(),
        || state.dispatch(path, method.clone(), payload, opts),
        RelayError::is_retriable,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_is_linear() {
        let steps: Vec<Duration> = backoff_steps().collect();
        assert_eq!(
            steps,
            vec![Duration::from_millis(1000), Duration::from_millis(2000)]
        );
    }

    #[test]
    fn test_backoff_count_matches_extra_attempts() {
        assert_eq!(backoff_steps().count(), RETRY_MAX_ATTEMPTS - 1);
    }
}
