use std::future::Future;
use std::time::Duration;

use crate::error::{FailureClass, TransferError};

/// Per-class retry budgets applied to each worker invocation.
///
/// Transient faults back off exponentially; unclassified faults are retried
/// back to back to absorb brief hiccups; fatal faults are never retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_secs(2),
            backoff_factor: 2,
        }
    }
}

/// Runs `op` until it succeeds or its retry budget is exhausted.
///
/// Only the last error is returned; individual attempts are an internal
/// concern and surface nowhere else.
pub async fn run_with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, TransferError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransferError>>,
{
    let mut delay = policy.backoff_base;
    let mut attempt = 1;

    loop {
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let class = err.class();
        if class == FailureClass::Fatal || attempt >= policy.max_attempts {
            return Err(err);
        }

        tracing::debug!(attempt, error = %err, ?class, "retrying after failed attempt");

        if class == FailureClass::Transient {
            tokio::time::sleep(delay).await;
            delay *= policy.backoff_factor;
        }
        attempt += 1;
    }
}
