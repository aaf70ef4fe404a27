// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio_retry::RetryIf;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, warn};

use landing_config::backoff::{RetryPolicy, Strategy};

use crate::errors::ClientError;
use crate::outcome::Outcome;

/// Run `attempt` until it succeeds, fails in a non-retryable way, or the
/// policy runs out of retries.
///
/// The first attempt runs immediately; each retry first waits for the next
/// delay of the policy. Cancelling `token` ends the loop with
/// [`Outcome::Cancelled`], whether an attempt or a backoff sleep is pending.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    token: &CancellationToken,
    operation: &str,
    mut attempt: F,
) -> Result<Outcome<T>, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Outcome<T>, ClientError>>,
{
    if token.is_cancelled() {
        debug!(operation, "cancelled before first attempt");
        return Ok(Outcome::Cancelled);
    }

    let attempts = AtomicU32::new(0);

    let action = || {
        let current = attempts.fetch_add(1, Ordering::Relaxed) + 1;
        attempt().instrument(tracing::debug_span!("attempt", operation, attempt = current))
    };

    let condition = |e: &ClientError| {
        let current = attempts.load(Ordering::Relaxed);
        if e.is_retryable() {
            warn!(operation, attempt = current, error = %e, "call attempt failed");
            true
        } else {
            error!(operation, attempt = current, error = %e, "call failed, not retrying");
            false
        }
    };

    let result = tokio::select! {
        _ = token.cancelled() => {
            info!(operation, attempts = attempts.load(Ordering::Relaxed), "call cancelled");
            return Ok(Outcome::Cancelled);
        }
        result = RetryIf::spawn(policy.get_strategy(), action, condition) => result,
    };

    let attempts = attempts.load(Ordering::Relaxed);
    match result {
        Ok(outcome) => {
            if attempts > 1 {
                info!(operation, attempts, "call succeeded after retries");
            }
            Ok(outcome)
        }
        Err(e) if !e.is_retryable() => Err(e),
        Err(e) => {
            error!(operation, attempts, error = %e, "call giving up");
            Err(ClientError::MaxRetriesExceeded {
                operation: operation.to_string(),
                attempts,
                last: Box::new(e),
            })
        }
    }
}
