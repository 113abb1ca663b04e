//! Bounded retry of the write that follows a seal.
//!
//! Once the authority has issued a seal the token cannot be given back, so a
//! failed write is retried per `RetryPolicy`.  If every attempt fails the
//! issued seal is returned inside `ArrasError::Persistence`.

use std::thread;

use tracing::warn;

use arras_contracts::{
    config::RetryPolicy,
    error::{ArrasError, ArrasResult},
    seal::Seal,
};

/// Errors that may clear on their own: storage failures and a head that
/// moved under a concurrent writer.
fn is_transient(err: &ArrasError) -> bool {
    err.is_retryable() || matches!(err, ArrasError::ChainConflict { .. })
}

/// Run `write` until it succeeds, fails permanently, or the policy's
/// attempts are used up.
///
/// With `seal` present every final failure is reported as a persistence
/// error carrying that seal.
pub(crate) fn persist_with_retry<T, F>(
    policy: &RetryPolicy,
    seal: Option<&Seal>,
    mut write: F,
) -> ArrasResult<T>
where
    F: FnMut() -> ArrasResult<T>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match write() {
            Ok(value) => return Ok(value),
            Err(err) if is_transient(&err) && attempt < max_attempts => {
                let delay = policy.delay_after(attempt);
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "persistence failed, retrying"
                );
                thread::sleep(delay);
                attempt += 1;
            }
            Err(err) => return Err(keep_seal(err, seal, attempt)),
        }
    }
}

fn keep_seal(err: ArrasError, seal: Option<&Seal>, attempts: u32) -> ArrasError {
    let Some(seal) = seal else {
        return err;
    };
    warn!(
        seal_id = %seal.id,
        attempts,
        error = %err,
        "giving up on persistence, returning issued seal to caller"
    );
    ArrasError::Persistence {
        reason: format!("after {} attempt(s): {}", attempts, err),
        seal: Some(Box::new(seal.clone())),
    }
}
