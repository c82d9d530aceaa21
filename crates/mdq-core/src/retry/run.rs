//! Retry loop: run an operation until success or the policy says stop.

use std::time::Duration;

use super::policy::{ErrorKind, RetryDecision, RetryPolicy};

/// Runs `op` until it succeeds or the retry policy says to stop.
///
/// `ctx` is threaded through both closures so they can share mutable state
/// (e.g. a progress callback). On a retryable failure `pause` is called with
/// the attempt number and backoff delay; it performs the wait and returns
/// `false` to give up early (e.g. on cancellation), in which case the last
/// error is returned.
pub fn run_with_retry<S, T, E, F, C, P>(
    policy: &RetryPolicy,
    ctx: &mut S,
    mut op: F,
    classify: C,
    mut pause: P,
) -> Result<T, E>
where
    S: ?Sized,
    F: FnMut(&mut S, u32) -> Result<T, E>,
    C: Fn(&E) -> ErrorKind,
    P: FnMut(&mut S, u32, Duration) -> bool,
{
    let mut attempt = 1u32;
    loop {
        match op(ctx, attempt) {
            Ok(v) => return Ok(v),
            Err(e) => match policy.decide(attempt, classify(&e)) {
                RetryDecision::NoRetry => return Err(e),
                RetryDecision::RetryAfter(d) => {
                    if !pause(ctx, attempt, d) {
                        return Err(e);
                    }
                    attempt += 1;
                }
            },
        }
    }
}
