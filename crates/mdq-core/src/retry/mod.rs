//! Retry and backoff policy for transient fetch failures.
//!
//! The fetch backend classifies a failed attempt (timeout, throttling,
//! connection failure) and asks the policy whether and when to try again.
//! Transient failures are never visible to the scheduler unless retries are
//! exhausted, at which point they surface as a failed fetch.

mod classify;
mod policy;
mod run;

pub use classify::{classify_backend_output, classify_http_status};
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::run_with_retry;
