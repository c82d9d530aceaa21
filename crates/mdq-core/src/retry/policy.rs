use std::time::Duration;

use crate::config::RetryConfig;

/// Why a backend run failed, as far as retrying is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The site stalled or the read timed out.
    Timeout,
    /// Rate limited (HTTP 429/503). Backs off twice as long.
    Throttled,
    /// Reset, refused, DNS or similar transport trouble.
    Connection,
    /// Retryable server-side status.
    Http5xx(u16),
    /// Extractor errors, private or removed media, bad formats.
    Other,
}

impl ErrorKind {
    pub fn is_transient(self) -> bool {
        !matches!(self, ErrorKind::Other)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    NoRetry,
    RetryAfter(Duration),
}

/// Backend re-run policy within a single task run.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Runs allowed per task run, the first one included. Never zero.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        let base = if cfg.base_delay_secs.is_finite() && cfg.base_delay_secs > 0.0 {
            Duration::from_secs_f64(cfg.base_delay_secs)
        } else {
            Duration::ZERO
        };
        Self {
            max_attempts: cfg.max_attempts.max(1),
            base_delay: base,
            max_delay: Duration::from_secs(cfg.max_delay_secs),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Whether attempt number `attempt` (1-based) that failed with `kind`
    /// gets another go, and after how long.
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        if !kind.is_transient() || attempt >= self.max_attempts {
            return RetryDecision::NoRetry;
        }
        let mut delay = self.backoff(attempt);
        if kind == ErrorKind::Throttled {
            delay = delay.saturating_mul(2).min(self.max_delay);
        }
        RetryDecision::RetryAfter(delay)
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(10);
        self.base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
        }
    }

    #[test]
    fn permanent_failures_are_final() {
        assert_eq!(policy(5).decide(1, ErrorKind::Other), RetryDecision::NoRetry);
    }

    #[test]
    fn delay_grows_until_capped() {
        let p = policy(20);
        let delays: Vec<_> = (1..=5)
            .map(|n| match p.decide(n, ErrorKind::Connection) {
                RetryDecision::RetryAfter(d) => d.as_secs(),
                RetryDecision::NoRetry => panic!("attempt {n} not retried"),
            })
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 8]);
    }

    #[test]
    fn throttling_waits_longer() {
        let p = policy(20);
        assert_eq!(
            p.decide(1, ErrorKind::Throttled),
            RetryDecision::RetryAfter(Duration::from_secs(2))
        );
        assert_eq!(
            p.decide(4, ErrorKind::Throttled),
            RetryDecision::RetryAfter(Duration::from_secs(8))
        );
    }

    #[test]
    fn last_attempt_is_not_retried() {
        let p = policy(2);
        assert!(matches!(
            p.decide(1, ErrorKind::Http5xx(502)),
            RetryDecision::RetryAfter(_)
        ));
        assert_eq!(p.decide(2, ErrorKind::Timeout), RetryDecision::NoRetry);
        assert_eq!(RetryPolicy::none().decide(1, ErrorKind::Timeout), RetryDecision::NoRetry);
    }

    #[test]
    fn config_is_sanitized() {
        let p = RetryPolicy::from(&RetryConfig {
            max_attempts: 0,
            base_delay_secs: f64::NAN,
            max_delay_secs: 5,
        });
        assert_eq!(p.max_attempts, 1);
        assert_eq!(p.base_delay, Duration::ZERO);
    }
}
