//! Inter-document pacing for batch ingestion.

use planscope_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Longest single wait a token bucket will ask for.
const MAX_WAIT: Duration = Duration::from_secs(3600);

/// How long to wait between documents of a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PacingPolicy {
    #[default]
    None,
    FixedDelay {
        delay_ms: u64,
    },
    /// At most `capacity` documents back to back, refilled continuously.
    TokenBucket {
        capacity: u32,
        refill_per_sec: f64,
    },
}

impl PacingPolicy {
    /// Reject token-bucket rates that cannot produce a finite wait.
    pub fn validate(&self) -> AppResult<()> {
        match self {
            PacingPolicy::TokenBucket { refill_per_sec, .. }
                if !(refill_per_sec.is_finite() && *refill_per_sec > 0.0) =>
            {
                Err(AppError::Config(format!(
                    "pacing.refill_per_sec must be a positive number, got {}",
                    refill_per_sec
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Applies a [`PacingPolicy`] across a sequence of documents.
#[derive(Debug)]
pub struct Pacer {
    policy: PacingPolicy,
    tokens: f64,
    refilled_at: Instant,
}

impl Pacer {
    pub fn new(policy: PacingPolicy) -> Self {
        let tokens = match &policy {
            PacingPolicy::TokenBucket { capacity, .. } => f64::from(*capacity),
            _ => 0.0,
        };
        Self {
            policy,
            tokens,
            refilled_at: Instant::now(),
        }
    }

    /// Wait as the policy requires before the next document.
    pub async fn pace(&mut self) {
        let delay = self.next_delay();
        if !delay.is_zero() {
            tracing::debug!(delay_ms = delay.as_millis() as u64, "Pacing before next document");
            tokio::time::sleep(delay).await;
        }
    }

    fn next_delay(&mut self) -> Duration {
        match self.policy {
            PacingPolicy::None => Duration::ZERO,
            PacingPolicy::FixedDelay { delay_ms } => Duration::from_millis(delay_ms),
            PacingPolicy::TokenBucket {
                capacity,
                refill_per_sec,
            } => {
                let now = Instant::now();
                let capacity = f64::from(capacity.max(1));
                if !(refill_per_sec.is_finite() && refill_per_sec > 0.0) {
                    return Duration::ZERO;
                }
                let elapsed = now.duration_since(self.refilled_at).as_secs_f64();
                self.tokens = (self.tokens + elapsed * refill_per_sec).min(capacity);
                self.refilled_at = now;

                if self.tokens >= 1.0 {
                    self.tokens -= 1.0;
                    Duration::ZERO
                } else {
                    let wait = (1.0 - self.tokens) / refill_per_sec;
                    let delay = Duration::try_from_secs_f64(wait)
                        .map_or(MAX_WAIT, |d| d.min(MAX_WAIT));
                    self.tokens = 0.0;
                    self.refilled_at = now + delay;
                    delay
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_none_does_not_wait() {
        let mut pacer = Pacer::new(PacingPolicy::None);
        let start = Instant::now();
        pacer.pace().await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_fixed_delay() {
        let mut pacer = Pacer::new(PacingPolicy::FixedDelay { delay_ms: 20 });
        let start = Instant::now();
        pacer.pace().await;
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_token_bucket_burst_then_wait() {
        let mut pacer = Pacer::new(PacingPolicy::TokenBucket {
            capacity: 2,
            refill_per_sec: 10.0,
        });
        assert_eq!(pacer.next_delay(), Duration::ZERO);
        assert_eq!(pacer.next_delay(), Duration::ZERO);
        let wait = pacer.next_delay();
        assert!(wait > Duration::from_millis(50) && wait <= Duration::from_millis(100));
    }

    #[test]
    fn test_bad_refill_rates_do_not_panic() {
        let mut pacer = Pacer::new(PacingPolicy::TokenBucket {
            capacity: 1,
            refill_per_sec: f64::NAN,
        });
        assert_eq!(pacer.next_delay(), Duration::ZERO);
        assert_eq!(pacer.next_delay(), Duration::ZERO);

        let mut pacer = Pacer::new(PacingPolicy::TokenBucket {
            capacity: 1,
            refill_per_sec: 1e-300,
        });
        assert_eq!(pacer.next_delay(), Duration::ZERO);
        assert_eq!(pacer.next_delay(), MAX_WAIT);
    }

    #[test]
    fn test_validate_refill_rate() {
        for bad in [f64::NAN, f64::INFINITY, 0.0, -1.0] {
            let policy = PacingPolicy::TokenBucket {
                capacity: 3,
                refill_per_sec: bad,
            };
            assert!(matches!(policy.validate(), Err(AppError::Config(_))));
        }
        let policy = PacingPolicy::TokenBucket {
            capacity: 3,
            refill_per_sec: 0.5,
        };
        assert!(policy.validate().is_ok());
        assert!(PacingPolicy::FixedDelay { delay_ms: 0 }.validate().is_ok());
    }

    #[test]
    fn test_policy_yaml() {
        let policy: PacingPolicy =
            serde_yaml::from_str("kind: token_bucket\ncapacity: 5\nrefill_per_sec: 0.5\n").unwrap();
        assert_eq!(
            policy,
            PacingPolicy::TokenBucket {
                capacity: 5,
                refill_per_sec: 0.5
            }
        );
        let policy: PacingPolicy = serde_yaml::from_str("kind: fixed_delay\ndelay_ms: 250\n").unwrap();
        assert_eq!(policy, PacingPolicy::FixedDelay { delay_ms: 250 });
    }
}
