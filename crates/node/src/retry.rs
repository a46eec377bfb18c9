// Path: crates/node/src/retry.rs
//! Retry with exponential backoff, a circuit breaker, and a token-bucket
//! rate limiter.
//!
//! Timeouts and partitions are retried; cryptographic failures are not (the
//! message is simply dropped where it failed). Backoff grows by powers of
//! two from one second up to sixty, with ±10% jitter to keep a recovering
//! cluster from thundering in step.

use conductor_types::error::ConsensusError;
use rand::Rng;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Exponential backoff parameters.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// First delay.
    pub base: Duration,
    /// Upper bound for any delay.
    pub cap: Duration,
    /// Jitter fraction applied to each delay (0.1 = ±10%).
    pub jitter: f64,
    /// Attempts before giving up.
    pub max_retries: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(60),
            jitter: 0.1,
            max_retries: 5,
        }
    }
}

impl BackoffPolicy {
    /// The delay before retry `attempt` (zero-based), jittered.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = self.base.as_secs_f64() * 2f64.powi(attempt as i32);
        let capped = exp.min(self.cap.as_secs_f64());
        let jitter = capped * self.jitter * (2.0 * rand::thread_rng().gen::<f64>() - 1.0);
        Duration::from_secs_f64((capped + jitter).max(0.0))
    }
}

/// True for error kinds worth retrying: timeouts and partitions. Signature
/// and certificate failures are deterministic and never retried.
pub fn is_retryable(error: &ConsensusError) -> bool {
    matches!(
        error,
        ConsensusError::Timeout { .. }
            | ConsensusError::NoQuorum { .. }
            | ConsensusError::InsufficientValidators { .. }
            | ConsensusError::Network(_)
    )
}

/// Runs `operation` until it succeeds, a non-retryable error occurs, or the
/// retry budget is exhausted.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: BackoffPolicy,
    mut operation: F,
) -> Result<T, ConsensusError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ConsensusError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if !is_retryable(&error) => return Err(error),
            Err(error) if attempt >= policy.max_retries => {
                warn!(target: "node", %error, attempts = attempt + 1, "retry budget exhausted");
                return Err(error);
            }
            Err(error) => {
                let delay = policy.delay(attempt);
                warn!(
                    target: "node",
                    %error,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "retrying after backoff"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Circuit-breaker state for an external dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Trips open after consecutive failures and probes again after a cooldown.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    reset_timeout: Duration,
    failures: u32,
    last_failure: Option<Instant>,
    state: BreakerState,
}

impl CircuitBreaker {
    /// Creates a breaker that opens after `failure_threshold` consecutive
    /// failures and probes again after `reset_timeout`.
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            reset_timeout,
            failures: 0,
            last_failure: None,
            state: BreakerState::Closed,
        }
    }

    /// True when a call may proceed. Transitions open → half-open once the
    /// cooldown has elapsed.
    pub fn allow(&mut self) -> bool {
        if self.state == BreakerState::Open {
            let cooled = self
                .last_failure
                .map(|at| at.elapsed() >= self.reset_timeout)
                .unwrap_or(true);
            if cooled {
                self.state = BreakerState::HalfOpen;
                info!(target: "node", "circuit breaker half-open");
            }
        }
        self.state != BreakerState::Open
    }

    /// Records a successful call.
    pub fn record_success(&mut self) {
        if self.state == BreakerState::HalfOpen {
            info!(target: "node", "circuit breaker closed");
        }
        self.state = BreakerState::Closed;
        self.failures = 0;
    }

    /// Records a failed call, possibly tripping the breaker open.
    pub fn record_failure(&mut self) {
        self.failures += 1;
        self.last_failure = Some(Instant::now());
        if self.failures >= self.failure_threshold {
            if self.state != BreakerState::Open {
                warn!(target: "node", failures = self.failures, "circuit breaker opened");
            }
            self.state = BreakerState::Open;
        }
    }
}

/// A token-bucket rate limiter.
#[derive(Debug)]
pub struct RateLimiter {
    rate_per_sec: f64,
    capacity: f64,
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// Creates a bucket refilled at `rate_per_sec` up to `capacity`.
    pub fn new(rate_per_sec: f64, capacity: u32) -> Self {
        Self {
            rate_per_sec,
            capacity: capacity as f64,
            tokens: capacity as f64,
            last_refill: Instant::now(),
        }
    }

    /// Takes `tokens` from the bucket; false means rate-limited.
    pub fn acquire(&mut self, tokens: u32) -> bool {
        let elapsed = self.last_refill.elapsed().as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate_per_sec).min(self.capacity);
        self.last_refill = Instant::now();

        if self.tokens >= tokens as f64 {
            self.tokens -= tokens as f64;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delays_grow_and_cap() {
        let policy = BackoffPolicy {
            jitter: 0.0,
            ..Default::default()
        };
        assert_eq!(policy.delay(0), Duration::from_secs(1));
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(5), Duration::from_secs(32));
        assert_eq!(policy.delay(10), Duration::from_secs(60));
    }

    #[test]
    fn jitter_stays_within_ten_percent() {
        let policy = BackoffPolicy::default();
        for _ in 0..50 {
            let d = policy.delay(2).as_secs_f64();
            assert!((3.6..=4.4).contains(&d), "delay {} out of band", d);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_timeouts_but_not_crypto_failures() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(BackoffPolicy::default(), || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ConsensusError::Timeout {
                        what: "round".into(),
                        seconds: 1,
                    })
                } else {
                    Ok(())
                }
            }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);

        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(BackoffPolicy::default(), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(ConsensusError::InvalidSignature) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn breaker_opens_and_probes() {
        let mut breaker = CircuitBreaker::new(2, Duration::from_millis(0));
        assert!(breaker.allow());
        breaker.record_failure();
        assert!(breaker.allow());
        breaker.record_failure();
        // Threshold reached: open. Zero cooldown lets it probe immediately.
        assert!(breaker.allow());
        breaker.record_success();
        assert!(breaker.allow());
    }

    #[test]
    fn limiter_exhausts_and_refills() {
        let mut limiter = RateLimiter::new(1000.0, 2);
        assert!(limiter.acquire(1));
        assert!(limiter.acquire(1));
        assert!(!limiter.acquire(1));
        std::thread::sleep(Duration::from_millis(5));
        assert!(limiter.acquire(1));
    }
}
