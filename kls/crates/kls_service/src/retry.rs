//! Bounded reconnect loop for long-lived connections owned by a service.
//!
//! A failed connection attempt schedules another one after a fixed delay,
//! up to a maximum number of consecutive failures. A successful connection
//! resets the counter.

use crate::config::ReconnectConfig;
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(5_000);

    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    pub fn from_config(config: &ReconnectConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_millis(config.delay_ms))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS, Self::DEFAULT_DELAY)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// No attempt made yet.
    Idle,
    Connected,
    /// Waiting before reconnect attempt number `attempt` (1-based).
    Waiting { attempt: u32 },
    Exhausted,
}

/// Tracks consecutive connection failures against a [`RetryPolicy`].
#[derive(Debug)]
pub struct Reconnector {
    policy: RetryPolicy,
    state: RetryState,
    attempts: u32,
}

impl Reconnector {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            state: RetryState::Idle,
            attempts: 0,
        }
    }

    pub fn state(&self) -> RetryState {
        self.state
    }

    /// Consecutive failed reconnects since the last success.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn on_connected(&mut self) {
        self.attempts = 0;
        self.state = RetryState::Connected;
    }

    pub fn on_failure(&mut self) -> RetryState {
        self.state = if self.attempts < self.policy.max_attempts {
            self.attempts += 1;
            RetryState::Waiting {
                attempt: self.attempts,
            }
        } else {
            RetryState::Exhausted
        };
        self.state
    }
}

#[derive(Debug)]
pub enum RetryError<E> {
    Cancelled,
    Exhausted { attempts: u32, last_error: E },
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Cancelled => write!(f, "reconnect cancelled"),
            RetryError::Exhausted {
                attempts,
                last_error,
            } => write!(f, "gave up after {attempts} reconnect attempts: {last_error}"),
        }
    }
}

impl<E: Error + 'static> Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RetryError::Cancelled => None,
            RetryError::Exhausted { last_error, .. } => Some(last_error),
        }
    }
}

/// Run `connect` until it succeeds, the policy is exhausted, or `cancel`
/// fires. `connect` receives the number of reconnects made so far.
pub async fn run_with_retry<T, E, F, Fut>(
    policy: RetryPolicy,
    cancel: &CancellationToken,
    mut connect: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let mut reconnector = Reconnector::new(policy);
    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }

        let error = match connect(reconnector.attempts()).await {
            Ok(value) => {
                reconnector.on_connected();
                return Ok(value);
            }
            Err(error) => error,
        };

        match reconnector.on_failure() {
            RetryState::Waiting { attempt } => {
                info!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = policy.delay.as_millis() as u64,
                    error = %error,
                    "connection failed; scheduling reconnect"
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                    _ = tokio::time::sleep(policy.delay) => {}
                }
            }
            _ => {
                warn!(attempts = reconnector.attempts(), error = %error, "max reconnect attempts reached");
                return Err(RetryError::Exhausted {
                    attempts: reconnector.attempts(),
                    last_error: error,
                });
            }
        }
    }
}
