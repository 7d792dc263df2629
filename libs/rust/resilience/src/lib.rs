//! Resilience utilities: bounded fixed-delay retry expressed as an explicit state machine.
//!
//! `RetryState` carries no timers of its own, so the transitions can be unit tested
//! without sleeping; `retry_async` drives it with `tokio::time::sleep`, which tests
//! can fast-forward with a paused clock.
use std::fmt;
use std::time::Duration;
use futures::Future;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// Fixed delay between attempts. A zero attempt budget still runs the operation once.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self { Self { max_attempts: max_attempts.max(1), delay } }
}

impl Default for RetryPolicy { fn default() -> Self { Self::fixed(5, Duration::from_secs(5)) } }

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState { Attempting(u32), Succeeded(u32), Exhausted(u32) }

impl RetryState {
    pub fn start() -> Self { RetryState::Attempting(1) }

    /// 1-based number of the attempt this state refers to.
    pub fn attempt(&self) -> u32 {
        match *self { RetryState::Attempting(n) | RetryState::Succeeded(n) | RetryState::Exhausted(n) => n }
    }

    pub fn on_success(self) -> Self {
        match self { RetryState::Attempting(n) => RetryState::Succeeded(n), done => done }
    }

    pub fn on_failure(self, policy: &RetryPolicy) -> Self {
        match self {
            RetryState::Attempting(n) if n >= policy.max_attempts.max(1) => RetryState::Exhausted(n),
            RetryState::Attempting(n) => RetryState::Attempting(n + 1),
            done => done,
        }
    }

    pub fn is_terminal(&self) -> bool { !matches!(self, RetryState::Attempting(_)) }
}

/// Returned when every attempt failed; keeps the error of the final attempt.
#[derive(Debug, Error)]
#[error("gave up after {attempts} attempt(s): {last_error}")]
pub struct Exhausted<E> {
    pub attempts: u32,
    #[source]
    pub last_error: E,
}

impl<E> Exhausted<E> {
    pub fn into_inner(self) -> E { self.last_error }
}

/// Runs `op` until it succeeds or the policy's attempt budget is spent, sleeping
/// `policy.delay` between attempts (never after the last one).
pub async fn retry_async<F, Fut, T, E>(policy: &RetryPolicy, mut op: F) -> Result<T, Exhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let mut state = RetryState::start();
    loop {
        let attempt = state.attempt();
        match op(attempt).await {
            Ok(v) => {
                state = state.on_success();
                debug!(attempt = state.attempt(), "retry_succeeded");
                return Ok(v);
            }
            Err(e) => {
                state = state.on_failure(policy);
                if let RetryState::Exhausted(attempts) = state {
                    warn!(attempts, error = %e, "retry_exhausted");
                    return Err(Exhausted { attempts, last_error: e });
                }
                warn!(attempt, max_attempts = policy.max_attempts, delay_ms = policy.delay.as_millis() as u64, error = %e, "attempt_failed_retrying");
                tokio::time::sleep(policy.delay).await;
            }
        }
    }
}
