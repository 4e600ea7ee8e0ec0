//! Guarded access to an affinity scorer: bounded retry, a deadline per call,
//! and a circuit breaker shared by every slice using the scorer.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::warn;

use crate::{
    config::ScorerPolicy,
    error::{Error, Result},
    scorer::{AffinityScorer, ScoreRequest, ScoreResponse, ScoringContext},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls flow normally.
    Closed,
    /// Calls are rejected until the cooldown elapses.
    Open,
    /// A single probing call is in flight, others are rejected.
    HalfOpen,
}

#[derive(Debug)]
struct Breaker {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    probing: bool,
}

pub struct CircuitBreaker {
    inner: Mutex<Breaker>,
    threshold: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            inner: Mutex::new(Breaker {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                probing: false,
            }),
            threshold: threshold.max(1),
            cooldown,
        }
    }

    pub fn allows_call(&self) -> bool {
        let mut breaker = self.inner.lock();
        match breaker.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => {
                let free = !breaker.probing;
                breaker.probing = true;
                free
            }
            CircuitState::Open => {
                let cooled = breaker
                    .opened_at
                    .is_none_or(|opened| opened.elapsed() >= self.cooldown);
                if cooled {
                    breaker.state = CircuitState::HalfOpen;
                    breaker.probing = true;
                }
                cooled
            }
        }
    }

    pub fn record_success(&self) {
        let mut breaker = self.inner.lock();
        breaker.state = CircuitState::Closed;
        breaker.consecutive_failures = 0;
        breaker.opened_at = None;
        breaker.probing = false;
    }

    pub fn record_failure(&self) {
        let mut breaker = self.inner.lock();
        breaker.consecutive_failures += 1;
        breaker.probing = false;
        let trip = match breaker.state {
            CircuitState::Closed => breaker.consecutive_failures >= self.threshold,
            CircuitState::HalfOpen => true,
            CircuitState::Open => false,
        };
        if trip {
            warn!(
                failures = breaker.consecutive_failures,
                "affinity scorer circuit opened"
            );
            breaker.state = CircuitState::Open;
            breaker.opened_at = Some(Instant::now());
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }
}

/// Wraps a scorer with the guards of a [`ScorerPolicy`].
///
/// The deadline is checked once the synchronous call returns: a late answer
/// is discarded and counted as a failure, but a scorer that never returns
/// is not interrupted. A response whose shape does not match the request is
/// a failed attempt as well.
pub struct ResilientScorer<S> {
    inner: S,
    max_attempts: u32,
    timeout: Duration,
    hidden_size: usize,
    breaker: CircuitBreaker,
}

impl<S: AffinityScorer> ResilientScorer<S> {
    pub fn new(inner: S, policy: &ScorerPolicy, hidden_size: usize) -> Self {
        Self {
            inner,
            max_attempts: policy.max_attempts.max(1),
            timeout: policy.timeout(),
            hidden_size,
            breaker: CircuitBreaker::new(policy.failure_threshold, policy.cooldown()),
        }
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn attempt(&self, request: &ScoreRequest<'_>) -> Result<ScoreResponse> {
        let started = Instant::now();
        let response = self.inner.score(request)?;
        let elapsed = started.elapsed();
        if elapsed > self.timeout {
            return Err(Error::ScorerTimeout {
                context: request.context,
                elapsed_ms: elapsed.as_millis() as u64,
                limit_ms: self.timeout.as_millis() as u64,
            });
        }
        response.validate(request, self.hidden_size)?;
        Ok(response)
    }
}

impl<S: AffinityScorer> AffinityScorer for ResilientScorer<S> {
    fn score(&self, request: &ScoreRequest<'_>) -> Result<ScoreResponse> {
        let context: ScoringContext = request.context;
        let mut last_error = None;

        for attempt in 1..=self.max_attempts {
            if !self.breaker.allows_call() {
                return Err(Error::CircuitOpen { context });
            }
            match self.attempt(request) {
                Ok(response) => {
                    self.breaker.record_success();
                    return Ok(response);
                }
                Err(error) => {
                    warn!(
                        %context,
                        attempt,
                        max_attempts = self.max_attempts,
                        %error,
                        "affinity scorer call failed"
                    );
                    self.breaker.record_failure();
                    last_error = Some(error);
                }
            }
        }

        Err(last_error.unwrap_or(Error::ScorerUnavailable {
            context,
            reason: "no attempt made".into(),
        }))
    }
}
