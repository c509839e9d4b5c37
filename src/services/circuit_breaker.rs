//! Process-wide circuit breaker shared by all providers.
//!
//! The breaker protects the dispatcher's outbound fan-out capacity as a
//! whole, not individual upstreams, so a single instance gates every
//! provider call.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use tracing::warn;

use crate::error::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            State::Closed => "closed",
            State::Open => "open",
            State::HalfOpen => "half-open",
        };
        f.write_str(state)
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub name: String,
    /// Probe budget while half-open.
    pub max_requests: u32,
    /// Counter-reset window while closed. Zero disables the reset.
    pub interval: Duration,
    /// Cooldown before an open breaker starts probing.
    pub timeout: Duration,
    /// Minimum samples in the current window before the trip condition is
    /// evaluated.
    pub min_requests: u32,
    /// Failure ratio that trips the breaker, in (0, 1].
    pub failure_ratio: f64,
}

#[derive(Debug, Default, Clone, Copy)]
struct Counts {
    requests: u32,
    successes: u32,
    failures: u32,
}

/// Mutable breaker state. Outcomes are stamped with the generation that
/// admitted them; a generation rolls whenever the state changes or the
/// closed-window interval expires, so stale outcomes never pollute the
/// current window's counters.
struct Shared {
    state: State,
    generation: u64,
    counts: Counts,
    expiry: Option<Instant>,
}

struct Inner {
    settings: Settings,
    shared: Mutex<Shared>,
}

#[derive(Clone)]
pub struct CircuitBreaker {
    inner: Arc<Inner>,
}

impl CircuitBreaker {
    pub fn new(mut settings: Settings) -> Self {
        settings.max_requests = settings.max_requests.max(1);
        let expiry = if settings.interval.is_zero() {
            None
        } else {
            Some(Instant::now() + settings.interval)
        };
        Self {
            inner: Arc::new(Inner {
                settings,
                shared: Mutex::new(Shared {
                    state: State::Closed,
                    generation: 0,
                    counts: Counts::default(),
                    expiry,
                }),
            }),
        }
    }

    /// Run `operation` through the breaker. While open every call
    /// short-circuits with `BreakerOpen` without invoking the operation;
    /// otherwise the operation's own result is surfaced unchanged.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let generation = self.before_call()?;
        let result = operation().await;
        self.after_call(generation, result.is_ok());
        result
    }

    pub fn state(&self) -> State {
        let mut shared = self.inner.shared.lock().unwrap();
        self.refresh(&mut shared, Instant::now());
        shared.state
    }

    fn before_call(&self) -> Result<u64, GatewayError> {
        let mut shared = self.inner.shared.lock().unwrap();
        let now = Instant::now();
        self.refresh(&mut shared, now);
        match shared.state {
            State::Open => Err(GatewayError::BreakerOpen),
            State::HalfOpen if shared.counts.requests >= self.inner.settings.max_requests => {
                Err(GatewayError::BreakerOpen)
            }
            _ => {
                shared.counts.requests += 1;
                Ok(shared.generation)
            }
        }
    }

    fn after_call(&self, generation: u64, success: bool) {
        let mut shared = self.inner.shared.lock().unwrap();
        let now = Instant::now();
        self.refresh(&mut shared, now);
        if shared.generation != generation {
            // Outcome belongs to a previous window.
            return;
        }
        if success {
            self.on_success(&mut shared, now);
        } else {
            self.on_failure(&mut shared, now);
        }
    }

    fn on_success(&self, shared: &mut Shared, now: Instant) {
        shared.counts.successes += 1;
        if shared.state == State::HalfOpen
            && shared.counts.successes >= self.inner.settings.max_requests
        {
            self.set_state(shared, State::Closed, now);
        }
    }

    fn on_failure(&self, shared: &mut Shared, now: Instant) {
        shared.counts.failures += 1;
        match shared.state {
            State::Closed => {
                if self.ready_to_trip(&shared.counts) {
                    self.set_state(shared, State::Open, now);
                }
            }
            State::HalfOpen => self.set_state(shared, State::Open, now),
            State::Open => {}
        }
    }

    fn ready_to_trip(&self, counts: &Counts) -> bool {
        let settings = &self.inner.settings;
        counts.requests >= settings.min_requests
            && counts.failures as f64 / counts.requests as f64 >= settings.failure_ratio
    }

    /// Advance time-driven transitions: closed-window rollover and the
    /// open -> half-open cooldown.
    fn refresh(&self, shared: &mut Shared, now: Instant) {
        match shared.state {
            State::Closed => {
                if let Some(expiry) = shared.expiry {
                    if now >= expiry {
                        self.new_generation(shared, now);
                    }
                }
            }
            State::Open => {
                if let Some(expiry) = shared.expiry {
                    if now >= expiry {
                        self.set_state(shared, State::HalfOpen, now);
                    }
                }
            }
            State::HalfOpen => {}
        }
    }

    fn set_state(&self, shared: &mut Shared, to: State, now: Instant) {
        if shared.state == to {
            return;
        }
        let from = shared.state;
        shared.state = to;
        self.new_generation(shared, now);
        warn!(
            "circuit breaker {} state changed from {from} to {to}",
            self.inner.settings.name
        );
    }

    fn new_generation(&self, shared: &mut Shared, now: Instant) {
        shared.generation += 1;
        shared.counts = Counts::default();
        shared.expiry = match shared.state {
            State::Closed => {
                let interval = self.inner.settings.interval;
                if interval.is_zero() {
                    None
                } else {
                    Some(now + interval)
                }
            }
            State::Open => Some(now + self.inner.settings.timeout),
            State::HalfOpen => None,
        };
    }
}
