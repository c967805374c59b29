//! Circuit Breaker Pattern
//!
//! Prevents hammering a failing provider by failing fast for a cool-down
//! period after repeated consecutive failures.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Duration to keep the circuit open before probing
    pub cool_down: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cool_down: Duration::from_secs(30),
        }
    }
}

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CircuitState {
    /// Normal operation - requests allowed
    #[default]
    Closed,
    /// Circuit tripped - requests blocked
    Open,
    /// Probe outstanding - exactly one request allowed through
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Per-endpoint circuit state.
///
/// Guarded by a mutex rather than atomics: the open -> half-open probe
/// claim must be atomic with the state read, and the critical section is
/// a handful of loads either way.
#[derive(Debug, Default)]
struct EndpointCircuit {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// Circuit breaker keyed per logical endpoint.
///
/// The breaker sees one aggregate outcome per resolution flight, recorded
/// by the orchestrator after retries are exhausted - never per attempt.
pub struct CircuitBreaker {
    config: BreakerConfig,
    circuits: DashMap<String, Mutex<EndpointCircuit>>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker.
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            circuits: DashMap::new(),
        }
    }

    fn with_circuit<T>(&self, endpoint: &str, f: impl FnOnce(&mut EndpointCircuit) -> T) -> T {
        let cell = self
            .circuits
            .entry(endpoint.to_string())
            .or_insert_with(|| Mutex::new(EndpointCircuit::default()));
        let mut circuit = cell.lock();
        f(&mut circuit)
    }

    /// Check whether a call to this endpoint is allowed.
    ///
    /// Closed always allows. Open allows only once the cool-down has
    /// elapsed, transitioning to half-open and admitting exactly one
    /// probing call. Half-open denies until that probe completes.
    pub fn allow(&self, endpoint: &str) -> bool {
        let cool_down = self.config.cool_down;
        self.with_circuit(endpoint, |circuit| match circuit.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = circuit
                    .opened_at
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::ZERO);
                if elapsed >= cool_down {
                    circuit.state = CircuitState::HalfOpen;
                    tracing::info!(endpoint, "circuit half-open, probing");
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => false,
        })
    }

    /// Record the aggregate success of one flight.
    pub fn record_success(&self, endpoint: &str) {
        self.with_circuit(endpoint, |circuit| {
            circuit.consecutive_failures = 0;
            if circuit.state != CircuitState::Closed {
                circuit.state = CircuitState::Closed;
                circuit.opened_at = None;
                tracing::info!(endpoint, "circuit closed (recovered)");
            }
        });
    }

    /// Record the aggregate failure of one flight.
    pub fn record_failure(&self, endpoint: &str) {
        let threshold = self.config.failure_threshold;
        self.with_circuit(endpoint, |circuit| {
            circuit.consecutive_failures += 1;
            match circuit.state {
                CircuitState::Closed => {
                    if circuit.consecutive_failures >= threshold {
                        circuit.state = CircuitState::Open;
                        circuit.opened_at = Some(Instant::now());
                        tracing::warn!(
                            endpoint,
                            failures = circuit.consecutive_failures,
                            "circuit opened"
                        );
                    }
                }
                CircuitState::HalfOpen => {
                    // Probe failed - back to open with a fresh cool-down
                    circuit.state = CircuitState::Open;
                    circuit.opened_at = Some(Instant::now());
                    tracing::warn!(endpoint, "circuit re-opened (probe failed)");
                }
                CircuitState::Open => {
                    circuit.opened_at = Some(Instant::now());
                }
            }
        });
    }

    /// Current state of an endpoint's circuit.
    pub fn state(&self, endpoint: &str) -> CircuitState {
        self.circuits
            .get(endpoint)
            .map(|cell| cell.lock().state)
            .unwrap_or_default()
    }

    /// Consecutive failure count for an endpoint.
    pub fn failure_count(&self, endpoint: &str) -> u32 {
        self.circuits
            .get(endpoint)
            .map(|cell| cell.lock().consecutive_failures)
            .unwrap_or(0)
    }

    /// Manually reset an endpoint's circuit to closed.
    pub fn reset(&self, endpoint: &str) {
        if let Some(cell) = self.circuits.get(endpoint) {
            let mut circuit = cell.lock();
            circuit.state = CircuitState::Closed;
            circuit.consecutive_failures = 0;
            circuit.opened_at = None;
            tracing::info!(endpoint, "circuit manually reset");
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}
