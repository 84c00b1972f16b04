use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    Closed,
    /// Failing fast until the reset timeout elapses.
    Open,
    /// Trial calls go through; the next outcome decides.
    HalfOpen,
}

#[derive(Debug)]
struct Circuit {
    state: CircuitState,
    consecutive_failures: usize,
    opened_at: Option<Instant>,
}

/// Guards calls to an upstream that may be down. Never held across an await.
pub struct CircuitBreaker {
    name: String,
    failure_threshold: usize,
    reset_timeout: Duration,
    circuit: Mutex<Circuit>,
}

impl CircuitBreaker {
    pub fn new(name: &str, failure_threshold: usize, reset_timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            failure_threshold: failure_threshold.max(1),
            reset_timeout,
            circuit: Mutex::new(Circuit {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Circuit> {
        self.circuit.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub async fn current(&self) -> CircuitState {
        self.lock().state
    }

    pub fn consecutive_failures(&self) -> usize {
        self.lock().consecutive_failures
    }

    /// Whether a call may go through right now.
    pub async fn check(&self) -> bool {
        let mut circuit = self.lock();
        match circuit.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let cooled_down = circuit
                    .opened_at
                    .map_or(true, |at| at.elapsed() >= self.reset_timeout);
                if cooled_down {
                    circuit.state = CircuitState::HalfOpen;
                    info!("Breaker [{}] half-open, letting a trial call through", self.name);
                }
                cooled_down
            }
        }
    }

    pub async fn record_success(&self) {
        let mut circuit = self.lock();
        if circuit.state == CircuitState::HalfOpen {
            info!("Breaker [{}] closed, upstream recovered", self.name);
        }
        circuit.state = CircuitState::Closed;
        circuit.consecutive_failures = 0;
        circuit.opened_at = None;
    }

    pub async fn record_failure(&self) {
        let mut circuit = self.lock();
        circuit.consecutive_failures += 1;

        let trips = circuit.state == CircuitState::HalfOpen
            || (circuit.state == CircuitState::Closed
                && circuit.consecutive_failures >= self.failure_threshold);
        if trips {
            circuit.state = CircuitState::Open;
            circuit.opened_at = Some(Instant::now());
            error!(
                "Breaker [{}] open after {} consecutive failures",
                self.name, circuit.consecutive_failures
            );
        }
    }
}
