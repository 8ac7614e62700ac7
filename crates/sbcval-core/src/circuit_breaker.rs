use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            open_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Default)]
struct Circuit {
    failures: u32,
    opened_at: Option<Instant>,
    probing: bool,
}

/// Stops calling an upstream that keeps failing.
///
/// After `failure_threshold` consecutive failures the circuit opens and every
/// request is refused until `open_timeout` has passed. The next request is
/// then let through as a probe: success closes the circuit, failure reopens it.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    circuit: Mutex<Circuit>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            circuit: Mutex::new(Circuit::default()),
        }
    }

    pub fn allow_request(&self) -> bool {
        let mut circuit = self.lock();
        match circuit.opened_at {
            None => true,
            Some(opened_at) if opened_at.elapsed() >= self.config.open_timeout => {
                circuit.opened_at = None;
                circuit.probing = true;
                true
            }
            Some(_) => false,
        }
    }

    pub fn record_success(&self) {
        *self.lock() = Circuit::default();
    }

    pub fn record_failure(&self) {
        let mut circuit = self.lock();
        circuit.failures = circuit.failures.saturating_add(1);
        if circuit.probing || circuit.failures >= self.config.failure_threshold {
            circuit.opened_at = Some(Instant::now());
            circuit.probing = false;
        }
    }

    pub fn state(&self) -> CircuitState {
        let circuit = self.lock();
        match (circuit.opened_at, circuit.probing) {
            (Some(_), _) => CircuitState::Open,
            (None, true) => CircuitState::HalfOpen,
            (None, false) => CircuitState::Closed,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().failures
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Circuit> {
        self.circuit
            .lock()
            .expect("circuit breaker lock is not poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 2,
            open_timeout: Duration::from_secs(60),
        });

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.allow_request());
    }

    #[test]
    fn probe_success_closes_the_circuit() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            open_timeout: Duration::from_millis(1),
        });

        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(5));
        assert!(breaker.allow_request());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.consecutive_failures(), 0);
    }

    #[test]
    fn probe_failure_reopens_immediately() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 5,
            open_timeout: Duration::from_millis(1),
        });

        for _ in 0..5 {
            breaker.record_failure();
        }
        std::thread::sleep(Duration::from_millis(5));
        assert!(breaker.allow_request());
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
    }
}
