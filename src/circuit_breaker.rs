use crate::models::ProbeId;
use failsafe::{backoff, backoff::Exponential, failure_policy, failure_policy::ConsecutiveFailures};
use failsafe::{Config, StateMachine};
use std::collections::HashMap;
use std::time::Duration;

pub type ProbeBreaker = StateMachine<ConsecutiveFailures<Exponential>, ()>;

/// Creates a circuit breaker for one external source.
///
/// # Configuration
///
/// - **Failure threshold**: 5 consecutive failures triggers OPEN state.
/// - **Backoff**: Exponential backoff from 10s to 60s before attempting recovery.
///
/// # States
///
/// - **CLOSED**: Normal operation, requests pass through.
/// - **OPEN**: Too many failures, requests fail fast.
/// - **HALF_OPEN**: Testing if the source recovered.
///
/// A rejected call is reported as a `failed` result; it is never retried.
pub fn create_probe_circuit_breaker() -> ProbeBreaker {
    let backoff_strategy = backoff::exponential(
        Duration::from_secs(10), // Initial delay
        Duration::from_secs(60), // Maximum delay
    );

    let failure_policy = failure_policy::consecutive_failures(5, backoff_strategy);

    Config::new().failure_policy(failure_policy).build()
}

/// One breaker per probe so a failing source never trips the others.
#[derive(Clone)]
pub struct ProbeBreakers {
    breakers: HashMap<ProbeId, ProbeBreaker>,
}

impl ProbeBreakers {
    pub fn new(probes: impl IntoIterator<Item = ProbeId>) -> Self {
        Self {
            breakers: probes
                .into_iter()
                .map(|id| (id, create_probe_circuit_breaker()))
                .collect(),
        }
    }

    pub fn get(&self, probe: ProbeId) -> Option<&ProbeBreaker> {
        self.breakers.get(&probe)
    }
}
