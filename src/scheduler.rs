use crate::cache::ResultCache;
use crate::circuit_breaker::ProbeBreakers;
use crate::config::{CacheTtl, Config, Credentials};
use crate::errors::OsintError;
use crate::models::{CanonicalNumber, ProbeId, ProbeResult};
use crate::probes::{ProbeFailure, SourceProbe};
use chrono::Utc;
use failsafe::futures::CircuitBreaker;
use futures::future::join_all;
use moka::future::Cache;
use moka::Expiry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

type HotKey = (String, ProbeId);

/// Keeps a hot entry only for what is left of its class TTL.
struct RemainingTtl {
    ttl: CacheTtl,
}

impl Expiry<HotKey, ProbeResult> for RemainingTtl {
    fn expire_after_create(
        &self,
        key: &HotKey,
        value: &ProbeResult,
        _created_at: Instant,
    ) -> Option<Duration> {
        let ttl = self.ttl.for_probe(key.1);
        let age = value
            .fetched_at
            .and_then(|at| (Utc::now() - at).to_std().ok())
            .unwrap_or(Duration::ZERO);
        Some(ttl.saturating_sub(age))
    }
}

/// Why a fetch left nothing in the hot tier.
#[derive(Debug)]
enum Uncached {
    Failed(ProbeFailure),
    Inconclusive(ProbeResult),
}

/// Runs probes for a number: cache first, then network under a global bound.
///
/// The hot tier doubles as the single-flight table: concurrent callers for the
/// same `(number, probe)` share one initialization, and failed initializations
/// are not retained.
pub struct ProbeScheduler {
    probes: Vec<Arc<dyn SourceProbe>>,
    cache: Arc<dyn ResultCache>,
    hot: Cache<HotKey, ProbeResult>,
    breakers: ProbeBreakers,
    permits: Arc<Semaphore>,
    credentials: Credentials,
    timeout: Duration,
}

impl ProbeScheduler {
    pub fn new(
        mut probes: Vec<Arc<dyn SourceProbe>>,
        cache: Arc<dyn ResultCache>,
        config: &Config,
    ) -> Result<Self, OsintError> {
        probes.sort_by_key(|p| p.id());
        if probes.windows(2).any(|w| w[0].id() == w[1].id()) {
            return Err(OsintError::Configuration(
                "more than one probe registered for the same id".to_string(),
            ));
        }

        let hot = Cache::builder()
            .max_capacity(config.hot_cache_capacity)
            .expire_after(RemainingTtl {
                ttl: config.cache_ttl,
            })
            .build();

        Ok(Self {
            breakers: ProbeBreakers::new(probes.iter().map(|p| p.id())),
            probes,
            cache,
            hot,
            permits: Arc::new(Semaphore::new(config.max_concurrent_probes)),
            credentials: config.credentials.clone(),
            timeout: config.per_probe_timeout,
        })
    }

    /// Ids of the registered probes, in order.
    pub fn probe_ids(&self) -> Vec<ProbeId> {
        self.probes.iter().map(|p| p.id()).collect()
    }

    /// One result per probe, ordered by probe id. Never fails.
    pub async fn run(&self, number: &CanonicalNumber) -> Vec<ProbeResult> {
        let runs = self.probes.iter().map(|probe| self.run_probe(number, probe));
        let mut results = join_all(runs).await;
        results.sort_by_key(|r| r.probe);
        results
    }

    /// Drops every hot entry; the durable cache is untouched.
    pub fn invalidate_hot(&self) {
        self.hot.invalidate_all();
    }

    async fn run_probe(&self, number: &CanonicalNumber, probe: &Arc<dyn SourceProbe>) -> ProbeResult {
        let id = probe.id();
        if id.requires_credentials() && !self.credentials.has(id) {
            tracing::debug!("{} skipped for {}: no credential", id, number);
            return ProbeFailure::MissingCredentials.into_result(id);
        }

        let key = (number.e164().to_string(), id);
        match self.hot.try_get_with(key, self.fetch(number, probe)).await {
            Ok(result) => result,
            Err(uncached) => match uncached.as_ref() {
                Uncached::Failed(failure) => {
                    tracing::warn!("{} failed for {}: {}", id, number, failure);
                    failure.clone().into_result(id)
                }
                Uncached::Inconclusive(result) => result.clone(),
            },
        }
    }

    /// Durable cache, then a bounded, timed network call. Conclusive results
    /// are persisted before they are handed to any waiting caller.
    async fn fetch(
        &self,
        number: &CanonicalNumber,
        probe: &Arc<dyn SourceProbe>,
    ) -> Result<ProbeResult, Uncached> {
        let id = probe.id();

        match self.cache.get(number, id).await {
            Ok(Some(entry)) => return Ok(entry.result),
            Ok(None) => {}
            Err(e) => tracing::warn!(
                "Result cache read failed for {}/{}, treating as miss: {}",
                number,
                id,
                e
            ),
        }

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| Uncached::Failed(ProbeFailure::Network("scheduler closed".to_string())))?;

        tracing::info!("Running {} for {}", id, number);
        let credential = self.credentials.get(id);
        let timed = async {
            tokio::time::timeout(self.timeout, probe.execute(number, credential))
                .await
                .unwrap_or(Err(ProbeFailure::Timeout))
        };

        let outcome = match self.breakers.get(id) {
            Some(breaker) => match breaker.call(timed).await {
                Ok(result) => Ok(result),
                Err(failsafe::Error::Rejected) => Err(ProbeFailure::CircuitOpen),
                Err(failsafe::Error::Inner(failure)) => Err(failure),
            },
            None => timed.await,
        };

        let result = outcome.map_err(Uncached::Failed)?;
        if !result.status.is_cacheable() {
            return Err(Uncached::Inconclusive(result));
        }

        if let Err(e) = self.cache.put(number, &result).await {
            tracing::warn!("Result cache write failed for {}/{}: {}", number, id, e);
        }
        Ok(result)
    }
}
