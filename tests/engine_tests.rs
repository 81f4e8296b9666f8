/// End-to-end engine tests with scripted probes and a real SQLite cache
use async_trait::async_trait;
use futures::future::join_all;
use phone_osint::cache::{CacheEntry, ResultCache, SqliteResultCache};
use phone_osint::config::{CacheTtl, Config, Credentials};
use phone_osint::db::Database;
use phone_osint::errors::OsintError;
use phone_osint::models::{
    CanonicalNumber, PatternTag, ProbeId, ProbeResult, ProbeStatus, RiskLevel, RiskSignal,
};
use phone_osint::normalizer::ValidationMode;
use phone_osint::probes::{ProbeFailure, SourceProbe};
use phone_osint::IntelEngine;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const NUMBER: &str = "+55 11 98765-4321";

/// What a scripted probe answers on each call.
#[derive(Clone)]
enum Script {
    Always(ProbeStatus, Value),
    FailFirst(ProbeStatus, Value),
}

struct ScriptedProbe {
    id: ProbeId,
    script: Script,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl ScriptedProbe {
    fn new(id: ProbeId, script: Script) -> Self {
        Self {
            id,
            script,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn not_found(id: ProbeId) -> Self {
        Self::new(id, Script::Always(ProbeStatus::NotFound, json!({ "hits": 0 })))
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceProbe for ScriptedProbe {
    fn id(&self) -> ProbeId {
        self.id
    }

    async fn execute(
        &self,
        _number: &CanonicalNumber,
        _credential: Option<&str>,
    ) -> Result<ProbeResult, ProbeFailure> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match &self.script {
            Script::Always(status, payload) => {
                Ok(ProbeResult::fetched(self.id, *status, payload.clone(), 0.9))
            }
            Script::FailFirst(_, _) if call == 0 => Err(ProbeFailure::Http { status: 502 }),
            Script::FailFirst(status, payload) => {
                Ok(ProbeResult::fetched(self.id, *status, payload.clone(), 0.9))
            }
        }
    }
}

/// Cache whose backend is always down.
struct UnavailableCache;

#[async_trait]
impl ResultCache for UnavailableCache {
    async fn get(
        &self,
        _number: &CanonicalNumber,
        _probe: ProbeId,
    ) -> Result<Option<CacheEntry>, OsintError> {
        Err(OsintError::CacheUnavailable("disk I/O error".to_string()))
    }

    async fn put(&self, _number: &CanonicalNumber, _result: &ProbeResult) -> Result<(), OsintError> {
        Err(OsintError::CacheUnavailable("disk I/O error".to_string()))
    }

    async fn clear(&self) -> Result<u64, OsintError> {
        Err(OsintError::CacheUnavailable("disk I/O error".to_string()))
    }

    async fn entries_for(&self, _e164: &str) -> Result<Vec<CacheEntry>, OsintError> {
        Ok(Vec::new())
    }
}

fn keyed_config(probes: &[ProbeId]) -> Config {
    let credentials = probes
        .iter()
        .fold(Credentials::default(), |creds, id| creds.with(*id, "test_key"));
    Config {
        enabled_probes: probes.to_vec(),
        credentials,
        ..Config::default()
    }
}

async fn sqlite_cache() -> Arc<SqliteResultCache> {
    let db = Database::new("sqlite::memory:").await.unwrap();
    Arc::new(SqliteResultCache::new(db.pool, CacheTtl::default()))
}

fn build_engine(
    config: &Config,
    probes: Vec<Arc<ScriptedProbe>>,
    cache: Arc<dyn ResultCache>,
) -> IntelEngine {
    let probes: Vec<Arc<dyn SourceProbe>> = probes
        .into_iter()
        .map(|p| p as Arc<dyn SourceProbe>)
        .collect();
    IntelEngine::new(config, probes, cache).unwrap()
}

#[tokio::test]
async fn test_concurrent_requests_share_one_fetch() {
    let probe = Arc::new(
        ScriptedProbe::not_found(ProbeId::BreachCheck).with_delay(Duration::from_millis(50)),
    );
    let config = keyed_config(&[ProbeId::BreachCheck]);
    let engine = build_engine(&config, vec![probe.clone()], sqlite_cache().await);

    let runs = (0..10).map(|_| engine.analyze(NUMBER, None));
    let records = join_all(runs).await;

    assert_eq!(probe.calls(), 1);
    let first = records[0].as_ref().unwrap();
    for record in &records {
        assert_eq!(record.as_ref().unwrap(), first);
    }
}

#[tokio::test]
async fn test_warm_cache_output_is_byte_identical() {
    let cache = sqlite_cache().await;
    let config = keyed_config(&[ProbeId::BreachCheck, ProbeId::ReputationLookup]);

    let breach = Arc::new(ScriptedProbe::new(
        ProbeId::BreachCheck,
        Script::Always(ProbeStatus::Found, json!({ "count": 1, "breaches": ["Adobe"] })),
    ));
    let reputation = Arc::new(ScriptedProbe::not_found(ProbeId::ReputationLookup));
    let cold = build_engine(&config, vec![breach.clone(), reputation.clone()], cache.clone());
    let first = serde_json::to_string(&cold.analyze(NUMBER, None).await.unwrap()).unwrap();

    // Fresh engine over the same store: nothing in its hot tier
    let breach_again = Arc::new(ScriptedProbe::not_found(ProbeId::BreachCheck));
    let reputation_again = Arc::new(ScriptedProbe::not_found(ProbeId::ReputationLookup));
    let warm = build_engine(
        &config,
        vec![breach_again.clone(), reputation_again.clone()],
        cache.clone(),
    );
    let second = serde_json::to_string(&warm.analyze(NUMBER, None).await.unwrap()).unwrap();

    assert_eq!(first, second);
    assert_eq!(breach.calls() + reputation.calls(), 2);
    assert_eq!(breach_again.calls() + reputation_again.calls(), 0);
}

#[tokio::test]
async fn test_slow_probe_times_out() {
    let probe = Arc::new(
        ScriptedProbe::not_found(ProbeId::PeopleSearch).with_delay(Duration::from_millis(500)),
    );
    let config = Config {
        per_probe_timeout: Duration::from_millis(50),
        ..keyed_config(&[ProbeId::PeopleSearch])
    };
    let engine = build_engine(&config, vec![probe], sqlite_cache().await);

    let record = engine.analyze(NUMBER, None).await.unwrap();
    let result = record.result(ProbeId::PeopleSearch).unwrap();
    assert_eq!(result.status, ProbeStatus::Failed);
    assert_eq!(result.reason(), Some("timeout"));
    assert_eq!(result.confidence, 0.0);
}

#[tokio::test]
async fn test_missing_credentials_skip_the_probe() {
    let probe = Arc::new(ScriptedProbe::not_found(ProbeId::CarrierLookup));
    let social = Arc::new(ScriptedProbe::not_found(ProbeId::SocialPresence));
    let config = Config {
        enabled_probes: vec![ProbeId::CarrierLookup, ProbeId::SocialPresence],
        ..Config::default()
    };
    let engine = build_engine(&config, vec![probe.clone(), social.clone()], sqlite_cache().await);

    let record = engine.analyze(NUMBER, None).await.unwrap();

    let carrier = record.result(ProbeId::CarrierLookup).unwrap();
    assert_eq!(carrier.status, ProbeStatus::Unknown);
    assert_eq!(carrier.reason(), Some("missing_credentials"));
    assert_eq!(probe.calls(), 0);

    // Presence probes need no credential
    assert_eq!(social.calls(), 1);
    assert_eq!(
        record.result(ProbeId::SocialPresence).unwrap().status,
        ProbeStatus::NotFound
    );
}

#[tokio::test]
async fn test_lenient_voip_number_scores_low() {
    let carrier = Arc::new(ScriptedProbe::new(
        ProbeId::CarrierLookup,
        Script::Always(
            ProbeStatus::Found,
            json!({ "carrier": "Example Voice", "line_type": "voip", "prepaid": false }),
        ),
    ));
    let config = Config {
        validation_mode: ValidationMode::Lenient,
        ..keyed_config(&[ProbeId::CarrierLookup])
    };
    let engine = build_engine(&config, vec![carrier], sqlite_cache().await);

    let record = engine.analyze("+1234567890", None).await.unwrap();

    assert_eq!(record.number.e164(), "+1234567890");
    assert!(record
        .patterns
        .iter()
        .any(|m| m.tag == PatternTag::SequentialDigits));
    let tags: Vec<RiskSignal> = record.factors.iter().map(|f| f.tag).collect();
    assert_eq!(tags, vec![RiskSignal::VoipLine]);
    assert_eq!(record.score, 30);
    assert_eq!(record.level, RiskLevel::Low);
}

#[tokio::test]
async fn test_strict_mode_rejects_the_same_input() {
    let config = keyed_config(&[ProbeId::CarrierLookup]);
    let carrier = Arc::new(ScriptedProbe::not_found(ProbeId::CarrierLookup));
    let engine = build_engine(&config, vec![carrier.clone()], sqlite_cache().await);

    let err = engine.analyze("+1234567890", None).await.unwrap_err();
    assert!(matches!(err, OsintError::InvalidNumber(_)));
    assert_eq!(carrier.calls(), 0);
}

#[tokio::test]
async fn test_cache_outage_degrades_to_misses() {
    let breach = Arc::new(ScriptedProbe::new(
        ProbeId::BreachCheck,
        Script::Always(ProbeStatus::Found, json!({ "count": 1 })),
    ));
    let config = keyed_config(&[ProbeId::BreachCheck]);
    let engine = build_engine(&config, vec![breach.clone()], Arc::new(UnavailableCache));

    let record = engine.analyze(NUMBER, None).await.unwrap();
    assert_eq!(
        record.result(ProbeId::BreachCheck).unwrap().status,
        ProbeStatus::Found
    );
    assert_eq!(record.score, 35);
    assert_eq!(breach.calls(), 1);

    assert!(matches!(
        engine.clear_cache().await,
        Err(OsintError::WithContext { .. })
    ));
}

#[tokio::test]
async fn test_failures_are_not_cached() {
    let flaky = Arc::new(ScriptedProbe::new(
        ProbeId::ReputationLookup,
        Script::FailFirst(ProbeStatus::Found, json!({ "listed": true })),
    ));
    let cache = sqlite_cache().await;
    let config = keyed_config(&[ProbeId::ReputationLookup]);
    let engine = build_engine(&config, vec![flaky.clone()], cache.clone());

    let first = engine.analyze(NUMBER, None).await.unwrap();
    let result = first.result(ProbeId::ReputationLookup).unwrap();
    assert_eq!(result.status, ProbeStatus::Failed);
    assert_eq!(result.reason(), Some("http_error"));
    assert!(cache.entries_for("+5511987654321").await.unwrap().is_empty());

    let second = engine.analyze(NUMBER, None).await.unwrap();
    assert_eq!(
        second.result(ProbeId::ReputationLookup).unwrap().status,
        ProbeStatus::Found
    );
    assert_eq!(flaky.calls(), 2);
    assert_eq!(cache.entries_for("+5511987654321").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_probe_concurrency_is_bounded() {
    let peak = Arc::new(AtomicUsize::new(0));
    let in_flight = Arc::new(AtomicUsize::new(0));
    let probes: Vec<Arc<ScriptedProbe>> = ProbeId::ALL
        .into_iter()
        .map(|id| {
            let mut probe = ScriptedProbe::not_found(id).with_delay(Duration::from_millis(30));
            probe.peak = peak.clone();
            probe.in_flight = in_flight.clone();
            Arc::new(probe)
        })
        .collect();
    let config = Config {
        max_concurrent_probes: 2,
        ..keyed_config(&ProbeId::ALL)
    };
    let engine = build_engine(&config, probes.clone(), sqlite_cache().await);

    let record = engine.analyze(NUMBER, None).await.unwrap();

    assert_eq!(record.results.len(), 6);
    assert!(peak.load(Ordering::SeqCst) <= 2);
    assert!(probes.iter().all(|p| p.calls() == 1));
}

#[tokio::test]
async fn test_batch_preserves_input_order() {
    let probe = Arc::new(ScriptedProbe::not_found(ProbeId::SocialPresence));
    let config = Config {
        enabled_probes: vec![ProbeId::SocialPresence],
        max_concurrent_numbers: 2,
        ..Config::default()
    };
    let engine = build_engine(&config, vec![probe], sqlite_cache().await);

    let inputs = vec![
        "+55 11 98765-4321".to_string(),
        "not a number!".to_string(),
        "+55 11 98765-4322".to_string(),
    ];
    let outcomes = engine.analyze_batch(&inputs, None).await;

    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0].as_ref().unwrap().number.e164(), "+5511987654321");
    assert!(matches!(outcomes[1], Err(OsintError::InvalidNumber(_))));
    assert_eq!(outcomes[2].as_ref().unwrap().number.e164(), "+5511987654322");
}

#[tokio::test]
async fn test_clear_cache_forces_refetch() {
    let probe = Arc::new(ScriptedProbe::not_found(ProbeId::BreachCheck));
    let config = keyed_config(&[ProbeId::BreachCheck]);
    let engine = build_engine(&config, vec![probe.clone()], sqlite_cache().await);

    engine.analyze(NUMBER, None).await.unwrap();
    engine.analyze(NUMBER, None).await.unwrap();
    assert_eq!(probe.calls(), 1);

    assert_eq!(engine.clear_cache().await.unwrap(), 1);

    engine.analyze(NUMBER, None).await.unwrap();
    assert_eq!(probe.calls(), 2);
}

#[tokio::test]
async fn test_disabled_probes_are_dropped() {
    let breach = Arc::new(ScriptedProbe::not_found(ProbeId::BreachCheck));
    let carrier = Arc::new(ScriptedProbe::not_found(ProbeId::CarrierLookup));
    let config = keyed_config(&[ProbeId::CarrierLookup]);
    let engine = build_engine(&config, vec![breach.clone(), carrier], sqlite_cache().await);

    assert_eq!(engine.probe_ids(), vec![ProbeId::CarrierLookup]);
    let record = engine.analyze(NUMBER, None).await.unwrap();
    assert_eq!(record.results.len(), 1);
    assert_eq!(breach.calls(), 0);
}
