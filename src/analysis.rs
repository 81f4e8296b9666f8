/// Analysis workflow shared by the HTTP handlers and the library entry point.
///
/// 1. Normalize the raw input into a canonical number
/// 2. Detect digit patterns (synchronous)
/// 3. Run every enabled probe (cache first, then network)
/// 4. Score the outcomes
/// 5. Assemble the immutable record
use crate::cache::{ResultCache, SqliteResultCache};
use crate::config::Config;
use crate::db::Database;
use crate::errors::{OsintError, ResultExt};
use crate::models::{
    CanonicalNumber, IntelligenceRecord, PatternMatch, ProbeId, ProbeResult, RiskAssessment,
};
use crate::normalizer::NumberNormalizer;
use crate::patterns::PatternAnalyzer;
use crate::probes::SourceProbe;
use crate::risk::RiskScorer;
use crate::scheduler::ProbeScheduler;
use crate::services::{build_http_client, default_probes};
use futures::stream::{self, StreamExt};
use std::sync::Arc;

/// Composes the pieces of one analysis into a record.
pub struct IntelligenceAssembler;

impl IntelligenceAssembler {
    /// Fails only when the results do not line up one-to-one, in order, with
    /// `expected` probe ids.
    pub fn assemble(
        number: CanonicalNumber,
        patterns: Vec<PatternMatch>,
        results: Vec<ProbeResult>,
        assessment: RiskAssessment,
        expected: &[ProbeId],
    ) -> Result<IntelligenceRecord, OsintError> {
        if results.windows(2).any(|w| w[0].probe >= w[1].probe) {
            return Err(OsintError::Internal(
                "probe results are duplicated or out of order".to_string(),
            ));
        }
        let ids: Vec<ProbeId> = results.iter().map(|r| r.probe).collect();
        if ids != expected {
            return Err(OsintError::Internal(format!(
                "probe results {:?} do not match enabled probes {:?}",
                ids, expected
            )));
        }

        let recommendations = assessment.level.recommendations();
        Ok(IntelligenceRecord {
            number,
            patterns,
            results,
            factors: assessment.factors,
            score: assessment.score,
            level: assessment.level,
            recommendations,
        })
    }
}

/// Engine entry point. Configuration is fixed at construction.
pub struct IntelEngine {
    normalizer: NumberNormalizer,
    patterns: PatternAnalyzer,
    scheduler: ProbeScheduler,
    scorer: RiskScorer,
    cache: Arc<dyn ResultCache>,
    max_concurrent_numbers: usize,
}

impl IntelEngine {
    /// Opens the SQLite cache and builds the HTTP-backed probes.
    pub async fn from_config(config: &Config) -> Result<Self, OsintError> {
        config.validate()?;

        let db = Database::new(&config.database_url).await?;
        tracing::info!("Result cache database ready");

        let cache: Arc<dyn ResultCache> =
            Arc::new(SqliteResultCache::new(db.pool, config.cache_ttl));
        let client = build_http_client(config)?;
        let probes = default_probes(config, client);

        Self::new(config, probes, cache)
    }

    /// Builds an engine over explicit probes and cache. Probes whose id is not
    /// enabled in `config` are dropped.
    pub fn new(
        config: &Config,
        probes: Vec<Arc<dyn SourceProbe>>,
        cache: Arc<dyn ResultCache>,
    ) -> Result<Self, OsintError> {
        config.validate()?;

        let probes: Vec<Arc<dyn SourceProbe>> = probes
            .into_iter()
            .filter(|p| config.is_enabled(p.id()))
            .collect();
        let scheduler = ProbeScheduler::new(probes, cache.clone(), config)
            .context("building probe scheduler")?;

        tracing::info!(
            "Engine ready: probes {:?}, validation {}",
            scheduler.probe_ids(),
            config.validation_mode
        );

        Ok(Self {
            normalizer: NumberNormalizer::new(config.validation_mode),
            patterns: PatternAnalyzer::new(),
            scheduler,
            scorer: RiskScorer::new(config.risk_weights),
            cache,
            max_concurrent_numbers: config.max_concurrent_numbers,
        })
    }

    /// Analyzes one number. Only an unusable input fails; probe and cache
    /// failures are folded into the record.
    pub async fn analyze(
        &self,
        raw: &str,
        country_hint: Option<&str>,
    ) -> Result<IntelligenceRecord, OsintError> {
        tracing::info!("Starting analysis for input: {}", raw);

        tracing::info!("Step 1: Normalizing number");
        let number = self.normalizer.normalize(raw, country_hint)?;

        tracing::info!("Step 2: Detecting patterns for {}", number);
        let patterns = self.patterns.analyze(&number);

        tracing::info!("Step 3: Running probes for {}", number);
        let results = self.scheduler.run(&number).await;

        tracing::info!("Step 4: Scoring {}", number);
        let assessment = self.scorer.score(&number, &results, &patterns);

        tracing::info!(
            "Analysis complete for {}: score {} ({:?}), {} factor(s)",
            number,
            assessment.score,
            assessment.level,
            assessment.factors.len()
        );

        IntelligenceAssembler::assemble(
            number,
            patterns,
            results,
            assessment,
            &self.scheduler.probe_ids(),
        )
    }

    /// One outcome per input, in input order, with at most
    /// `max_concurrent_numbers` analyses in flight.
    pub async fn analyze_batch(
        &self,
        numbers: &[String],
        country_hint: Option<&str>,
    ) -> Vec<Result<IntelligenceRecord, OsintError>> {
        tracing::info!("Starting batch analysis of {} number(s)", numbers.len());
        // Built up front so the returned future stays `Send` for any input lifetime.
        let analyses: Vec<_> = numbers
            .iter()
            .map(|raw| Box::pin(self.analyze(raw, country_hint)))
            .collect();
        stream::iter(analyses)
            .buffered(self.max_concurrent_numbers)
            .collect()
            .await
    }

    /// Empties both cache tiers.
    pub async fn clear_cache(&self) -> Result<u64, OsintError> {
        self.scheduler.invalidate_hot();
        self.cache.clear().await.context("clearing result cache")
    }

    pub fn probe_ids(&self) -> Vec<ProbeId> {
        self.scheduler.probe_ids()
    }
}
