use crate::cache_validator::CacheChecksum;
use crate::config::CacheTtl;
use crate::errors::{OsintError, ResultExt};
use crate::models::{CanonicalNumber, ProbeId, ProbeResult, ProbeStatus};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{Row, SqlitePool};
use std::time::Duration;

/// A persisted probe result keyed by `(canonical number, probe id)`.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub canonical_number: String,
    pub result: ProbeResult,
    pub checksum: String,
}

impl CacheEntry {
    /// Time since the result was fetched; zero for timestamps in the future.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        self.result
            .fetched_at
            .and_then(|at| (now - at).to_std().ok())
            .unwrap_or(Duration::ZERO)
    }

    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        self.result.fetched_at.is_some() && self.age(now) <= ttl
    }
}

/// Durable store of prior probe outcomes.
///
/// Stale entries read as absent; nothing is evicted in the background.
#[async_trait]
pub trait ResultCache: Send + Sync {
    async fn get(
        &self,
        number: &CanonicalNumber,
        probe: ProbeId,
    ) -> Result<Option<CacheEntry>, OsintError>;

    /// Upserts a conclusive result. Degraded results are ignored.
    async fn put(&self, number: &CanonicalNumber, result: &ProbeResult) -> Result<(), OsintError>;

    /// Removes every entry, returning how many were removed.
    async fn clear(&self) -> Result<u64, OsintError>;

    /// All stored entries for an E.164 number, fresh or not, ordered by probe id.
    async fn entries_for(&self, e164: &str) -> Result<Vec<CacheEntry>, OsintError>;
}

pub struct SqliteResultCache {
    pool: SqlitePool,
    ttl: CacheTtl,
}

impl SqliteResultCache {
    pub fn new(pool: SqlitePool, ttl: CacheTtl) -> Self {
        Self { pool, ttl }
    }

    pub fn ttl(&self) -> &CacheTtl {
        &self.ttl
    }

    fn decode_row(row: &sqlx::sqlite::SqliteRow) -> Result<Option<CacheEntry>, OsintError> {
        let canonical_number: String = row.try_get("canonical_number")?;
        let probe_id: String = row.try_get("probe_id")?;
        let status: String = row.try_get("status")?;
        let payload: String = row.try_get("payload")?;
        let confidence: f64 = row.try_get("confidence")?;
        let fetched_at: String = row.try_get("fetched_at")?;
        let checksum: String = row.try_get("checksum")?;

        let (probe, status) = match (probe_id.parse::<ProbeId>(), status.parse::<ProbeStatus>()) {
            (Ok(p), Ok(s)) => (p, s),
            _ => {
                tracing::warn!(
                    "Skipping cache row with unknown probe/status: {}/{}",
                    probe_id,
                    status
                );
                return Ok(None);
            }
        };

        if !CacheChecksum::verify(
            &checksum,
            &canonical_number,
            probe,
            status,
            confidence,
            &fetched_at,
            &payload,
        ) {
            return Ok(None);
        }

        let payload = match serde_json::from_str(&payload) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Cached payload for {}/{} is not JSON: {}", canonical_number, probe, e);
                return Ok(None);
            }
        };
        let fetched_at = match DateTime::parse_from_rfc3339(&fetched_at) {
            Ok(at) => at.with_timezone(&Utc),
            Err(e) => {
                tracing::warn!("Cached timestamp for {}/{} is invalid: {}", canonical_number, probe, e);
                return Ok(None);
            }
        };

        Ok(Some(CacheEntry {
            canonical_number,
            result: ProbeResult {
                probe,
                status,
                payload,
                fetched_at: Some(fetched_at),
                confidence,
            },
            checksum,
        }))
    }
}

#[async_trait]
impl ResultCache for SqliteResultCache {
    async fn get(
        &self,
        number: &CanonicalNumber,
        probe: ProbeId,
    ) -> Result<Option<CacheEntry>, OsintError> {
        let row = sqlx::query(
            "SELECT canonical_number, probe_id, status, payload, confidence, fetched_at, checksum \
             FROM probe_cache WHERE canonical_number = ? AND probe_id = ?",
        )
        .bind(number.e164())
        .bind(probe.as_str())
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("reading cache for {}/{}", number, probe))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let Some(entry) = Self::decode_row(&row)? else {
            return Ok(None);
        };

        let ttl = self.ttl.for_probe(probe);
        if !entry.is_fresh(ttl, Utc::now()) {
            tracing::debug!("Cache entry for {}/{} is stale", number, probe);
            return Ok(None);
        }

        tracing::debug!("Cache hit for {}/{}", number, probe);
        Ok(Some(entry))
    }

    async fn put(&self, number: &CanonicalNumber, result: &ProbeResult) -> Result<(), OsintError> {
        let fetched_at = match result.fetched_at {
            Some(at) if result.status.is_cacheable() => at,
            _ => {
                tracing::debug!(
                    "Not caching {} result for {}/{}",
                    result.status.as_str(),
                    number,
                    result.probe
                );
                return Ok(());
            }
        };

        let payload = serde_json::to_string(&result.payload)
            .map_err(|e| OsintError::Internal(format!("payload serialization failed: {}", e)))?;
        let fetched_at = fetched_at.to_rfc3339_opts(SecondsFormat::Millis, true);
        let checksum = CacheChecksum::compute(
            number.e164(),
            result.probe,
            result.status,
            result.confidence,
            &fetched_at,
            &payload,
        );

        sqlx::query(
            "INSERT INTO probe_cache \
             (canonical_number, probe_id, status, payload, confidence, fetched_at, checksum) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (canonical_number, probe_id) DO UPDATE SET \
             status = excluded.status, payload = excluded.payload, \
             confidence = excluded.confidence, fetched_at = excluded.fetched_at, \
             checksum = excluded.checksum",
        )
        .bind(number.e164())
        .bind(result.probe.as_str())
        .bind(result.status.as_str())
        .bind(payload)
        .bind(result.confidence)
        .bind(fetched_at)
        .bind(checksum)
        .execute(&self.pool)
        .await
        .with_context(|| format!("writing cache for {}/{}", number, result.probe))?;

        tracing::debug!("Cached {}/{} ({})", number, result.probe, result.status.as_str());
        Ok(())
    }

    async fn clear(&self) -> Result<u64, OsintError> {
        let done = sqlx::query("DELETE FROM probe_cache")
            .execute(&self.pool)
            .await
            .context("clearing probe cache")?;
        tracing::info!("Cleared {} cached probe results", done.rows_affected());
        Ok(done.rows_affected())
    }

    async fn entries_for(&self, e164: &str) -> Result<Vec<CacheEntry>, OsintError> {
        let rows = sqlx::query(
            "SELECT canonical_number, probe_id, status, payload, confidence, fetched_at, checksum \
             FROM probe_cache WHERE canonical_number = ? ORDER BY probe_id",
        )
        .bind(e164)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("listing cache entries for {}", e164))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(entry) = Self::decode_row(row)? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }
}
