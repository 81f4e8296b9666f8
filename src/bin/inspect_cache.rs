//! Utility to print the cached probe results for one number.

use chrono::Utc;
use phone_osint::data::cache::{ResultCache, SqliteResultCache};
use phone_osint::config::Config;
use phone_osint::data::db::Database;
use phone_osint::core::normalizer::NumberNormalizer;

/// Main entry point for the cache inspection utility.
///
/// Usage: `inspect_cache <number> [country]`. The number is normalized with the
/// configured validation mode before lookup.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let raw = args
        .next()
        .ok_or_else(|| anyhow::anyhow!("usage: inspect_cache <number> [country]"))?;
    let country = args.next();

    let config = Config::from_env()?;
    let number = NumberNormalizer::new(config.validation_mode).normalize(&raw, country.as_deref())?;
    let db = Database::new(&config.database_url).await?;
    let cache = SqliteResultCache::new(db.pool, config.cache_ttl);

    let entries = cache.entries_for(number.e164()).await?;
    println!("{} ({}): {} cached result(s)", number, number.international(), entries.len());

    let now = Utc::now();
    for entry in &entries {
        let ttl = cache.ttl().for_probe(entry.result.probe);
        println!(
            "- {}: {} (confidence {:.2}, age {}s, {})",
            entry.result.probe,
            entry.result.status.as_str(),
            entry.result.confidence,
            entry.age(now).as_secs(),
            if entry.is_fresh(ttl, now) { "fresh" } else { "stale" }
        );
        println!("  {}", entry.result.payload);
    }

    Ok(())
}
