//! Script to drop every cached probe result.

use phone_osint::data::cache::{ResultCache, SqliteResultCache};
use phone_osint::config::Config;
use phone_osint::data::db::Database;

/// Main entry point for the cleanup script.
///
/// Loads the configuration (for the database URL and TTLs), connects to the
/// result cache and deletes every entry.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    let db = Database::new(&config.database_url).await?;

    tracing::info!("Connected to result cache. Clearing all entries...");

    let cache = SqliteResultCache::new(db.pool, config.cache_ttl);
    let removed = cache.clear().await?;

    tracing::info!("Cleanup complete. Deleted {} cached probe results.", removed);

    Ok(())
}
