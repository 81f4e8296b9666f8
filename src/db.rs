use crate::errors::{OsintError, ResultExt};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS probe_cache (
    canonical_number TEXT NOT NULL,
    probe_id         TEXT NOT NULL,
    status           TEXT NOT NULL,
    payload          TEXT NOT NULL,
    confidence       REAL NOT NULL,
    fetched_at       TEXT NOT NULL,
    checksum         TEXT NOT NULL,
    PRIMARY KEY (canonical_number, probe_id)
)
"#;

pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, OsintError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .context("parsing OSINT_DB_URL")?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        // Every connection to `sqlite::memory:` is its own database.
        let in_memory = database_url.contains(":memory:");

        let mut pool_options = SqlitePoolOptions::new().max_connections(if in_memory { 1 } else { 10 });
        if in_memory {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }
        let pool = pool_options
            .connect_with(options)
            .await
            .context("opening result cache database")?;

        sqlx::query(SCHEMA)
            .execute(&pool)
            .await
            .context("creating probe_cache table")?;

        Ok(Self { pool })
    }
}
