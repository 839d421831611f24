use crate::core::config::DatabaseConfig;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

/// Open the catalog connection pool
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
        .connect(&config.url)
        .await
        .inspect_err(|e| tracing::error!("Failed to connect to catalog database: {}", e))?;

    tracing::info!(
        "Catalog database connected: {} (max_connections={})",
        redact_url(&config.url),
        config.max_connections
    );

    Ok(pool)
}

/// Apply pending schema migrations from `./migrations`
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))
}

/// Strip credentials from a connection URL before logging it
fn redact_url(url: &str) -> &str {
    url.split('@').next_back().unwrap_or("***")
}
