use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::config::AppConfig;

pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect_with(config.database.clone())
        .await
        .context("connect to database")?;
    Ok(pool)
}

/// Applies `./migrations`. A failure is logged and startup continues so the
/// service can come up against a schema managed elsewhere.
pub async fn migrate(pool: &PgPool) {
    if let Err(e) = sqlx::migrate!("./migrations").run(pool).await {
        tracing::warn!(error = %e, "migrations failed; continuing");
    }
}
