use std::sync::Arc;

mod app;
mod config;
mod db;
mod error;
mod state;
mod users;

use crate::{config::AppConfig, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = config::load_dotenv();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        "user_service=debug,axum=info,tower_http=info,sqlx=warn".to_string()
    });
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = Arc::new(AppConfig::from_env()?);
    tracing::info!(%env, "starting user-service");

    let db = db::connect(&config).await?;
    db::migrate(&db).await;

    let app = app::build_app(AppState::with_postgres(config.clone(), db.clone()));
    app::serve(app, &config).await?;

    db.close().await;
    tracing::info!("database pool closed");
    Ok(())
}
