use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::users::{PgUserStore, UserStore};

/// Built once at startup and cloned into every handler; read-only afterwards.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
}

impl AppState {
    pub fn from_parts(config: Arc<AppConfig>, users: Arc<dyn UserStore>) -> Self {
        Self { config, users }
    }

    pub fn with_postgres(config: Arc<AppConfig>, db: PgPool) -> Self {
        Self::from_parts(config, Arc::new(PgUserStore::new(db)))
    }

    #[cfg(test)]
    pub fn with_store(users: Arc<dyn UserStore>) -> Self {
        let config = Arc::new(AppConfig {
            env: "test".into(),
            database: sqlx::postgres::PgConnectOptions::new()
                .host("localhost")
                .database("postgres"),
            db_max_connections: 1,
            host: "127.0.0.1".into(),
            port: 0,
            shutdown_grace_secs: 1,
            list: crate::config::ListConfig::default(),
        });
        Self::from_parts(config, users)
    }
}
