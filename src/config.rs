use std::net::SocketAddr;
use std::str::FromStr;

use anyhow::Context;
use serde::Deserialize;
use sqlx::postgres::{PgConnectOptions, PgSslMode};

const DEFAULT_ENV: &str = "prod";

/// Bounds applied to `GET /user` page sizes.
#[derive(Debug, Clone, Deserialize)]
pub struct ListConfig {
    pub default_limit: i64,
    pub max_limit: i64,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 100,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub database: PgConnectOptions,
    pub db_max_connections: u32,
    pub host: String,
    pub port: u16,
    pub shutdown_grace_secs: u64,
    pub list: ListConfig,
}

/// Loads `.env` and then `.env.{APP_ENV}`. Variables already present in the
/// process environment are never overwritten.
pub fn load_dotenv() -> String {
    dotenvy::dotenv().ok();
    let env = app_env(|key| std::env::var(key).ok());
    dotenvy::from_filename(format!(".env.{env}")).ok();
    env
}

fn app_env(get: impl Fn(&str) -> Option<String>) -> String {
    get("APP_ENV")
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_ENV.into())
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database = match get("DATABASE_URL").filter(|v| !v.is_empty()) {
            Some(url) => PgConnectOptions::from_str(&url)
                .context("DATABASE_URL is not a valid Postgres URL")?,
            None => database_from_parts(&get)?,
        };

        let port = match get("APP_PORT").or_else(|| get("SERVER_PORT")) {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("APP_PORT must be a port number, got {raw:?}"))?,
            None => 8080,
        };

        let defaults = ListConfig::default();
        let list = ListConfig {
            default_limit: parse_or(&get, "LIST_DEFAULT_LIMIT", defaults.default_limit)?,
            max_limit: parse_or(&get, "LIST_MAX_LIMIT", defaults.max_limit)?,
        };
        anyhow::ensure!(
            list.default_limit > 0 && list.max_limit >= list.default_limit,
            "LIST_DEFAULT_LIMIT must be positive and not above LIST_MAX_LIMIT"
        );

        Ok(Self {
            env: app_env(&get),
            database,
            db_max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", 10)?,
            host: get("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            shutdown_grace_secs: parse_or(&get, "SHUTDOWN_GRACE_SECS", 5)?,
            list,
        })
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }
}

/// Each part is handed to sqlx as-is, so credentials need no URL escaping.
fn database_from_parts(
    get: &impl Fn(&str) -> Option<String>,
) -> anyhow::Result<PgConnectOptions> {
    let required = |key: &str| get(key).with_context(|| format!("{key} is not set and DATABASE_URL is missing"));
    let host = required("DB_HOST")?;
    let user = required("DB_USER")?;
    let name = required("DB_NAME")?;
    let port = parse_or(get, "DB_PORT", 5432u16)?;
    let ssl_mode = get("DB_SSL_MODE").unwrap_or_else(|| "disable".into());
    let ssl_mode = PgSslMode::from_str(&ssl_mode)
        .with_context(|| format!("DB_SSL_MODE has an invalid value {ssl_mode:?}"))?;

    let mut options = PgConnectOptions::new()
        .host(&host)
        .port(port)
        .username(&user)
        .database(&name)
        .ssl_mode(ssl_mode);
    if let Some(password) = get("DB_PASSWORD").filter(|v| !v.is_empty()) {
        options = options.password(&password);
    }
    Ok(options)
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key).filter(|v| !v.is_empty()) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value {raw:?}")),
        None => Ok(default),
    }
}
