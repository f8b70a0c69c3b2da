use std::{str::FromStr, time::Duration};

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub port: u16,
    pub db_max_connections: u32,
    pub cache_max_capacity: u64,
    pub cache_ttl: Duration,
    /// Replaces the `http://<host>` origin used in cache keys.
    pub public_origin: Option<String>,
    pub log_level: log::LevelFilter,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Ok(Self {
            database_url: var("DATABASE_URL"),
            port: parse_or(var("PORT"), "PORT", 8000)?,
            db_max_connections: parse_or(var("DB_MAX_CONNECTIONS"), "DB_MAX_CONNECTIONS", 10)?,
            cache_max_capacity: parse_or(var("CACHE_MAX_CAPACITY"), "CACHE_MAX_CAPACITY", 10_000)?,
            cache_ttl: Duration::from_secs(parse_or(var("CACHE_TTL_SECS"), "CACHE_TTL_SECS", 3600)?),
            public_origin: var("PUBLIC_ORIGIN").map(|o| o.trim_end_matches('/').to_string()),
            log_level: parse_or(var("LOG_LEVEL"), "LOG_LEVEL", log::LevelFilter::Info)?,
        })
    }
}

fn parse_or<T>(value: Option<String>, name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(v) => v
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {:?}", name, v)),
        None => Ok(default),
    }
}
