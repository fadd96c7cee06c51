//! Runtime configuration, read from the environment (after `.env` is loaded).

use std::env;
use std::net::SocketAddr;

use crate::error::{FinanceError, Result};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://./shadoron.db?mode=rwc";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_SYNC_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_ORACLE_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    /// Remote instance that queued operations are replayed against.
    pub remote_url: Option<String>,
    pub sync_max_attempts: u32,
    /// `None` when no endpoint/key pair is configured.
    pub oracle: Option<OracleConfig>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so tests don't touch
    /// the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let bind_raw = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .parse::<SocketAddr>()
            .map_err(|e| FinanceError::Config(format!("BIND_ADDR {bind_raw:?}: {e}")))?;

        let sync_max_attempts = match get("SYNC_MAX_ATTEMPTS") {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| FinanceError::Config(format!("SYNC_MAX_ATTEMPTS must be a positive integer, got {raw:?}")))?,
            None => DEFAULT_SYNC_MAX_ATTEMPTS,
        };

        let oracle = match (get("ORACLE_ENDPOINT"), get("ORACLE_API_KEY")) {
            (Some(endpoint), Some(api_key)) => Some(OracleConfig {
                endpoint: endpoint.trim_end_matches('/').to_string(),
                model: get("ORACLE_MODEL").unwrap_or_else(|| DEFAULT_ORACLE_MODEL.to_string()),
                api_key,
            }),
            _ => None,
        };

        Ok(Self {
            database_url,
            bind_addr,
            remote_url: get("REMOTE_URL").map(|u| u.trim_end_matches('/').to_string()),
            sync_max_attempts,
            oracle,
        })
    }
}
