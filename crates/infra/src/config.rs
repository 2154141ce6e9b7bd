//! Configuration loading and representation.
//!
//! Everything is read from `TRUSTSCORE_*` environment variables with
//! defaults. [`AppConfig::from_lookup`] takes any key lookup, so tests do not
//! have to touch the process environment.

use std::path::Path;
use std::time::Duration;

use trustscore_core::WorkerId;

pub const DATABASE_URL: &str = "TRUSTSCORE_DATABASE_URL";
pub const MAX_CONNECTIONS: &str = "TRUSTSCORE_MAX_CONNECTIONS";
pub const CLAIM_TIMEOUT_MS: &str = "TRUSTSCORE_CLAIM_TIMEOUT_MS";
pub const WORKER_ID: &str = "TRUSTSCORE_WORKER_ID";
pub const WORKERS: &str = "TRUSTSCORE_WORKERS";
pub const POLL_INTERVAL_MS: &str = "TRUSTSCORE_POLL_INTERVAL_MS";
pub const STALE_CLAIM_SECS: &str = "TRUSTSCORE_STALE_CLAIM_SECS";

pub const DEFAULT_DATABASE_URL: &str = "sqlite://trust_engine.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 4;
pub const DEFAULT_CLAIM_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Invalid configuration value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {key}={value:?}: {reason}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

/// Storage connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// Upper bound on waiting for the write lock (busy timeout).
    pub claim_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            claim_timeout: DEFAULT_CLAIM_TIMEOUT,
        }
    }
}

impl StoreConfig {
    /// Defaults pointed at a database file.
    pub fn for_path(path: impl AsRef<Path>) -> Self {
        Self {
            database_url: format!("sqlite://{}", path.as_ref().display()),
            ..Self::default()
        }
    }
}

/// Worker process settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Base id; each thread appends `-<n>`.
    pub worker_id: WorkerId,
    pub workers: usize,
    pub poll_interval: Duration,
    /// Claims older than this are expired on idle polls. `None` disables the sweep.
    pub stale_claim_timeout: Option<Duration>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: WorkerId::ephemeral(),
            workers: 1,
            poll_interval: DEFAULT_POLL_INTERVAL,
            stale_claim_timeout: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub worker: WorkerConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let store = StoreConfig {
            database_url: get(DATABASE_URL).unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            max_connections: parse_positive(MAX_CONNECTIONS, get(MAX_CONNECTIONS))?
                .unwrap_or(DEFAULT_MAX_CONNECTIONS),
            claim_timeout: parse_positive(CLAIM_TIMEOUT_MS, get(CLAIM_TIMEOUT_MS))?
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_CLAIM_TIMEOUT),
        };

        let worker_id = match get(WORKER_ID) {
            Some(raw) => WorkerId::new(raw.trim()).map_err(|e| ConfigError {
                key: WORKER_ID,
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => default_worker_id(&lookup),
        };

        let worker = WorkerConfig {
            worker_id,
            workers: parse_positive(WORKERS, get(WORKERS))?.unwrap_or(1),
            poll_interval: parse_positive(POLL_INTERVAL_MS, get(POLL_INTERVAL_MS))?
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_POLL_INTERVAL),
            stale_claim_timeout: parse_positive(STALE_CLAIM_SECS, get(STALE_CLAIM_SECS))?
                .map(Duration::from_secs),
        };

        Ok(Self { store, worker })
    }
}

/// `<hostname>-<pid>`, falling back to a random id when no hostname is known.
fn default_worker_id<F>(lookup: &F) -> WorkerId
where
    F: Fn(&str) -> Option<String>,
{
    lookup("HOSTNAME")
        .or_else(|| lookup("COMPUTERNAME"))
        .and_then(|host| WorkerId::new(format!("{}-{}", host.trim(), std::process::id())).ok())
        .unwrap_or_else(WorkerId::ephemeral)
}

fn parse_positive<T>(key: &'static str, raw: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    let Some(raw) = raw else {
        return Ok(None);
    };

    let value = raw.trim().parse::<T>().map_err(|e| ConfigError {
        key,
        value: raw.clone(),
        reason: e.to_string(),
    })?;

    if value <= T::default() {
        return Err(ConfigError {
            key,
            value: raw,
            reason: "must be greater than zero".to_string(),
        });
    }

    Ok(Some(value))
}
