//! Board configuration loaded from environment variables.
//!
//! Every knob has a typed default; unparseable values fall back to the
//! default rather than failing startup. Only combinations that would break
//! liveness tracking are rejected.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_DATA_DIR: &str = ".stickyboard";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_PRESENCE_HEARTBEAT_SECS: u64 = 15;
const DEFAULT_PRESENCE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CURSOR_THROTTLE_MS: u64 = 100;
const DEFAULT_CURSOR_TIMEOUT_SECS: u64 = 10;
const DEFAULT_LOCK_RELEASE_GRACE_MS: u64 = 150;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} must be greater than zero")]
    Zero { key: &'static str },
    #[error("PRESENCE_HEARTBEAT_SECS ({heartbeat}s) must be shorter than PRESENCE_TIMEOUT_SECS ({timeout}s)")]
    HeartbeatTooSlow { heartbeat: u64, timeout: u64 },
}

impl crate::error::ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Zero { .. } => "E_CONFIG_ZERO",
            Self::HeartbeatTooSlow { .. } => "E_CONFIG_HEARTBEAT",
        }
    }
}

/// Liveness and lock timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Interval between presence heartbeats.
    pub heartbeat: Duration,
    /// A presence record older than this is offline.
    pub presence_timeout: Duration,
    /// Minimum spacing between cursor publications.
    pub cursor_throttle: Duration,
    /// A cursor record older than this is hidden.
    pub cursor_timeout: Duration,
    /// Delay before a blurred note's lock is released.
    pub lock_grace: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            heartbeat: Duration::from_secs(DEFAULT_PRESENCE_HEARTBEAT_SECS),
            presence_timeout: Duration::from_secs(DEFAULT_PRESENCE_TIMEOUT_SECS),
            cursor_throttle: Duration::from_millis(DEFAULT_CURSOR_THROTTLE_MS),
            cursor_timeout: Duration::from_secs(DEFAULT_CURSOR_TIMEOUT_SECS),
            lock_grace: Duration::from_millis(DEFAULT_LOCK_RELEASE_GRACE_MS),
        }
    }
}

impl Timing {
    /// Presence timeout in milliseconds, for comparing against stored timestamps.
    #[must_use]
    pub fn presence_timeout_ms(&self) -> i64 {
        duration_ms(self.presence_timeout)
    }

    #[must_use]
    pub fn cursor_timeout_ms(&self) -> i64 {
        duration_ms(self.cursor_timeout)
    }

    #[must_use]
    pub fn cursor_throttle_ms(&self) -> i64 {
        duration_ms(self.cursor_throttle)
    }
}

fn duration_ms(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

/// Everything a board session needs to start.
#[derive(Debug, Clone)]
pub struct BoardConfig {
    /// Remote backend location. `None` selects the local backend outright.
    pub database_url: Option<String>,
    /// Directory for local storage records.
    pub data_dir: PathBuf,
    /// Display name to use when creating or renaming the local identity.
    pub username: Option<String>,
    pub db_max_connections: u32,
    pub timing: Timing,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            username: None,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            timing: Timing::default(),
        }
    }
}

impl BoardConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a timing knob is zero or the heartbeat interval is
    /// not shorter than the presence timeout.
    pub fn from_env() -> Result<Self, ConfigError> {
        let secs = |key: &str, default: u64| Duration::from_secs(env_parse(key, default));
        let millis = |key: &str, default: u64| Duration::from_millis(env_parse(key, default));

        let config = Self {
            database_url: env_string("STICKYBOARD_DATABASE_URL"),
            data_dir: env_string("STICKYBOARD_DATA_DIR").map_or_else(|| PathBuf::from(DEFAULT_DATA_DIR), PathBuf::from),
            username: env_string("STICKYBOARD_USERNAME"),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            timing: Timing {
                heartbeat: secs("PRESENCE_HEARTBEAT_SECS", DEFAULT_PRESENCE_HEARTBEAT_SECS),
                presence_timeout: secs("PRESENCE_TIMEOUT_SECS", DEFAULT_PRESENCE_TIMEOUT_SECS),
                cursor_throttle: millis("CURSOR_THROTTLE_MS", DEFAULT_CURSOR_THROTTLE_MS),
                cursor_timeout: secs("CURSOR_TIMEOUT_SECS", DEFAULT_CURSOR_TIMEOUT_SECS),
                lock_grace: millis("LOCK_RELEASE_GRACE_MS", DEFAULT_LOCK_RELEASE_GRACE_MS),
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// See [`BoardConfig::from_env`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.timing;
        for (key, value) in [
            ("PRESENCE_HEARTBEAT_SECS", t.heartbeat),
            ("PRESENCE_TIMEOUT_SECS", t.presence_timeout),
            ("CURSOR_TIMEOUT_SECS", t.cursor_timeout),
        ] {
            if value.is_zero() {
                return Err(ConfigError::Zero { key });
            }
        }
        if self.db_max_connections == 0 {
            return Err(ConfigError::Zero { key: "DB_MAX_CONNECTIONS" });
        }
        if t.heartbeat >= t.presence_timeout {
            return Err(ConfigError::HeartbeatTooSlow {
                heartbeat: t.heartbeat.as_secs(),
                timeout: t.presence_timeout.as_secs(),
            });
        }
        Ok(())
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// A non-empty, trimmed environment string.
fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
