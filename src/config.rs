//! Configuration parsed from environment variables.
//!
//! Server:
//! - `PORT`: listen port (default 3000)
//! - `DATABASE_URL`: Postgres store when set, in-memory store otherwise
//! - `DATABASE_MAX_CONNECTIONS`: pool size (default 5)
//!
//! Session (a board client):
//! - `NOTEBOARD_USER`: acting user id (required)
//! - `NOTEBOARD_SERVER_URL`: store server base URL (default `http://localhost:3000`)
//! - `WRITE_QUEUE_CAPACITY`: bounded outbound write queue (default 1024)

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use crate::persistence::DEFAULT_WRITE_QUEUE_CAPACITY;
use crate::store::CollectionPath;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_SERVER_URL: &str = "http://localhost:3000";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {var}")]
    Missing { var: &'static str },
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

impl crate::ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Missing { .. } => "E_CONFIG_MISSING",
            Self::Invalid { .. } => "E_CONFIG_INVALID",
        }
    }
}

/// Read `key` and parse it, falling back to `default` when the variable is
/// unset or does not parse.
pub fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

// =============================================================================
// SERVER
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
}

impl ServerConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            port: env_parse("PORT", DEFAULT_PORT),
            database_url: std::env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty()),
            database_max_connections: env_parse("DATABASE_MAX_CONNECTIONS", DEFAULT_DATABASE_MAX_CONNECTIONS).max(1),
        }
    }

    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

// =============================================================================
// SESSION
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub user_id: String,
    pub server_url: String,
    pub write_queue_capacity: usize,
}

impl SessionConfig {
    /// # Errors
    ///
    /// Returns `Missing` without `NOTEBOARD_USER` and `Invalid` for a bad
    /// user id or server URL.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::resolve(
            std::env::var("NOTEBOARD_USER").ok(),
            std::env::var("NOTEBOARD_SERVER_URL").ok(),
            env_parse("WRITE_QUEUE_CAPACITY", DEFAULT_WRITE_QUEUE_CAPACITY),
        )
    }

    /// Validate raw values as read from the environment.
    ///
    /// # Errors
    ///
    /// Same as [`Self::from_env`].
    pub fn resolve(
        user_id: Option<String>,
        server_url: Option<String>,
        write_queue_capacity: usize,
    ) -> Result<Self, ConfigError> {
        let user_id = user_id
            .map(|u| u.trim().to_owned())
            .filter(|u| !u.is_empty())
            .ok_or(ConfigError::Missing { var: "NOTEBOARD_USER" })?;
        CollectionPath::personal(&user_id)
            .map_err(|e| ConfigError::Invalid { var: "NOTEBOARD_USER", reason: e.to_string() })?;

        let server_url = server_url
            .map(|u| u.trim().trim_end_matches('/').to_owned())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_owned());
        if !(server_url.starts_with("http://") || server_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                var: "NOTEBOARD_SERVER_URL",
                reason: format!("expected an http(s) URL, got {server_url}"),
            });
        }

        Ok(Self { user_id, server_url, write_queue_capacity: write_queue_capacity.max(1) })
    }
}
