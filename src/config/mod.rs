use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Longest span a `chrono::Duration` can hold, in whole seconds
const MAX_DURATION_SECS: u64 = i64::MAX as u64 / 1_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub request_timeout_secs: u64,
    pub max_request_size_bytes: usize,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    #[serde(skip_serializing)]
    pub database_url: Option<String>,
    pub max_connections: u32,
    /// Upper bound for a single store call
    pub op_timeout_ms: u64,
    /// Extra attempts for reads that timed out; writes are never retried
    pub read_retries: u32,
    /// Compare-and-swap attempts when appending to a view's component list
    pub cas_retries: u32,
    pub sweep_grace_secs: u64,
    /// 0 disables the background recovery sweep
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub clock_skew_secs: u64,
    pub view_create_roles: Vec<String>,
}

impl StoreConfig {
    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }

    /// Minimum age of a pending component before the sweep may settle it
    pub fn sweep_grace(&self) -> chrono::Duration {
        grace_from_secs(self.sweep_grace_secs)
    }
}

pub fn grace_from_secs(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(secs.min(MAX_DURATION_SECS) as i64)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("sweep grace of {grace_secs}s must exceed {minimum_secs}s (request timeout plus store call timeout)")]
    SweepGraceTooShort { grace_secs: u64, minimum_secs: u64 },
}

impl AppConfig {
    /// Longest an add can still be running: the request is cut off after its
    /// timeout, and a store call it already issued after the op timeout.
    pub fn max_add_duration_secs(&self) -> u64 {
        self.server
            .request_timeout_secs
            .saturating_add(self.store.op_timeout_ms.div_ceil(1_000))
    }

    /// A sweep with a shorter grace could roll back an add that is still running
    pub fn check_sweep_grace(&self, grace_secs: u64) -> Result<(), ConfigError> {
        let minimum_secs = self.max_add_duration_secs();
        if grace_secs <= minimum_secs {
            return Err(ConfigError::SweepGraceTooShort {
                grace_secs,
                minimum_secs,
            });
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.check_sweep_grace(self.store.sweep_grace_secs)
    }

    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Some(port) = env::var("TRACE_API_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|v| v.parse().ok())
        {
            self.server.port = port;
        }
        if let Ok(v) = env::var("API_REQUEST_TIMEOUT_SECS") {
            self.server.request_timeout_secs = v.parse().unwrap_or(self.server.request_timeout_secs);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.server.max_request_size_bytes = v.parse().unwrap_or(self.server.max_request_size_bytes);
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.server.enable_cors = v.parse().unwrap_or(self.server.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.server.cors_origins = split_list(&v);
        }

        // Store overrides
        match env::var("STORE_BACKEND").as_deref() {
            Ok("postgres") | Ok("pg") => self.store.backend = StoreBackend::Postgres,
            Ok("memory") => self.store.backend = StoreBackend::Memory,
            _ => {}
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.store.database_url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.store.max_connections = v.parse().unwrap_or(self.store.max_connections);
        }
        if let Ok(v) = env::var("STORE_OP_TIMEOUT_MS") {
            self.store.op_timeout_ms = v.parse().unwrap_or(self.store.op_timeout_ms);
        }
        if let Ok(v) = env::var("STORE_READ_RETRIES") {
            self.store.read_retries = v.parse().unwrap_or(self.store.read_retries);
        }
        if let Ok(v) = env::var("CAS_RETRIES") {
            self.store.cas_retries = v.parse().unwrap_or(self.store.cas_retries);
        }
        if let Ok(v) = env::var("SWEEP_GRACE_SECS") {
            self.store.sweep_grace_secs = v.parse().unwrap_or(self.store.sweep_grace_secs);
        }
        if let Ok(v) = env::var("SWEEP_INTERVAL_SECS") {
            self.store.sweep_interval_secs = v.parse().unwrap_or(self.store.sweep_interval_secs);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("JWT_CLOCK_SKEW_SECS") {
            self.security.clock_skew_secs = v.parse().unwrap_or(self.security.clock_skew_secs);
        }
        if let Ok(v) = env::var("VIEW_CREATE_ROLES") {
            self.security.view_create_roles = split_list(&v);
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 8080,
                request_timeout_secs: 30,
                max_request_size_bytes: 1024 * 1024, // 1MB
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
            },
            store: StoreConfig {
                backend: StoreBackend::Memory,
                database_url: None,
                max_connections: 10,
                op_timeout_ms: 5_000,
                read_retries: 1,
                cas_retries: 5,
                sweep_grace_secs: 60,
                sweep_interval_secs: 60,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24 * 7, // 1 week
                clock_skew_secs: 0,
                view_create_roles: vec!["owner".to_string(), "editor".to_string()],
            },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                port: 8080,
                request_timeout_secs: 15,
                max_request_size_bytes: 512 * 1024,
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
            },
            store: StoreConfig {
                backend: StoreBackend::Postgres,
                database_url: None,
                max_connections: 20,
                op_timeout_ms: 3_000,
                read_retries: 1,
                cas_retries: 5,
                sweep_grace_secs: 60,
                sweep_interval_secs: 120,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                clock_skew_secs: 0,
                view_create_roles: vec!["owner".to_string(), "editor".to_string()],
            },
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                port: 8080,
                request_timeout_secs: 10,
                max_request_size_bytes: 256 * 1024,
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
            },
            store: StoreConfig {
                backend: StoreBackend::Postgres,
                database_url: None,
                max_connections: 50,
                op_timeout_ms: 2_000,
                read_retries: 2,
                cas_retries: 8,
                sweep_grace_secs: 120,
                sweep_interval_secs: 300,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 4,
                clock_skew_secs: 0,
                view_create_roles: vec!["owner".to_string(), "editor".to_string()],
            },
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.security.clock_skew_secs, 0);
        assert_eq!(config.security.view_create_roles, vec!["owner", "editor"]);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert_eq!(config.store.backend, StoreBackend::Postgres);
        assert!(config.store.op_timeout_ms <= 5_000);
        assert!(config.store.sweep_grace_secs > 0);
    }

    #[test]
    fn presets_leave_room_for_adds_in_flight() {
        for config in [AppConfig::development(), AppConfig::staging(), AppConfig::production()] {
            assert_eq!(config.validate(), Ok(()), "{:?}", config.environment);
        }
    }

    #[test]
    fn sweep_grace_must_outlast_a_request() {
        let mut config = AppConfig::development();
        config.server.request_timeout_secs = 30;
        config.store.op_timeout_ms = 4_500;
        assert_eq!(config.max_add_duration_secs(), 35);

        config.store.sweep_grace_secs = 30;
        assert_eq!(
            config.validate(),
            Err(ConfigError::SweepGraceTooShort {
                grace_secs: 30,
                minimum_secs: 35
            })
        );
        assert!(config.check_sweep_grace(0).is_err());
        assert!(config.check_sweep_grace(36).is_ok());
    }

    #[test]
    fn huge_grace_saturates() {
        assert!(grace_from_secs(u64::MAX) > chrono::Duration::days(365 * 1_000));
    }

    #[test]
    fn split_list_drops_blanks() {
        assert_eq!(split_list(" owner, ,editor "), vec!["owner", "editor"]);
    }
}
