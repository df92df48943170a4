//! Runner configuration.
//!
//! The runner reads a handful of environment variables. Missing variables
//! use the defaults below; invalid ones are reported and also fall back.

use std::net::SocketAddr;
use std::path::PathBuf;

use tracing::warn;

use crate::geo::GeoClientConfig;

/// Variable naming the settings file.
pub const STORAGE_PATH_VAR: &str = "GEOLOCATION_STORAGE_PATH";

/// Variable naming the HTTP listen address.
pub const LISTEN_ADDR_VAR: &str = "GEOLOCATION_LISTEN_ADDR";

/// Variable holding the outbound request timeout in seconds.
pub const HTTP_TIMEOUT_VAR: &str = "GEOLOCATION_HTTP_TIMEOUT_SECS";

const DEFAULT_STORAGE_PATH: &str = "geolocation.json";

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Configuration for the device runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// File the device settings are persisted to
    pub storage_path: PathBuf,
    /// Address the settings/position HTTP surface listens on
    pub listen_addr: SocketAddr,
    /// Timeout for requests to the geolocation APIs
    pub http_timeout_secs: u64,
}

impl RunnerConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup` (for testing).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup(STORAGE_PATH_VAR).filter(|p| !p.is_empty()) {
            config.storage_path = PathBuf::from(path);
        }

        if let Some(raw) = lookup(LISTEN_ADDR_VAR) {
            match raw.parse() {
                Ok(addr) => config.listen_addr = addr,
                Err(e) => warn!(var = LISTEN_ADDR_VAR, value = %raw, error = %e, "invalid listen address, using default"),
            }
        }

        if let Some(raw) = lookup(HTTP_TIMEOUT_VAR) {
            match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => config.http_timeout_secs = secs,
                _ => warn!(var = HTTP_TIMEOUT_VAR, value = %raw, "invalid timeout, using default"),
            }
        }

        config
    }

    /// Set the settings file path.
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = path.into();
        self
    }

    /// Set the listen address.
    pub fn with_listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = addr;
        self
    }

    /// Geolocation client configuration for this runner.
    pub fn geo_client_config(&self) -> GeoClientConfig {
        GeoClientConfig::new().with_timeout(self.http_timeout_secs)
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}
