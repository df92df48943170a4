//! Mock geolocation API for testing without network access.
//!
//! Serves a scripted public IP and a table of known positions, and records
//! every request so tests can assert on what the refresher asked for.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::host::Position;

use super::api::GeoApi;
use super::error::GeoError;

#[derive(Debug, Default)]
struct MockState {
    /// Address returned by `public_ip`, or the status it fails with.
    public_ip: Option<Result<String, u16>>,
    /// Known positions, keyed by IP.
    positions: HashMap<String, Position>,
    /// Status every lookup fails with, when set.
    lookup_failure: Option<u16>,
    /// Simulated latency of each lookup.
    lookup_delay: Duration,
    public_ip_calls: usize,
    lookup_requests: Vec<String>,
}

/// Mock API that serves canned answers.
///
/// Clones share state, so a test can keep one handle for scripting and
/// assertions while the refresher owns another.
#[derive(Debug, Clone, Default)]
pub struct MockGeoApi {
    state: Arc<Mutex<MockState>>,
}

impl MockGeoApi {
    /// Create a mock with no public IP and no known positions.
    ///
    /// Until scripted, `public_ip` fails with status 503 and every lookup
    /// with status 404.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Answer `public_ip` with `ip`.
    pub fn with_public_ip(self, ip: impl Into<String>) -> Self {
        self.state().public_ip = Some(Ok(ip.into()));
        self
    }

    /// Make `public_ip` fail with HTTP `status`.
    pub fn fail_public_ip(&self, status: u16) {
        self.state().public_ip = Some(Err(status));
    }

    /// Make lookups of `ip` return `position`.
    pub fn with_position(self, ip: impl Into<String>, position: Position) -> Self {
        self.state().positions.insert(ip.into(), position);
        self
    }

    /// Replace the public IP answer after construction.
    pub fn set_public_ip(&self, ip: impl Into<String>) {
        self.state().public_ip = Some(Ok(ip.into()));
    }

    /// Replace the position served for `ip` after construction.
    pub fn set_position(&self, ip: impl Into<String>, position: Position) {
        self.state().positions.insert(ip.into(), position);
    }

    /// Make every lookup fail with HTTP `status`, or clear the failure.
    pub fn fail_lookups(&self, status: Option<u16>) {
        self.state().lookup_failure = status;
    }

    /// Delay every lookup by `delay` before answering.
    pub fn with_lookup_delay(self, delay: Duration) -> Self {
        self.state().lookup_delay = delay;
        self
    }

    /// Number of `public_ip` calls so far.
    pub fn public_ip_calls(&self) -> usize {
        self.state().public_ip_calls
    }

    /// Every address looked up so far, in order.
    pub fn lookup_requests(&self) -> Vec<String> {
        self.state().lookup_requests.clone()
    }
}

#[async_trait]
impl GeoApi for MockGeoApi {
    async fn public_ip(&self) -> Result<String, GeoError> {
        let mut state = self.state();
        state.public_ip_calls += 1;

        match &state.public_ip {
            Some(Ok(ip)) => Ok(ip.clone()),
            Some(Err(status)) => Err(GeoError::Api {
                status: *status,
                message: "mock public IP failure".to_string(),
            }),
            None => Err(GeoError::Api {
                status: 503,
                message: "no public IP scripted".to_string(),
            }),
        }
    }

    async fn lookup(&self, ip: &str) -> Result<Position, GeoError> {
        let delay = {
            let mut state = self.state();
            state.lookup_requests.push(ip.to_string());
            state.lookup_delay
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let state = self.state();
        if let Some(status) = state.lookup_failure {
            return Err(GeoError::Api {
                status,
                message: "mock lookup failure".to_string(),
            });
        }

        state
            .positions
            .get(ip)
            .copied()
            .ok_or_else(|| GeoError::Api {
                status: 404,
                message: format!("No mock position for {ip}"),
            })
    }
}
