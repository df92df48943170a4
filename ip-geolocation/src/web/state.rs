//! Application state for the web layer.

use std::sync::Arc;

use crate::sensor::GeolocationRefresher;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// The hosted geolocation device
    pub device: Arc<GeolocationRefresher>,
}

impl AppState {
    /// Create a new app state.
    pub fn new(device: GeolocationRefresher) -> Self {
        Self {
            device: Arc::new(device),
        }
    }
}
