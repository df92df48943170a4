//! The geolocation API seam.

use async_trait::async_trait;

use crate::host::Position;

use super::error::GeoError;

/// Resolves the public address of this host and geolocates addresses.
#[async_trait]
pub trait GeoApi: Send + Sync {
    /// Fetch this host's public IP address.
    async fn public_ip(&self) -> Result<String, GeoError>;

    /// Geolocate `ip`.
    async fn lookup(&self, ip: &str) -> Result<Position, GeoError>;
}
