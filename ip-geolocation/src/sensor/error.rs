//! Refresh cycle error types.

use crate::geo::GeoError;
use crate::host::StorageError;

/// Errors that end a refresh cycle early.
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    /// IP detection or geolocation lookup failed
    #[error(transparent)]
    Geo(#[from] GeoError),

    /// Writing a detected value to storage failed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Neither an override nor a detected address is available
    #[error("no IP address to geolocate")]
    NoAddress,
}
