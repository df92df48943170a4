//! ipapi.co response types.

use serde::Deserialize;

use crate::host::Position;

use super::error::GeoError;

/// Subset of the ipapi.co `/{ip}/json` response.
///
/// Failed lookups still come back with status 200, carrying
/// `"error": true` and a `reason` instead of coordinates.
#[derive(Debug, Clone, Deserialize)]
pub struct IpApiResponse {
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country_name: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

impl IpApiResponse {
    /// The coordinates, if both are present.
    pub fn position(&self) -> Option<Position> {
        Some(Position::new(self.latitude?, self.longitude?))
    }
}

/// Parse a geolocation response body into a position.
pub fn parse_lookup(body: &str) -> Result<Position, GeoError> {
    let response: IpApiResponse = serde_json::from_str(body).map_err(|e| GeoError::Json {
        message: e.to_string(),
        body: Some(body.chars().take(500).collect()),
    })?;

    if response.error {
        return Err(GeoError::Lookup {
            reason: response
                .reason
                .unwrap_or_else(|| "unspecified error".to_string()),
        });
    }

    response.position().ok_or_else(|| GeoError::Json {
        message: "response has no latitude/longitude".to_string(),
        body: Some(body.chars().take(500).collect()),
    })
}
