//! Geolocation API error types.

/// Errors that can occur when calling the IP-echo or geolocation APIs.
#[derive(Debug, thiserror::Error)]
pub enum GeoError {
    /// HTTP request failed (network error, timeout, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error status
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Rate limited by the API
    #[error("rate limited by geolocation API")]
    RateLimited,

    /// Response body was not the expected JSON
    #[error("JSON parse error: {message}")]
    Json {
        message: String,
        body: Option<String>,
    },

    /// Configured base URL can't be used to build lookup URLs
    #[error("invalid lookup base URL: {url}")]
    InvalidUrl { url: String },

    /// The API answered but refused to geolocate the address
    #[error("lookup failed: {reason}")]
    Lookup { reason: String },
}
