//! HTTP client for ipify and ipapi.co.

use async_trait::async_trait;
use reqwest::{StatusCode, Url};

use crate::host::Position;

use super::api::GeoApi;
use super::error::GeoError;
use super::types::parse_lookup;

/// Default IP-echo endpoint. Answers with the caller's address as plain text.
const DEFAULT_IP_ECHO_URL: &str = "https://api.ipify.org";

/// Default geolocation base URL. Lookups go to `{base}/{ip}/json`.
const DEFAULT_LOOKUP_BASE_URL: &str = "https://ipapi.co";

/// ipapi.co rejects requests without a user agent.
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Configuration for the geolocation client.
#[derive(Debug, Clone)]
pub struct GeoClientConfig {
    /// URL that echoes the caller's public IP
    pub ip_echo_url: String,
    /// Base URL of the geolocation API
    pub lookup_base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl GeoClientConfig {
    /// Create a config pointing at the public ipify and ipapi.co endpoints.
    pub fn new() -> Self {
        Self {
            ip_echo_url: DEFAULT_IP_ECHO_URL.to_string(),
            lookup_base_url: DEFAULT_LOOKUP_BASE_URL.to_string(),
            timeout_secs: 30,
        }
    }

    /// Set a custom IP-echo URL (for testing).
    pub fn with_ip_echo_url(mut self, url: impl Into<String>) -> Self {
        self.ip_echo_url = url.into();
        self
    }

    /// Set a custom geolocation base URL (for testing).
    pub fn with_lookup_base_url(mut self, url: impl Into<String>) -> Self {
        self.lookup_base_url = url.into();
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

impl Default for GeoClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Client for the IP-echo and geolocation APIs.
#[derive(Debug, Clone)]
pub struct GeoClient {
    http: reqwest::Client,
    ip_echo_url: String,
    lookup_base_url: Url,
}

impl GeoClient {
    /// Create a new geolocation client.
    ///
    /// Fails if the lookup base URL can't have path segments appended.
    pub fn new(config: GeoClientConfig) -> Result<Self, GeoError> {
        let lookup_base_url = Url::parse(&config.lookup_base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| GeoError::InvalidUrl {
                url: config.lookup_base_url.clone(),
            })?;

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            ip_echo_url: config.ip_echo_url,
            lookup_base_url,
        })
    }

    /// URL queried to geolocate `ip`: `{base}/{ip}/json`.
    ///
    /// `ip` is a single percent-encoded path segment, whatever it contains.
    fn lookup_url(&self, ip: &str) -> Url {
        let mut url = self.lookup_base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(ip).push("json");
        }
        url
    }
}

/// Turn a non-2xx response into the matching error.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, GeoError> {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(GeoError::RateLimited);
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(GeoError::Api {
            status: status.as_u16(),
            message: body,
        });
    }

    Ok(response)
}

#[async_trait]
impl GeoApi for GeoClient {
    async fn public_ip(&self) -> Result<String, GeoError> {
        let response = self.http.get(&self.ip_echo_url).send().await?;
        let body = check_status(response).await?.text().await?;

        Ok(body.trim().to_string())
    }

    async fn lookup(&self, ip: &str) -> Result<Position, GeoError> {
        let response = self.http.get(self.lookup_url(ip)).send().await?;
        let body = check_status(response).await?.text().await?;

        parse_lookup(&body)
    }
}
