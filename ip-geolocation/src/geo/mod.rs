//! IP-geolocation API clients.
//!
//! Two outbound calls make up a lookup:
//! - an IP-echo endpoint (ipify) that returns the caller's public address
//!   as plain text
//! - a geolocation endpoint (ipapi.co) that maps an address to JSON with
//!   `latitude` and `longitude`
//!
//! Both sit behind the [`GeoApi`] trait so the refresher can be driven by
//! [`MockGeoApi`] in tests.

mod api;
mod client;
mod error;
mod mock;
mod types;

pub use api::GeoApi;
pub use client::{GeoClient, GeoClientConfig};
pub use error::GeoError;
pub use mock::MockGeoApi;
pub use types::{IpApiResponse, parse_lookup};
