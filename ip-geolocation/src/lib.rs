//! IP geolocation position sensor.
//!
//! A device that periodically finds the host's public IP address, looks up
//! where that address is, and publishes the result as a position reading.
//! Storage, device events, and the position attribute are supplied by the
//! host through the traits in [`host`].

pub mod config;
pub mod geo;
pub mod host;
pub mod sensor;
pub mod web;
