//! IP geolocation position sensor.
//!
//! [`GeolocationRefresher`] periodically resolves the host's public IP (or
//! a user override), geolocates it, and publishes the position through the
//! host's position attribute. Its three settings live in host storage.

mod error;
mod refresher;
mod settings;

#[cfg(test)]
mod refresher_tests;

pub use error::SensorError;
pub use refresher::GeolocationRefresher;
pub use settings::{
    DEFAULT_REFRESH_INTERVAL_MINS, IP_OVERRIDE, IP_SELF, MAX_REFRESH_INTERVAL_MINS,
    REFRESH_INTERVAL, Setting, SettingType, SettingValue, parse_int_prefix, refresh_delay,
    refresh_interval_from, settings_surface,
};
