//! The device's settings surface.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Storage key of the last auto-detected public IP.
pub const IP_SELF: &str = "ipSelf";

/// Storage key of the user-supplied IP to geolocate instead.
pub const IP_OVERRIDE: &str = "ipOverride";

/// Storage key of the refresh interval, in minutes.
pub const REFRESH_INTERVAL: &str = "refreshInterval";

/// Refresh interval used when none is stored or it reads as zero.
pub const DEFAULT_REFRESH_INTERVAL_MINS: i64 = 30;

/// Longest interval the scheduler honours, in minutes.
///
/// 35,791 minutes is the largest whole number of minutes below 2^31 ms.
pub const MAX_REFRESH_INTERVAL_MINS: i64 = 35_791;

/// Input type hint for the host UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingType {
    String,
    Number,
}

/// A setting value as entered in, or shown by, the host UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Number(serde_json::Number),
    Text(String),
}

impl SettingValue {
    /// The string written to storage for this value.
    pub fn to_storage_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Number(n) => write!(f, "{n}"),
            SettingValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for SettingValue {
    fn from(s: &str) -> Self {
        SettingValue::Text(s.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(s: String) -> Self {
        SettingValue::Text(s)
    }
}

impl From<i64> for SettingValue {
    fn from(n: i64) -> Self {
        SettingValue::Number(n.into())
    }
}

/// One entry of the settings surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setting {
    pub key: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub value: Option<SettingValue>,
    #[serde(rename = "type")]
    pub kind: SettingType,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub readonly: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<&'static str>,
}

/// Build the settings surface from current values.
pub fn settings_surface(
    ip_self: Option<String>,
    ip_override: Option<String>,
    refresh_interval: i64,
) -> Vec<Setting> {
    vec![
        Setting {
            key: IP_SELF,
            title: "Autodetected IP",
            description: "The autodetected public IP address of this host.",
            value: ip_self.map(SettingValue::Text),
            kind: SettingType::String,
            readonly: true,
            placeholder: None,
        },
        Setting {
            key: IP_OVERRIDE,
            title: "IP Override",
            description: "If set, detects geolocation for the provided IP address. \
                          Otherwise, uses this host's autodetected IP address.",
            value: ip_override.map(SettingValue::Text),
            kind: SettingType::String,
            readonly: false,
            placeholder: Some("8.8.8.8"),
        },
        Setting {
            key: REFRESH_INTERVAL,
            title: "Refresh Interval",
            description: "The interval, in minutes, to refresh the IP's geolocation data.",
            value: Some(SettingValue::from(refresh_interval)),
            kind: SettingType::Number,
            readonly: false,
            placeholder: None,
        },
    ]
}

/// Read the integer prefix of `raw`.
///
/// Leading whitespace and one sign are accepted; reading stops at the
/// first non-digit, so `"15 minutes"` is 15 and `"1.5"` is 1. A `0x` or
/// `0X` after the sign switches to hexadecimal (`"0x1A"` is 26). `None`
/// when no digit is found. Out-of-range values saturate.
pub fn parse_int_prefix(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let (negative, unsigned) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let (radix, digits) = match unsigned.get(..2) {
        Some("0x" | "0X") => (16, &unsigned[2..]),
        _ => (10, unsigned),
    };

    let mut value: i64 = 0;
    let mut seen_digit = false;
    for digit in digits.chars().map_while(|c| c.to_digit(radix)) {
        seen_digit = true;
        let digit = i64::from(digit);
        value = if negative {
            value.saturating_mul(i64::from(radix)).saturating_sub(digit)
        } else {
            value.saturating_mul(i64::from(radix)).saturating_add(digit)
        };
    }

    seen_digit.then_some(value)
}

/// The refresh interval, in minutes, for a stored value.
///
/// Missing, non-numeric and zero values fall back to
/// [`DEFAULT_REFRESH_INTERVAL_MINS`].
pub fn refresh_interval_from(raw: Option<&str>) -> i64 {
    match raw.and_then(parse_int_prefix) {
        None | Some(0) => DEFAULT_REFRESH_INTERVAL_MINS,
        Some(mins) => mins,
    }
}

/// Delay before the next refresh for an interval in minutes.
///
/// Negative intervals are scheduled as one minute, and intervals beyond
/// [`MAX_REFRESH_INTERVAL_MINS`] are capped.
pub fn refresh_delay(interval_mins: i64) -> Duration {
    let mins = interval_mins.clamp(1, MAX_REFRESH_INTERVAL_MINS);
    Duration::from_millis(60_000 * mins as u64)
}
