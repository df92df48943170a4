//! Data transfer objects for web requests and responses.

use serde::{Deserialize, Serialize};

use crate::sensor::SettingValue;

/// Request to change a setting.
#[derive(Debug, Deserialize)]
pub struct PutSettingRequest {
    /// New value; `null` or absent clears it
    #[serde(default)]
    pub value: Option<SettingValue>,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
