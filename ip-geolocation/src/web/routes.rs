//! HTTP route handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
};
use tracing::error;

use crate::host::{Position, StorageError};
use crate::sensor::Setting;

use super::dto::*;
use super::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/settings", get(get_settings))
        .route("/settings/:key", put(put_setting))
        .route("/position", get(get_position))
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// List the settings with their current values.
async fn get_settings(State(state): State<AppState>) -> Json<Vec<Setting>> {
    Json(state.device.get_settings())
}

/// Store a setting and wait for the refresh it triggers.
///
/// Only keys on the settings surface are accepted, and read-only ones are
/// rejected.
async fn put_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<PutSettingRequest>,
) -> Result<StatusCode, AppError> {
    let setting = state
        .device
        .get_settings()
        .into_iter()
        .find(|s| s.key == key)
        .ok_or_else(|| AppError::NotFound {
            message: format!("Unknown setting: {key}"),
        })?;

    if setting.readonly {
        return Err(AppError::BadRequest {
            message: format!("Setting {key} is read-only"),
        });
    }

    state.device.put_setting(setting.key, req.value).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// The current position reading.
async fn get_position(State(state): State<AppState>) -> Result<Json<Position>, AppError> {
    state
        .device
        .position()
        .map(Json)
        .ok_or_else(|| AppError::NotFound {
            message: "No position yet".to_string(),
        })
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    NotFound { message: String },
    Internal { message: String },
}

impl From<StorageError> for AppError {
    fn from(e: StorageError) -> Self {
        AppError::Internal {
            message: e.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            AppError::NotFound { message } => (StatusCode::NOT_FOUND, message),
            AppError::Internal { message } => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        if status.is_server_error() {
            error!(%status, %message, "request failed");
        }

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}
