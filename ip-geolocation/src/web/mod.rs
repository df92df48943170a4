//! HTTP surface for the device.
//!
//! Stands in for the host UI: lists the settings, applies edits, and
//! reports the current position reading.

mod dto;
mod routes;
mod state;

pub use dto::*;
pub use routes::{AppError, create_router};
pub use state::AppState;
