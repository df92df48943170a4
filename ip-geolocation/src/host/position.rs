//! Position sensor reading and the setter the host exposes for it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// A geographic position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    /// Create a position from latitude and longitude.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// The device's `position` attribute, as surfaced by the host.
///
/// `set_position` is called while the device holds its scheduling lock.
/// Implementations must not call back into the device (for example
/// `next_refresh_in` or `put_setting`) from inside it, or they deadlock.
pub trait PositionSink: Send + Sync {
    /// Replace the current reading.
    fn set_position(&self, position: Position);
}

/// Position attribute backed by a watch channel.
///
/// Cloning shares the same reading. `None` until the first reading is set.
#[derive(Debug, Clone)]
pub struct SharedPosition {
    sender: Arc<watch::Sender<Option<Position>>>,
}

impl SharedPosition {
    /// Create an attribute with no reading yet.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// The latest reading.
    pub fn get(&self) -> Option<Position> {
        *self.sender.borrow()
    }

    /// Watch for new readings.
    pub fn subscribe(&self) -> watch::Receiver<Option<Position>> {
        self.sender.subscribe()
    }
}

impl Default for SharedPosition {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionSink for SharedPosition {
    fn set_position(&self, position: Position) {
        self.sender.send_replace(Some(position));
    }
}
