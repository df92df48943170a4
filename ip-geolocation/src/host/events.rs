//! Device-event notifications.

use async_trait::async_trait;
use tokio::sync::broadcast;

/// Default number of buffered events per subscriber.
const DEFAULT_CAPACITY: usize = 16;

/// Device interface whose state an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceInterface {
    /// The settings surface changed (a value was written or detected).
    Settings,
    /// A new position reading was published.
    PositionSensor,
}

/// Channel the host listens on for device state changes.
#[async_trait]
pub trait DeviceEvents: Send + Sync {
    /// Announce that the state behind `interface` changed.
    async fn on_device_event(&self, interface: DeviceInterface);
}

/// Event channel backed by a tokio broadcast channel.
///
/// Every subscriber sees every event. Events sent while nobody is
/// subscribed are dropped.
#[derive(Debug, Clone)]
pub struct BroadcastEvents {
    sender: broadcast::Sender<DeviceInterface>,
}

impl BroadcastEvents {
    /// Create a channel with the default buffer size.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a channel buffering up to `capacity` events per subscriber.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events sent from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceInterface> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastEvents {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceEvents for BroadcastEvents {
    async fn on_device_event(&self, interface: DeviceInterface) {
        // Err only means there are no subscribers
        let _ = self.sender.send(interface);
    }
}
