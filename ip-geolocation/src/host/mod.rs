//! Collaborators supplied by the device host.
//!
//! The refresher never talks to a concrete plugin runtime. It consumes
//! key/value storage, a device-event channel, and a position setter through
//! the traits here. The runner binary plugs in the in-process
//! implementations that live alongside them.

mod error;
mod events;
mod position;
mod storage;

pub use error::StorageError;
pub use events::{BroadcastEvents, DeviceEvents, DeviceInterface};
pub use position::{Position, PositionSink, SharedPosition};
pub use storage::{FileStorage, MemoryStorage, Storage};
