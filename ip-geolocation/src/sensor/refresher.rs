//! The refresh loop that keeps the position reading current.
//!
//! A cycle detects the public IP, picks the address to geolocate, looks it
//! up and publishes the position. However the cycle ends, it arms a timer
//! for the next one. Writing a setting cancels the timer and runs a cycle
//! straight away.
//!
//! Every cycle runs under a generation number. Writing a setting or
//! shutting down moves to a new generation and aborts the pending timer
//! task, so a cycle from an older generation that is still in flight
//! neither publishes its position nor arms a timer.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::geo::GeoApi;
use crate::host::{DeviceEvents, DeviceInterface, Position, PositionSink, Storage, StorageError};

use super::error::SensorError;
use super::settings::{
    IP_OVERRIDE, IP_SELF, REFRESH_INTERVAL, Setting, SettingValue, refresh_delay,
    refresh_interval_from, settings_surface,
};

/// A scheduled refresh that hasn't fired yet.
#[derive(Debug)]
struct PendingRefresh {
    handle: JoinHandle<()>,
    deadline: Instant,
}

/// Timer state. Only touched with the lock held.
#[derive(Debug, Default)]
struct Schedule {
    generation: u64,
    pending: Option<PendingRefresh>,
    stopped: bool,
}

struct Inner {
    storage: Arc<dyn Storage>,
    events: Arc<dyn DeviceEvents>,
    sink: Arc<dyn PositionSink>,
    api: Arc<dyn GeoApi>,
    runtime: Handle,
    schedule: Mutex<Schedule>,
    reading: Mutex<Option<Position>>,
}

/// Position sensor device that geolocates the host by its public IP.
///
/// The loop runs until [`shutdown`](Self::shutdown) is called or the
/// device is dropped.
pub struct GeolocationRefresher {
    inner: Arc<Inner>,
}

impl GeolocationRefresher {
    /// Create the device and start its first refresh cycle.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start(
        storage: Arc<dyn Storage>,
        events: Arc<dyn DeviceEvents>,
        sink: Arc<dyn PositionSink>,
        api: Arc<dyn GeoApi>,
    ) -> Self {
        let inner = Arc::new(Inner {
            storage,
            events,
            sink,
            api,
            runtime: Handle::current(),
            schedule: Mutex::new(Schedule::default()),
            reading: Mutex::new(None),
        });

        inner.schedule_refresh(Duration::ZERO, 0);

        Self { inner }
    }

    /// The last auto-detected public IP.
    pub fn ip_self(&self) -> Option<String> {
        self.inner.storage.get_item(IP_SELF)
    }

    /// The user-supplied IP, if any.
    pub fn ip_override(&self) -> Option<String> {
        self.inner.storage.get_item(IP_OVERRIDE)
    }

    /// Minutes between refreshes.
    pub fn refresh_interval(&self) -> i64 {
        self.inner.refresh_interval()
    }

    /// The address the next cycle would geolocate: the override when set,
    /// otherwise the detected IP.
    pub fn effective_ip(&self) -> Option<String> {
        self.inner.effective_ip()
    }

    /// The latest published position.
    pub fn position(&self) -> Option<Position> {
        *self.inner.lock_reading()
    }

    /// Time until the pending refresh fires, `None` if nothing is scheduled.
    pub fn next_refresh_in(&self) -> Option<Duration> {
        let schedule = self.inner.lock_schedule();
        schedule
            .pending
            .as_ref()
            .map(|p| p.deadline.saturating_duration_since(Instant::now()))
    }

    /// The settings surface with current values.
    pub fn get_settings(&self) -> Vec<Setting> {
        settings_surface(self.ip_self(), self.ip_override(), self.refresh_interval())
    }

    /// Store a setting and restart the refresh loop with it in effect.
    ///
    /// The value is stored as given; `None` stores an empty string, which
    /// clears the override. The pending timer is cancelled, a settings
    /// event is emitted, and a new cycle runs before this returns. If the
    /// write fails nothing else happens.
    pub async fn put_setting(
        &self,
        key: &str,
        value: Option<SettingValue>,
    ) -> Result<(), StorageError> {
        let stored = value.map(|v| v.to_storage_string()).unwrap_or_default();
        self.inner.storage.set_item(key, &stored)?;
        debug!(key, value = %stored, "setting stored");

        let Some(generation) = self.inner.restart() else {
            self.inner
                .events
                .on_device_event(DeviceInterface::Settings)
                .await;
            debug!("device shut down, not refreshing");
            return Ok(());
        };

        // Armed before the first await so the loop survives this future
        // being dropped early.
        let _reschedule = RescheduleGuard {
            inner: &self.inner,
            generation,
        };
        self.inner
            .events
            .on_device_event(DeviceInterface::Settings)
            .await;
        self.inner.refresh_position(generation).await;

        Ok(())
    }

    /// Detect the public IP and store it as the autodetected setting.
    pub async fn refresh_self_ip(&self) -> Result<String, SensorError> {
        self.inner.refresh_self_ip().await
    }

    /// Cancel the pending refresh and stop the loop.
    ///
    /// A cycle already in flight finishes its requests but publishes
    /// nothing.
    pub fn shutdown(&self) {
        let mut schedule = self.inner.lock_schedule();
        schedule.stopped = true;
        schedule.generation += 1;
        if let Some(pending) = schedule.pending.take() {
            pending.handle.abort();
        }
    }
}

impl Drop for GeolocationRefresher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Inner {
    fn lock_schedule(&self) -> MutexGuard<'_, Schedule> {
        self.schedule.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_reading(&self) -> MutexGuard<'_, Option<Position>> {
        self.reading.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn refresh_interval(&self) -> i64 {
        refresh_interval_from(self.storage.get_item(REFRESH_INTERVAL).as_deref())
    }

    fn effective_ip(&self) -> Option<String> {
        non_empty(self.storage.get_item(IP_OVERRIDE))
            .or_else(|| non_empty(self.storage.get_item(IP_SELF)))
    }

    /// Cancel the pending timer and invalidate every cycle in flight.
    ///
    /// Returns the generation the replacement cycle runs under, or `None`
    /// once the device is shut down.
    fn restart(&self) -> Option<u64> {
        let mut schedule = self.lock_schedule();
        if let Some(pending) = schedule.pending.take() {
            pending.handle.abort();
        }
        if schedule.stopped {
            return None;
        }
        schedule.generation += 1;
        Some(schedule.generation)
    }

    /// Arm the timer to run a cycle of `generation` after `delay`.
    ///
    /// Does nothing if `generation` has been superseded.
    fn schedule_refresh(self: &Arc<Self>, delay: Duration, generation: u64) {
        let mut schedule = self.lock_schedule();
        if schedule.stopped || schedule.generation != generation {
            debug!(generation, "superseded refresh cycle, not rescheduling");
            return;
        }

        let deadline = Instant::now() + delay;
        let weak = Arc::downgrade(self);
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(inner) = weak.upgrade() {
                inner.run_cycle(generation).await;
            }
        });

        // Under the current generation the only timer that can still be
        // pending is the task running this cycle, which ends right after.
        // Dropping its handle detaches it.
        schedule.pending = Some(PendingRefresh { handle, deadline });
    }

    async fn run_cycle(self: &Arc<Self>, generation: u64) {
        let _reschedule = RescheduleGuard {
            inner: self,
            generation,
        };
        self.refresh_position(generation).await;
    }

    /// Steps of a cycle up to publishing. Rescheduling is the caller's job.
    async fn refresh_position(&self, generation: u64) {
        info!("refreshing geolocator position");
        match self.locate().await {
            Ok(position) => self.publish(position, generation).await,
            Err(e) => warn!(error = %e, "geolocation refresh failed, keeping previous position"),
        }
    }

    async fn locate(&self) -> Result<Position, SensorError> {
        self.refresh_self_ip().await?;

        let ip = self.effective_ip().ok_or(SensorError::NoAddress)?;
        info!(%ip, "using address for geolocation");

        Ok(self.api.lookup(&ip).await?)
    }

    async fn refresh_self_ip(&self) -> Result<String, SensorError> {
        let ip = self.api.public_ip().await?;
        info!(%ip, "detected self ip");

        self.storage.set_item(IP_SELF, &ip)?;
        self.events.on_device_event(DeviceInterface::Settings).await;

        Ok(ip)
    }

    async fn publish(&self, position: Position, generation: u64) {
        {
            let schedule = self.lock_schedule();
            if schedule.generation != generation {
                debug!(generation, "discarding position from superseded refresh cycle");
                return;
            }
            *self.lock_reading() = Some(position);
            self.sink.set_position(position);
        }

        info!(
            latitude = position.latitude,
            longitude = position.longitude,
            "geolocation updated"
        );
        self.events
            .on_device_event(DeviceInterface::PositionSensor)
            .await;
    }
}

/// Arms the next refresh when dropped, however the cycle ended.
struct RescheduleGuard<'a> {
    inner: &'a Arc<Inner>,
    generation: u64,
}

impl Drop for RescheduleGuard<'_> {
    fn drop(&mut self) {
        let interval = self.inner.refresh_interval();
        debug!(interval_mins = interval, "scheduling next refresh");
        self.inner
            .schedule_refresh(refresh_delay(interval), self.generation);
    }
}

/// Trimmed `value`, or `None` if it is missing or blank.
fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
