//! Tests for the refresh loop, driven by a mock API on a paused clock.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::*;
use crate::geo::{GeoError, MockGeoApi};
use crate::host::{
    DeviceEvents, DeviceInterface, MemoryStorage, Position, SharedPosition, Storage, StorageError,
};

const MINUTE: Duration = Duration::from_secs(60);

fn mountain_view() -> Position {
    Position::new(37.4, -122.1)
}

fn sydney() -> Position {
    Position::new(-33.87, 151.21)
}

fn reykjavik() -> Position {
    Position::new(64.15, -21.94)
}

/// API that detects 8.8.8.8 and knows where it is.
fn default_api() -> MockGeoApi {
    MockGeoApi::new()
        .with_public_ip("8.8.8.8")
        .with_position("8.8.8.8", mountain_view())
}

/// Records every event along with how many IP detections had happened
/// when it was emitted.
struct RecordingEvents {
    api: MockGeoApi,
    log: Mutex<Vec<(DeviceInterface, usize)>>,
}

impl RecordingEvents {
    fn new(api: MockGeoApi) -> Self {
        Self {
            api,
            log: Mutex::new(Vec::new()),
        }
    }

    fn log(&self) -> Vec<(DeviceInterface, usize)> {
        self.log.lock().unwrap().clone()
    }

    fn clear(&self) {
        self.log.lock().unwrap().clear();
    }
}

#[async_trait]
impl DeviceEvents for RecordingEvents {
    async fn on_device_event(&self, interface: DeviceInterface) {
        let calls = self.api.public_ip_calls();
        self.log.lock().unwrap().push((interface, calls));
    }
}

/// Storage whose writes always fail.
struct ReadOnlyStorage(MemoryStorage);

impl Storage for ReadOnlyStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.0.get_item(key)
    }

    fn set_item(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Io {
            path: PathBuf::from("/ro/device.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        })
    }
}

struct Harness {
    refresher: GeolocationRefresher,
    api: MockGeoApi,
    position: SharedPosition,
    events: Arc<RecordingEvents>,
}

fn start(api: MockGeoApi, storage: Arc<dyn Storage>) -> Harness {
    let position = SharedPosition::new();
    let events = Arc::new(RecordingEvents::new(api.clone()));

    let refresher = GeolocationRefresher::start(
        storage,
        events.clone(),
        Arc::new(position.clone()),
        Arc::new(api.clone()),
    );

    Harness {
        refresher,
        api,
        position,
        events,
    }
}

fn storage_with(items: &[(&str, &str)]) -> Arc<dyn Storage> {
    let storage = MemoryStorage::new();
    for (key, value) in items {
        storage.set_item(key, value).unwrap();
    }
    Arc::new(storage)
}

/// Let spawned refresh tasks run until they block on a timer.
///
/// Only yields, so the paused clock does not move.
async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Move the paused clock forward and let due cycles run.
async fn advance(by: Duration) {
    tokio::time::advance(by).await;
    settle().await;
}

// ========== refresh cycle ==========

#[tokio::test(start_paused = true)]
async fn first_cycle_detects_ip_and_publishes_position() {
    let h = start(default_api(), storage_with(&[]));
    settle().await;

    assert_eq!(h.refresher.ip_self().as_deref(), Some("8.8.8.8"));
    assert_eq!(h.refresher.position(), Some(mountain_view()));
    assert_eq!(h.position.get(), Some(mountain_view()));
    assert_eq!(h.api.lookup_requests(), vec!["8.8.8.8"]);
    assert_eq!(h.refresher.next_refresh_in(), Some(30 * MINUTE));

    assert_eq!(
        h.events.log(),
        vec![
            (DeviceInterface::Settings, 1),
            (DeviceInterface::PositionSensor, 1)
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn timer_fires_after_interval_and_repeats() {
    let h = start(default_api(), storage_with(&[]));
    settle().await;
    assert_eq!(h.api.public_ip_calls(), 1);

    advance(29 * MINUTE).await;
    assert_eq!(h.api.public_ip_calls(), 1);

    h.api.set_position("8.8.8.8", sydney());
    advance(MINUTE).await;
    assert_eq!(h.api.public_ip_calls(), 2);
    assert_eq!(h.refresher.position(), Some(sydney()));
    assert_eq!(h.refresher.next_refresh_in(), Some(30 * MINUTE));

    advance(30 * MINUTE).await;
    assert_eq!(h.api.public_ip_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn stored_interval_sets_the_timer() {
    let h = start(default_api(), storage_with(&[("refreshInterval", "5")]));
    settle().await;

    assert_eq!(h.refresher.refresh_interval(), 5);
    assert_eq!(h.refresher.next_refresh_in(), Some(5 * MINUTE));

    advance(5 * MINUTE).await;
    assert_eq!(h.api.public_ip_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_lookup_keeps_position_and_reschedules() {
    let h = start(default_api(), storage_with(&[]));
    settle().await;
    assert_eq!(h.refresher.position(), Some(mountain_view()));

    h.api.fail_lookups(Some(500));
    advance(30 * MINUTE).await;

    assert_eq!(h.api.lookup_requests().len(), 2);
    assert_eq!(h.refresher.position(), Some(mountain_view()));
    assert_eq!(h.position.get(), Some(mountain_view()));
    assert_eq!(h.refresher.next_refresh_in(), Some(30 * MINUTE));

    // Recovers on the next scheduled cycle
    h.api.fail_lookups(None);
    h.api.set_position("8.8.8.8", sydney());
    advance(30 * MINUTE).await;
    assert_eq!(h.refresher.position(), Some(sydney()));
}

#[tokio::test(start_paused = true)]
async fn failed_ip_detection_skips_lookup_and_reschedules() {
    let h = start(MockGeoApi::new(), storage_with(&[]));
    settle().await;

    assert_eq!(h.api.public_ip_calls(), 1);
    assert!(h.api.lookup_requests().is_empty());
    assert_eq!(h.refresher.ip_self(), None);
    assert_eq!(h.refresher.position(), None);
    assert_eq!(h.refresher.next_refresh_in(), Some(30 * MINUTE));
    assert!(h.events.log().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_ip_detection_blocks_override_lookup_too() {
    let api = MockGeoApi::new().with_position("1.1.1.1", sydney());
    let h = start(api, storage_with(&[("ipOverride", "1.1.1.1")]));
    settle().await;

    assert!(h.api.lookup_requests().is_empty());
    assert_eq!(h.refresher.position(), None);
    assert_eq!(h.refresher.next_refresh_in(), Some(30 * MINUTE));
}

#[tokio::test(start_paused = true)]
async fn empty_detected_ip_without_override_skips_lookup() {
    let api = MockGeoApi::new().with_public_ip("");
    let h = start(api, storage_with(&[]));
    settle().await;

    assert!(h.api.lookup_requests().is_empty());
    assert_eq!(h.refresher.effective_ip(), None);
    assert_eq!(h.refresher.next_refresh_in(), Some(30 * MINUTE));
}

// ========== effective IP ==========

#[tokio::test(start_paused = true)]
async fn override_is_geolocated_instead_of_detected_ip() {
    let api = default_api().with_position("1.1.1.1", sydney());
    let h = start(api, storage_with(&[("ipOverride", "1.1.1.1")]));
    settle().await;

    assert_eq!(h.api.lookup_requests(), vec!["1.1.1.1"]);
    assert_eq!(h.refresher.ip_self().as_deref(), Some("8.8.8.8"));
    assert_eq!(h.refresher.effective_ip().as_deref(), Some("1.1.1.1"));
    assert_eq!(h.refresher.position(), Some(sydney()));
}

#[tokio::test(start_paused = true)]
async fn blank_override_falls_back_to_detected_ip() {
    let h = start(default_api(), storage_with(&[("ipOverride", "   ")]));
    settle().await;

    assert_eq!(h.api.lookup_requests(), vec!["8.8.8.8"]);
    assert_eq!(h.refresher.position(), Some(mountain_view()));
}

// ========== put_setting ==========

#[tokio::test(start_paused = true)]
async fn put_setting_notifies_once_then_runs_a_cycle() {
    let h = start(default_api(), storage_with(&[]));
    settle().await;
    h.events.clear();

    h.refresher
        .put_setting(REFRESH_INTERVAL, Some(SettingValue::from(60)))
        .await
        .unwrap();

    let log = h.events.log();
    // The first event is emitted before the new cycle detects the IP.
    assert_eq!(log[0], (DeviceInterface::Settings, 1));
    assert_eq!(
        log.iter()
            .filter(|(interface, calls)| *interface == DeviceInterface::Settings && *calls == 1)
            .count(),
        1
    );
    assert_eq!(
        log[1..],
        [
            (DeviceInterface::Settings, 2),
            (DeviceInterface::PositionSensor, 2)
        ]
    );
    assert_eq!(h.api.public_ip_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn put_setting_cancels_the_pending_timer() {
    let h = start(default_api(), storage_with(&[]));
    settle().await;

    advance(20 * MINUTE).await;
    h.refresher
        .put_setting(REFRESH_INTERVAL, Some(SettingValue::from(60)))
        .await
        .unwrap();
    assert_eq!(h.api.public_ip_calls(), 2);
    assert_eq!(h.refresher.next_refresh_in(), Some(60 * MINUTE));

    // Past the original 30-minute deadline: the old timer never fires.
    advance(15 * MINUTE).await;
    assert_eq!(h.api.public_ip_calls(), 2);

    advance(45 * MINUTE).await;
    assert_eq!(h.api.public_ip_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn put_setting_override_switches_address() {
    let api = default_api().with_position("1.1.1.1", sydney());
    let h = start(api, storage_with(&[]));
    settle().await;

    h.refresher
        .put_setting(IP_OVERRIDE, Some("1.1.1.1".into()))
        .await
        .unwrap();
    assert_eq!(h.refresher.position(), Some(sydney()));
    assert_eq!(h.api.lookup_requests(), vec!["8.8.8.8", "1.1.1.1"]);

    // Clearing the override goes back to the detected address
    h.refresher.put_setting(IP_OVERRIDE, None).await.unwrap();
    assert_eq!(h.refresher.ip_override().as_deref(), Some(""));
    assert_eq!(h.refresher.position(), Some(mountain_view()));
    assert_eq!(
        h.api.lookup_requests(),
        vec!["8.8.8.8", "1.1.1.1", "8.8.8.8"]
    );
}

#[tokio::test(start_paused = true)]
async fn put_setting_interval_falls_back_on_bad_input() {
    let h = start(default_api(), storage_with(&[]));
    settle().await;

    for (raw, expected) in [("abc", 30), ("0", 30), ("", 30), ("5", 5), ("15 minutes", 15)] {
        h.refresher
            .put_setting(REFRESH_INTERVAL, Some(raw.into()))
            .await
            .unwrap();
        assert_eq!(h.refresher.refresh_interval(), expected, "input {raw:?}");
        assert_eq!(
            h.refresher.next_refresh_in(),
            Some(expected as u32 * MINUTE),
            "input {raw:?}"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn put_setting_storage_failure_leaves_loop_alone() {
    let storage = Arc::new(ReadOnlyStorage(MemoryStorage::new()));
    let h = start(default_api(), storage);
    settle().await;

    // The first cycle failed storing the detected IP but still rescheduled
    assert_eq!(h.refresher.ip_self(), None);
    assert_eq!(h.refresher.position(), None);
    assert!(h.api.lookup_requests().is_empty());

    advance(10 * MINUTE).await;
    h.events.clear();

    let err = h
        .refresher
        .put_setting(IP_OVERRIDE, Some("1.1.1.1".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Io { .. }));
    assert!(h.events.log().is_empty());
    assert_eq!(h.api.public_ip_calls(), 1);
    assert_eq!(h.refresher.next_refresh_in(), Some(20 * MINUTE));
}

// ========== in-flight cycles ==========

#[tokio::test(start_paused = true)]
async fn setting_change_supersedes_cycle_in_flight() {
    let api = default_api()
        .with_position("1.1.1.1", sydney())
        .with_lookup_delay(Duration::from_secs(10));
    let h = start(api, storage_with(&[]));
    settle().await;

    // The first cycle is waiting on its lookup
    assert_eq!(h.api.lookup_requests(), vec!["8.8.8.8"]);
    assert_eq!(h.refresher.position(), None);

    h.refresher
        .put_setting(IP_OVERRIDE, Some("1.1.1.1".into()))
        .await
        .unwrap();
    assert_eq!(h.refresher.position(), Some(sydney()));
    assert_eq!(h.refresher.next_refresh_in(), Some(30 * MINUTE));

    advance(MINUTE).await;
    assert_eq!(h.refresher.position(), Some(sydney()));
    assert_eq!(h.api.lookup_requests(), vec!["8.8.8.8", "1.1.1.1"]);
}

#[tokio::test(start_paused = true)]
async fn concurrent_setting_changes_publish_only_the_latest() {
    let api = default_api()
        .with_position("1.1.1.1", sydney())
        .with_position("9.9.9.9", reykjavik())
        .with_lookup_delay(Duration::from_secs(10));
    let h = start(api, storage_with(&[]));
    settle().await;
    advance(Duration::from_secs(10)).await;
    assert_eq!(h.refresher.position(), Some(mountain_view()));

    let (first, second) = tokio::join!(
        h.refresher.put_setting(IP_OVERRIDE, Some("1.1.1.1".into())),
        h.refresher.put_setting(IP_OVERRIDE, Some("9.9.9.9".into())),
    );
    first.unwrap();
    second.unwrap();

    assert_eq!(
        h.api.lookup_requests(),
        vec!["8.8.8.8", "1.1.1.1", "9.9.9.9"]
    );
    assert_eq!(h.refresher.position(), Some(reykjavik()));
    assert_eq!(h.position.get(), Some(reykjavik()));
    assert_eq!(h.api.public_ip_calls(), 3);

    // Exactly one timer survives
    advance(30 * MINUTE).await;
    assert_eq!(h.api.public_ip_calls(), 4);
}

// ========== lifecycle ==========

#[tokio::test(start_paused = true)]
async fn shutdown_stops_the_loop() {
    let h = start(default_api(), storage_with(&[]));
    settle().await;

    h.refresher.shutdown();
    assert_eq!(h.refresher.next_refresh_in(), None);

    advance(120 * MINUTE).await;
    assert_eq!(h.api.public_ip_calls(), 1);

    // Settings are still stored, but no cycle runs
    h.refresher
        .put_setting(IP_OVERRIDE, Some("1.1.1.1".into()))
        .await
        .unwrap();
    assert_eq!(h.refresher.ip_override().as_deref(), Some("1.1.1.1"));
    assert_eq!(h.api.public_ip_calls(), 1);
    assert_eq!(h.refresher.next_refresh_in(), None);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_device_stops_the_loop() {
    let Harness { refresher, api, .. } = start(default_api(), storage_with(&[]));
    settle().await;

    drop(refresher);
    advance(120 * MINUTE).await;

    assert_eq!(api.public_ip_calls(), 1);
}

// ========== direct operations ==========

#[tokio::test(start_paused = true)]
async fn refresh_self_ip_stores_and_notifies() {
    let h = start(default_api(), storage_with(&[]));
    settle().await;
    h.events.clear();

    h.api.set_public_ip("9.9.9.9");
    let ip = h.refresher.refresh_self_ip().await.unwrap();

    assert_eq!(ip, "9.9.9.9");
    assert_eq!(h.refresher.ip_self().as_deref(), Some("9.9.9.9"));
    assert_eq!(h.events.log(), vec![(DeviceInterface::Settings, 2)]);

    h.api.fail_public_ip(500);
    let err = h.refresher.refresh_self_ip().await.unwrap_err();
    assert!(matches!(
        err,
        SensorError::Geo(GeoError::Api { status: 500, .. })
    ));
    assert_eq!(h.refresher.ip_self().as_deref(), Some("9.9.9.9"));
}

#[tokio::test(start_paused = true)]
async fn get_settings_reflects_current_values() {
    let h = start(default_api(), storage_with(&[("ipOverride", "1.1.1.1")]));
    settle().await;

    let settings = h.refresher.get_settings();
    assert_eq!(settings.len(), 3);

    assert_eq!(settings[0].key, IP_SELF);
    assert_eq!(settings[0].value, Some(SettingValue::from("8.8.8.8")));
    assert!(settings[0].readonly);

    assert_eq!(settings[1].key, IP_OVERRIDE);
    assert_eq!(settings[1].value, Some(SettingValue::from("1.1.1.1")));
    assert_eq!(settings[1].placeholder, Some("8.8.8.8"));

    assert_eq!(settings[2].key, REFRESH_INTERVAL);
    assert_eq!(settings[2].value, Some(SettingValue::from(30)));
    assert_eq!(settings[2].kind, SettingType::Number);
}
