use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;

fn unique_temp_path(file_name: &str) -> PathBuf {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time should be after unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("gymlink-session-{file_name}-{suffix}.xml"))
}

fn remove_if_exists(path: &Path) {
    if path.exists() {
        fs::remove_file(path).expect("temporary fixture file should be removable");
    }
}

fn controller(script: &str, state_path: &Path) -> gymlink::SessionController {
    let factory =
        gymlink::scripted_driver_factory(script.parse().expect("driver script should parse"));
    gymlink::SessionController::new(
        factory,
        gymlink::DriverConfig::default(),
        gymlink::StateFile::new(state_path.to_path_buf()),
    )
}

fn treadmill_match() -> gymlink::DeviceMatch {
    gymlink::DeviceMatch::new(
        gymlink::DriverModel::DomyosTreadmill,
        gymlink::DeviceDescriptor::new("Domyos Treadmill", "AA:BB:CC:DD:EE", Some(1796)),
    )
}

fn bike_match() -> gymlink::DeviceMatch {
    gymlink::DeviceMatch::new(
        gymlink::DriverModel::DomyosBike,
        gymlink::DeviceDescriptor::new("Domyos-Bike 1234", "11:22:33:44:55", None),
    )
}

#[tokio::test]
async fn saved_state_seeds_treadmill_drivers_before_they_connect() {
    let path = unique_temp_path("seed");
    remove_if_exists(&path);
    gymlink::StateFile::new(path.clone())
        .save(&gymlink::SessionState::now(12.5, 3.0))
        .expect("session state should save");
    let mut session = controller("", &path);

    session.adopt(&treadmill_match());

    let device = session.active_device().expect("adopted driver should be active");
    assert_eq!(gymlink::DeviceKind::Treadmill, device.kind());
    assert_eq!(12.5, device.current_speed());
    assert_eq!(3.0, device.current_inclination());

    remove_if_exists(&path);
}

#[tokio::test]
async fn bike_drivers_skip_session_seeding() {
    let path = unique_temp_path("bike-seed");
    remove_if_exists(&path);
    gymlink::StateFile::new(path.clone())
        .save(&gymlink::SessionState::now(12.5, 3.0))
        .expect("session state should save");
    let mut session = controller("", &path);

    session.adopt(&bike_match());

    let device = session.active_device().expect("adopted driver should be active");
    assert_eq!(gymlink::DeviceKind::Bike, device.kind());
    assert_eq!(0.0, device.current_speed());
    assert_eq!(0.0, device.current_inclination());

    remove_if_exists(&path);
}

#[tokio::test]
async fn adopting_a_new_device_releases_the_previous_driver() {
    let path = unique_temp_path("readopt");
    remove_if_exists(&path);
    let mut session = controller("", &path);

    session.adopt(&treadmill_match());
    session.adopt(&bike_match());

    let device = session.active_device().expect("second driver should be active");
    assert_eq!(gymlink::DeviceKind::Bike, device.kind());
    assert!(session.release(), "active driver should release");
    assert!(!session.release(), "second release should be a no-op");
    assert_eq!(None, session.active_device().map(|device| device.kind()));
}

#[tokio::test]
async fn record_metric_persists_treadmill_snapshots() {
    let path = unique_temp_path("persist");
    remove_if_exists(&path);
    let mut session = controller("speed:9.5,incline:2.0", &path);
    session.adopt(&treadmill_match());

    let first = session.next_event().await.expect("first metric should arrive");
    let second = session.next_event().await.expect("second metric should arrive");
    assert_matches!(first, gymlink::DeviceEvent::Metric(gymlink::MetricUpdate::Speed(_)));
    assert_matches!(
        second,
        gymlink::DeviceEvent::Metric(gymlink::MetricUpdate::Inclination(_))
    );

    session.record_metric(gymlink::MetricUpdate::Inclination(2.0));

    let saved = gymlink::StateFile::new(path.clone())
        .load()
        .expect("treadmill metrics should persist");
    assert_eq!(9.5, saved.speed());
    assert_eq!(2.0, saved.inclination());

    remove_if_exists(&path);
}

#[tokio::test]
async fn record_metric_ignores_bike_sessions() {
    let path = unique_temp_path("bike-persist");
    remove_if_exists(&path);
    let mut session = controller("speed:30.0", &path);
    session.adopt(&bike_match());

    let event = session.next_event().await.expect("bike metric should arrive");
    assert_matches!(event, gymlink::DeviceEvent::Metric(_));

    session.record_metric(gymlink::MetricUpdate::Speed(30.0));

    assert_eq!(None, gymlink::StateFile::new(path.clone()).load());
    assert!(!path.exists(), "bike sessions should never create a state file");
}

#[tokio::test]
async fn next_event_streams_until_the_driver_disconnects() {
    let path = unique_temp_path("stream");
    remove_if_exists(&path);
    let mut session = controller("speed:1.0,disconnect", &path);
    session.adopt(&treadmill_match());

    assert_eq!(
        Some(gymlink::DeviceEvent::Metric(gymlink::MetricUpdate::Speed(1.0))),
        session.next_event().await
    );
    assert_eq!(Some(gymlink::DeviceEvent::Disconnected), session.next_event().await);
    assert_eq!(None, session.next_event().await);

    assert!(session.release(), "driver should still be held after disconnect");
    assert_eq!(None, session.next_event().await);

    remove_if_exists(&path);
}
