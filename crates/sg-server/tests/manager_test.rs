//! Controller manager: loading, routing, enable/disable and reload

use sg_config::{load_yaml_string, ControllerConfig, SunGuardConfig};
use sg_controller::testing::{MockClock, RecordingActuator};
use sg_controller::CoverActuator;
use sg_core::events::CoverAction;
use sg_core::Zone;
use sg_event_bus::EventBus;
use sg_server::{ControllerManager, EngineError, SignalUpdate};
use std::sync::Arc;

const CONFIG: &str = r#"
controllers:
  - id: living_room
    name: Living room
    thresholds: { t1: 25, t2: 28, t3: 22, hysteresis1: 0.3, hysteresis2: 0.3 }
    check_interval_seconds: 3600
  - id: office
    thresholds: { t1: 24, t2: 27, t3: 21 }
    check_interval_seconds: 3600
"#;

fn parse(yaml: &str) -> SunGuardConfig {
    SunGuardConfig::from_yaml(load_yaml_string(yaml).unwrap()).unwrap()
}

fn manager() -> (ControllerManager, Arc<RecordingActuator>) {
    let actuator = Arc::new(RecordingActuator::new());
    let shared = actuator.clone();
    let manager = ControllerManager::new(
        Arc::new(EventBus::new()),
        Arc::new(MockClock::new()),
        Arc::new(move |_: &ControllerConfig| shared.clone() as Arc<dyn CoverActuator>),
    );
    (manager, actuator)
}

async fn route(manager: &ControllerManager, line: &str) -> Result<(), EngineError> {
    manager.route(&SignalUpdate::parse(line)?).await
}

#[tokio::test]
async fn test_load_spawns_every_controller() {
    let (manager, _) = manager();
    manager.load(&parse(CONFIG)).unwrap();

    assert_eq!(manager.count(), 2);
    assert_eq!(manager.ids(), vec!["living_room", "office"]);
    assert!(manager.get("living_room").is_some());
    assert!(manager.get("kitchen").is_none());

    manager.shutdown_all().await;
    assert_eq!(manager.count(), 0);
}

#[tokio::test]
async fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sunguard.yaml");
    std::fs::write(&path, CONFIG).unwrap();

    let (manager, _) = manager();
    manager.load(&SunGuardConfig::load(&path).unwrap()).unwrap();
    assert_eq!(manager.count(), 2);
}

#[tokio::test]
async fn test_duplicate_spawn_rejected() {
    let (manager, _) = manager();
    manager.load(&parse(CONFIG)).unwrap();

    let config = parse(CONFIG).controllers[0].clone();
    assert!(matches!(
        manager.spawn(config),
        Err(EngineError::AlreadyExists(id)) if id == "living_room"
    ));
}

#[tokio::test]
async fn test_route_signal_lines() {
    let (manager, actuator) = manager();
    manager.load(&parse(CONFIG)).unwrap();

    route(&manager, r#"{"controller": "office", "temperature": "24.5"}"#)
        .await
        .unwrap();
    let office = manager.get("office").unwrap();
    assert_eq!(office.status().await.unwrap().zone, Zone::T1);

    let living_room = manager.get("living_room").unwrap();
    assert_eq!(living_room.status().await.unwrap().zone, Zone::None);
    assert_eq!(actuator.count(CoverAction::CaptureSnapshot), 1);

    route(&manager, r#"{"controller": "office", "temperature": "unavailable"}"#)
        .await
        .unwrap();
    let status = office.status().await.unwrap();
    assert_eq!(status.zone, Zone::T1);
    assert_eq!(status.last_temperature, None);
}

#[tokio::test]
async fn test_route_force_zone() {
    let (manager, actuator) = manager();
    manager.load(&parse(CONFIG)).unwrap();

    route(&manager, r#"{"controller": "living_room", "force_zone": "t2"}"#)
        .await
        .unwrap();
    let handle = manager.get("living_room").unwrap();
    assert_eq!(handle.status().await.unwrap().zone, Zone::T2);
    assert_eq!(
        actuator.calls(),
        vec![
            CoverAction::CaptureSnapshot,
            CoverAction::ApplyScene {
                tier: sg_core::Tier::T2
            },
        ]
    );
}

#[tokio::test]
async fn test_route_errors() {
    let (manager, _) = manager();
    manager.load(&parse(CONFIG)).unwrap();

    assert!(matches!(
        route(&manager, r#"{"controller": "kitchen", "temperature": 30}"#).await,
        Err(EngineError::NotFound(id)) if id == "kitchen"
    ));
    assert!(matches!(
        route(&manager, r#"{"controller": "office", "force_zone": "max"}"#).await,
        Err(EngineError::InvalidZone(_))
    ));
    assert!(matches!(
        route(&manager, "{").await,
        Err(EngineError::InvalidSignal(_))
    ));
}

#[tokio::test]
async fn test_enable_disable() {
    let (manager, actuator) = manager();
    manager.load(&parse(CONFIG)).unwrap();

    manager.disable("office").unwrap();
    let office = manager.get("office").unwrap();
    assert!(!office.is_enabled());

    route(&manager, r#"{"controller": "office", "temperature": 30}"#)
        .await
        .unwrap();
    assert_eq!(office.status().await.unwrap().zone, Zone::None);
    assert!(actuator.calls().is_empty());

    manager.enable("office").unwrap();
    assert_eq!(office.check_now().await.unwrap(), Zone::T2);

    assert!(matches!(
        manager.disable("kitchen"),
        Err(EngineError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_reload_in_place() {
    let (manager, _) = manager();
    manager.load(&parse(CONFIG)).unwrap();

    route(&manager, r#"{"controller": "living_room", "temperature": 25.4}"#)
        .await
        .unwrap();
    let living_room = manager.get("living_room").unwrap();
    let office = manager.get("office").unwrap();
    assert_eq!(living_room.status().await.unwrap().zone, Zone::T1);

    manager
        .reload(&parse(
            r#"
controllers:
  - id: living_room
    thresholds: { t1: 26, t2: 29, t3: 23 }
    check_interval_seconds: 3600
  - id: bedroom
    thresholds: { t1: 25, t2: 28, t3: 22 }
    check_interval_seconds: 3600
"#,
        ))
        .await
        .unwrap();

    assert_eq!(manager.ids(), vec!["bedroom", "living_room"]);
    assert_eq!(living_room.config().thresholds.t1, 26.0);
    // Kept controllers keep their episode across a reload
    assert_eq!(living_room.status().await.unwrap().zone, Zone::T1);
    assert!(matches!(
        office.status().await,
        Err(EngineError::Stopped(_))
    ));
}

#[tokio::test]
async fn test_reload_rejects_invalid_config() {
    let (manager, _) = manager();
    manager.load(&parse(CONFIG)).unwrap();

    let mut config = parse(CONFIG);
    config.controllers[1].thresholds.t1 = 40.0;
    assert!(matches!(
        manager.reload(&config).await,
        Err(EngineError::Config(_))
    ));
    assert_eq!(manager.count(), 2);
    assert_eq!(manager.get("office").unwrap().config().thresholds.t1, 24.0);
}
