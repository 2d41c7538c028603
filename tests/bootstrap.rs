use pitstop_tower::messaging::{AgentCategory, PlatformStatusResponse};
use pitstop_tower::models::PlatformAlarms;
use pitstop_tower::orchestration::{BootstrapConfig, TowerBootstrap};
use pitstop_tower::test_helpers::{bay, settle, Behavior, ScriptedMessaging};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_bootstrap_from_config_directory() {
    let config_dir = TempDir::new().unwrap();
    let log_dir = config_dir.path().join("ps-logs");
    fs::write(
        config_dir.path().join("tower.toml"),
        format!(
            "[timing]\nlanding_wait_ms = 20000\n\n[logging]\nps_log_dir = \"{}\"\n",
            log_dir.display()
        ),
    )
    .unwrap();
    fs::write(
        config_dir.path().join("tower.test.toml"),
        "[timing]\ncomms_timeout_ms = 2000\n",
    )
    .unwrap();

    let bus = ScriptedMessaging::new();
    bus.respond(
        "PlatformStatusRequest",
        Behavior::Status(PlatformStatusResponse {
            geo: None,
            service_millis: 60_000,
            alarms: PlatformAlarms::default(),
            ready_ps_id: None,
            bays: Some(vec![bay(1, Some("PT1"), 30_000)]),
        }),
    );

    let mut system = TowerBootstrap::bootstrap(
        Arc::new(bus.clone()),
        BootstrapConfig {
            config_directory: Some(config_dir.path().to_path_buf()),
            environment_override: Some("test".to_string()),
        },
    )
    .await
    .unwrap();

    let timing = system.config_manager.config().timing;
    assert_eq!(timing.landing_wait_ms, 20_000);
    assert_eq!(timing.comms_timeout_ms, 2_000);
    assert!(log_dir.is_dir());

    let mut events = system.events.subscribe();
    let status = system.status();
    assert!(status.running);
    assert_eq!(status.environment, "test");
    assert_eq!(status.ps_log_dir.as_deref(), Some(log_dir.as_path()));
    assert_eq!(status.event_subscribers, 1);

    system
        .tower
        .agent_discovered("PLT1", AgentCategory::Platform)
        .unwrap();
    settle().await;
    let event = tokio::time::timeout(std::time::Duration::from_secs(2), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.name, "platform.status_updated");
    assert_eq!(event.context["current"]["plt_id"], "PLT1");

    system.stop().await.unwrap();
    assert!(!system.is_running());
    assert!(system.tower.is_closed());
    // Stopping twice is harmless
    system.stop().await.unwrap();
}

#[tokio::test]
async fn test_bootstrap_rejects_invalid_configuration() {
    let config_dir = TempDir::new().unwrap();
    fs::write(
        config_dir.path().join("tower.toml"),
        "[timing]\nhalf_margin_ms = 0\n",
    )
    .unwrap();

    let result = TowerBootstrap::bootstrap(
        Arc::new(ScriptedMessaging::new()),
        BootstrapConfig {
            config_directory: Some(config_dir.path().to_path_buf()),
            environment_override: Some("test".to_string()),
        },
    )
    .await;

    let err = result.err().expect("zero half margin is refused");
    assert!(err.to_string().contains("failed to load tower configuration"));
}
