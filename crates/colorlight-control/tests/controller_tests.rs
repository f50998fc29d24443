mod common;

use colorlight_control::{
    ControlError, ControlMode, ControllerConfig, FixtureId, GroupLabel, LightController,
    LinkChannel, LinkError, LoopbackConnector, LoopbackLink, PatternState, TargetMode,
};
use colorlight_core::{hsl_to_rgb, EffectMode, Hsl, Rgb};
use common::{flat_frame, ScriptedCapture};
use std::sync::Arc;
use std::time::Duration;

async fn connected(names: &[&str]) -> (LightController, Vec<Arc<LoopbackLink>>) {
    let controller = LightController::new(ControllerConfig::default());
    let connector = LoopbackConnector::new();
    let mut links = Vec::new();
    for name in names {
        links.push(connector.add_named(name));
        controller.connect(&connector).await.unwrap().unwrap();
    }
    for link in &links {
        link.clear_writes();
    }
    (controller, links)
}

#[tokio::test]
async fn test_connect_registers_and_sends_initial_red() {
    let controller = LightController::new(ControllerConfig::default());
    let connector = LoopbackConnector::new();
    let link = connector.add_named("Colorlight-7");

    let fixture = controller.connect(&connector).await.unwrap().unwrap();
    assert_eq!(fixture.id().as_str(), "7");
    assert_eq!(fixture.name(), "Colorlight-7");
    assert_eq!(link.colors(), vec![[255, 0, 0]]);
    assert_eq!(fixture.last_color(), Some(Rgb::RED));
    assert_eq!(controller.registry().ids(), vec![FixtureId::new("7")]);
}

#[tokio::test]
async fn test_connect_outcomes() {
    let controller = LightController::new(ControllerConfig::default());
    let connector = LoopbackConnector::new();

    // Nothing to pick: not an error
    assert!(controller.connect(&connector).await.unwrap().is_none());

    connector.add_named("Colorlight");
    connector.deny_next("Bluetooth adapter off");
    let err = controller.connect(&connector).await.unwrap_err();
    assert!(matches!(err, ControlError::Connect(LinkError::Denied(_))));

    let legacy = controller.connect(&connector).await.unwrap().unwrap();
    assert_eq!(legacy.id().as_str(), "default");
}

#[tokio::test]
async fn test_duplicate_connect_rejected() {
    let (controller, links) = connected(&["Colorlight-3"]).await;
    let connector = LoopbackConnector::new();
    let second = connector.add_named("Colorlight-3");

    let err = controller.connect(&connector).await.unwrap_err();
    assert!(matches!(err, ControlError::AlreadyRegistered(id) if id.as_str() == "3"));
    assert_eq!(controller.registry().len(), 1);
    assert_eq!(second.write_count(), 0);
    assert!(links[0].is_connected());
}

#[tokio::test]
async fn test_link_loss_unregisters_fixture() {
    let (controller, links) = connected(&["Colorlight-1", "Colorlight-2"]).await;
    controller.assign_group(&FixtureId::new("1"), Some(GroupLabel::B));

    links[0].simulate_disconnect();

    assert_eq!(controller.registry().ids(), vec![FixtureId::new("2")]);
    assert_eq!(controller.registry().group_of(&FixtureId::new("1")), None);

    controller.apply_current_color().await;
    assert_eq!(links[0].write_count(), 0);
    assert_eq!(links[1].write_count(), 1);
}

#[tokio::test]
async fn test_disconnect_closes_link() {
    let (controller, links) = connected(&["Colorlight-1"]).await;

    controller.disconnect(&FixtureId::new("1")).await;
    assert!(controller.registry().is_empty());
    assert!(!links[0].is_connected());

    // Unknown ids are ignored
    controller.disconnect(&FixtureId::new("1")).await;
}

#[tokio::test]
async fn test_reconnect_after_loss_gets_fresh_state() {
    let controller = LightController::new(ControllerConfig::default());
    let connector = LoopbackConnector::new();
    let old = connector.add_named("Colorlight-5");
    controller.connect(&connector).await.unwrap();
    controller.assign_group(&FixtureId::new("5"), Some(GroupLabel::C));
    old.simulate_disconnect();

    connector.add_named("Colorlight-5");
    let fresh = controller.connect(&connector).await.unwrap().unwrap();
    assert_eq!(controller.registry().group_of(fresh.id()), None);
    assert_eq!(controller.registry().len(), 1);
}

#[tokio::test]
async fn test_individual_target_receives_color() {
    let (controller, links) = connected(&["Colorlight-1", "Colorlight-2"]).await;
    controller.set_target_mode(TargetMode::Individual);

    // Nothing chosen yet
    assert!(controller.apply_current_color().await.is_empty());

    controller.select_fixture(Some(FixtureId::new("2")));
    controller.set_hex("#0000ff");
    let report = controller.apply_current_color().await;

    assert_eq!(report.sent(), 1);
    assert_eq!(links[0].write_count(), 0);
    assert_eq!(links[1].colors(), vec![[0, 0, 255]]);
}

#[tokio::test]
async fn test_hex_input() {
    let controller = LightController::new(ControllerConfig::default());
    assert_eq!(controller.current_rgb(), Rgb::RED);

    assert!(controller.set_hex("#0000FF"));
    assert_eq!(controller.current_hex(), "#0000ff");

    assert!(!controller.set_hex("blue"));
    assert_eq!(controller.current_hex(), "#0000ff");
}

#[tokio::test]
async fn test_auto_requires_targets() {
    let controller = LightController::new(ControllerConfig::default());
    let err = controller.start_auto(1).await.unwrap_err();
    assert!(matches!(err, ControlError::NoTargets));
}

#[tokio::test]
async fn test_auto_and_clear() {
    let (controller, links) = connected(&["Colorlight-1", "Colorlight-2"]).await;
    controller.assign_group(&FixtureId::new("1"), Some(GroupLabel::A));
    controller.set_target_mode(TargetMode::Group);

    controller.start_auto(2).await.unwrap();
    let first = controller.fixture(&FixtureId::new("1")).unwrap();
    assert_eq!(first.pattern_state(), PatternState::AutoRunning(2));

    controller.set_target_mode(TargetMode::All);
    controller.clear().await;

    assert_eq!(links[0].commands(), vec!["AUTO:2", "STOP", "CLEAR"]);
    assert_eq!(links[1].commands(), vec!["CLEAR"]);
    assert_eq!(first.pattern_state(), PatternState::Idle);
}

#[tokio::test]
async fn test_switch_mode_stops_running_patterns() {
    let (controller, links) = connected(&["Colorlight-1", "Colorlight-2"]).await;
    controller.set_target_mode(TargetMode::Individual);
    controller.select_fixture(Some(FixtureId::new("1")));
    controller.start_auto(3).await.unwrap();

    // Patterns keep running in auto mode
    controller.switch_mode(ControlMode::Auto).await;
    assert_eq!(links[0].commands(), vec!["AUTO:3"]);

    // Color mode stops them regardless of the current target
    controller.select_fixture(Some(FixtureId::new("2")));
    let report = controller.switch_mode(ControlMode::Color).await;
    assert_eq!(report.sent(), 1);
    assert_eq!(links[0].commands(), vec!["AUTO:3", "STOP"]);
    assert!(links[1].commands().is_empty());
    assert_eq!(controller.mode(), ControlMode::Color);
}

#[tokio::test(start_paused = true)]
async fn test_music_mode_lifecycle() {
    let (controller, links) = connected(&["Colorlight-1"]).await;
    controller.set_effect_mode(EffectMode::Brightness);
    controller.set_base_color(Rgb::new(0, 255, 0));
    let capture = ScriptedCapture::new(flat_frame(255.0));

    controller.switch_mode(ControlMode::Music).await;
    controller.start_music(&capture).await.unwrap();
    assert!(controller.is_music_running());

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(links[0].colors(), vec![[0, 255, 0]]);

    // Leaving music mode stops the engine and releases the microphone
    controller.switch_mode(ControlMode::Auto).await;
    assert!(!controller.is_music_running());
    assert!(capture.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_losing_every_fixture_ends_music() {
    let (controller, links) = connected(&["Colorlight-1"]).await;
    let capture = ScriptedCapture::new(flat_frame(120.0));

    controller.switch_mode(ControlMode::Music).await;
    controller.start_music(&capture).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(controller.is_music_running());

    links[0].simulate_disconnect();
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert!(!controller.is_music_running());
    assert!(capture.is_closed());
}

#[tokio::test]
async fn test_music_requires_targets() {
    let controller = LightController::new(ControllerConfig::default());
    let capture = ScriptedCapture::new(flat_frame(0.0));
    let err = controller.start_music(&capture).await.unwrap_err();
    assert!(matches!(err, ControlError::NoTargets));
    assert_eq!(capture.opened.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_sensitivity_is_clamped() {
    let controller = LightController::new(ControllerConfig::default());
    controller.set_sensitivity(42);
    assert_eq!(controller.audio_state().sensitivity.step(), 10);
    controller.set_sensitivity(0);
    assert_eq!(controller.audio_state().sensitivity.step(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_debounced_color_sends_last_value_once() {
    let (controller, links) = connected(&["Colorlight-1", "Colorlight-2"]).await;

    for hue in [10.0, 20.0, 30.0, 40.0, 50.0] {
        controller.set_hsl(Hsl::new(hue, 100.0, 50.0));
        controller.apply_color_debounced();
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    assert!(links[0].colors().is_empty());

    tokio::time::sleep(Duration::from_millis(200)).await;

    let expected = hsl_to_rgb(Hsl::new(50.0, 100.0, 50.0)).to_bytes();
    assert_eq!(links[0].colors(), vec![expected]);
    assert_eq!(links[1].colors(), vec![expected]);
}
