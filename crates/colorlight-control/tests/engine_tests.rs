mod common;

use colorlight_control::{
    AudioReactiveEngine, ControlError, EngineConfig, EnginePhase, FixtureId, FixtureRegistry,
    TargetSelector,
};
use colorlight_core::{AudioReactiveConfig, EffectMode, Rgb};
use common::{add_fixture, flat_frame, ScriptedCapture};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

fn engine_with(registry: &FixtureRegistry, mode: EffectMode) -> AudioReactiveEngine {
    AudioReactiveEngine::new(
        registry.clone(),
        Arc::new(RwLock::new(TargetSelector::all())),
        EngineConfig::default(),
        AudioReactiveConfig {
            mode,
            ..AudioReactiveConfig::default()
        },
    )
}

async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn test_start_and_stop() {
    let registry = FixtureRegistry::new();
    let (_, link) = add_fixture(&registry, "1");
    let engine = engine_with(&registry, EffectMode::Brightness);
    let capture = ScriptedCapture::new(flat_frame(100.0));

    assert_eq!(engine.phase(), EnginePhase::Stopped);
    engine.start(&capture).await.unwrap();
    assert_eq!(engine.phase(), EnginePhase::Running);

    advance(100).await;
    assert!(capture.reads() > 0);
    // Constant input: one write, the rest suppressed as unchanged
    assert_eq!(link.write_count(), 1);
    let expected = Rgb::RED.scale(engine.state().last_output.unwrap().adjusted_volume / 255.0);
    assert_eq!(link.colors(), vec![expected.to_bytes()]);

    engine.stop();
    assert_eq!(engine.phase(), EnginePhase::Stopped);
    assert!(capture.is_closed());

    // Stopping twice is harmless
    engine.stop();
}

#[tokio::test(start_paused = true)]
async fn test_start_twice_rejected() {
    let registry = FixtureRegistry::new();
    let engine = engine_with(&registry, EffectMode::Brightness);
    let capture = ScriptedCapture::new(flat_frame(50.0));

    engine.start(&capture).await.unwrap();
    let err = engine.start(&capture).await.unwrap_err();
    assert!(matches!(err, ControlError::InvalidState(_)));
    assert_eq!(capture.opened.load(std::sync::atomic::Ordering::SeqCst), 1);

    engine.stop();
}

#[tokio::test(start_paused = true)]
async fn test_capture_denied_returns_to_stopped() {
    let registry = FixtureRegistry::new();
    let engine = engine_with(&registry, EffectMode::Brightness);

    let err = engine.start(&ScriptedCapture::denied()).await.unwrap_err();
    assert!(matches!(err, ControlError::CaptureDenied(_)));
    assert_eq!(engine.phase(), EnginePhase::Stopped);

    // A later attempt can still succeed
    engine
        .start(&ScriptedCapture::new(flat_frame(50.0)))
        .await
        .unwrap();
    assert_eq!(engine.phase(), EnginePhase::Running);
    engine.stop();
}

#[tokio::test(start_paused = true)]
async fn test_deliveries_are_throttled() {
    let registry = FixtureRegistry::new();
    let (_, link) = add_fixture(&registry, "1");
    // Rainbow changes color every frame, so nothing is suppressed as unchanged
    let engine = engine_with(&registry, EffectMode::Rainbow);
    let capture = ScriptedCapture::new(flat_frame(100.0));

    engine.start(&capture).await.unwrap();
    advance(1000).await;
    engine.stop();

    let frames = capture.reads();
    let writes = link.write_count();
    assert!(frames >= 50, "only {frames} frames analysed");
    assert!(writes >= 10, "only {writes} writes");
    assert!(writes <= 21, "{writes} writes in one second");
    assert!(writes < frames);
}

#[tokio::test(start_paused = true)]
async fn test_stop_mid_frame_releases_capture() {
    let registry = FixtureRegistry::new();
    let (fixture, link) = add_fixture(&registry, "1");
    let engine = engine_with(&registry, EffectMode::Rainbow);
    let capture = ScriptedCapture::new(flat_frame(100.0));

    link.hold_writes();
    engine.start(&capture).await.unwrap();
    advance(40).await;
    assert_eq!(link.write_count(), 1);

    engine.stop();
    let reads_at_stop = capture.reads();
    assert!(capture.is_closed());

    link.release_writes();
    advance(500).await;

    assert_eq!(capture.reads(), reads_at_stop);
    assert_eq!(link.write_count(), 1);
    assert_eq!(engine.phase(), EnginePhase::Stopped);
    assert!(fixture.last_color().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_ended_input_stops_engine() {
    let registry = FixtureRegistry::new();
    add_fixture(&registry, "1");
    let engine = engine_with(&registry, EffectMode::Brightness);
    let capture = ScriptedCapture::new(flat_frame(100.0)).ending_after(3);

    engine.start(&capture).await.unwrap();
    advance(200).await;

    assert_eq!(capture.reads(), 3);
    assert_eq!(engine.phase(), EnginePhase::Stopped);
    assert!(capture.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_last_fixture_leaving_stops_engine() {
    let registry = FixtureRegistry::new();
    add_fixture(&registry, "1");
    add_fixture(&registry, "2");
    let engine = engine_with(&registry, EffectMode::Rainbow);
    let capture = ScriptedCapture::new(flat_frame(100.0));

    engine.start(&capture).await.unwrap();
    advance(40).await;

    // One fixture left: keeps running
    registry.unregister(&FixtureId::new("1"));
    advance(40).await;
    assert!(engine.is_running());

    registry.unregister(&FixtureId::new("2"));
    advance(40).await;
    assert_eq!(engine.phase(), EnginePhase::Stopped);
    assert!(capture.is_closed());

    let reads_at_stop = capture.reads();
    advance(200).await;
    assert_eq!(capture.reads(), reads_at_stop);
}

#[tokio::test(start_paused = true)]
async fn test_settings_apply_while_running() {
    let registry = FixtureRegistry::new();
    let (_, link) = add_fixture(&registry, "1");
    let engine = engine_with(&registry, EffectMode::Brightness);
    let capture = ScriptedCapture::new(flat_frame(255.0));

    engine.set_base_color(Rgb::new(0, 0, 255));
    engine.start(&capture).await.unwrap();
    advance(30).await;
    assert_eq!(link.colors().last(), Some(&[0, 0, 255]));

    engine.set_base_color(Rgb::new(0, 255, 0));
    advance(100).await;
    assert_eq!(link.colors().last(), Some(&[0, 255, 0]));

    engine.set_sensitivity(colorlight_core::Sensitivity::new(9));
    assert_eq!(engine.state().sensitivity.step(), 9);
    engine.stop();
}
