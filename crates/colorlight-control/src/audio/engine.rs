//! Audio-reactive runtime
//!
//! [`AudioReactiveEngine`] owns the capture source and the frame loop. Each
//! tick reads a spectrum, runs it through the [`AudioColorizer`] and, at most
//! once per send interval, fans the color out to the current targets as
//! throttled, fire-and-forget writes.
//!
//! The engine stops itself when the input ends or the last fixture
//! disconnects. Every start bumps a generation counter and so does every
//! stop. The loop and each spawned write check it before acting, so nothing
//! computed after a stop ever reaches a fixture.

use super::capture::{AudioCapture, SpectrumSource};
use crate::dispatcher::{send_color, SendMode, SendOutcome};
use crate::error::{ControlError, Result};
use crate::registry::FixtureRegistry;
use crate::target::TargetSelector;
use colorlight_core::{AudioColorizer, AudioReactiveConfig, EffectMode, FrameOutput, Rgb, Sensitivity};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// Engine lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnginePhase {
    #[default]
    Stopped,
    /// Waiting for the capture device
    Starting,
    Running,
}

/// Loop timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Time between analysed frames
    pub frame_interval_ms: u64,
    /// Minimum time between deliveries to the fixtures
    pub send_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16,
            send_interval_ms: 50,
        }
    }
}

impl EngineConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    pub fn send_interval(&self) -> Duration {
        Duration::from_millis(self.send_interval_ms)
    }
}

/// Snapshot of the engine's settings and rolling state
#[derive(Debug, Clone, PartialEq)]
pub struct AudioEngineState {
    pub phase: EnginePhase,
    pub sensitivity: Sensitivity,
    pub mode: EffectMode,
    pub base_color: Rgb,
    pub previous_volume: f32,
    pub hue_cursor: f32,
    pub palette_index: usize,
    pub last_output: Option<FrameOutput>,
}

struct EngineShared {
    phase: EnginePhase,
    generation: u64,
    colorizer: AudioColorizer,
    source: Option<Box<dyn SpectrumSource>>,
    task: Option<JoinHandle<()>>,
    last_sent: Option<Instant>,
    last_output: Option<FrameOutput>,
}

impl EngineShared {
    /// Stop from inside the frame loop, which then exits on its own
    fn shut_down(&mut self) {
        self.phase = EnginePhase::Stopped;
        self.generation += 1;
        if let Some(mut source) = self.source.take() {
            source.close();
        }
        self.task = None;
    }
}

/// Drives fixtures from live audio
#[derive(Clone)]
pub struct AudioReactiveEngine {
    shared: Arc<Mutex<EngineShared>>,
    registry: FixtureRegistry,
    selector: Arc<RwLock<TargetSelector>>,
    config: EngineConfig,
}

impl AudioReactiveEngine {
    pub fn new(
        registry: FixtureRegistry,
        selector: Arc<RwLock<TargetSelector>>,
        config: EngineConfig,
        audio: AudioReactiveConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Mutex::new(EngineShared {
                phase: EnginePhase::Stopped,
                generation: 0,
                colorizer: AudioColorizer::new(audio),
                source: None,
                task: None,
                last_sent: None,
                last_output: None,
            })),
            registry,
            selector,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn phase(&self) -> EnginePhase {
        self.shared.lock().phase
    }

    pub fn is_running(&self) -> bool {
        self.phase() == EnginePhase::Running
    }

    pub fn state(&self) -> AudioEngineState {
        let shared = self.shared.lock();
        let colorizer = &shared.colorizer;
        AudioEngineState {
            phase: shared.phase,
            sensitivity: colorizer.sensitivity(),
            mode: colorizer.mode(),
            base_color: colorizer.config().base_color,
            previous_volume: colorizer.previous_volume(),
            hue_cursor: colorizer.hue_cursor(),
            palette_index: colorizer.palette_index(),
            last_output: shared.last_output,
        }
    }

    pub fn set_sensitivity(&self, sensitivity: Sensitivity) {
        self.shared.lock().colorizer.set_sensitivity(sensitivity);
        debug!("Audio sensitivity set to {}", sensitivity.step());
    }

    pub fn set_effect_mode(&self, mode: EffectMode) {
        self.shared.lock().colorizer.set_mode(mode);
        debug!("Audio effect mode set to {}", mode);
    }

    pub fn set_base_color(&self, color: Rgb) {
        self.shared.lock().colorizer.set_base_color(color);
    }

    /// Acquire audio input and start the frame loop.
    ///
    /// Fails with `InvalidState` unless stopped and with `CaptureDenied` if
    /// the input cannot be opened, in which case the engine is stopped again.
    pub async fn start(&self, capture: &dyn AudioCapture) -> Result<()> {
        let generation = {
            let mut shared = self.shared.lock();
            if shared.phase != EnginePhase::Stopped {
                return Err(ControlError::InvalidState(format!(
                    "audio engine is {:?}",
                    shared.phase
                )));
            }
            shared.phase = EnginePhase::Starting;
            shared.generation += 1;
            shared.generation
        };
        debug!("Audio engine starting");

        let opened = capture.open().await;

        let mut shared = self.shared.lock();
        if shared.generation != generation {
            // Stopped while waiting for the device
            if let Ok(mut source) = opened {
                source.close();
            }
            debug!("Audio engine start cancelled");
            return Ok(());
        }

        let source = match opened {
            Ok(source) => source,
            Err(e) => {
                shared.phase = EnginePhase::Stopped;
                warn!("Audio capture failed: {}", e);
                return Err(ControlError::CaptureDenied(e.to_string()));
            }
        };

        shared.source = Some(source);
        shared.last_sent = None;
        shared.phase = EnginePhase::Running;
        shared.task = Some(tokio::spawn(self.clone().run(generation)));
        info!(
            "Audio engine running ({} mode, sensitivity {})",
            shared.colorizer.mode(),
            shared.colorizer.sensitivity().step()
        );
        Ok(())
    }

    /// Stop the loop and release the audio input. Idempotent.
    pub fn stop(&self) {
        let (source, task) = {
            let mut shared = self.shared.lock();
            if shared.phase == EnginePhase::Stopped {
                return;
            }
            shared.phase = EnginePhase::Stopped;
            shared.generation += 1;
            (shared.source.take(), shared.task.take())
        };

        if let Some(mut source) = source {
            source.close();
        }
        if let Some(task) = task {
            task.abort();
        }
        info!("Audio engine stopped");
    }

    fn is_current(&self, generation: u64) -> bool {
        let shared = self.shared.lock();
        shared.generation == generation && shared.phase == EnginePhase::Running
    }

    async fn run(self, generation: u64) {
        let mut ticker = tokio::time::interval(self.config.frame_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let send_interval = self.config.send_interval();

        loop {
            ticker.tick().await;

            let fleet_empty = self.registry.is_empty();
            let delivery = {
                let mut shared = self.shared.lock();
                if shared.generation != generation || shared.phase != EnginePhase::Running {
                    break;
                }
                if fleet_empty {
                    info!("No fixtures connected; stopping audio engine");
                    shared.shut_down();
                    break;
                }
                let frame = shared.source.as_mut().and_then(|s| s.read_frame());
                let Some(frame) = frame else {
                    warn!("Audio input ended; stopping engine");
                    shared.shut_down();
                    break;
                };

                let output = shared.colorizer.process(&frame);
                shared.last_output = Some(output);

                let now = Instant::now();
                let due = shared
                    .last_sent
                    .map_or(true, |last| now.duration_since(last) >= send_interval);
                if due {
                    shared.last_sent = Some(now);
                    Some(output.color)
                } else {
                    None
                }
            };

            if let Some(color) = delivery {
                self.deliver(color, generation);
            }
        }
        debug!("Audio frame loop exited");
    }

    /// Fire-and-forget write to every current target
    fn deliver(&self, color: Rgb, generation: u64) {
        let targets = self.registry.resolve_targets(&self.selector.read());
        for fixture in targets {
            let engine = self.clone();
            tokio::spawn(async move {
                if !engine.is_current(generation) {
                    return;
                }
                match send_color(&fixture, color, SendMode::Throttled).await {
                    Ok(SendOutcome::Sent) => {}
                    Ok(SendOutcome::Skipped(reason)) => {
                        trace!("Fixture {}: audio frame skipped ({:?})", fixture.id(), reason)
                    }
                    Err(e) => warn!("Fixture {}: audio frame failed: {}", fixture.id(), e),
                }
            });
        }
    }
}
