//! Light controller facade
//!
//! Ties the registry, target selection, dispatcher, debounce gate and audio
//! engine together into the operations a front end drives: connect and
//! disconnect fixtures, pick targets, set colors, run patterns and switch
//! between color, pattern and music modes.

use crate::audio::{AudioCapture, AudioEngineState, AudioReactiveEngine};
use crate::config::ControllerConfig;
use crate::debounce::DebounceGate;
use crate::dispatcher::{send_color, send_command, CommandDispatcher, DispatchReport, SendMode};
use crate::error::{ControlError, Result};
use crate::fixture::{Fixture, FixtureCommand, FixtureId, GroupLabel, PatternId};
use crate::link::{DiscoveryFilter, LinkConnector, LinkError};
use crate::registry::FixtureRegistry;
use crate::target::{TargetMode, TargetSelector};
use colorlight_core::{hex_to_rgb, hsl_to_rgb, rgb_to_hex, rgb_to_hsl, EffectMode, Hsl, Rgb, Sensitivity};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Which panel of the controller is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlMode {
    /// Manual color
    #[default]
    Color,
    /// Patterns running on the fixtures
    Auto,
    /// Audio-reactive
    Music,
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlMode::Color => f.write_str("color"),
            ControlMode::Auto => f.write_str("auto"),
            ControlMode::Music => f.write_str("music"),
        }
    }
}

/// Controls a fleet of fixtures
pub struct LightController {
    config: ControllerConfig,
    filter: DiscoveryFilter,
    registry: FixtureRegistry,
    selector: Arc<RwLock<TargetSelector>>,
    dispatcher: CommandDispatcher,
    debounce: DebounceGate,
    engine: AudioReactiveEngine,
    color: Arc<Mutex<Hsl>>,
    mode: Mutex<ControlMode>,
}

impl LightController {
    pub fn new(config: ControllerConfig) -> Self {
        let registry = FixtureRegistry::new();
        let selector = Arc::new(RwLock::new(TargetSelector::new()));
        let engine = AudioReactiveEngine::new(
            registry.clone(),
            selector.clone(),
            config.engine.clone(),
            config.audio.clone(),
        );
        Self {
            filter: DiscoveryFilter::default(),
            dispatcher: CommandDispatcher::new(registry.clone()),
            debounce: DebounceGate::new(config.debounce_interval()),
            registry,
            selector,
            engine,
            color: Arc::new(Mutex::new(Hsl::default())),
            mode: Mutex::new(ControlMode::Color),
            config,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn registry(&self) -> &FixtureRegistry {
        &self.registry
    }

    pub fn engine(&self) -> &AudioReactiveEngine {
        &self.engine
    }

    /// Look up a connected fixture
    pub fn fixture(&self, id: &FixtureId) -> Result<Arc<Fixture>> {
        self.registry.get(id).ok_or(ControlError::NotFound)
    }

    // --- Connection ---

    /// Discover and connect one fixture.
    ///
    /// Returns `Ok(None)` when nothing was found or the user cancelled the
    /// device picker. The new fixture is sent the initial color.
    pub async fn connect(&self, connector: &dyn LinkConnector) -> Result<Option<Arc<Fixture>>> {
        let link = match connector.connect(&self.filter).await {
            Ok(link) => link,
            Err(LinkError::NotFound) => {
                debug!("No fixture selected");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let name = link.advertised_name();
        let id = FixtureId::from_advertised_name(&name);
        let fixture = self.registry.register(id, name, link.clone())?;

        let registry = self.registry.clone();
        let weak = Arc::downgrade(&fixture);
        link.on_disconnected(Box::new(move || {
            if let Some(fixture) = weak.upgrade() {
                info!("Fixture {} disconnected", fixture.id());
                registry.unregister_fixture(&fixture);
            }
        }));

        match send_color(&fixture, self.config.initial_color, SendMode::Manual).await {
            Ok(_) => info!(
                "Connected {} (initial color {})",
                fixture.name(),
                self.config.initial_color
            ),
            Err(e) => warn!("Connected {} but initial color failed: {}", fixture.name(), e),
        }
        Ok(Some(fixture))
    }

    /// Close a fixture's link and forget it. Unknown ids are ignored.
    pub async fn disconnect(&self, id: &FixtureId) {
        if let Some(fixture) = self.registry.get(id) {
            if fixture.is_connected() {
                fixture.link().disconnect().await;
            }
        }
        self.registry.unregister(id);
    }

    // --- Targeting ---

    pub fn selector(&self) -> TargetSelector {
        self.selector.read().clone()
    }

    pub fn set_target_mode(&self, mode: TargetMode) {
        self.selector.write().set_mode(mode);
    }

    pub fn select_group(&self, group: GroupLabel) {
        self.selector.write().select_group(group);
    }

    pub fn select_fixture(&self, id: Option<FixtureId>) {
        self.selector.write().select_fixture(id);
    }

    pub fn assign_group(&self, id: &FixtureId, group: Option<GroupLabel>) {
        self.registry.assign_group(id, group);
    }

    /// Fixtures the current selection addresses
    pub fn targets(&self) -> Vec<Arc<Fixture>> {
        self.registry.resolve_targets(&self.selector.read())
    }

    // --- Manual color ---

    pub fn set_hsl(&self, hsl: Hsl) {
        *self.color.lock() = hsl;
    }

    /// Set the current color from `#rrggbb`. Invalid input leaves the color
    /// unchanged and returns `false`.
    pub fn set_hex(&self, hex: &str) -> bool {
        match hex_to_rgb(hex) {
            Ok(rgb) => {
                self.set_hsl(rgb_to_hsl(rgb));
                true
            }
            Err(e) => {
                warn!("Ignoring color input: {}", e);
                false
            }
        }
    }

    pub fn current_hsl(&self) -> Hsl {
        *self.color.lock()
    }

    pub fn current_rgb(&self) -> Rgb {
        hsl_to_rgb(self.current_hsl())
    }

    pub fn current_hex(&self) -> String {
        rgb_to_hex(self.current_rgb())
    }

    /// Send the current color to the targets now
    pub async fn apply_current_color(&self) -> DispatchReport {
        let selector = self.selector();
        self.dispatcher
            .dispatch_color(&selector, self.current_rgb(), SendMode::Manual)
            .await
    }

    /// Send the current color once input has settled. Color and targets are
    /// read when the send fires, not when it is scheduled.
    pub fn apply_color_debounced(&self) {
        let dispatcher = self.dispatcher.clone();
        let selector = self.selector.clone();
        let color = self.color.clone();
        self.debounce.schedule(async move {
            let rgb = hsl_to_rgb(*color.lock());
            let targets = selector.read().clone();
            let report = dispatcher
                .dispatch_color(&targets, rgb, SendMode::Manual)
                .await;
            debug!("Debounced {}: {}/{} sent", rgb, report.sent(), report.targeted());
        });
    }

    // --- Patterns ---

    /// Start a stored pattern on every target
    pub async fn start_auto(&self, pattern: PatternId) -> Result<DispatchReport> {
        let selector = self.selector();
        if self.registry.resolve_targets(&selector).is_empty() {
            return Err(ControlError::NoTargets);
        }
        let report = self
            .dispatcher
            .dispatch_command(&selector, FixtureCommand::Auto(pattern))
            .await;
        info!("Pattern {} started on {} fixture(s)", pattern, report.sent());
        Ok(report)
    }

    /// Stop patterns on every target
    pub async fn stop_auto(&self) -> DispatchReport {
        let selector = self.selector();
        self.dispatcher
            .dispatch_command(&selector, FixtureCommand::Stop)
            .await
    }

    /// Turn the targets off, stopping any running pattern first
    pub async fn clear(&self) -> DispatchReport {
        let selector = self.selector();
        self.dispatcher
            .dispatch_to_targets(&selector, |fixture| async move {
                if fixture.pattern_state().is_running() {
                    send_command(&fixture, FixtureCommand::Stop).await?;
                }
                send_command(&fixture, FixtureCommand::Clear).await
            })
            .await
    }

    // --- Modes ---

    pub fn mode(&self) -> ControlMode {
        *self.mode.lock()
    }

    /// Switch panels. Color and music mode stop every running pattern;
    /// leaving music mode stops the audio engine.
    pub async fn switch_mode(&self, mode: ControlMode) -> DispatchReport {
        *self.mode.lock() = mode;
        info!("Switched to {} mode", mode);

        if mode != ControlMode::Music {
            self.engine.stop();
        }

        if mode == ControlMode::Auto {
            return DispatchReport::default();
        }

        let running: Vec<Arc<Fixture>> = self
            .registry
            .fixtures()
            .into_iter()
            .filter(|f| f.pattern_state().is_running())
            .collect();
        if running.is_empty() {
            return DispatchReport::default();
        }
        self.dispatcher
            .dispatch_to(running, |fixture| async move {
                send_command(&fixture, FixtureCommand::Stop).await
            })
            .await
    }

    // --- Music ---

    /// Start the audio engine on `capture`
    pub async fn start_music(&self, capture: &dyn AudioCapture) -> Result<()> {
        if self.targets().is_empty() {
            return Err(ControlError::NoTargets);
        }
        self.engine.start(capture).await
    }

    pub fn stop_music(&self) {
        self.engine.stop();
    }

    pub fn is_music_running(&self) -> bool {
        self.engine.is_running()
    }

    /// Sensitivity on the 1..=10 scale; out-of-range steps are clamped
    pub fn set_sensitivity(&self, step: u8) {
        self.engine.set_sensitivity(Sensitivity::new(step));
    }

    pub fn set_effect_mode(&self, mode: EffectMode) {
        self.engine.set_effect_mode(mode);
    }

    pub fn set_base_color(&self, color: Rgb) {
        self.engine.set_base_color(color);
    }

    pub fn audio_state(&self) -> AudioEngineState {
        self.engine.state()
    }
}

impl Drop for LightController {
    fn drop(&mut self) {
        self.engine.stop();
    }
}
