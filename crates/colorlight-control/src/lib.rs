//! Colorlight Control - Fleet coordination for wireless RGB fixtures
//!
//! This crate drives any number of connected Colorlight fixtures:
//! - **Fixtures**: identity, group membership and per-fixture write state
//! - **Targeting**: all fixtures, one group, or one fixture
//! - **Dispatch**: serialized, de-duplicated color and command writes with
//!   per-fixture failure isolation
//! - **Audio**: a frame loop that turns live audio into a throttled color
//!   stream
//!
//! ## Feature Flags
//!
//! - `audio` (default): microphone capture through `cpal`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use colorlight_control::{ControllerConfig, LightController, LoopbackConnector};
//!
//! # async fn demo() -> colorlight_control::Result<()> {
//! let controller = LightController::new(ControllerConfig::default());
//! let connector = LoopbackConnector::new();
//! connector.add_named("Colorlight-1");
//!
//! controller.connect(&connector).await?;
//! controller.set_hex("#00ff80");
//! controller.apply_current_color().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`fixture`] - Fixture model and command vocabulary
//! - [`link`] - Link contract and loopback transport
//! - [`registry`] - Connected fixtures and group assignments
//! - [`target`] - Target selection
//! - [`dispatcher`] - Guarded writes and fan-out
//! - [`debounce`] - Trailing-edge debounce for UI input
//! - [`audio`] - Audio capture and the audio-reactive engine
//! - [`controller`] - The facade tying it all together
//! - [`config`] - Configuration loading
//! - [`error`] - Error types

#![allow(missing_docs)]

/// Audio capture and audio-reactive engine
pub mod audio;
/// Controller configuration
pub mod config;
/// Light controller facade
pub mod controller;
/// Trailing-edge debounce
pub mod debounce;
/// Outbound writes and fan-out
pub mod dispatcher;
/// Error types
pub mod error;
/// Fixture model
pub mod fixture;
/// Link contract
pub mod link;
/// Fixture registry
pub mod registry;
/// Target selection
pub mod target;

// Re-exports
pub use audio::{
    AudioCapture, AudioEngineState, AudioReactiveEngine, CaptureError, EngineConfig, EnginePhase,
    SpectrumSource, SyntheticCapture, Tone,
};
#[cfg(feature = "audio")]
pub use audio::CpalCapture;
pub use config::ControllerConfig;
pub use controller::{ControlMode, LightController};
pub use debounce::DebounceGate;
pub use dispatcher::{
    send_color, send_command, CommandDispatcher, DispatchReport, SendMode, SendOutcome, SkipReason,
};
pub use error::{ControlError, Result};
pub use fixture::{
    Fixture, FixtureCommand, FixtureId, GroupLabel, PatternId, PatternState, WriteState,
};
pub use link::loopback::{LinkWrite, LoopbackConnector, LoopbackLink};
pub use link::{DiscoveryFilter, LinkChannel, LinkConnector, LinkError, LinkHandle};
pub use registry::FixtureRegistry;
pub use target::{TargetMode, TargetSelector};
