//! Audio-reactive mode
//!
//! - [`capture`] - capture contract ([`AudioCapture`], [`SpectrumSource`])
//! - [`engine`] - start/stop state machine and frame loop
//! - [`synthetic`] - tone generator input, for dry runs
//! - `cpal_capture` - microphone input (requires `audio` feature)

pub mod capture;
#[cfg(feature = "audio")]
pub mod cpal_capture;
pub mod engine;
pub mod synthetic;

pub use capture::{AudioCapture, CaptureError, SpectrumSource};
#[cfg(feature = "audio")]
pub use cpal_capture::CpalCapture;
pub use engine::{AudioEngineState, AudioReactiveEngine, EngineConfig, EnginePhase};
pub use synthetic::{SyntheticCapture, Tone};
