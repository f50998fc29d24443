//! Colorlight Core - Color model and audio-to-color synthesis
//!
//! This crate contains the pure, I/O-free parts of Colorlight:
//! - HSL / RGB / hex conversions used by every color path
//! - Spectrum frames and the FFT analyzer that produces them
//! - The per-frame audio-reactive color synthesis (five effect modes)
//! - Logging configuration shared by the binaries

#![warn(missing_docs)]

pub mod audio_reactive;
pub mod color;
pub mod logging;
pub mod spectrum;

// --- Re-exports grouped by category ---

// Color
pub use color::{hex_to_rgb, hsl_to_rgb, rgb_to_hex, rgb_to_hsl, ColorError, Hsl, Rgb};

// Audio
pub use audio_reactive::{
    AudioColorizer, AudioReactiveConfig, BeatConfig, EffectMode, FrameOutput, MusicalScaleConfig,
    PitchClass, RainbowConfig, Sensitivity,
};
pub use spectrum::{AnalyzerConfig, SpectrumAnalyzer, SpectrumFrame, MAX_MAGNITUDE};

// Logging
pub use logging::LogConfig;
