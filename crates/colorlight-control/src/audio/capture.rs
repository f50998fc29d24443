//! Audio capture contract

use colorlight_core::SpectrumFrame;
use futures::future::BoxFuture;
use thiserror::Error;

/// Capture errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// The platform or user refused access to the microphone
    #[error("Microphone access denied: {0}")]
    Denied(String),

    /// No input device is available
    #[error("No audio input device found")]
    NoDevice,

    /// The device exists but the stream could not be set up
    #[error("Audio stream error: {0}")]
    Stream(String),
}

/// A live source of spectrum frames
pub trait SpectrumSource: Send {
    /// Latest spectrum, or `None` once the source has been closed
    fn read_frame(&mut self) -> Option<SpectrumFrame>;

    /// Release the underlying device. Further reads return `None`.
    fn close(&mut self);
}

/// Opens spectrum sources
pub trait AudioCapture: Send + Sync {
    /// Acquire the input device and start analysing it
    fn open(&self) -> BoxFuture<'_, Result<Box<dyn SpectrumSource>, CaptureError>>;
}
