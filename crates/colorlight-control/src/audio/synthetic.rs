//! Synthetic audio input
//!
//! Generates a sum of sine tones and runs it through a real
//! [`SpectrumAnalyzer`]. Lets the audio path run without a microphone.

use super::capture::{AudioCapture, CaptureError, SpectrumSource};
use colorlight_core::{AnalyzerConfig, SpectrumAnalyzer, SpectrumFrame};
use futures::future::BoxFuture;
use std::f32::consts::TAU;

/// A tone in the synthetic signal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency_hz: f32,
    pub amplitude: f32,
}

impl Tone {
    pub fn new(frequency_hz: f32, amplitude: f32) -> Self {
        Self {
            frequency_hz,
            amplitude,
        }
    }
}

/// Capture that synthesizes its input
#[derive(Debug, Clone)]
pub struct SyntheticCapture {
    tones: Vec<Tone>,
    analyzer: AnalyzerConfig,
    /// Samples generated per `read_frame`
    block_size: usize,
}

impl SyntheticCapture {
    pub fn new(tones: Vec<Tone>, analyzer: AnalyzerConfig) -> Self {
        // One block per ~16 ms frame
        let block_size = (analyzer.sample_rate as usize / 60).max(1);
        Self {
            tones,
            analyzer,
            block_size,
        }
    }
}

impl AudioCapture for SyntheticCapture {
    fn open(&self) -> BoxFuture<'_, Result<Box<dyn SpectrumSource>, CaptureError>> {
        Box::pin(async move {
            let source = SyntheticSource {
                tones: self.tones.clone(),
                sample_rate: self.analyzer.sample_rate as f32,
                block: vec![0.0; self.block_size],
                position: 0,
                analyzer: Some(SpectrumAnalyzer::new(self.analyzer.clone())),
            };
            Ok(Box::new(source) as Box<dyn SpectrumSource>)
        })
    }
}

struct SyntheticSource {
    tones: Vec<Tone>,
    sample_rate: f32,
    block: Vec<f32>,
    position: u64,
    analyzer: Option<SpectrumAnalyzer>,
}

impl SpectrumSource for SyntheticSource {
    fn read_frame(&mut self) -> Option<SpectrumFrame> {
        let analyzer = self.analyzer.as_mut()?;
        for sample in self.block.iter_mut() {
            let t = self.position as f32 / self.sample_rate;
            *sample = self
                .tones
                .iter()
                .map(|tone| tone.amplitude * (TAU * tone.frequency_hz * t).sin())
                .sum();
            self.position += 1;
        }
        analyzer.process_samples(&self.block);
        Some(analyzer.frame())
    }

    fn close(&mut self) {
        self.analyzer = None;
    }
}
