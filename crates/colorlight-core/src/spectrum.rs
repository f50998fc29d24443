//! Spectrum frames and the FFT analyzer that produces them
//!
//! Magnitudes are expressed on a byte scale (`0.0..=255.0`) where the analyzer's
//! decibel window is mapped linearly onto the full range. This is the scale the
//! audio-reactive thresholds are tuned for.

use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, trace};

/// Largest magnitude a bin can carry
pub const MAX_MAGNITUDE: f32 = 255.0;

/// One analysis frame: a fixed-length array of per-bin magnitudes
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumFrame {
    /// Magnitude per frequency bin, `0.0..=MAX_MAGNITUDE`
    pub magnitudes: Vec<f32>,
    /// Sample rate of the analysed signal (Hz)
    pub sample_rate: u32,
    /// FFT size the bins were produced with (bin count is half of it)
    pub fft_size: usize,
}

impl SpectrumFrame {
    /// Create a frame from raw magnitudes
    pub fn new(magnitudes: Vec<f32>, sample_rate: u32, fft_size: usize) -> Self {
        Self {
            magnitudes,
            sample_rate,
            fft_size,
        }
    }

    /// A silent frame with `fft_size / 2` bins
    pub fn silent(sample_rate: u32, fft_size: usize) -> Self {
        Self::new(vec![0.0; fft_size / 2], sample_rate, fft_size)
    }

    /// Number of frequency bins
    pub fn bin_count(&self) -> usize {
        self.magnitudes.len()
    }

    /// Width of one bin in Hz
    pub fn hz_per_bin(&self) -> f32 {
        self.sample_rate as f32 / self.fft_size.max(1) as f32
    }

    /// Bin index whose center is nearest to `frequency_hz`.
    ///
    /// May point past the end of the spectrum; callers bounds-check.
    pub fn bin_for_frequency(&self, frequency_hz: f32) -> isize {
        (frequency_hz / self.hz_per_bin()).round() as isize
    }

    /// Mean magnitude across all bins
    pub fn mean_magnitude(&self) -> f32 {
        if self.magnitudes.is_empty() {
            return 0.0;
        }
        self.magnitudes.iter().sum::<f32>() / self.magnitudes.len() as f32
    }

    /// Mean magnitude over `start..end`, or 0 for an empty/invalid range
    pub fn mean_range(&self, start: usize, end: usize) -> f32 {
        if start >= end || end > self.magnitudes.len() {
            return 0.0;
        }
        self.magnitudes[start..end].iter().sum::<f32>() / (end - start) as f32
    }
}

/// Configuration for [`SpectrumAnalyzer`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Sample rate from audio backend
    pub sample_rate: u32,
    /// FFT size (power of 2)
    pub fft_size: usize,
    /// Overlap ratio (0.0 - 1.0)
    pub overlap: f32,
    /// Temporal smoothing between FFT frames (0.0 - 1.0)
    pub smoothing: f32,
    /// Decibel value mapped to magnitude 0
    pub min_decibels: f32,
    /// Decibel value mapped to [`MAX_MAGNITUDE`]
    pub max_decibels: f32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            fft_size: 4096,
            overlap: 0.5,
            smoothing: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

/// FFT analyzer turning PCM samples into byte-scale spectrum frames
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    config: AnalyzerConfig,

    /// Ring buffer of the most recent `fft_size` samples
    input_buffer: Vec<f32>,
    buffer_write_pos: usize,
    samples_since_fft: usize,
    hop_size: usize,
    total_samples: u64,

    fft_buffer: Vec<Complex<f32>>,
    scratch_buffer: Vec<Complex<f32>>,
    window: Vec<f32>,

    /// Smoothed linear magnitudes (before decibel mapping)
    smoothed: Vec<f32>,
    /// Latest byte-scale output
    magnitudes: Vec<f32>,
    fft_count: u64,
}

impl SpectrumAnalyzer {
    /// Create a new analyzer
    pub fn new(config: AnalyzerConfig) -> Self {
        let fft_size = config.fft_size.max(2);
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        let half_size = fft_size / 2;
        let scratch_len = fft.get_inplace_scratch_len();
        let hop_size = (((1.0 - config.overlap) * fft_size as f32) as usize).max(1);

        // Pre-compute Hann window
        let window: Vec<f32> = (0..fft_size)
            .map(|i| {
                let t = i as f32 / (fft_size - 1) as f32;
                0.5 * (1.0 - (2.0 * std::f32::consts::PI * t).cos())
            })
            .collect();

        debug!(
            "SpectrumAnalyzer created: sample_rate={}, fft_size={}, hop_size={}",
            config.sample_rate, fft_size, hop_size
        );

        Self {
            fft,
            config: AnalyzerConfig { fft_size, ..config },
            input_buffer: vec![0.0; fft_size],
            buffer_write_pos: 0,
            samples_since_fft: 0,
            hop_size,
            total_samples: 0,
            fft_buffer: vec![Complex::new(0.0, 0.0); fft_size],
            scratch_buffer: vec![Complex::new(0.0, 0.0); scratch_len],
            window,
            smoothed: vec![0.0; half_size],
            magnitudes: vec![0.0; half_size],
            fft_count: 0,
        }
    }

    /// Analyzer configuration
    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Feed mono samples; runs an FFT every hop once the buffer is full.
    pub fn process_samples(&mut self, samples: &[f32]) {
        let fft_size = self.config.fft_size;
        for &sample in samples {
            // Non-finite samples would poison the smoothed spectrum forever
            let sample = if sample.is_finite() { sample } else { 0.0 };
            self.input_buffer[self.buffer_write_pos] = sample;
            self.buffer_write_pos = (self.buffer_write_pos + 1) % fft_size;
            self.samples_since_fft += 1;
            self.total_samples += 1;

            if self.samples_since_fft >= self.hop_size && self.total_samples >= fft_size as u64 {
                self.perform_fft();
                self.samples_since_fft = 0;
            }
        }
    }

    /// Snapshot of the latest spectrum
    pub fn frame(&self) -> SpectrumFrame {
        SpectrumFrame::new(
            self.magnitudes.clone(),
            self.config.sample_rate,
            self.config.fft_size,
        )
    }

    fn perform_fft(&mut self) {
        let fft_size = self.config.fft_size;
        self.fft_count += 1;

        // The write position is where we'll write NEXT, so data starts there
        for i in 0..fft_size {
            let src_idx = (self.buffer_write_pos + i) % fft_size;
            self.fft_buffer[i] = Complex::new(self.input_buffer[src_idx] * self.window[i], 0.0);
        }

        self.fft
            .process_with_scratch(&mut self.fft_buffer, &mut self.scratch_buffer);

        let norm = 1.0 / fft_size as f32;
        let smoothing = self.config.smoothing.clamp(0.0, 1.0);
        let db_range = (self.config.max_decibels - self.config.min_decibels).max(f32::EPSILON);

        for i in 0..self.smoothed.len() {
            let magnitude = self.fft_buffer[i].norm() * norm;
            self.smoothed[i] = self.smoothed[i] * smoothing + magnitude * (1.0 - smoothing);

            let db = 20.0 * self.smoothed[i].max(1e-12).log10();
            let scaled = (db - self.config.min_decibels) / db_range * MAX_MAGNITUDE;
            self.magnitudes[i] = scaled.clamp(0.0, MAX_MAGNITUDE).floor();
        }

        if self.fft_count % 100 == 0 {
            trace!("FFT #{}: bins={}", self.fft_count, self.magnitudes.len());
        }
    }
}
