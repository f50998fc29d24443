//! Audio-to-color synthesis.
//!
//! [`AudioColorizer`] consumes one [`SpectrumFrame`] per animation frame and
//! produces the RGB triple to show on the fixtures. It owns the rolling state
//! the effects need between frames (previous volume for beat detection, hue
//! cursor for the rainbow scroll, current palette slot).

use crate::color::{hsl_to_rgb, Hsl, Rgb};
use crate::spectrum::{SpectrumFrame, MAX_MAGNITUDE};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::trace;

/// Audio-reactive effect algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EffectMode {
    /// Base color dimmed by overall volume
    #[default]
    Brightness,
    /// Low / mid / high thirds drive red / green / blue
    Frequency,
    /// Dominant pitch class picks the hue
    MusicalScale,
    /// Volume spikes step through a palette
    Beat,
    /// Volume scrolls a hue cursor
    Rainbow,
}

impl EffectMode {
    /// All modes, in UI order
    pub const ALL: [EffectMode; 5] = [
        EffectMode::Brightness,
        EffectMode::Frequency,
        EffectMode::MusicalScale,
        EffectMode::Beat,
        EffectMode::Rainbow,
    ];

    /// Whether the mode reads the configured base color
    pub fn uses_base_color(self) -> bool {
        self == EffectMode::Brightness
    }
}

impl fmt::Display for EffectMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EffectMode::Brightness => "brightness",
            EffectMode::Frequency => "frequency",
            EffectMode::MusicalScale => "musicalScale",
            EffectMode::Beat => "beat",
            EffectMode::Rainbow => "rainbow",
        };
        f.write_str(name)
    }
}

/// Sensitivity on a 1..=10 scale, mapped linearly onto a 0.5x - 2.0x gain
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Sensitivity(u8);

impl Sensitivity {
    /// Lowest accepted step
    pub const MIN: u8 = 1;
    /// Highest accepted step
    pub const MAX: u8 = 10;
    /// Gain at [`Sensitivity::MIN`]
    pub const MIN_GAIN: f32 = 0.5;
    /// Gain at [`Sensitivity::MAX`]
    pub const MAX_GAIN: f32 = 2.0;

    /// Clamp `step` into the accepted range
    pub fn new(step: u8) -> Self {
        Self(step.clamp(Self::MIN, Self::MAX))
    }

    /// Raw step value
    pub fn step(self) -> u8 {
        self.0
    }

    /// Gain multiplier for this step
    pub fn gain(self) -> f32 {
        let t = (self.0 - Self::MIN) as f32 / (Self::MAX - Self::MIN) as f32;
        Self::MIN_GAIN + t * (Self::MAX_GAIN - Self::MIN_GAIN)
    }
}

impl Default for Sensitivity {
    fn default() -> Self {
        Self(5)
    }
}

impl TryFrom<u8> for Sensitivity {
    type Error = String;

    fn try_from(step: u8) -> Result<Self, Self::Error> {
        if (Self::MIN..=Self::MAX).contains(&step) {
            Ok(Self(step))
        } else {
            Err(format!(
                "sensitivity {} outside {}..={}",
                step,
                Self::MIN,
                Self::MAX
            ))
        }
    }
}

impl From<Sensitivity> for u8 {
    fn from(s: Sensitivity) -> Self {
        s.0
    }
}

/// A pitch class tracked by the musical-scale effect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitchClass {
    /// Display name
    pub name: String,
    /// Center frequencies, one per tracked octave (Hz)
    pub center_hz: Vec<f32>,
    /// Hue emitted when this pitch class dominates (degrees)
    pub hue: f32,
}

impl PitchClass {
    fn new(name: &str, center_hz: [f32; 2], hue: f32) -> Self {
        Self {
            name: name.to_string(),
            center_hz: center_hz.to_vec(),
            hue,
        }
    }
}

/// Tuning for the musical-scale (pitch-class) detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MusicalScaleConfig {
    /// Tracked pitch classes, C4..B5
    pub notes: Vec<PitchClass>,
    /// Half-width of the peak window around each center, in bins
    pub narrow_half_width: usize,
    /// Width of the noise window on each side beyond the peak window, in bins
    pub surround_width: usize,
    /// Centers below this frequency belong to the low octave (Hz)
    pub low_octave_split_hz: f32,
    /// Weight applied to low-octave contrast
    pub low_octave_weight: f32,
    /// Weight applied to high-octave contrast
    pub high_octave_weight: f32,
    /// Winning score must exceed this to light up
    pub activity_floor: f32,
}

impl Default for MusicalScaleConfig {
    fn default() -> Self {
        Self {
            notes: vec![
                PitchClass::new("C", [261.6, 523.3], 0.0),
                PitchClass::new("D", [293.7, 587.3], 30.0),
                PitchClass::new("E", [329.6, 659.3], 60.0),
                PitchClass::new("F", [349.2, 698.5], 120.0),
                PitchClass::new("G", [392.0, 784.0], 180.0),
                PitchClass::new("A", [440.0, 880.0], 240.0),
                PitchClass::new("B", [493.9, 987.8], 280.0),
            ],
            narrow_half_width: 3,
            surround_width: 10,
            low_octave_split_hz: 520.0,
            low_octave_weight: 1.5,
            high_octave_weight: 1.0,
            activity_floor: 10.0,
        }
    }
}

/// Tuning for the beat effect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeatConfig {
    /// A beat needs `volume > previous * threshold`
    pub threshold: f32,
    /// A beat also needs `volume > volume_floor`
    pub volume_floor: f32,
    /// Colors cycled on each beat
    pub palette: Vec<Rgb>,
}

impl Default for BeatConfig {
    fn default() -> Self {
        Self {
            threshold: 1.3,
            volume_floor: 50.0,
            palette: vec![
                Rgb::new(255, 0, 0),
                Rgb::new(255, 165, 0),
                Rgb::new(255, 255, 0),
                Rgb::new(0, 255, 0),
                Rgb::new(0, 255, 255),
                Rgb::new(0, 0, 255),
                Rgb::new(138, 43, 226),
            ],
        }
    }
}

/// Tuning for the rainbow effect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RainbowConfig {
    /// Hue only advances above this volume
    pub volume_floor: f32,
    /// Hue advance per frame is `volume / hue_step_divisor` degrees
    pub hue_step_divisor: f32,
    /// Brightness never drops below this fraction
    pub min_brightness: f32,
}

impl Default for RainbowConfig {
    fn default() -> Self {
        Self {
            volume_floor: 20.0,
            hue_step_divisor: 50.0,
            min_brightness: 0.3,
        }
    }
}

/// Full audio-reactive configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioReactiveConfig {
    /// Initial sensitivity step
    pub sensitivity: Sensitivity,
    /// Initial effect mode
    pub mode: EffectMode,
    /// Base color for brightness mode
    pub base_color: Rgb,
    /// Musical-scale tuning
    pub musical_scale: MusicalScaleConfig,
    /// Beat tuning
    pub beat: BeatConfig,
    /// Rainbow tuning
    pub rainbow: RainbowConfig,
}

impl Default for AudioReactiveConfig {
    fn default() -> Self {
        Self {
            sensitivity: Sensitivity::default(),
            mode: EffectMode::default(),
            base_color: Rgb::RED,
            musical_scale: MusicalScaleConfig::default(),
            beat: BeatConfig::default(),
            rainbow: RainbowConfig::default(),
        }
    }
}

/// Result of one analysed frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameOutput {
    /// Mean magnitude before gain
    pub raw_volume: f32,
    /// Gain-adjusted, clamped volume (`0.0..=MAX_MAGNITUDE`)
    pub adjusted_volume: f32,
    /// Color to send
    pub color: Rgb,
}

/// Per-frame audio-to-color synthesizer
#[derive(Debug, Clone)]
pub struct AudioColorizer {
    config: AudioReactiveConfig,
    previous_volume: f32,
    hue_cursor: f32,
    palette_index: usize,
}

impl AudioColorizer {
    /// Create a colorizer in its initial state
    pub fn new(config: AudioReactiveConfig) -> Self {
        Self {
            config,
            previous_volume: 0.0,
            hue_cursor: 0.0,
            palette_index: 0,
        }
    }

    /// Current configuration
    pub fn config(&self) -> &AudioReactiveConfig {
        &self.config
    }

    /// Current effect mode
    pub fn mode(&self) -> EffectMode {
        self.config.mode
    }

    /// Switch effect mode
    pub fn set_mode(&mut self, mode: EffectMode) {
        self.config.mode = mode;
    }

    /// Current sensitivity
    pub fn sensitivity(&self) -> Sensitivity {
        self.config.sensitivity
    }

    /// Set sensitivity
    pub fn set_sensitivity(&mut self, sensitivity: Sensitivity) {
        self.config.sensitivity = sensitivity;
    }

    /// Set the base color used by brightness mode
    pub fn set_base_color(&mut self, color: Rgb) {
        self.config.base_color = color;
    }

    /// Current palette slot of the beat effect
    pub fn palette_index(&self) -> usize {
        self.palette_index
    }

    /// Current rainbow hue cursor (degrees)
    pub fn hue_cursor(&self) -> f32 {
        self.hue_cursor
    }

    /// Adjusted volume recorded by the last beat-mode frame
    pub fn previous_volume(&self) -> f32 {
        self.previous_volume
    }

    /// Forget rolling state (used when capture restarts)
    pub fn reset(&mut self) {
        self.previous_volume = 0.0;
        self.hue_cursor = 0.0;
        self.palette_index = 0;
    }

    /// Analyse one frame and compute its color
    pub fn process(&mut self, frame: &SpectrumFrame) -> FrameOutput {
        let gain = self.config.sensitivity.gain();
        let raw_volume = frame.mean_magnitude();
        let adjusted_volume = (raw_volume * gain).clamp(0.0, MAX_MAGNITUDE);

        let color = match self.config.mode {
            EffectMode::Brightness => self
                .config
                .base_color
                .scale(adjusted_volume / MAX_MAGNITUDE),
            EffectMode::Frequency => frequency_color(frame, gain),
            EffectMode::MusicalScale => self.musical_scale_color(frame, gain),
            EffectMode::Beat => self.beat_color(adjusted_volume),
            EffectMode::Rainbow => self.rainbow_color(adjusted_volume),
        };

        trace!(
            "frame: mode={} raw={:.1} adjusted={:.1} -> {}",
            self.config.mode,
            raw_volume,
            adjusted_volume,
            color
        );

        FrameOutput {
            raw_volume,
            adjusted_volume,
            color,
        }
    }

    /// Index of the dominant pitch class and its score, if any note scored.
    pub fn dominant_pitch_class(&self, frame: &SpectrumFrame) -> Option<(usize, f32)> {
        let tuning = &self.config.musical_scale;
        let mut best: Option<(usize, f32)> = None;

        for (index, note) in tuning.notes.iter().enumerate() {
            let score: f32 = note
                .center_hz
                .iter()
                .map(|&hz| {
                    let weight = if hz < tuning.low_octave_split_hz {
                        tuning.low_octave_weight
                    } else {
                        tuning.high_octave_weight
                    };
                    peak_contrast(frame, hz, tuning) * weight
                })
                .sum();

            // Strictly greater: earlier notes win ties, nothing wins at zero
            if score > best.map_or(0.0, |(_, s)| s) {
                best = Some((index, score));
            }
        }

        best
    }

    fn musical_scale_color(&self, frame: &SpectrumFrame, gain: f32) -> Rgb {
        let tuning = &self.config.musical_scale;
        match self.dominant_pitch_class(frame) {
            Some((index, score)) if score > tuning.activity_floor => {
                let hue = tuning.notes[index].hue;
                let brightness = (score * gain / MAX_MAGNITUDE).min(1.0);
                hsl_to_rgb(Hsl::new(hue, 100.0, 50.0)).scale(brightness)
            }
            _ => Rgb::BLACK,
        }
    }

    fn beat_color(&mut self, volume: f32) -> Rgb {
        let beat = &self.config.beat;
        if beat.palette.is_empty() {
            self.previous_volume = volume;
            return Rgb::BLACK;
        }

        if volume > self.previous_volume * beat.threshold && volume > beat.volume_floor {
            self.palette_index = (self.palette_index + 1) % beat.palette.len();
        }
        self.previous_volume = volume;

        let slot = self.palette_index % beat.palette.len();
        beat.palette[slot].scale(volume / MAX_MAGNITUDE)
    }

    fn rainbow_color(&mut self, volume: f32) -> Rgb {
        let rainbow = &self.config.rainbow;
        if volume > rainbow.volume_floor {
            self.hue_cursor = (self.hue_cursor + volume / rainbow.hue_step_divisor) % 360.0;
        }

        let brightness = (volume / MAX_MAGNITUDE).max(rainbow.min_brightness);
        hsl_to_rgb(Hsl::new(self.hue_cursor, 100.0, 50.0)).scale(brightness)
    }
}

/// Low / mid / high thirds of the spectrum mapped onto r / g / b.
fn frequency_color(frame: &SpectrumFrame, gain: f32) -> Rgb {
    let n = frame.bin_count();
    let bounds = [0, n / 3, 2 * n / 3, n];
    let channel = |i: usize| {
        let mean = frame.mean_range(bounds[i], bounds[i + 1]);
        (mean * gain).round().clamp(0.0, MAX_MAGNITUDE) as u8
    };
    Rgb::new(channel(0), channel(1), channel(2))
}

/// Mean of the peak window minus mean of the surrounding noise windows.
fn peak_contrast(frame: &SpectrumFrame, center_hz: f32, tuning: &MusicalScaleConfig) -> f32 {
    let center = frame.bin_for_frequency(center_hz);
    let narrow = tuning.narrow_half_width as isize;
    let surround = tuning.surround_width as isize;

    let peak = window_mean(frame, center - narrow..=center + narrow);
    let Some(peak) = peak else {
        return 0.0;
    };

    let below = center - narrow - surround..=center - narrow - 1;
    let above = center + narrow + 1..=center + narrow + surround;
    let noise = window_mean_pair(frame, below, above).unwrap_or(0.0);

    (peak - noise).max(0.0)
}

fn window_mean(frame: &SpectrumFrame, bins: std::ops::RangeInclusive<isize>) -> Option<f32> {
    let (sum, count) = window_sum(frame, bins);
    (count > 0).then(|| sum / count as f32)
}

fn window_mean_pair(
    frame: &SpectrumFrame,
    first: std::ops::RangeInclusive<isize>,
    second: std::ops::RangeInclusive<isize>,
) -> Option<f32> {
    let (sum_a, count_a) = window_sum(frame, first);
    let (sum_b, count_b) = window_sum(frame, second);
    let count = count_a + count_b;
    (count > 0).then(|| (sum_a + sum_b) / count as f32)
}

/// Sum and count of the in-range bins of `bins`
fn window_sum(frame: &SpectrumFrame, bins: std::ops::RangeInclusive<isize>) -> (f32, usize) {
    let len = frame.magnitudes.len() as isize;
    bins.filter(|&bin| bin >= 0 && bin < len)
        .fold((0.0, 0), |(sum, count), bin| {
            (sum + frame.magnitudes[bin as usize], count + 1)
        })
}
