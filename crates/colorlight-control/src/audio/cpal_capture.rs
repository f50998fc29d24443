//! Microphone capture through cpal
//!
//! `cpal::Stream` is not `Send` on every platform, so each capture owns a
//! dedicated thread that builds the stream, keeps it alive and drops it when
//! told to stop. The audio callback mixes to mono and feeds a shared
//! [`SpectrumAnalyzer`]; reads only snapshot the analyzer.

use super::capture::{AudioCapture, CaptureError, SpectrumSource};
use colorlight_core::{AnalyzerConfig, SpectrumAnalyzer, SpectrumFrame};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Sender};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};

/// Captures the default input device
#[derive(Debug, Clone, Default)]
pub struct CpalCapture {
    analyzer: AnalyzerConfig,
}

impl CpalCapture {
    /// `analyzer.sample_rate` is replaced by the device rate on open
    pub fn new(analyzer: AnalyzerConfig) -> Self {
        Self { analyzer }
    }
}

impl AudioCapture for CpalCapture {
    fn open(&self) -> BoxFuture<'_, Result<Box<dyn SpectrumSource>, CaptureError>> {
        let analyzer_config = self.analyzer.clone();
        Box::pin(async move {
            let (ready_tx, ready_rx) = bounded(1);
            let (stop_tx, stop_rx) = bounded::<()>(1);

            let thread = std::thread::Builder::new()
                .name("colorlight-capture".to_string())
                .spawn(move || {
                    let stream = match build_stream(analyzer_config) {
                        Ok((stream, analyzer)) => {
                            let _ = ready_tx.send(Ok(analyzer));
                            stream
                        }
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };
                    // Blocks until stop is sent or the source is dropped
                    let _ = stop_rx.recv();
                    drop(stream);
                    debug!("Capture stream closed");
                })
                .map_err(|e| CaptureError::Stream(e.to_string()))?;

            let startup = tokio::task::spawn_blocking(move || ready_rx.recv())
                .await
                .map_err(|e| CaptureError::Stream(e.to_string()))?
                .map_err(|_| CaptureError::Stream("capture thread exited".to_string()))?;

            match startup {
                Ok(analyzer) => Ok(Box::new(CpalSource {
                    analyzer,
                    stop: Some(stop_tx),
                    thread: Some(thread),
                }) as Box<dyn SpectrumSource>),
                Err(e) => {
                    let _ = thread.join();
                    Err(e)
                }
            }
        })
    }
}

type SharedAnalyzer = Arc<Mutex<SpectrumAnalyzer>>;

fn build_stream(
    mut analyzer_config: AnalyzerConfig,
) -> Result<(cpal::Stream, SharedAnalyzer), CaptureError> {
    let host = cpal::default_host();
    let device = host.default_input_device().ok_or(CaptureError::NoDevice)?;
    if let Ok(name) = device.name() {
        info!("Using audio input device: {}", name);
    }

    let supported = device.default_input_config().map_err(|e| match e {
        cpal::DefaultStreamConfigError::DeviceNotAvailable => CaptureError::NoDevice,
        other => CaptureError::Denied(other.to_string()),
    })?;
    let channels = supported.channels().max(1) as usize;
    analyzer_config.sample_rate = supported.sample_rate().0;
    debug!(
        "Input config: {} Hz, {} channels, {:?}",
        analyzer_config.sample_rate,
        channels,
        supported.sample_format()
    );

    let analyzer = Arc::new(Mutex::new(SpectrumAnalyzer::new(analyzer_config)));
    let config: cpal::StreamConfig = supported.config();
    let err_fn = |err: cpal::StreamError| error!("Audio stream error: {}", err);

    let stream = match supported.sample_format() {
        cpal::SampleFormat::F32 => {
            let sink = analyzer.clone();
            device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    feed(&sink, data, channels, |s| s)
                },
                err_fn,
                None,
            )
        }
        cpal::SampleFormat::I16 => {
            let sink = analyzer.clone();
            device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    feed(&sink, data, channels, |s| s as f32 / i16::MAX as f32)
                },
                err_fn,
                None,
            )
        }
        cpal::SampleFormat::U16 => {
            let sink = analyzer.clone();
            device.build_input_stream(
                &config,
                move |data: &[u16], _: &cpal::InputCallbackInfo| {
                    feed(&sink, data, channels, |s| s as f32 / 32768.0 - 1.0)
                },
                err_fn,
                None,
            )
        }
        other => {
            warn!("Unsupported sample format: {:?}", other);
            return Err(CaptureError::Stream(format!(
                "unsupported sample format {:?}",
                other
            )));
        }
    }
    .map_err(|e| match e {
        cpal::BuildStreamError::DeviceNotAvailable => CaptureError::NoDevice,
        cpal::BuildStreamError::BackendSpecific { err } => CaptureError::Denied(err.to_string()),
        other => CaptureError::Stream(other.to_string()),
    })?;

    stream
        .play()
        .map_err(|e| CaptureError::Stream(e.to_string()))?;
    info!("Audio capture started");
    Ok((stream, analyzer))
}

/// Mix interleaved frames to mono and feed the analyzer
fn feed<T: Copy>(sink: &SharedAnalyzer, data: &[T], channels: usize, to_f32: impl Fn(T) -> f32) {
    let mono: Vec<f32> = data
        .chunks(channels)
        .map(|frame| frame.iter().map(|&s| to_f32(s)).sum::<f32>() / frame.len() as f32)
        .collect();
    sink.lock().process_samples(&mono);
}

struct CpalSource {
    analyzer: SharedAnalyzer,
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl SpectrumSource for CpalSource {
    fn read_frame(&mut self) -> Option<SpectrumFrame> {
        self.stop.as_ref()?;
        Some(self.analyzer.lock().frame())
    }

    fn close(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Capture thread panicked");
            }
        }
    }
}

impl Drop for CpalSource {
    fn drop(&mut self) {
        self.close();
    }
}
