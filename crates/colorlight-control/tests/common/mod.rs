#![allow(dead_code)]

use colorlight_control::{
    AudioCapture, CaptureError, Fixture, FixtureId, FixtureRegistry, LoopbackLink, SpectrumSource,
};
use colorlight_core::SpectrumFrame;
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Register a loopback fixture named `Colorlight-<id>`
pub fn add_fixture(registry: &FixtureRegistry, id: &str) -> (Arc<Fixture>, Arc<LoopbackLink>) {
    let name = format!("Colorlight-{}", id);
    let link = Arc::new(LoopbackLink::new(name.clone()));
    let fixture = registry
        .register(FixtureId::new(id), name, link.clone())
        .unwrap();
    (fixture, link)
}

/// A standalone fixture on a loopback link
pub fn lone_fixture() -> (Arc<Fixture>, Arc<LoopbackLink>) {
    let link = Arc::new(LoopbackLink::new("Colorlight-1"));
    let fixture = Arc::new(Fixture::new(
        FixtureId::new("1"),
        "Colorlight-1",
        link.clone(),
    ));
    (fixture, link)
}

/// Flat spectrum with every bin at `level`
pub fn flat_frame(level: f32) -> SpectrumFrame {
    SpectrumFrame::new(vec![level; 2048], 48000, 4096)
}

/// Capture that replays one frame and counts reads
#[derive(Clone)]
pub struct ScriptedCapture {
    pub reads: Arc<AtomicUsize>,
    pub closed: Arc<AtomicBool>,
    pub opened: Arc<AtomicUsize>,
    frame: SpectrumFrame,
    frame_limit: Option<usize>,
    deny: bool,
}

impl ScriptedCapture {
    pub fn new(frame: SpectrumFrame) -> Self {
        Self {
            reads: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicBool::new(false)),
            opened: Arc::new(AtomicUsize::new(0)),
            frame,
            frame_limit: None,
            deny: false,
        }
    }

    /// Source ends after `limit` frames
    pub fn ending_after(mut self, limit: usize) -> Self {
        self.frame_limit = Some(limit);
        self
    }

    /// Opening fails as if the microphone permission was refused
    pub fn denied() -> Self {
        let mut capture = Self::new(flat_frame(0.0));
        capture.deny = true;
        capture
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl AudioCapture for ScriptedCapture {
    fn open(&self) -> BoxFuture<'_, Result<Box<dyn SpectrumSource>, CaptureError>> {
        Box::pin(async move {
            if self.deny {
                return Err(CaptureError::Denied("permission refused".to_string()));
            }
            self.opened.fetch_add(1, Ordering::SeqCst);
            self.closed.store(false, Ordering::SeqCst);
            Ok(Box::new(ScriptedSource {
                capture: self.clone(),
                served: 0,
            }) as Box<dyn SpectrumSource>)
        })
    }
}

struct ScriptedSource {
    capture: ScriptedCapture,
    served: usize,
}

impl SpectrumSource for ScriptedSource {
    fn read_frame(&mut self) -> Option<SpectrumFrame> {
        if self.capture.is_closed() {
            return None;
        }
        if self.capture.frame_limit.is_some_and(|limit| self.served >= limit) {
            return None;
        }
        self.served += 1;
        self.capture.reads.fetch_add(1, Ordering::SeqCst);
        Some(self.capture.frame.clone())
    }

    fn close(&mut self) {
        self.capture.closed.store(true, Ordering::SeqCst);
    }
}
