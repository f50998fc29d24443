//! In-process link transport
//!
//! [`LoopbackLink`] stands in for a radio link: it records every write,
//! can hold writes open, fail the next write, or drop the connection.
//! [`LoopbackConnector`] hands out queued loopback links on `connect`.
//! Used for dry runs without hardware and throughout the tests.

use super::{DisconnectCallback, DiscoveryFilter, LinkChannel, LinkConnector, LinkError, LinkHandle};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

/// One recorded write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkWrite {
    Color([u8; 3]),
    Command(String),
}

/// Loopback link
pub struct LoopbackLink {
    name: String,
    connected: AtomicBool,
    writes: Mutex<Vec<LinkWrite>>,
    fail_next: Mutex<Option<LinkError>>,
    hold: Mutex<Option<Arc<Semaphore>>>,
    callbacks: Mutex<Vec<DisconnectCallback>>,
}

impl LoopbackLink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connected: AtomicBool::new(true),
            writes: Mutex::new(Vec::new()),
            fail_next: Mutex::new(None),
            hold: Mutex::new(None),
            callbacks: Mutex::new(Vec::new()),
        }
    }

    /// All writes so far, in invocation order
    pub fn writes(&self) -> Vec<LinkWrite> {
        self.writes.lock().clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().len()
    }

    /// Colors written so far
    pub fn colors(&self) -> Vec<[u8; 3]> {
        self.writes
            .lock()
            .iter()
            .filter_map(|w| match w {
                LinkWrite::Color(rgb) => Some(*rgb),
                LinkWrite::Command(_) => None,
            })
            .collect()
    }

    /// Commands written so far
    pub fn commands(&self) -> Vec<String> {
        self.writes
            .lock()
            .iter()
            .filter_map(|w| match w {
                LinkWrite::Command(cmd) => Some(cmd.clone()),
                LinkWrite::Color(_) => None,
            })
            .collect()
    }

    pub fn clear_writes(&self) {
        self.writes.lock().clear();
    }

    /// Fail the next write with `error`
    pub fn fail_next_write(&self, error: LinkError) {
        *self.fail_next.lock() = Some(error);
    }

    /// Keep subsequent writes pending until [`LoopbackLink::release_writes`]
    pub fn hold_writes(&self) {
        *self.hold.lock() = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let every held write complete
    pub fn release_writes(&self) {
        if let Some(gate) = self.hold.lock().take() {
            gate.close();
        }
    }

    /// Drop the connection as if the fixture went out of range
    pub fn simulate_disconnect(&self) {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return;
        }
        debug!("Loopback link '{}' disconnected", self.name);
        let callbacks = std::mem::take(&mut *self.callbacks.lock());
        for callback in callbacks {
            callback();
        }
    }

    async fn complete_write(&self, gate: Option<Arc<Semaphore>>) -> Result<(), LinkError> {
        if let Some(gate) = gate {
            // Closed on release; no permits are ever added
            let _ = gate.acquire().await;
        }
        if !self.connected.load(Ordering::SeqCst) {
            return Err(LinkError::Disconnected);
        }
        match self.fail_next.lock().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl LinkChannel for LoopbackLink {
    fn advertised_name(&self) -> String {
        self.name.clone()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn write_color(&self, rgb: [u8; 3]) -> BoxFuture<'_, Result<(), LinkError>> {
        self.writes.lock().push(LinkWrite::Color(rgb));
        let gate = self.hold.lock().clone();
        Box::pin(self.complete_write(gate))
    }

    fn write_command<'a>(&'a self, command: &'a [u8]) -> BoxFuture<'a, Result<(), LinkError>> {
        self.writes
            .lock()
            .push(LinkWrite::Command(String::from_utf8_lossy(command).into_owned()));
        let gate = self.hold.lock().clone();
        Box::pin(self.complete_write(gate))
    }

    fn on_disconnected(&self, callback: DisconnectCallback) {
        if self.is_connected() {
            self.callbacks.lock().push(callback);
        } else {
            callback();
        }
    }

    fn disconnect(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move { self.simulate_disconnect() })
    }
}

/// Hands out queued loopback links
#[derive(Default)]
pub struct LoopbackConnector {
    queue: Mutex<VecDeque<Arc<LoopbackLink>>>,
    deny: Mutex<Option<String>>,
}

impl LoopbackConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a device available for discovery
    pub fn add_device(&self, link: Arc<LoopbackLink>) {
        self.queue.lock().push_back(link);
    }

    /// Queue a fresh device and return its link
    pub fn add_named(&self, name: &str) -> Arc<LoopbackLink> {
        let link = Arc::new(LoopbackLink::new(name));
        self.add_device(link.clone());
        link
    }

    /// Refuse the next connect attempt
    pub fn deny_next(&self, reason: impl Into<String>) {
        *self.deny.lock() = Some(reason.into());
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }
}

impl LinkConnector for LoopbackConnector {
    fn connect<'a>(
        &'a self,
        filter: &'a DiscoveryFilter,
    ) -> BoxFuture<'a, Result<LinkHandle, LinkError>> {
        Box::pin(async move {
            if let Some(reason) = self.deny.lock().take() {
                return Err(LinkError::Denied(reason));
            }
            let mut queue = self.queue.lock();
            let position = queue
                .iter()
                .position(|link| filter.matches(&link.name))
                .ok_or(LinkError::NotFound)?;
            let link = queue.remove(position).ok_or(LinkError::NotFound)?;
            Ok(link as LinkHandle)
        })
    }
}
