//! Outbound writes
//!
//! Every write to a fixture goes through [`send_color`] or [`send_command`].
//! They apply the connectivity guard, the per-fixture in-flight guard and
//! (for throttled audio frames) redundant-color suppression, and they map
//! link errors onto [`ControlError`]. [`CommandDispatcher`] fans a write
//! out to the fixtures a [`TargetSelector`] resolves to.

use crate::error::{ControlError, Result};
use crate::fixture::{Fixture, FixtureCommand, FixtureId, PatternState};
use crate::link::LinkError;
use crate::registry::FixtureRegistry;
use crate::target::TargetSelector;
use colorlight_core::Rgb;
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// How a color write is being issued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendMode {
    /// User-initiated; always written
    Manual,
    /// Audio frame; skipped when the fixture already shows the color
    Throttled,
}

/// Why a write was not performed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The link reports no connection
    NotConnected,
    /// A previous color write has not finished
    WriteInFlight,
    /// Same as the last acknowledged color
    Unchanged,
    /// The link dropped during the write
    Disconnected,
}

/// Outcome of a single write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    Skipped(SkipReason),
}

impl SendOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, SendOutcome::Sent)
    }
}

/// Write a color to one fixture.
///
/// Drops the write (rather than queueing it) while another color write to
/// the same fixture is in flight. A lost link is reported as
/// `Skipped(Disconnected)`; any other failure is returned and not retried.
pub async fn send_color(fixture: &Fixture, color: Rgb, mode: SendMode) -> Result<SendOutcome> {
    if !fixture.is_connected() {
        return Ok(SendOutcome::Skipped(SkipReason::NotConnected));
    }
    if mode == SendMode::Throttled && fixture.last_color() == Some(color) {
        return Ok(SendOutcome::Skipped(SkipReason::Unchanged));
    }
    let Some(_guard) = fixture.try_begin_write() else {
        debug!("Fixture {}: write in flight, dropping {}", fixture.id(), color);
        return Ok(SendOutcome::Skipped(SkipReason::WriteInFlight));
    };

    let result = fixture.link().write_color(color.to_bytes()).await;
    let outcome = settle(fixture, result)?;
    if outcome.is_sent() {
        fixture.record_color(color);
        debug!("Fixture {}: sent {}", fixture.id(), color);
    }
    Ok(outcome)
}

/// Write a text command to one fixture and track the resulting pattern state
pub async fn send_command(fixture: &Fixture, command: FixtureCommand) -> Result<SendOutcome> {
    if !fixture.is_connected() {
        return Ok(SendOutcome::Skipped(SkipReason::NotConnected));
    }

    let payload = command.to_bytes();
    let result = fixture.link().write_command(&payload).await;
    let outcome = settle(fixture, result)?;
    if outcome.is_sent() {
        let pattern = match command {
            FixtureCommand::Auto(id) => PatternState::AutoRunning(id),
            FixtureCommand::Stop | FixtureCommand::Clear => PatternState::Idle,
        };
        fixture.set_pattern_state(pattern);
        debug!("Fixture {}: sent {}", fixture.id(), command);
    }
    Ok(outcome)
}

fn link_error(fixture: &Fixture, error: LinkError) -> ControlError {
    match error {
        LinkError::Disconnected => ControlError::LinkDisconnected(fixture.id().clone()),
        other => ControlError::TransportWrite {
            id: fixture.id().clone(),
            reason: other.to_string(),
        },
    }
}

/// Map a write result, swallowing a dropped link
fn settle(fixture: &Fixture, result: std::result::Result<(), LinkError>) -> Result<SendOutcome> {
    match result.map_err(|e| link_error(fixture, e)) {
        Ok(()) => Ok(SendOutcome::Sent),
        Err(ControlError::LinkDisconnected(id)) => {
            debug!("Fixture {}: link dropped during write", id);
            Ok(SendOutcome::Skipped(SkipReason::Disconnected))
        }
        Err(e) => Err(e),
    }
}

/// Per-fixture results of a fan-out, in target order
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub results: Vec<(FixtureId, Result<SendOutcome>)>,
}

impl DispatchReport {
    /// Number of fixtures the dispatch addressed
    pub fn targeted(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn sent(&self) -> usize {
        self.results
            .iter()
            .filter(|(_, r)| matches!(r, Ok(SendOutcome::Sent)))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.results
            .iter()
            .filter(|(_, r)| matches!(r, Ok(SendOutcome::Skipped(_))))
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&FixtureId, &ControlError)> {
        self.results
            .iter()
            .filter_map(|(id, r)| r.as_ref().err().map(|e| (id, e)))
    }

    pub fn all_ok(&self) -> bool {
        self.results.iter().all(|(_, r)| r.is_ok())
    }

    pub fn outcome(&self, id: &FixtureId) -> Option<&Result<SendOutcome>> {
        self.results.iter().find(|(i, _)| i == id).map(|(_, r)| r)
    }
}

/// Fans writes out to the fixtures a selector resolves to
#[derive(Clone)]
pub struct CommandDispatcher {
    registry: FixtureRegistry,
}

impl CommandDispatcher {
    pub fn new(registry: FixtureRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &FixtureRegistry {
        &self.registry
    }

    /// Run `action` against every target concurrently.
    ///
    /// Targets are resolved at call time. A failing fixture never stops the
    /// others; each result lands in the report.
    pub async fn dispatch_to_targets<F, Fut>(
        &self,
        selector: &TargetSelector,
        action: F,
    ) -> DispatchReport
    where
        F: Fn(Arc<Fixture>) -> Fut,
        Fut: Future<Output = Result<SendOutcome>>,
    {
        let targets = self.registry.resolve_targets(selector);
        if targets.is_empty() {
            debug!("Dispatch resolved no targets ({})", selector.mode());
            return DispatchReport::default();
        }
        self.dispatch_to(targets, action).await
    }

    /// Run `action` against the given fixtures concurrently
    pub async fn dispatch_to<F, Fut>(&self, targets: Vec<Arc<Fixture>>, action: F) -> DispatchReport
    where
        F: Fn(Arc<Fixture>) -> Fut,
        Fut: Future<Output = Result<SendOutcome>>,
    {
        let ids: Vec<FixtureId> = targets.iter().map(|f| f.id().clone()).collect();
        let outcomes = join_all(targets.into_iter().map(action)).await;

        let report = DispatchReport {
            results: ids.into_iter().zip(outcomes).collect(),
        };
        for (id, error) in report.failures() {
            warn!("Fixture {}: {}", id, error);
        }
        report
    }

    /// Write one color to every target
    pub async fn dispatch_color(
        &self,
        selector: &TargetSelector,
        color: Rgb,
        mode: SendMode,
    ) -> DispatchReport {
        self.dispatch_to_targets(selector, |fixture| async move {
            send_color(&fixture, color, mode).await
        })
        .await
    }

    /// Write one command to every target
    pub async fn dispatch_command(
        &self,
        selector: &TargetSelector,
        command: FixtureCommand,
    ) -> DispatchReport {
        self.dispatch_to_targets(selector, |fixture| async move {
            send_command(&fixture, command).await
        })
        .await
    }
}
