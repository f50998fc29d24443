//! Fixture model
//!
//! A [`Fixture`] is one connected light: its identifier, the link it is
//! reached through, and the small amount of mutable state the dispatcher
//! needs to serialize writes and suppress redundant ones.

use crate::link::LinkChannel;
use colorlight_core::Rgb;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

/// Advertised-name prefix of a numbered fixture
pub const NAME_PREFIX: &str = "Colorlight-";
/// Advertised name of an unnumbered fixture
pub const LEGACY_NAME: &str = "Colorlight";
/// Identifier given to an unnumbered fixture
pub const LEGACY_ID: &str = "default";

/// Fixture identifier, derived from the advertised name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FixtureId(String);

impl FixtureId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive the identifier from an advertised name.
    ///
    /// `"...Colorlight-<digits>..."` yields the digits, the bare legacy name
    /// yields `"default"`, anything else is used verbatim. The last two can
    /// collide between physical devices.
    pub fn from_advertised_name(name: &str) -> Self {
        if let Some(digits) = numbered_suffix(name) {
            return Self(digits.to_string());
        }

        if name == LEGACY_NAME {
            warn!(
                "Fixture advertises the legacy name '{}'; identifier '{}' is shared by all such fixtures",
                name, LEGACY_ID
            );
            return Self(LEGACY_ID.to_string());
        }

        warn!(
            "Fixture name '{}' carries no number; using the raw name as identifier",
            name
        );
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// First run of digits directly following the numbered prefix
fn numbered_suffix(name: &str) -> Option<&str> {
    name.match_indices(NAME_PREFIX).find_map(|(start, _)| {
        let rest = &name[start + NAME_PREFIX.len()..];
        let len = rest.bytes().take_while(u8::is_ascii_digit).count();
        (len > 0).then(|| &rest[..len])
    })
}

impl fmt::Display for FixtureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FixtureId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Group a fixture can be assigned to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GroupLabel {
    #[default]
    A,
    B,
    C,
}

impl GroupLabel {
    pub const ALL: [GroupLabel; 3] = [GroupLabel::A, GroupLabel::B, GroupLabel::C];
}

impl fmt::Display for GroupLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GroupLabel::A => "A",
            GroupLabel::B => "B",
            GroupLabel::C => "C",
        };
        f.write_str(label)
    }
}

impl FromStr for GroupLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(GroupLabel::A),
            "B" | "b" => Ok(GroupLabel::B),
            "C" | "c" => Ok(GroupLabel::C),
            other => Err(format!("Unknown group '{}'", other)),
        }
    }
}

/// Identifier of a preset pattern stored on the fixture
pub type PatternId = u8;

/// Text command understood by the fixture's control characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureCommand {
    /// Run a stored pattern autonomously
    Auto(PatternId),
    /// Stop the running pattern
    Stop,
    /// Turn the light off
    Clear,
}

impl FixtureCommand {
    /// ASCII payload written to the link
    pub fn to_bytes(self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for FixtureCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixtureCommand::Auto(pattern) => write!(f, "AUTO:{}", pattern),
            FixtureCommand::Stop => f.write_str("STOP"),
            FixtureCommand::Clear => f.write_str("CLEAR"),
        }
    }
}

/// Whether a color write is outstanding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteState {
    #[default]
    Idle,
    InFlight,
}

/// What the fixture is doing on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PatternState {
    #[default]
    Idle,
    AutoRunning(PatternId),
}

impl PatternState {
    pub fn is_running(&self) -> bool {
        matches!(self, PatternState::AutoRunning(_))
    }
}

#[derive(Debug, Default)]
struct FixtureState {
    write: WriteState,
    pattern: PatternState,
    last_color: Option<Rgb>,
}

/// A connected fixture
pub struct Fixture {
    id: FixtureId,
    name: String,
    link: Arc<dyn LinkChannel>,
    state: Mutex<FixtureState>,
}

impl Fixture {
    pub fn new(id: FixtureId, name: impl Into<String>, link: Arc<dyn LinkChannel>) -> Self {
        Self {
            id,
            name: name.into(),
            link,
            state: Mutex::new(FixtureState::default()),
        }
    }

    pub fn id(&self) -> &FixtureId {
        &self.id
    }

    /// Advertised name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn link(&self) -> &Arc<dyn LinkChannel> {
        &self.link
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    pub fn write_state(&self) -> WriteState {
        self.state.lock().write
    }

    pub fn pattern_state(&self) -> PatternState {
        self.state.lock().pattern
    }

    pub fn set_pattern_state(&self, pattern: PatternState) {
        self.state.lock().pattern = pattern;
    }

    /// Color of the last write the link confirmed
    pub fn last_color(&self) -> Option<Rgb> {
        self.state.lock().last_color
    }

    pub(crate) fn record_color(&self, color: Rgb) {
        self.state.lock().last_color = Some(color);
    }

    /// Claim the write slot.
    ///
    /// Returns `None` while another write is in flight. The slot is released
    /// when the guard drops, including when the write future is cancelled.
    pub fn try_begin_write(&self) -> Option<WriteGuard<'_>> {
        let mut state = self.state.lock();
        if state.write == WriteState::InFlight {
            return None;
        }
        state.write = WriteState::InFlight;
        Some(WriteGuard { fixture: self })
    }
}

impl fmt::Debug for Fixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Fixture")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("write", &state.write)
            .field("pattern", &state.pattern)
            .field("last_color", &state.last_color)
            .finish()
    }
}

/// Held for the duration of a color write
pub struct WriteGuard<'a> {
    fixture: &'a Fixture,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.fixture.state.lock().write = WriteState::Idle;
    }
}
