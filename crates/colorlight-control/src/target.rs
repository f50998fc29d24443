//! Target selection
//!
//! A [`TargetSelector`] says which fixtures a command addresses. It only
//! remembers the choice; the registry turns it into concrete fixtures at
//! dispatch time.

use crate::fixture::{FixtureId, GroupLabel};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Addressing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetMode {
    /// Every registered fixture
    #[default]
    All,
    /// Fixtures assigned to the selected group
    Group,
    /// The selected fixture only
    Individual,
}

impl fmt::Display for TargetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetMode::All => f.write_str("all"),
            TargetMode::Group => f.write_str("group"),
            TargetMode::Individual => f.write_str("individual"),
        }
    }
}

/// Addressing mode plus the remembered group and fixture choices
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TargetSelector {
    mode: TargetMode,
    group: Option<GroupLabel>,
    fixture: Option<FixtureId>,
}

impl TargetSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selector addressing every fixture
    pub fn all() -> Self {
        Self::default()
    }

    /// Selector addressing one group
    pub fn group(label: GroupLabel) -> Self {
        Self {
            mode: TargetMode::Group,
            group: Some(label),
            fixture: None,
        }
    }

    /// Selector addressing one fixture
    pub fn individual(id: FixtureId) -> Self {
        Self {
            mode: TargetMode::Individual,
            group: None,
            fixture: Some(id),
        }
    }

    pub fn mode(&self) -> TargetMode {
        self.mode
    }

    /// Switch addressing mode. Entering group mode without a chosen group
    /// selects group A.
    pub fn set_mode(&mut self, mode: TargetMode) {
        self.mode = mode;
        if mode == TargetMode::Group && self.group.is_none() {
            self.group = Some(GroupLabel::A);
        }
    }

    /// Group addressed in group mode
    pub fn selected_group(&self) -> GroupLabel {
        self.group.unwrap_or_default()
    }

    pub fn select_group(&mut self, label: GroupLabel) {
        self.group = Some(label);
    }

    /// Fixture addressed in individual mode, if one was chosen
    pub fn selected_fixture(&self) -> Option<&FixtureId> {
        self.fixture.as_ref()
    }

    pub fn select_fixture(&mut self, id: Option<FixtureId>) {
        self.fixture = id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_mode_defaults_to_a() {
        let mut selector = TargetSelector::new();
        assert_eq!(selector.mode(), TargetMode::All);

        selector.set_mode(TargetMode::Group);
        assert_eq!(selector.selected_group(), GroupLabel::A);
    }

    #[test]
    fn test_choices_survive_mode_switches() {
        let mut selector = TargetSelector::new();
        selector.select_group(GroupLabel::C);
        selector.select_fixture(Some(FixtureId::new("2")));

        selector.set_mode(TargetMode::Individual);
        selector.set_mode(TargetMode::Group);
        assert_eq!(selector.selected_group(), GroupLabel::C);
        assert_eq!(selector.selected_fixture(), Some(&FixtureId::new("2")));
    }

    #[test]
    fn test_mode_serde_names() {
        let json = serde_json::to_string(&TargetMode::Individual).unwrap();
        assert_eq!(json, "\"individual\"");
    }
}
