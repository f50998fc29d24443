//! Fixture registry
//!
//! The registry owns every connected [`Fixture`] and its group assignment.
//! It is a cheaply cloneable handle so disconnect callbacks and spawned
//! tasks can reach it. The lock is only ever held for map updates and
//! lookups, never across an await.

use crate::error::{ControlError, Result};
use crate::fixture::{Fixture, FixtureId, GroupLabel};
use crate::link::LinkHandle;
use crate::target::{TargetMode, TargetSelector};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Default)]
struct RegistryInner {
    /// Registration order
    fixtures: Vec<Arc<Fixture>>,
    groups: HashMap<FixtureId, GroupLabel>,
}

impl RegistryInner {
    fn position(&self, id: &FixtureId) -> Option<usize> {
        self.fixtures.iter().position(|f| f.id() == id)
    }
}

/// Shared handle to the set of connected fixtures
#[derive(Clone, Default)]
pub struct FixtureRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl FixtureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fixture. Fails without side effect if the identifier is taken.
    pub fn register(
        &self,
        id: FixtureId,
        name: impl Into<String>,
        link: LinkHandle,
    ) -> Result<Arc<Fixture>> {
        let mut inner = self.inner.write();
        if inner.position(&id).is_some() {
            return Err(ControlError::AlreadyRegistered(id));
        }
        let fixture = Arc::new(Fixture::new(id, name, link));
        inner.fixtures.push(fixture.clone());
        info!(
            "Registered fixture {} ({}), {} connected",
            fixture.id(),
            fixture.name(),
            inner.fixtures.len()
        );
        Ok(fixture)
    }

    /// Remove a fixture and its group assignment. Unknown ids are ignored.
    pub fn unregister(&self, id: &FixtureId) -> Option<Arc<Fixture>> {
        let mut inner = self.inner.write();
        let removed = inner.position(id).map(|pos| inner.fixtures.remove(pos));
        inner.groups.remove(id);
        if removed.is_some() {
            info!(
                "Unregistered fixture {}, {} connected",
                id,
                inner.fixtures.len()
            );
        }
        removed
    }

    /// Remove this exact fixture, leaving a newer registration under the
    /// same identifier alone.
    pub fn unregister_fixture(&self, fixture: &Arc<Fixture>) -> bool {
        let mut inner = self.inner.write();
        let Some(pos) = inner.fixtures.iter().position(|f| Arc::ptr_eq(f, fixture)) else {
            return false;
        };
        inner.fixtures.remove(pos);
        inner.groups.remove(fixture.id());
        info!(
            "Unregistered fixture {}, {} connected",
            fixture.id(),
            inner.fixtures.len()
        );
        true
    }

    /// Set or clear a fixture's group. No-op for unknown ids.
    pub fn assign_group(&self, id: &FixtureId, group: Option<GroupLabel>) {
        let mut inner = self.inner.write();
        if inner.position(id).is_none() {
            debug!("Ignoring group assignment for unknown fixture {}", id);
            return;
        }
        match group {
            Some(label) => {
                inner.groups.insert(id.clone(), label);
            }
            None => {
                inner.groups.remove(id);
            }
        }
    }

    pub fn group_of(&self, id: &FixtureId) -> Option<GroupLabel> {
        self.inner.read().groups.get(id).copied()
    }

    pub fn get(&self, id: &FixtureId) -> Option<Arc<Fixture>> {
        let inner = self.inner.read();
        inner.position(id).map(|pos| inner.fixtures[pos].clone())
    }

    pub fn contains(&self, id: &FixtureId) -> bool {
        self.inner.read().position(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.read().fixtures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().fixtures.is_empty()
    }

    /// Identifiers in registration order
    pub fn ids(&self) -> Vec<FixtureId> {
        self.inner
            .read()
            .fixtures
            .iter()
            .map(|f| f.id().clone())
            .collect()
    }

    /// Snapshot of all fixtures in registration order
    pub fn fixtures(&self) -> Vec<Arc<Fixture>> {
        self.inner.read().fixtures.clone()
    }

    /// Fixtures addressed by `selector`, in registration order
    pub fn resolve_targets(&self, selector: &TargetSelector) -> Vec<Arc<Fixture>> {
        let inner = self.inner.read();
        match selector.mode() {
            TargetMode::All => inner.fixtures.clone(),
            TargetMode::Group => {
                let label = selector.selected_group();
                inner
                    .fixtures
                    .iter()
                    .filter(|f| inner.groups.get(f.id()) == Some(&label))
                    .cloned()
                    .collect()
            }
            TargetMode::Individual => selector
                .selected_fixture()
                .and_then(|id| inner.position(id))
                .map(|pos| vec![inner.fixtures[pos].clone()])
                .unwrap_or_default(),
        }
    }
}
