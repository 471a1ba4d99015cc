//! Per-run registry of declared hardware resources.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, error};

use tuner_vts_protocol::{DiseqcMessage, RegistryError, ResourceId, ResourceKind, ResourceRef};

/// Declared resource ids, one container per [`ResourceKind`], plus the
/// DiSEqC messages of the run.
///
/// The registry is populated once by configuration loading and emptied by
/// [`Registry::reset_all`] at teardown so the next test case starts clean.
#[derive(Debug, Clone)]
pub struct Registry {
    /// Ids per kind. Every kind always has a (possibly empty) container.
    resources: BTreeMap<ResourceKind, BTreeSet<ResourceId>>,
    diseqc_messages: Vec<DiseqcMessage>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            resources: ResourceKind::ALL
                .iter()
                .map(|kind| (*kind, BTreeSet::new()))
                .collect(),
            diseqc_messages: Vec::new(),
        }
    }

    /// Register a resource id.
    ///
    /// Returns `Ok(false)` if the id was already registered for this kind.
    /// The [`ResourceId::INVALID`] sentinel is rejected.
    pub fn insert(&mut self, kind: ResourceKind, id: ResourceId) -> Result<bool, RegistryError> {
        if !id.is_valid() {
            return Err(RegistryError::InvalidSentinel(kind));
        }
        Ok(self.resources.entry(kind).or_default().insert(id))
    }

    /// Register every id of `ids` for `kind`, stopping at the first error.
    pub fn extend<I>(&mut self, kind: ResourceKind, ids: I) -> Result<(), RegistryError>
    where
        I: IntoIterator<Item = ResourceId>,
    {
        for id in ids {
            self.insert(kind, id)?;
        }
        Ok(())
    }

    pub fn contains(&self, resource: ResourceRef) -> bool {
        self.resources
            .get(&resource.kind)
            .map(|ids| ids.contains(&resource.id))
            .unwrap_or(false)
    }

    /// Ids of `kind` in ascending order.
    pub fn ids(&self, kind: ResourceKind) -> impl Iterator<Item = ResourceId> + '_ {
        self.resources.get(&kind).into_iter().flatten().copied()
    }

    /// Resources of `kind` in ascending id order.
    pub fn refs(&self, kind: ResourceKind) -> impl Iterator<Item = ResourceRef> + '_ {
        self.ids(kind).map(move |id| ResourceRef::new(kind, id))
    }

    pub fn count(&self, kind: ResourceKind) -> usize {
        self.resources.get(&kind).map(BTreeSet::len).unwrap_or(0)
    }

    pub fn add_diseqc_message(&mut self, message: DiseqcMessage) {
        self.diseqc_messages.push(message);
    }

    pub fn diseqc_messages(&self) -> &[DiseqcMessage] {
        &self.diseqc_messages
    }

    /// DiSEqC messages addressed to `lnb`, in declaration order.
    pub fn diseqc_messages_for(&self, lnb: ResourceId) -> impl Iterator<Item = &DiseqcMessage> {
        self.diseqc_messages.iter().filter(move |m| m.lnb == lnb)
    }

    pub fn is_empty(&self) -> bool {
        self.resources.values().all(BTreeSet::is_empty) && self.diseqc_messages.is_empty()
    }

    /// Total number of registered resources over all kinds.
    pub fn len(&self) -> usize {
        self.resources.values().map(BTreeSet::len).sum()
    }

    /// Empty every per-kind container and the DiSEqC list.
    ///
    /// Unconditional and idempotent. A container that is still populated
    /// afterwards is a harness bug: debug builds panic, release builds log it.
    pub fn reset_all(&mut self) {
        let before = self.len();
        for ids in self.resources.values_mut() {
            ids.clear();
        }
        self.diseqc_messages.clear();

        let leaked: Vec<ResourceKind> = self
            .resources
            .iter()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(kind, _)| *kind)
            .collect();
        debug_assert!(leaked.is_empty(), "resources leaked after reset: {:?}", leaked);
        if !leaked.is_empty() {
            error!("Resources leaked after reset: {:?}", leaked);
        }

        debug!("Registry reset ({} resource(s) released)", before);
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
