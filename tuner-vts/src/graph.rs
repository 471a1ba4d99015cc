//! Directed connection graph between declared resources.

use std::collections::{BTreeMap, BTreeSet};

use tuner_vts_protocol::{Edge, Relation, ResourceId, ResourceKind, ResourceRef};

/// Declared connections, indexed in both directions.
///
/// Edges are kept in declaration order for diagnostics. The adjacency sets
/// are ordered, so every query yields resources by kind and ascending id.
#[derive(Debug, Clone, Default)]
pub struct ConnectionGraph {
    edges: Vec<Edge>,
    outgoing: BTreeMap<ResourceRef, BTreeSet<(Relation, ResourceRef)>>,
    incoming: BTreeMap<ResourceRef, BTreeSet<(Relation, ResourceRef)>>,
}

impl ConnectionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_edges<I>(edges: I) -> Self
    where
        I: IntoIterator<Item = Edge>,
    {
        let mut graph = Self::new();
        for edge in edges {
            graph.add_edge(edge);
        }
        graph
    }

    /// Record a connection. Duplicates are kept in the edge list (so the
    /// validator can report them) but collapse in the adjacency index.
    pub fn add_edge(&mut self, edge: Edge) {
        self.outgoing
            .entry(edge.source)
            .or_default()
            .insert((edge.relation, edge.target));
        self.incoming
            .entry(edge.target)
            .or_default()
            .insert((edge.relation, edge.source));
        self.edges.push(edge);
    }

    /// Edges in declaration order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Resources `source` points at through `relation`.
    pub fn targets(
        &self,
        source: ResourceRef,
        relation: Relation,
    ) -> impl Iterator<Item = ResourceRef> + '_ {
        self.outgoing
            .get(&source)
            .into_iter()
            .flatten()
            .filter(move |(r, _)| *r == relation)
            .map(|(_, target)| *target)
    }

    /// Resources pointing at `target` through `relation`.
    pub fn sources(
        &self,
        target: ResourceRef,
        relation: Relation,
    ) -> impl Iterator<Item = ResourceRef> + '_ {
        self.incoming
            .get(&target)
            .into_iter()
            .flatten()
            .filter(move |(r, _)| *r == relation)
            .map(|(_, source)| *source)
    }

    /// Frontends whose demux `resource` attaches to, ascending.
    ///
    /// A well-formed filter or descrambler yields exactly one.
    pub fn demuxes_of(&self, resource: ResourceRef) -> Vec<ResourceId> {
        self.targets(resource, Relation::AttachesTo)
            .filter(|r| r.kind == ResourceKind::Frontend)
            .map(|r| r.id)
            .collect()
    }

    /// LNBs feeding `frontend`, ascending.
    pub fn lnbs_feeding(&self, frontend: ResourceId) -> Vec<ResourceId> {
        self.sources(ResourceRef::frontend(frontend.0), Relation::Feeds)
            .filter(|r| r.kind == ResourceKind::Lnb)
            .map(|r| r.id)
            .collect()
    }

    /// Stream filters on the demux of `frontend`.
    pub fn filters_on(&self, frontend: ResourceId) -> BTreeSet<ResourceRef> {
        self.sources(ResourceRef::frontend(frontend.0), Relation::AttachesTo)
            .filter(|r| r.kind.is_stream_filter())
            .collect()
    }

    /// Filters used by a DVR or descrambler.
    pub fn filters_used_by(&self, user: ResourceRef) -> BTreeSet<ResourceRef> {
        self.targets(user, Relation::Uses)
            .filter(|r| r.kind.is_filter())
            .collect()
    }

    /// Audio and video filters used by `user`.
    pub fn media_filters_used_by(&self, user: ResourceRef) -> BTreeSet<ResourceRef> {
        self.targets(user, Relation::Uses)
            .filter(|r| r.kind.is_media_filter())
            .collect()
    }

    /// Frontend whose demux carries every filter `dvr` uses.
    ///
    /// `None` when the DVR uses no filter, or when one of its filters is on
    /// no demux or on more than one.
    pub fn record_chain_frontend(&self, dvr: ResourceRef) -> Option<ResourceId> {
        let mut frontend = None;
        for filter in self.filters_used_by(dvr) {
            let demuxes = self.demuxes_of(filter);
            match (demuxes.as_slice(), frontend) {
                ([only], None) => frontend = Some(*only),
                ([only], Some(current)) if *only == current => {}
                _ => return None,
            }
        }
        frontend
    }

    /// Frontend on which `descrambler` works on at least one media filter of
    /// its own demux.
    pub fn descrambling_frontend(&self, descrambler: ResourceRef) -> Option<ResourceId> {
        let demuxes = self.demuxes_of(descrambler);
        let [frontend] = demuxes.as_slice() else {
            return None;
        };
        self.media_filters_used_by(descrambler)
            .into_iter()
            .any(|filter| self.demuxes_of(filter) == [*frontend])
            .then_some(*frontend)
    }
}
