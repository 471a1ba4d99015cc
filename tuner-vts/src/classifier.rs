//! Dataflow classification.
//!
//! Walks a [`ValidatedTopology`] from every frontend and enumerates each
//! resource chain that realizes a [`DataflowContext`]:
//!
//! - `Record`: frontend → demux → filters ← record DVR
//! - `LnbRecord`: a `Record` chain whose frontend is fed by an LNB
//! - `Descrambling`: frontend → demux → media filters ← descrambler
//! - `LnbDescrambling`: a `Descrambling` chain whose frontend is fed by an LNB
//!
//! Traversal is in ascending id order at every level, so the bindings of a
//! context always come out in the same order for the same topology.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use log::{debug, info};
use serde::Serialize;

use tuner_vts_protocol::{DataflowContext, ResourceId, ResourceKind, ResourceRef};

use crate::validator::ValidatedTopology;

/// One concrete resource chain realizing a dataflow.
///
/// Bindings are only produced by [`determine_data_flows`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ScenarioBinding {
    context: DataflowContext,
    frontend: ResourceId,
    lnb: Option<ResourceId>,
    dvr: Option<ResourceId>,
    descrambler: Option<ResourceId>,
    filters: BTreeSet<ResourceRef>,
}

impl ScenarioBinding {
    pub fn context(&self) -> DataflowContext {
        self.context
    }

    pub fn frontend(&self) -> ResourceId {
        self.frontend
    }

    /// Feeding LNB, set exactly for LNB-backed contexts.
    pub fn lnb(&self) -> Option<ResourceId> {
        self.lnb
    }

    /// Record DVR of a record chain.
    pub fn dvr(&self) -> Option<ResourceId> {
        self.dvr
    }

    pub fn descrambler(&self) -> Option<ResourceId> {
        self.descrambler
    }

    /// Demux filters of the chain, by kind then id.
    pub fn filters(&self) -> &BTreeSet<ResourceRef> {
        &self.filters
    }

    /// Stable name for test parametrisation, e.g. `lnb_record/frontend0/lnb1/dvr0`.
    pub fn name(&self) -> String {
        let mut name = format!("{}/frontend{}", self.context, self.frontend);
        if let Some(lnb) = self.lnb {
            name.push_str(&format!("/lnb{}", lnb));
        }
        if let Some(dvr) = self.dvr {
            name.push_str(&format!("/dvr{}", dvr));
        }
        if let Some(descrambler) = self.descrambler {
            name.push_str(&format!("/descrambler{}", descrambler));
        }
        name
    }

    fn with_lnb(&self, context: DataflowContext, lnb: ResourceId) -> Self {
        Self {
            context,
            lnb: Some(lnb),
            ..self.clone()
        }
    }
}

impl fmt::Display for ScenarioBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())?;
        let filters: Vec<String> = self.filters.iter().map(ToString::to_string).collect();
        write!(f, " [{}]", filters.join(", "))
    }
}

/// Bindings of every dataflow context.
///
/// A context with no binding is a coverage gap, not an error: tests that
/// parametrise over it are simply not instantiated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataflowBindings {
    by_context: BTreeMap<DataflowContext, Vec<ScenarioBinding>>,
}

impl DataflowBindings {
    fn new() -> Self {
        Self {
            by_context: DataflowContext::ALL
                .into_iter()
                .map(|context| (context, Vec::new()))
                .collect(),
        }
    }

    fn push(&mut self, binding: ScenarioBinding) {
        self.by_context
            .entry(binding.context)
            .or_default()
            .push(binding);
    }

    /// Bindings of `context`, in traversal order.
    pub fn get(&self, context: DataflowContext) -> &[ScenarioBinding] {
        self.by_context
            .get(&context)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// True when the topology cannot realize `context` at all.
    pub fn is_gap(&self, context: DataflowContext) -> bool {
        self.get(context).is_empty()
    }

    /// All bindings, context by context.
    pub fn iter(&self) -> impl Iterator<Item = &ScenarioBinding> {
        self.by_context.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.by_context.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Enumerate every binding the validated topology can realize.
pub fn determine_data_flows(topology: &ValidatedTopology<'_>) -> DataflowBindings {
    let registry = topology.registry();
    let graph = topology.graph();
    let mut bindings = DataflowBindings::new();

    for frontend in registry.ids(ResourceKind::Frontend) {
        let lnbs = graph.lnbs_feeding(frontend);

        let mut records = Vec::new();
        for dvr in registry.refs(ResourceKind::RecordDvr) {
            if graph.record_chain_frontend(dvr) == Some(frontend) {
                records.push(ScenarioBinding {
                    context: DataflowContext::Record,
                    frontend,
                    lnb: None,
                    dvr: Some(dvr.id),
                    descrambler: None,
                    filters: graph.filters_used_by(dvr),
                });
            }
        }

        let mut descramblings = Vec::new();
        for descrambler in registry.refs(ResourceKind::Descrambler) {
            if graph.demuxes_of(descrambler) != [frontend] {
                continue;
            }
            let filters = graph.media_filters_used_by(descrambler);
            if filters.is_empty() {
                debug!(
                    "descrambler:{} on frontend:{} uses no media filter, skipped",
                    descrambler.id, frontend
                );
                continue;
            }
            descramblings.push(ScenarioBinding {
                context: DataflowContext::Descrambling,
                frontend,
                lnb: None,
                dvr: None,
                descrambler: Some(descrambler.id),
                filters,
            });
        }

        for lnb in &lnbs {
            for record in &records {
                bindings.push(record.with_lnb(DataflowContext::LnbRecord, *lnb));
            }
            for descrambling in &descramblings {
                bindings.push(descrambling.with_lnb(DataflowContext::LnbDescrambling, *lnb));
            }
        }
        for binding in records.into_iter().chain(descramblings) {
            bindings.push(binding);
        }
    }

    for context in DataflowContext::ALL {
        let found = bindings.get(context).len();
        if found == 0 {
            info!("Dataflow {}: no binding, tests will not be instantiated", context);
        } else {
            info!("Dataflow {}: {} binding(s)", context, found);
        }
    }

    bindings
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use tuner_vts_protocol::{Edge, Relation};

    use crate::graph::ConnectionGraph;
    use crate::registry::Registry;
    use crate::validator::validate;

    fn r(kind: ResourceKind, id: u32) -> ResourceRef {
        ResourceRef::new(kind, ResourceId(id))
    }

    fn declare(registry: &mut Registry, resources: &[ResourceRef]) {
        for resource in resources {
            registry.insert(resource.kind, resource.id).unwrap();
        }
    }

    fn classify(registry: &Registry, graph: &ConnectionGraph) -> DataflowBindings {
        let topology = validate(registry, graph, &BTreeSet::new()).unwrap();
        determine_data_flows(&topology)
    }

    /// Frontend 0, video filter 0 on its demux and record DVR 0 using it,
    /// optionally with LNB 0 feeding the frontend.
    fn record_topology(with_lnb: bool) -> (Registry, ConnectionGraph) {
        let fe = ResourceRef::frontend(0);
        let video = r(ResourceKind::VideoFilter, 0);
        let dvr = r(ResourceKind::RecordDvr, 0);

        let mut registry = Registry::new();
        declare(&mut registry, &[fe, video, dvr]);
        let mut graph = ConnectionGraph::from_edges([
            Edge::new(video, Relation::AttachesTo, fe),
            Edge::new(dvr, Relation::Uses, video),
        ]);
        if with_lnb {
            declare(&mut registry, &[ResourceRef::lnb(0)]);
            graph.add_edge(Edge::new(ResourceRef::lnb(0), Relation::Feeds, fe));
        }
        (registry, graph)
    }

    #[test]
    fn test_lnb_record_implies_record() {
        let (registry, graph) = record_topology(true);
        let bindings = classify(&registry, &graph);

        let lnb_record = bindings.get(DataflowContext::LnbRecord);
        assert_eq!(lnb_record.len(), 1);
        assert_eq!(lnb_record[0].lnb(), Some(ResourceId(0)));
        assert_eq!(lnb_record[0].dvr(), Some(ResourceId(0)));

        let record = bindings.get(DataflowContext::Record);
        assert_eq!(record.len(), 1);
        assert_eq!(record[0].lnb(), None);
        assert!(record[0].filters().contains(&r(ResourceKind::VideoFilter, 0)));
    }

    #[test]
    fn test_record_without_lnb() {
        let (registry, graph) = record_topology(false);
        let bindings = classify(&registry, &graph);

        assert!(bindings.is_gap(DataflowContext::LnbRecord));
        assert_eq!(bindings.get(DataflowContext::Record).len(), 1);
        assert!(bindings.is_gap(DataflowContext::Descrambling));
        assert!(bindings.is_gap(DataflowContext::LnbDescrambling));
    }

    #[test]
    fn test_empty_topology_is_all_gaps() {
        let bindings = classify(&Registry::new(), &ConnectionGraph::new());
        assert!(bindings.is_empty());
        for context in DataflowContext::ALL {
            assert!(bindings.is_gap(context));
        }
    }

    /// Two frontends, each with an audio and video filter; frontend 1 fed
    /// by LNBs 2 and 0; two record DVRs and a descrambler on each demux.
    /// Declarations deliberately out of order.
    fn wide_topology() -> (Registry, ConnectionGraph) {
        let mut registry = Registry::new();
        let mut edges = Vec::new();
        for fe_id in [1, 0] {
            let fe = ResourceRef::frontend(fe_id);
            let audio = r(ResourceKind::AudioFilter, fe_id);
            let video = r(ResourceKind::VideoFilter, fe_id);
            let dvr_a = r(ResourceKind::RecordDvr, fe_id * 2 + 1);
            let dvr_b = r(ResourceKind::RecordDvr, fe_id * 2);
            let desc = r(ResourceKind::Descrambler, fe_id);
            declare(&mut registry, &[fe, audio, video, dvr_a, dvr_b, desc]);
            edges.extend([
                Edge::new(video, Relation::AttachesTo, fe),
                Edge::new(audio, Relation::AttachesTo, fe),
                Edge::new(dvr_a, Relation::Uses, video),
                Edge::new(dvr_b, Relation::Uses, audio),
                Edge::new(dvr_b, Relation::Uses, video),
                Edge::new(desc, Relation::AttachesTo, fe),
                Edge::new(desc, Relation::Uses, video),
                Edge::new(desc, Relation::Uses, audio),
            ]);
        }
        for lnb in [2, 0] {
            declare(&mut registry, &[ResourceRef::lnb(lnb)]);
            edges.push(Edge::new(
                ResourceRef::lnb(lnb),
                Relation::Feeds,
                ResourceRef::frontend(1),
            ));
        }
        (registry, ConnectionGraph::from_edges(edges))
    }

    #[test]
    fn test_bindings_are_ordered() {
        let (registry, graph) = wide_topology();
        let bindings = classify(&registry, &graph);

        for context in DataflowContext::ALL {
            let list = bindings.get(context);
            let mut sorted = list.to_vec();
            sorted.sort();
            assert_eq!(list, &sorted[..], "{} bindings out of order", context);
        }

        let names: Vec<String> = bindings
            .get(DataflowContext::LnbRecord)
            .iter()
            .map(ScenarioBinding::name)
            .collect();
        assert_eq!(
            names,
            vec![
                "lnb_record/frontend1/lnb0/dvr2",
                "lnb_record/frontend1/lnb0/dvr3",
                "lnb_record/frontend1/lnb2/dvr2",
                "lnb_record/frontend1/lnb2/dvr3",
            ]
        );
        assert_eq!(bindings.get(DataflowContext::Record).len(), 4);
        assert_eq!(bindings.get(DataflowContext::Descrambling).len(), 2);
        assert_eq!(bindings.get(DataflowContext::LnbDescrambling).len(), 2);
    }

    #[test]
    fn test_classification_is_idempotent() {
        let (registry, graph) = wide_topology();
        let first = classify(&registry, &graph);
        let second = classify(&registry, &graph);
        assert_eq!(first, second);
        assert_eq!(first.len(), 12);
    }

    #[test]
    fn test_descrambler_uses_only_media_filters() {
        let (registry, graph) = wide_topology();
        let bindings = classify(&registry, &graph);
        let descrambling = &bindings.get(DataflowContext::Descrambling)[0];

        assert_eq!(descrambling.frontend(), ResourceId(0));
        assert_eq!(descrambling.descrambler(), Some(ResourceId(0)));
        assert_eq!(descrambling.dvr(), None);
        assert_eq!(
            descrambling.filters().iter().copied().collect::<Vec<_>>(),
            vec![r(ResourceKind::AudioFilter, 0), r(ResourceKind::VideoFilter, 0)]
        );
    }

    #[test]
    fn test_descrambler_without_filters_is_skipped() {
        let fe = ResourceRef::frontend(0);
        let desc = r(ResourceKind::Descrambler, 0);
        let mut registry = Registry::new();
        declare(&mut registry, &[fe, desc, ResourceRef::lnb(0)]);
        let graph = ConnectionGraph::from_edges([
            Edge::new(desc, Relation::AttachesTo, fe),
            Edge::new(ResourceRef::lnb(0), Relation::Feeds, fe),
        ]);

        let bindings = classify(&registry, &graph);
        assert!(bindings.is_gap(DataflowContext::Descrambling));
        assert!(bindings.is_gap(DataflowContext::LnbDescrambling));
    }

    #[test]
    fn test_binding_display() {
        let (registry, graph) = record_topology(true);
        let bindings = classify(&registry, &graph);
        assert_eq!(
            bindings.get(DataflowContext::Record)[0].to_string(),
            "record/frontend0/dvr0 [video_filter:0]"
        );
    }
}
