//! Connection validation.
//!
//! Validation runs every check and aggregates all issues into one
//! [`TopologyDiagnostics`], so a broken configuration can be fixed in a
//! single pass. Checks, in order:
//!
//! 1. referential integrity of edges and DiSEqC targets
//! 2. legality of each `(kind, relation, kind)` triple, and duplicates
//! 3. cardinality of filters, DVRs and descramblers
//! 4. minimum resources and connections of each enabled dataflow, and at
//!    least one connected chain realizing it
//!
//! Checks 3 and 4 only look at edges that passed 1 and 2. A resource whose
//! connections were all dropped by 1 or 2 is not reported again by the
//! cardinality checks. An enabled dataflow still reports missing resources
//! and connections, since a dropped edge cannot realize it either. The
//! connected chain is only sought once checks 1 to 3 found nothing.

use std::collections::{BTreeSet, HashSet};

use log::{debug, info, warn};

use tuner_vts_protocol::{
    ConfigurationError, DataflowContext, Edge, Relation, ResourceId, ResourceKind, ResourceRef,
    TopologyDiagnostics, TopologyIssue,
};

use crate::graph::ConnectionGraph;
use crate::registry::Registry;

/// Proof that a registry and graph passed validation.
///
/// Only [`validate`] can build one, and the classifier accepts nothing else.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedTopology<'a> {
    registry: &'a Registry,
    graph: &'a ConnectionGraph,
}

impl<'a> ValidatedTopology<'a> {
    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    pub fn graph(&self) -> &'a ConnectionGraph {
        self.graph
    }
}

/// A connection shape that an enabled dataflow needs at least one of.
struct EdgePattern {
    description: &'static str,
    matches: fn(&Edge) -> bool,
}

const LNB_FEEDS_FRONTEND: EdgePattern = EdgePattern {
    description: "lnb --feeds--> frontend",
    matches: |e| e.source.kind == ResourceKind::Lnb && e.relation == Relation::Feeds,
};

const FILTER_ON_FRONTEND: EdgePattern = EdgePattern {
    description: "filter --attaches_to--> frontend",
    matches: |e| e.source.kind.is_stream_filter() && e.relation == Relation::AttachesTo,
};

const RECORD_DVR_USES_FILTER: EdgePattern = EdgePattern {
    description: "record_dvr --uses--> filter",
    matches: |e| e.source.kind == ResourceKind::RecordDvr && e.relation == Relation::Uses,
};

const MEDIA_FILTER_ON_FRONTEND: EdgePattern = EdgePattern {
    description: "audio/video filter --attaches_to--> frontend",
    matches: |e| e.source.kind.is_media_filter() && e.relation == Relation::AttachesTo,
};

const DESCRAMBLER_ON_FRONTEND: EdgePattern = EdgePattern {
    description: "descrambler --attaches_to--> frontend",
    matches: |e| e.source.kind == ResourceKind::Descrambler && e.relation == Relation::AttachesTo,
};

const DESCRAMBLER_USES_MEDIA_FILTER: EdgePattern = EdgePattern {
    description: "descrambler --uses--> audio/video filter",
    matches: |e| e.source.kind == ResourceKind::Descrambler && e.relation == Relation::Uses,
};

/// Minimum resource kinds and connections of a dataflow.
fn requirements(context: DataflowContext) -> (&'static [ResourceKind], &'static [EdgePattern]) {
    use ResourceKind::*;

    match context {
        DataflowContext::Record => (
            &[Frontend, RecordDvr],
            &[FILTER_ON_FRONTEND, RECORD_DVR_USES_FILTER],
        ),
        DataflowContext::LnbRecord => (
            &[Frontend, RecordDvr, Lnb],
            &[FILTER_ON_FRONTEND, RECORD_DVR_USES_FILTER, LNB_FEEDS_FRONTEND],
        ),
        DataflowContext::Descrambling => (
            &[Frontend, Descrambler],
            &[
                MEDIA_FILTER_ON_FRONTEND,
                DESCRAMBLER_ON_FRONTEND,
                DESCRAMBLER_USES_MEDIA_FILTER,
            ],
        ),
        DataflowContext::LnbDescrambling => (
            &[Frontend, Descrambler, Lnb],
            &[
                MEDIA_FILTER_ON_FRONTEND,
                DESCRAMBLER_ON_FRONTEND,
                DESCRAMBLER_USES_MEDIA_FILTER,
                LNB_FEEDS_FRONTEND,
            ],
        ),
    }
}

/// Validate a declared topology.
///
/// `enabled` lists the dataflows the configuration promises to exercise;
/// their minimum requirements are checked too.
pub fn validate<'a>(
    registry: &'a Registry,
    graph: &'a ConnectionGraph,
    enabled: &BTreeSet<DataflowContext>,
) -> Result<ValidatedTopology<'a>, ConfigurationError> {
    let mut diagnostics = TopologyDiagnostics::new();

    let sound = check_edges(registry, graph, &mut diagnostics);
    check_diseqc_targets(registry, &mut diagnostics);
    check_cardinality(registry, graph, &sound, &mut diagnostics);
    let structurally_sound = diagnostics.is_empty();
    check_enabled_dataflows(registry, &sound, enabled, structurally_sound, &mut diagnostics);

    if diagnostics.is_empty() {
        info!(
            "Topology validated: {} resource(s), {} connection(s)",
            registry.len(),
            graph.edges().len()
        );
        Ok(ValidatedTopology { registry, graph })
    } else {
        Err(ConfigurationError(diagnostics))
    }
}

/// Validate and report the outcome as a boolean, logging every issue.
pub fn validate_connections(
    registry: &Registry,
    graph: &ConnectionGraph,
    enabled: &BTreeSet<DataflowContext>,
) -> bool {
    match validate(registry, graph, enabled) {
        Ok(_) => true,
        Err(ConfigurationError(diagnostics)) => {
            warn!("Failed to validate connections ({} issue(s))", diagnostics.len());
            for issue in &diagnostics.issues {
                warn!("  {}", issue);
            }
            false
        }
    }
}

/// Checks 1 and 2 for edges. Returns the graph of edges that passed both.
fn check_edges(
    registry: &Registry,
    graph: &ConnectionGraph,
    diagnostics: &mut TopologyDiagnostics,
) -> ConnectionGraph {
    let mut sound = ConnectionGraph::new();
    let mut seen: HashSet<Edge> = HashSet::new();

    for (edge_index, edge) in graph.edges().iter().enumerate() {
        let mut resolved = true;
        for endpoint in [edge.source, edge.target] {
            if !registry.contains(endpoint) {
                diagnostics.push(TopologyIssue::DanglingReference {
                    edge_index,
                    edge: *edge,
                    endpoint,
                });
                resolved = false;
            }
        }

        if !edge.is_legal() {
            diagnostics.push(TopologyIssue::IllegalEdge {
                edge_index,
                edge: *edge,
            });
            continue;
        }

        if !seen.insert(*edge) {
            diagnostics.push(TopologyIssue::DuplicateEdge {
                edge_index,
                edge: *edge,
            });
            continue;
        }

        if resolved {
            sound.add_edge(*edge);
        }
    }

    debug!(
        "{} of {} connection(s) resolved and legal",
        sound.edges().len(),
        graph.edges().len()
    );
    sound
}

fn check_diseqc_targets(registry: &Registry, diagnostics: &mut TopologyDiagnostics) {
    for (index, message) in registry.diseqc_messages().iter().enumerate() {
        if !registry.contains(ResourceRef::new(ResourceKind::Lnb, message.lnb)) {
            diagnostics.push(TopologyIssue::DanglingDiseqcTarget {
                index,
                lnb: message.lnb,
            });
        }
    }
}

/// Check 3, over every declared resource of the constrained kinds.
///
/// `graph` holds the sound edges; `declared` all of them.
fn check_cardinality(
    registry: &Registry,
    declared: &ConnectionGraph,
    graph: &ConnectionGraph,
    diagnostics: &mut TopologyDiagnostics,
) {
    for kind in ResourceKind::ALL.into_iter().filter(|k| k.is_stream_filter()) {
        for filter in registry.refs(kind) {
            let frontends = graph.demuxes_of(filter);
            if frontends.len() > 1 {
                diagnostics.push(TopologyIssue::FilterInMultipleDemuxes { filter, frontends });
            }
        }
    }

    for kind in ResourceKind::ALL.into_iter().filter(|k| k.is_dvr()) {
        for dvr in registry.refs(kind) {
            let filters = graph.filters_used_by(dvr);
            if filters.is_empty() {
                if declared.targets(dvr, Relation::Uses).next().is_none() {
                    diagnostics.push(TopologyIssue::DvrWithoutFilters { dvr });
                }
                continue;
            }

            let frontends: BTreeSet<_> = filters
                .iter()
                .flat_map(|filter| graph.demuxes_of(*filter))
                .collect();
            if frontends.len() > 1 {
                diagnostics.push(TopologyIssue::DvrSpansDemuxes {
                    dvr,
                    frontends: frontends.into_iter().collect(),
                });
            }
        }
    }

    for descrambler in registry.refs(ResourceKind::Descrambler) {
        let demuxes = graph.demuxes_of(descrambler);
        if demuxes.len() != 1 {
            let dropped = demuxes.is_empty()
                && declared
                    .targets(descrambler, Relation::AttachesTo)
                    .next()
                    .is_some();
            if !dropped {
                diagnostics.push(TopologyIssue::DescramblerDemuxCount {
                    descrambler: descrambler.id,
                    found: demuxes.len(),
                });
            }
            continue;
        }

        for filter in graph.filters_used_by(descrambler) {
            if graph.demuxes_of(filter) != demuxes {
                diagnostics.push(TopologyIssue::DescramblerFilterOffDemux {
                    descrambler: descrambler.id,
                    filter,
                });
            }
        }
    }
}

/// Check 4, for the enabled dataflows only.
fn check_enabled_dataflows(
    registry: &Registry,
    graph: &ConnectionGraph,
    enabled: &BTreeSet<DataflowContext>,
    seek_chains: bool,
    diagnostics: &mut TopologyDiagnostics,
) {
    for context in enabled {
        let (kinds, patterns) = requirements(*context);
        let before = diagnostics.len();

        for kind in kinds {
            if registry.count(*kind) == 0 {
                diagnostics.push(TopologyIssue::MissingRequiredResource {
                    context: *context,
                    kind: *kind,
                });
            }
        }

        for pattern in patterns {
            if !graph.edges().iter().any(pattern.matches) {
                diagnostics.push(TopologyIssue::MissingRequiredEdge {
                    context: *context,
                    pattern: pattern.description,
                });
            }
        }

        if seek_chains
            && diagnostics.len() == before
            && !has_connected_chain(registry, graph, *context)
        {
            diagnostics.push(TopologyIssue::DataflowNotConnected { context: *context });
        }
    }
}

/// Whether some DVR or descrambler chain realizes `context` on one frontend,
/// fed by an LNB when the context needs one.
fn has_connected_chain(
    registry: &Registry,
    graph: &ConnectionGraph,
    context: DataflowContext,
) -> bool {
    let frontends: BTreeSet<ResourceId> = if context.is_descrambling() {
        registry
            .refs(ResourceKind::Descrambler)
            .filter_map(|descrambler| graph.descrambling_frontend(descrambler))
            .collect()
    } else {
        registry
            .refs(ResourceKind::RecordDvr)
            .filter_map(|dvr| graph.record_chain_frontend(dvr))
            .collect()
    };

    frontends
        .into_iter()
        .any(|frontend| !context.requires_lnb() || !graph.lnbs_feeding(frontend).is_empty())
}
