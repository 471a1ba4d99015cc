//! Suite initialisation: load, connect, validate, classify.

use std::collections::BTreeSet;

use log::{error, info};
use serde::Serialize;

use tuner_vts::{determine_data_flows, validate, ConnectionGraph, DataflowBindings, Registry};
use tuner_vts_protocol::{DataflowContext, FilterType, ResourceKind};

use crate::config::TopologyConfig;
use crate::error::Result;

/// Topology of one suite run, validated and classified.
#[derive(Debug, Clone)]
pub struct SuiteTopology {
    registry: Registry,
    graph: ConnectionGraph,
    enabled: BTreeSet<DataflowContext>,
    bindings: DataflowBindings,
}

impl SuiteTopology {
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn graph(&self) -> &ConnectionGraph {
        &self.graph
    }

    /// Dataflows the configuration requires to be realizable.
    pub fn enabled(&self) -> &BTreeSet<DataflowContext> {
        &self.enabled
    }

    pub fn bindings(&self) -> &DataflowBindings {
        &self.bindings
    }

    /// Release every registered resource.
    pub fn reset(&mut self) {
        self.registry.reset_all();
    }

    pub fn summary(&self) -> SuiteSummary<'_> {
        SuiteSummary {
            resources: ResourceKind::ALL
                .into_iter()
                .map(|kind| ResourceSummary {
                    kind,
                    count: self.registry.count(kind),
                    filter_type: kind.filter_type(),
                })
                .filter(|summary| summary.count > 0)
                .collect(),
            connections: self.graph.edges().len(),
            enabled: &self.enabled,
            bindings: &self.bindings,
        }
    }
}

/// Declared count of one resource kind.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ResourceSummary {
    pub kind: ResourceKind,
    pub count: usize,
    /// Type the filters of this kind are opened with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_type: Option<FilterType>,
}

/// Serializable overview of a suite topology.
#[derive(Debug, Serialize)]
pub struct SuiteSummary<'a> {
    pub resources: Vec<ResourceSummary>,
    pub connections: usize,
    pub enabled: &'a BTreeSet<DataflowContext>,
    pub bindings: &'a DataflowBindings,
}

/// Build the suite topology from `config`.
///
/// A configuration error is fatal: no test may run against a topology that
/// did not validate.
pub fn init_configuration(config: &TopologyConfig) -> Result<SuiteTopology> {
    let registry = config.build_registry()?;
    let graph = config.build_graph();
    let enabled = config.enabled_dataflows();

    let bindings = match validate(&registry, &graph, &enabled) {
        Ok(topology) => determine_data_flows(&topology),
        Err(e) => {
            error!("Tuner topology rejected:\n{}", e.0);
            return Err(e.into());
        }
    };

    info!(
        "Suite topology ready: {} resource(s), {} connection(s), {} binding(s)",
        registry.len(),
        graph.edges().len(),
        bindings.len()
    );

    Ok(SuiteTopology {
        registry,
        graph,
        enabled,
        bindings,
    })
}
