//! Error types for topology validation and filter output verification.

use std::fmt;

use thiserror::Error;

use crate::types::{DataflowContext, Edge, FilterKey, ResourceId, ResourceKind, ResourceRef};

/// Errors raised while populating a registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The reserved sentinel id was offered as a real resource id.
    #[error("{0} id uses the reserved INVALID sentinel")]
    InvalidSentinel(ResourceKind),
}

/// One problem found while validating a declared topology.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyIssue {
    /// An edge endpoint is not present in the registry.
    #[error("connection #{edge_index} ({edge}) references unknown {endpoint}")]
    DanglingReference {
        edge_index: usize,
        edge: Edge,
        endpoint: ResourceRef,
    },

    /// A DiSEqC message targets an LNB that is not present in the registry.
    #[error("diseqc message #{index} targets unknown lnb:{lnb}")]
    DanglingDiseqcTarget { index: usize, lnb: ResourceId },

    /// The edge connects kinds that cannot be connected this way.
    #[error("connection #{edge_index} ({edge}) is not a legal connection")]
    IllegalEdge { edge_index: usize, edge: Edge },

    /// The same edge was declared more than once.
    #[error("connection #{edge_index} ({edge}) is declared more than once")]
    DuplicateEdge { edge_index: usize, edge: Edge },

    /// A filter attaches to more than one demux context.
    #[error("{filter} attaches to {} demuxes (frontends {frontends:?}), at most one allowed", .frontends.len())]
    FilterInMultipleDemuxes {
        filter: ResourceRef,
        frontends: Vec<ResourceId>,
    },

    /// A DVR is declared without any filter.
    #[error("{dvr} does not use any filter, at least one required")]
    DvrWithoutFilters { dvr: ResourceRef },

    /// The filters of one DVR sit on different demux contexts.
    #[error("{dvr} uses filters on several demuxes (frontends {frontends:?})")]
    DvrSpansDemuxes {
        dvr: ResourceRef,
        frontends: Vec<ResourceId>,
    },

    /// A descrambler is not bound to exactly one demux context.
    #[error("descrambler:{descrambler} attaches to {found} demuxes, exactly one required")]
    DescramblerDemuxCount {
        descrambler: ResourceId,
        found: usize,
    },

    /// A descrambler uses a filter that lives on another demux.
    #[error("descrambler:{descrambler} uses {filter}, which is not on its demux")]
    DescramblerFilterOffDemux {
        descrambler: ResourceId,
        filter: ResourceRef,
    },

    /// An enabled scenario needs a resource kind with no declared ids.
    #[error("dataflow {context} is enabled but no {kind} is declared")]
    MissingRequiredResource {
        context: DataflowContext,
        kind: ResourceKind,
    },

    /// An enabled scenario needs a connection that is never declared.
    #[error("dataflow {context} is enabled but no `{pattern}` connection is declared")]
    MissingRequiredEdge {
        context: DataflowContext,
        pattern: &'static str,
    },

    /// An enabled scenario has its resources and connections, but no chain
    /// of them realizes it on a single frontend.
    #[error("dataflow {context} is enabled but no connected {context} chain is declared")]
    DataflowNotConnected { context: DataflowContext },
}

impl TopologyIssue {
    /// Resources this issue is about, used to name culprits in reports.
    pub fn subjects(&self) -> Vec<ResourceRef> {
        match self {
            TopologyIssue::DanglingReference { endpoint, .. } => vec![*endpoint],
            TopologyIssue::DanglingDiseqcTarget { lnb, .. } => {
                vec![ResourceRef::new(ResourceKind::Lnb, *lnb)]
            }
            TopologyIssue::IllegalEdge { edge, .. }
            | TopologyIssue::DuplicateEdge { edge, .. } => vec![edge.source, edge.target],
            TopologyIssue::FilterInMultipleDemuxes { filter, .. } => vec![*filter],
            TopologyIssue::DvrWithoutFilters { dvr }
            | TopologyIssue::DvrSpansDemuxes { dvr, .. } => vec![*dvr],
            TopologyIssue::DescramblerDemuxCount { descrambler, .. } => {
                vec![ResourceRef::new(ResourceKind::Descrambler, *descrambler)]
            }
            TopologyIssue::DescramblerFilterOffDemux {
                descrambler,
                filter,
            } => vec![
                ResourceRef::new(ResourceKind::Descrambler, *descrambler),
                *filter,
            ],
            TopologyIssue::MissingRequiredResource { .. }
            | TopologyIssue::MissingRequiredEdge { .. }
            | TopologyIssue::DataflowNotConnected { .. } => Vec::new(),
        }
    }
}

/// Every issue found in one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologyDiagnostics {
    pub issues: Vec<TopologyIssue>,
}

impl TopologyDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, issue: TopologyIssue) {
        self.issues.push(issue);
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Returns true if any issue concerns `resource`.
    pub fn mentions(&self, resource: ResourceRef) -> bool {
        self.issues
            .iter()
            .any(|issue| issue.subjects().contains(&resource))
    }
}

impl fmt::Display for TopologyDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} topology issue(s)", self.issues.len())?;
        for issue in &self.issues {
            write!(f, "\n  - {}", issue)?;
        }
        Ok(())
    }
}

/// Fatal configuration error: the declared topology is not usable and no
/// test may run against it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid tuner topology: {0}")]
pub struct ConfigurationError(pub TopologyDiagnostics);

/// Why a single filter callback rejected its output.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterCheckError {
    /// Not enough filter output arrived before the wait expired.
    #[error("received {received} output event(s) before timeout, expected at least {expected}")]
    NoOutput { received: usize, expected: usize },

    /// The output arrived but its content is wrong.
    #[error("unexpected filter output: {0}")]
    Mismatch(String),
}

/// Failure of one filter data output verification pass.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationFailure {
    /// Verification ran before any filter callback was registered.
    #[error("no filter callback registered, nothing to verify")]
    NoFiltersRegistered,

    /// One or more callbacks rejected their output.
    #[error("{} filter(s) failed output verification: {}", .failures.len(), format_failures(.failures))]
    CallbacksFailed {
        failures: Vec<(FilterKey, FilterCheckError)>,
    },
}

impl VerificationFailure {
    /// Keys of the callbacks that failed, in verification order.
    pub fn failed_keys(&self) -> Vec<FilterKey> {
        match self {
            VerificationFailure::NoFiltersRegistered => Vec::new(),
            VerificationFailure::CallbacksFailed { failures } => {
                failures.iter().map(|(key, _)| *key).collect()
            }
        }
    }
}

fn format_failures(failures: &[(FilterKey, FilterCheckError)]) -> String {
    failures
        .iter()
        .map(|(key, err)| format!("[{}] {}", key, err))
        .collect::<Vec<_>>()
        .join("; ")
}
