//! tuner-vts - topology validation and dataflow classification for tuner
//! hardware tests.
//!
//! The crate takes a declared tuner topology (frontends, LNBs, demux filters,
//! DVRs, descramblers and the connections between them), checks that it is
//! consistent, and works out which end-to-end scenarios it can exercise.
//! Once a scenario is streaming, it verifies the output of every opened
//! filter.
//!
//! Suite initialisation runs once:
//!
//! 1. [`Registry`]: the declared ids of each resource kind
//! 2. [`ConnectionGraph`]: the declared connections
//! 3. [`validator::validate`]: referential integrity, legality, cardinality
//!    and scenario requirements, yielding a [`ValidatedTopology`]
//! 4. [`classifier::determine_data_flows`]: every [`ScenarioBinding`] per
//!    [`DataflowContext`]
//!
//! Per test case, filter callbacks are registered in a [`FilterCallbackMap`]
//! and checked with [`verifier::filter_data_output_test`]. Teardown calls
//! [`Registry::reset_all`].

pub mod classifier;
pub mod graph;
pub mod registry;
pub mod validator;
pub mod verifier;

pub use classifier::{determine_data_flows, DataflowBindings, ScenarioBinding};
pub use graph::ConnectionGraph;
pub use registry::Registry;
pub use validator::{validate, validate_connections, ValidatedTopology};
pub use verifier::{
    filter_data_output_test, ChannelFilterCallback, FilterCallback, FilterCallbackMap,
    FilterEvent, FilterEventSender, FilterExpectation, FilterStatus, VerificationReport,
};

pub use tuner_vts_protocol::{
    ConfigurationError, DataflowContext, DiseqcMessage, Edge, FilterCheckError, FilterKey,
    Relation, ResourceId, ResourceKind, ResourceRef, TopologyDiagnostics, TopologyIssue,
    VerificationFailure,
};
