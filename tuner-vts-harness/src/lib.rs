//! Harness around the tuner-vts core.
//!
//! Loads a topology configuration, initialises the suite (validate, then
//! classify), and manages per-test fixtures.

pub mod config;
pub mod error;
pub mod fixture;
pub mod logging;
pub mod suite;

pub use config::{config_path, variant_from_env, TopologyConfig};
pub use error::{HarnessError, Result};
pub use fixture::{FixtureKind, HalWrapper, TunerFixture};
pub use suite::{init_configuration, ResourceSummary, SuiteSummary, SuiteTopology};
