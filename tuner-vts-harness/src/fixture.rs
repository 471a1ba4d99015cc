//! Per-test fixture lifecycle.
//!
//! Each test group sets up the suite topology, optionally parametrises over
//! the bindings of its dataflow contexts, and tears everything down when the
//! case ends, including when it fails part way.

use std::fmt;

use log::{debug, info};

use tuner_vts::{filter_data_output_test, FilterCallbackMap, ScenarioBinding, VerificationReport};
use tuner_vts_protocol::{DataflowContext, DiseqcMessage, ResourceId, VerificationFailure};

use crate::config::TopologyConfig;
use crate::error::Result;
use crate::suite::{init_configuration, SuiteTopology};

/// HAL object families a test group drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HalWrapper {
    Frontend,
    Demux,
    Filter,
    Dvr,
    Lnb,
    Descrambler,
}

/// Test groups of the suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FixtureKind {
    Lnb,
    Demux,
    Filter,
    Playback,
    Record,
    Frontend,
    Broadcast,
    Descrambler,
}

impl FixtureKind {
    pub const ALL: [FixtureKind; 8] = [
        FixtureKind::Lnb,
        FixtureKind::Demux,
        FixtureKind::Filter,
        FixtureKind::Playback,
        FixtureKind::Record,
        FixtureKind::Frontend,
        FixtureKind::Broadcast,
        FixtureKind::Descrambler,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FixtureKind::Lnb => "lnb",
            FixtureKind::Demux => "demux",
            FixtureKind::Filter => "filter",
            FixtureKind::Playback => "playback",
            FixtureKind::Record => "record",
            FixtureKind::Frontend => "frontend",
            FixtureKind::Broadcast => "broadcast",
            FixtureKind::Descrambler => "descrambler",
        }
    }

    /// Wrappers initialised in set-up, in initialisation order.
    pub fn required_wrappers(self) -> &'static [HalWrapper] {
        use HalWrapper::*;

        match self {
            FixtureKind::Lnb => &[Lnb],
            FixtureKind::Frontend => &[Frontend],
            FixtureKind::Demux | FixtureKind::Filter => &[Frontend, Demux, Filter],
            FixtureKind::Playback => &[Frontend, Demux, Filter, Dvr],
            FixtureKind::Record => &[Frontend, Demux, Filter, Dvr, Lnb],
            FixtureKind::Broadcast => &[Frontend, Demux, Filter, Lnb, Dvr],
            FixtureKind::Descrambler => &[Frontend, Demux, Filter, Descrambler, Dvr, Lnb],
        }
    }

    /// Contexts whose bindings parametrise this group.
    pub fn dataflow_contexts(self) -> &'static [DataflowContext] {
        match self {
            FixtureKind::Record => &[DataflowContext::LnbRecord, DataflowContext::Record],
            FixtureKind::Descrambler => &[
                DataflowContext::Descrambling,
                DataflowContext::LnbDescrambling,
            ],
            _ => &[],
        }
    }

    /// Whether the group may open an LNB for its scenario.
    pub fn tracks_lnb(self) -> bool {
        self.required_wrappers().contains(&HalWrapper::Lnb) && self != FixtureKind::Lnb
    }
}

impl fmt::Display for FixtureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// State of one running test case.
pub struct TunerFixture {
    kind: FixtureKind,
    suite: SuiteTopology,
    callbacks: FilterCallbackMap,
    lnb_id: ResourceId,
    properties: Vec<(String, String)>,
    torn_down: bool,
}

impl TunerFixture {
    /// Initialise the suite topology for a `kind` test case.
    pub fn set_up(kind: FixtureKind, config: &TopologyConfig) -> Result<Self> {
        let suite = init_configuration(config)?;
        debug!(
            "Fixture {} set up with wrappers {:?}",
            kind,
            kind.required_wrappers()
        );
        Ok(Self {
            kind,
            suite,
            callbacks: FilterCallbackMap::new(),
            lnb_id: ResourceId::INVALID,
            properties: Vec::new(),
            torn_down: false,
        })
    }

    pub fn kind(&self) -> FixtureKind {
        self.kind
    }

    pub fn suite(&self) -> &SuiteTopology {
        &self.suite
    }

    /// Bindings to run a parametrised test over.
    ///
    /// An empty slice means the test is not instantiated for this device.
    pub fn parameters(&self, context: DataflowContext) -> &[ScenarioBinding] {
        let bindings = self.suite.bindings().get(context);
        if bindings.is_empty() {
            info!(
                "{}: no {} binding, parametrised test not instantiated",
                self.kind, context
            );
        }
        bindings
    }

    /// Every binding of the group's contexts, context by context.
    pub fn all_parameters(&self) -> Vec<&ScenarioBinding> {
        self.kind
            .dataflow_contexts()
            .iter()
            .flat_map(|context| self.parameters(*context))
            .collect()
    }

    /// Start a scenario; remembers its LNB for teardown when the group
    /// opens one.
    pub fn open_scenario(&mut self, binding: &ScenarioBinding) {
        match binding.lnb() {
            Some(lnb) if self.kind.tracks_lnb() => self.lnb_id = lnb,
            _ => self.lnb_id = ResourceId::INVALID,
        }
        debug!("{}: opened scenario {}", self.kind, binding.name());
    }

    /// LNB opened by the current scenario, [`ResourceId::INVALID`] if none.
    pub fn lnb_id(&self) -> ResourceId {
        self.lnb_id
    }

    /// DiSEqC messages to send to the current scenario's LNB.
    pub fn diseqc_messages(&self) -> Vec<&DiseqcMessage> {
        if !self.lnb_id.is_valid() {
            return Vec::new();
        }
        self.suite
            .registry()
            .diseqc_messages_for(self.lnb_id)
            .collect()
    }

    pub fn callbacks(&self) -> &FilterCallbackMap {
        &self.callbacks
    }

    pub async fn filter_data_output_test(
        &self,
    ) -> std::result::Result<VerificationReport, VerificationFailure> {
        filter_data_output_test(&self.callbacks).await
    }

    /// Record a `description` property for the test report.
    pub fn description(&mut self, description: impl Into<String>) {
        self.properties
            .push(("description".to_owned(), description.into()));
    }

    pub fn properties(&self) -> &[(String, String)] {
        &self.properties
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Release the suite's resources. Safe to call more than once.
    pub fn tear_down(&mut self) {
        if !self.torn_down {
            debug!("Fixture {} tearing down", self.kind);
        }
        self.suite.reset();
        self.callbacks.clear();
        self.lnb_id = ResourceId::INVALID;
        self.torn_down = true;
    }
}

impl Drop for TunerFixture {
    fn drop(&mut self) {
        self.tear_down();
    }
}

impl fmt::Debug for TunerFixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TunerFixture")
            .field("kind", &self.kind)
            .field("lnb_id", &self.lnb_id)
            .field("callbacks", &self.callbacks)
            .field("torn_down", &self.torn_down)
            .finish()
    }
}
