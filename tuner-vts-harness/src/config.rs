//! Topology configuration file.
//!
//! A topology is described in TOML:
//!
//! ```toml
//! [logging]
//! level = "debug"
//!
//! [resources]
//! frontend = [0]
//! lnb = [0]
//! video_filter = [0]
//! record_dvr = [0]
//!
//! [[diseqc]]
//! lnb = 0
//! payload = [0xE0, 0x10, 0x38, 0xF0]
//!
//! [[connections]]
//! from = { kind = "lnb", id = 0 }
//! relation = "feeds"
//! to = { kind = "frontend", id = 0 }
//!
//! [dataflows]
//! enabled = ["lnb_record", "record"]
//! ```
//!
//! The file for a run is `<base>.<variant>.toml`, where the variant usually
//! names the device under test.

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Deserialize;

use tuner_vts::{ConnectionGraph, Registry};
use tuner_vts_protocol::{
    DataflowContext, DiseqcMessage, Edge, Relation, ResourceId, ResourceKind, ResourceRef,
};

use crate::error::{HarnessError, Result};

/// Environment variable selecting the configuration variant.
pub const VARIANT_ENV: &str = "TUNER_VTS_CONFIG_VARIANT";

/// Default base path of the configuration file.
pub const DEFAULT_CONFIG_BASE: &str = "tuner_vts_config";

/// Whole configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopologyConfig {
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub resources: ResourcesSection,
    #[serde(default)]
    pub diseqc: Vec<DiseqcEntry>,
    #[serde(default)]
    pub connections: Vec<ConnectionEntry>,
    #[serde(default)]
    pub dataflows: DataflowsSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingSection {
    pub level: Option<String>,
    pub log_dir: Option<String>,
    pub retention_days: Option<u64>,
}

/// Declared ids, one array per resource kind.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResourcesSection {
    pub frontend: Vec<u32>,
    pub lnb: Vec<u32>,
    pub audio_filter: Vec<u32>,
    pub video_filter: Vec<u32>,
    pub section_filter: Vec<u32>,
    pub pcr_filter: Vec<u32>,
    pub ip_filter: Vec<u32>,
    pub playback_dvr: Vec<u32>,
    pub record_dvr: Vec<u32>,
    pub time_filter: Vec<u32>,
    pub descrambler: Vec<u32>,
}

impl ResourcesSection {
    /// Declared ids of `kind`, in file order.
    pub fn ids(&self, kind: ResourceKind) -> &[u32] {
        match kind {
            ResourceKind::Frontend => &self.frontend,
            ResourceKind::Lnb => &self.lnb,
            ResourceKind::AudioFilter => &self.audio_filter,
            ResourceKind::VideoFilter => &self.video_filter,
            ResourceKind::SectionFilter => &self.section_filter,
            ResourceKind::PcrFilter => &self.pcr_filter,
            ResourceKind::IpFilter => &self.ip_filter,
            ResourceKind::PlaybackDvr => &self.playback_dvr,
            ResourceKind::RecordDvr => &self.record_dvr,
            ResourceKind::TimeFilter => &self.time_filter,
            ResourceKind::Descrambler => &self.descrambler,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiseqcEntry {
    pub lnb: u32,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionEntry {
    pub from: ResourceRef,
    pub relation: Relation,
    pub to: ResourceRef,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataflowsSection {
    #[serde(default)]
    pub enabled: Vec<DataflowContext>,
}

/// Configuration variant from the environment, if set and non-empty.
pub fn variant_from_env() -> Option<String> {
    std::env::var(VARIANT_ENV).ok().filter(|v| !v.is_empty())
}

/// Compose the configuration file path for `base` and `variant`.
///
/// A trailing `.toml` on `base` is ignored. An empty variant selects the
/// base file itself.
pub fn config_path(base: &Path, variant: Option<&str>) -> PathBuf {
    let base = if base.extension().map_or(false, |ext| ext == "toml") {
        base.with_extension("")
    } else {
        base.to_path_buf()
    };

    let mut name = OsString::from(base.as_os_str());
    if let Some(variant) = variant.filter(|v| !v.is_empty()) {
        name.push(".");
        name.push(variant);
    }
    name.push(".toml");
    PathBuf::from(name)
}

impl TopologyConfig {
    /// Resolve and load the configuration of `variant`.
    pub fn load(base: &Path, variant: Option<&str>) -> Result<Self> {
        let path = config_path(base, variant);
        Self::load_file(&path)
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(HarnessError::ConfigNotFound(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        info!("Loaded topology configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Populate a fresh registry with every declared resource and DiSEqC
    /// message.
    pub fn build_registry(&self) -> Result<Registry> {
        let mut registry = Registry::new();
        for kind in ResourceKind::ALL {
            for &raw in self.resources.ids(kind) {
                let id = ResourceId(raw);
                if !registry.insert(kind, id)? {
                    return Err(HarnessError::DuplicateResource { kind, id });
                }
            }
            debug!("{}: {} declared", kind, registry.count(kind));
        }
        for entry in &self.diseqc {
            registry.add_diseqc_message(DiseqcMessage::new(
                ResourceId(entry.lnb),
                entry.payload.clone(),
            ));
        }
        Ok(registry)
    }

    /// Connection graph in declaration order.
    pub fn build_graph(&self) -> ConnectionGraph {
        ConnectionGraph::from_edges(
            self.connections
                .iter()
                .map(|c| Edge::new(c.from, c.relation, c.to)),
        )
    }

    pub fn enabled_dataflows(&self) -> BTreeSet<DataflowContext> {
        self.dataflows.enabled.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[logging]
level = "debug"

[resources]
frontend = [1, 0]
lnb = [0]
video_filter = [0]
record_dvr = [0]

[[diseqc]]
lnb = 0
payload = [0xE0, 0x10, 0x38, 0xF0]

[[connections]]
from = { kind = "lnb", id = 0 }
relation = "feeds"
to = { kind = "frontend", id = 0 }

[[connections]]
from = { kind = "video_filter", id = 0 }
relation = "attaches_to"
to = { kind = "frontend", id = 0 }

[dataflows]
enabled = ["record", "lnb_record"]
"#;

    #[test]
    fn test_parse_sample() {
        let config = TopologyConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.logging.level.as_deref(), Some("debug"));
        assert_eq!(config.resources.ids(ResourceKind::Frontend), &[1, 0]);
        assert!(config.resources.ids(ResourceKind::Descrambler).is_empty());
        assert_eq!(config.diseqc[0].payload, vec![0xE0, 0x10, 0x38, 0xF0]);
        assert_eq!(config.connections[1].relation, Relation::AttachesTo);
        assert_eq!(
            config.enabled_dataflows().into_iter().collect::<Vec<_>>(),
            vec![DataflowContext::LnbRecord, DataflowContext::Record]
        );
    }

    #[test]
    fn test_build_registry_and_graph() {
        let config = TopologyConfig::from_toml_str(SAMPLE).unwrap();
        let registry = config.build_registry().unwrap();
        assert_eq!(registry.count(ResourceKind::Frontend), 2);
        assert_eq!(registry.diseqc_messages().len(), 1);

        let graph = config.build_graph();
        assert_eq!(graph.edges().len(), 2);
        assert_eq!(graph.lnbs_feeding(ResourceId(0)), vec![ResourceId(0)]);
    }

    #[test]
    fn test_duplicate_resource() {
        let config = TopologyConfig::from_toml_str("[resources]\nlnb = [3, 3]\n").unwrap();
        assert!(matches!(
            config.build_registry(),
            Err(HarnessError::DuplicateResource {
                kind: ResourceKind::Lnb,
                id: ResourceId(3),
            })
        ));
    }

    #[test]
    fn test_sentinel_id_rejected() {
        let config =
            TopologyConfig::from_toml_str("[resources]\nfrontend = [4294967295]\n").unwrap();
        assert!(matches!(
            config.build_registry(),
            Err(HarnessError::Registry(_))
        ));
    }

    #[test]
    fn test_unknown_resource_kind_rejected() {
        assert!(matches!(
            TopologyConfig::from_toml_str("[resources]\ndemux = [0]\n"),
            Err(HarnessError::Toml(_))
        ));
    }

    #[test]
    fn test_empty_file() {
        let config = TopologyConfig::from_toml_str("").unwrap();
        assert!(config.build_registry().unwrap().is_empty());
        assert!(config.build_graph().is_empty());
        assert!(config.enabled_dataflows().is_empty());
    }

    #[test]
    fn test_config_path() {
        let base = Path::new("configs/tuner_vts_config");
        assert_eq!(
            config_path(base, Some("cuttlefish")),
            PathBuf::from("configs/tuner_vts_config.cuttlefish.toml")
        );
        assert_eq!(config_path(base, Some("")), PathBuf::from("configs/tuner_vts_config.toml"));
        assert_eq!(config_path(base, None), PathBuf::from("configs/tuner_vts_config.toml"));
        assert_eq!(
            config_path(Path::new("tuner.toml"), Some("a")),
            PathBuf::from("tuner.a.toml")
        );
    }

    #[test]
    fn test_missing_file() {
        let base = std::env::temp_dir().join("tuner-vts-harness-missing");
        match TopologyConfig::load(&base, Some("nope")) {
            Err(HarnessError::ConfigNotFound(path)) => {
                assert!(path.ends_with("tuner-vts-harness-missing.nope.toml"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_load_from_disk() {
        let dir = std::env::temp_dir().join(format!("tuner-vts-harness-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let base = dir.join("topology");
        std::fs::write(config_path(&base, Some("dev")), SAMPLE).unwrap();

        let config = TopologyConfig::load(&base, Some("dev")).unwrap();
        assert_eq!(config.connections.len(), 2);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
