//! Resource, connection and scenario type definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of one concrete hardware unit within its [`ResourceKind`].
///
/// Ids are unique per kind only: `Frontend 0` and `Lnb 0` are different units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub u32);

impl ResourceId {
    /// Reserved sentinel meaning "no resource" (e.g. a scenario that is not
    /// LNB-backed). A registry never accepts it as a real id.
    pub const INVALID: ResourceId = ResourceId(u32::MAX);

    /// Returns true unless this is the [`ResourceId::INVALID`] sentinel.
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl Default for ResourceId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}", self.0)
        } else {
            f.write_str("INVALID")
        }
    }
}

/// Hardware resource kinds. Each kind has its own id namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Frontend,
    Lnb,
    AudioFilter,
    VideoFilter,
    SectionFilter,
    PcrFilter,
    IpFilter,
    PlaybackDvr,
    RecordDvr,
    TimeFilter,
    Descrambler,
}

impl ResourceKind {
    /// All kinds, in ordering order.
    pub const ALL: [ResourceKind; 11] = [
        ResourceKind::Frontend,
        ResourceKind::Lnb,
        ResourceKind::AudioFilter,
        ResourceKind::VideoFilter,
        ResourceKind::SectionFilter,
        ResourceKind::PcrFilter,
        ResourceKind::IpFilter,
        ResourceKind::PlaybackDvr,
        ResourceKind::RecordDvr,
        ResourceKind::TimeFilter,
        ResourceKind::Descrambler,
    ];

    /// Configuration name of the kind.
    pub fn name(self) -> &'static str {
        match self {
            ResourceKind::Frontend => "frontend",
            ResourceKind::Lnb => "lnb",
            ResourceKind::AudioFilter => "audio_filter",
            ResourceKind::VideoFilter => "video_filter",
            ResourceKind::SectionFilter => "section_filter",
            ResourceKind::PcrFilter => "pcr_filter",
            ResourceKind::IpFilter => "ip_filter",
            ResourceKind::PlaybackDvr => "playback_dvr",
            ResourceKind::RecordDvr => "record_dvr",
            ResourceKind::TimeFilter => "time_filter",
            ResourceKind::Descrambler => "descrambler",
        }
    }

    /// Any demux filter, including the time filter.
    pub fn is_filter(self) -> bool {
        self.is_stream_filter() || self == ResourceKind::TimeFilter
    }

    /// Filters that consume a sub-stream of the demux and can be wired
    /// to frontends, DVRs and descramblers.
    pub fn is_stream_filter(self) -> bool {
        matches!(
            self,
            ResourceKind::AudioFilter
                | ResourceKind::VideoFilter
                | ResourceKind::SectionFilter
                | ResourceKind::PcrFilter
                | ResourceKind::IpFilter
        )
    }

    /// Audio and video filters, the ones a descrambler works on.
    pub fn is_media_filter(self) -> bool {
        matches!(self, ResourceKind::AudioFilter | ResourceKind::VideoFilter)
    }

    pub fn is_dvr(self) -> bool {
        matches!(self, ResourceKind::PlaybackDvr | ResourceKind::RecordDvr)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Globally unique handle of a resource: its kind plus its per-kind id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub id: ResourceId,
}

impl ResourceRef {
    pub fn new(kind: ResourceKind, id: ResourceId) -> Self {
        Self { kind, id }
    }

    pub fn frontend(id: u32) -> Self {
        Self::new(ResourceKind::Frontend, ResourceId(id))
    }

    pub fn lnb(id: u32) -> Self {
        Self::new(ResourceKind::Lnb, ResourceId(id))
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Relation carried by a connection edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// Source delivers signal into the target (LNB into frontend).
    Feeds,
    /// Source lives on the target's demux context.
    AttachesTo,
    /// Source consumes or processes the target's output.
    Uses,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Relation::Feeds => "feeds",
            Relation::AttachesTo => "attaches_to",
            Relation::Uses => "uses",
        })
    }
}

/// A declared connection: `source --relation--> target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: ResourceRef,
    pub relation: Relation,
    pub target: ResourceRef,
}

impl Edge {
    pub fn new(source: ResourceRef, relation: Relation, target: ResourceRef) -> Self {
        Self {
            source,
            relation,
            target,
        }
    }

    /// Whether the `(source kind, relation, target kind)` triple is a
    /// connection the hardware model allows.
    pub fn is_legal(&self) -> bool {
        use ResourceKind::*;

        match (self.source.kind, self.relation, self.target.kind) {
            (Lnb, Relation::Feeds, Frontend) => true,
            (k, Relation::AttachesTo, Frontend) if k.is_stream_filter() => true,
            (RecordDvr | PlaybackDvr, Relation::Uses, k) if k.is_stream_filter() => true,
            (Descrambler, Relation::AttachesTo, Frontend) => true,
            (Descrambler, Relation::Uses, k) if k.is_media_filter() => true,
            _ => false,
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} --{}--> {}", self.source, self.relation, self.target)
    }
}

/// An opaque DiSEqC command addressed to one LNB.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiseqcMessage {
    pub lnb: ResourceId,
    pub payload: Vec<u8>,
}

impl DiseqcMessage {
    pub fn new(lnb: ResourceId, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            lnb,
            payload: payload.into(),
        }
    }
}

/// End-to-end scenario classes a topology can realize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataflowContext {
    LnbRecord,
    Record,
    Descrambling,
    LnbDescrambling,
}

impl DataflowContext {
    pub const ALL: [DataflowContext; 4] = [
        DataflowContext::LnbRecord,
        DataflowContext::Record,
        DataflowContext::Descrambling,
        DataflowContext::LnbDescrambling,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DataflowContext::LnbRecord => "lnb_record",
            DataflowContext::Record => "record",
            DataflowContext::Descrambling => "descrambling",
            DataflowContext::LnbDescrambling => "lnb_descrambling",
        }
    }

    /// Whether the scenario must be fed by an LNB.
    pub fn requires_lnb(self) -> bool {
        matches!(
            self,
            DataflowContext::LnbRecord | DataflowContext::LnbDescrambling
        )
    }

    pub fn is_descrambling(self) -> bool {
        matches!(
            self,
            DataflowContext::Descrambling | DataflowContext::LnbDescrambling
        )
    }
}

impl fmt::Display for DataflowContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Key under which a filter callback is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterKey {
    /// Keyed by the filter resource itself.
    Filter(ResourceRef),
    /// Keyed by a HAL-assigned filter session id.
    Session(i64),
}

impl From<ResourceRef> for FilterKey {
    fn from(value: ResourceRef) -> Self {
        FilterKey::Filter(value)
    }
}

impl fmt::Display for FilterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterKey::Filter(r) => write!(f, "{}", r),
            FilterKey::Session(id) => write!(f, "session:{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(kind: ResourceKind, id: u32) -> ResourceRef {
        ResourceRef::new(kind, ResourceId(id))
    }

    #[test]
    fn test_invalid_sentinel() {
        assert!(!ResourceId::INVALID.is_valid());
        assert!(ResourceId(0).is_valid());
        assert_eq!(ResourceId::default(), ResourceId::INVALID);
        assert_eq!(ResourceId::INVALID.to_string(), "INVALID");
    }

    #[test]
    fn test_legal_edges() {
        use ResourceKind::*;

        assert!(Edge::new(r(Lnb, 0), Relation::Feeds, r(Frontend, 0)).is_legal());
        assert!(Edge::new(r(VideoFilter, 1), Relation::AttachesTo, r(Frontend, 0)).is_legal());
        assert!(Edge::new(r(RecordDvr, 0), Relation::Uses, r(SectionFilter, 2)).is_legal());
        assert!(Edge::new(r(Descrambler, 0), Relation::Uses, r(AudioFilter, 0)).is_legal());

        // Wrong direction / wrong relation / unsupported pairs.
        assert!(!Edge::new(r(Frontend, 0), Relation::Feeds, r(Lnb, 0)).is_legal());
        assert!(!Edge::new(r(Lnb, 0), Relation::AttachesTo, r(Frontend, 0)).is_legal());
        assert!(!Edge::new(r(TimeFilter, 0), Relation::AttachesTo, r(Frontend, 0)).is_legal());
        assert!(!Edge::new(r(Descrambler, 0), Relation::Uses, r(SectionFilter, 0)).is_legal());
    }

    #[test]
    fn test_ref_ordering_by_kind_then_id() {
        let mut refs = vec![
            r(ResourceKind::VideoFilter, 0),
            r(ResourceKind::AudioFilter, 7),
            r(ResourceKind::AudioFilter, 2),
        ];
        refs.sort();
        assert_eq!(
            refs,
            vec![
                r(ResourceKind::AudioFilter, 2),
                r(ResourceKind::AudioFilter, 7),
                r(ResourceKind::VideoFilter, 0),
            ]
        );
    }

    #[test]
    fn test_dataflow_context_flags() {
        assert!(DataflowContext::LnbRecord.requires_lnb());
        assert!(!DataflowContext::Record.requires_lnb());
        assert!(DataflowContext::LnbDescrambling.is_descrambling());
        assert_eq!(DataflowContext::LnbDescrambling.to_string(), "lnb_descrambling");
    }

    #[test]
    fn test_relation_display_matches_config_names() {
        assert_eq!(Relation::Feeds.to_string(), "feeds");
        assert_eq!(Relation::AttachesTo.to_string(), "attaches_to");
        assert_eq!(Relation::Uses.to_string(), "uses");

        let edge = Edge::new(
            r(ResourceKind::AudioFilter, 1),
            Relation::AttachesTo,
            ResourceRef::frontend(0),
        );
        assert!(edge.to_string().contains("--attaches_to-->"));
    }

    #[test]
    fn test_filter_key_display() {
        let key = FilterKey::from(r(ResourceKind::PcrFilter, 3));
        assert_eq!(key.to_string(), "pcr_filter:3");
        assert_eq!(FilterKey::Session(42).to_string(), "session:42");
    }
}
