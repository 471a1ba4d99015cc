//! Shared vocabulary for tuner topology validation.
//!
//! This crate defines the identifiers and relations that describe a declared
//! tuner hardware topology, independent of how that topology was loaded or
//! how it is exercised.
//!
//! # Resources and connections
//!
//! Every hardware unit is a [`ResourceRef`]: a [`ResourceKind`] plus a
//! per-kind [`ResourceId`]. Connections between units are directed [`Edge`]s
//! labelled with a [`Relation`]:
//!
//! ```text
//!  Lnb ──feeds──▶ Frontend ◀──attaches_to── Filter ◀──uses── RecordDvr
//!                    ▲                         ▲
//!                    └──attaches_to── Descrambler ──uses──┘
//! ```
//!
//! A demux has no identifier of its own: it is always opened on a frontend,
//! so the frontend id names the demux context.
//!
//! # Example
//!
//! ```rust
//! use tuner_vts_protocol::{Edge, Relation, ResourceId, ResourceKind, ResourceRef};
//!
//! let lnb = ResourceRef::new(ResourceKind::Lnb, ResourceId(0));
//! let frontend = ResourceRef::new(ResourceKind::Frontend, ResourceId(0));
//! let edge = Edge::new(lnb, Relation::Feeds, frontend);
//!
//! assert!(edge.is_legal());
//! assert!(!ResourceId::INVALID.is_valid());
//! ```

pub mod error;
pub mod filter_type;
pub mod types;

pub use error::{
    ConfigurationError, FilterCheckError, RegistryError, TopologyDiagnostics, TopologyIssue,
    VerificationFailure,
};
pub use filter_type::{
    AlpFilterType, FilterMainType, FilterSubType, FilterType, IpFilterType, MmtpFilterType,
    TlvFilterType, TsFilterType,
};
pub use types::{
    DataflowContext, DiseqcMessage, Edge, FilterKey, Relation, ResourceId, ResourceKind,
    ResourceRef,
};
