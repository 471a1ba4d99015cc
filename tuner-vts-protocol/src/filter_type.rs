//! Demux filter type descriptors.
//!
//! A filter type is a main type (the transport it parses) plus a sub type
//! drawn from that main type's own vocabulary. [`FilterSubType`] carries the
//! main type in its variant, so a TS sub type can never be paired with an
//! MMTP main type.

use serde::{Deserialize, Serialize};

use crate::types::ResourceKind;

/// Transport a demux filter parses. Values are the HAL bit flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum FilterMainType {
    Ts = 1 << 0,
    Mmtp = 1 << 1,
    Ip = 1 << 2,
    Tlv = 1 << 3,
    Alp = 1 << 4,
}

impl FilterMainType {
    /// Main type for a single set bit, `None` for unknown bits.
    pub fn from_bit(bit: u32) -> Option<Self> {
        match 1u32.checked_shl(bit)? {
            0x01 => Some(FilterMainType::Ts),
            0x02 => Some(FilterMainType::Mmtp),
            0x04 => Some(FilterMainType::Ip),
            0x08 => Some(FilterMainType::Tlv),
            0x10 => Some(FilterMainType::Alp),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TsFilterType {
    Undefined,
    Section,
    Pes,
    Ts,
    Audio,
    Video,
    Pcr,
    Record,
    Temi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MmtpFilterType {
    Undefined,
    Section,
    Pes,
    Mmtp,
    Audio,
    Video,
    Record,
    Download,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IpFilterType {
    Undefined,
    Section,
    Ntp,
    IpPayload,
    Ip,
    PayloadThrough,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TlvFilterType {
    Undefined,
    Section,
    Tlv,
    PayloadThrough,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlpFilterType {
    Undefined,
    Section,
    Ptp,
    PayloadThrough,
}

/// Sub type, tagged by the main type it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterSubType {
    Ts(TsFilterType),
    Mmtp(MmtpFilterType),
    Ip(IpFilterType),
    Tlv(TlvFilterType),
    Alp(AlpFilterType),
}

/// Complete filter type descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterType {
    pub sub_type: FilterSubType,
}

impl FilterType {
    pub fn new(sub_type: FilterSubType) -> Self {
        Self { sub_type }
    }

    pub fn main_type(&self) -> FilterMainType {
        match self.sub_type {
            FilterSubType::Ts(_) => FilterMainType::Ts,
            FilterSubType::Mmtp(_) => FilterMainType::Mmtp,
            FilterSubType::Ip(_) => FilterMainType::Ip,
            FilterSubType::Tlv(_) => FilterMainType::Tlv,
            FilterSubType::Alp(_) => FilterMainType::Alp,
        }
    }

    /// Filter type used when linking filters of main type `1 << bit`:
    /// the main type with an undefined sub type.
    pub fn linkage(bit: u32) -> Option<Self> {
        let sub_type = match FilterMainType::from_bit(bit)? {
            FilterMainType::Ts => FilterSubType::Ts(TsFilterType::Undefined),
            FilterMainType::Mmtp => FilterSubType::Mmtp(MmtpFilterType::Undefined),
            FilterMainType::Ip => FilterSubType::Ip(IpFilterType::Undefined),
            FilterMainType::Tlv => FilterSubType::Tlv(TlvFilterType::Undefined),
            FilterMainType::Alp => FilterSubType::Alp(AlpFilterType::Undefined),
        };
        Some(Self::new(sub_type))
    }
}

impl ResourceKind {
    /// Filter type a filter of this kind is opened with.
    ///
    /// Returns `None` for non-filter kinds and for the time filter, which is
    /// opened without a type.
    pub fn filter_type(self) -> Option<FilterType> {
        let sub_type = match self {
            ResourceKind::AudioFilter => FilterSubType::Ts(TsFilterType::Audio),
            ResourceKind::VideoFilter => FilterSubType::Ts(TsFilterType::Video),
            ResourceKind::SectionFilter => FilterSubType::Ts(TsFilterType::Section),
            ResourceKind::PcrFilter => FilterSubType::Ts(TsFilterType::Pcr),
            ResourceKind::IpFilter => FilterSubType::Ip(IpFilterType::Ip),
            _ => return None,
        };
        Some(FilterType::new(sub_type))
    }
}
