//! # Wire Message Schema
//!
//! Messages exchanged between output and input buffers.
//!
//! ```text
//! OutputBuffer ──publish──▶ topic ──▶ InputBuffer       (Snapshot, PayloadUpdate,
//!                                                         LinkUpdate, Commit, Retraction)
//! RemoteIu ──rpc──▶ OutputBuffer ──▶ Revision (0 = rejected)
//! ```
//!
//! Every struct is plain data with no skipped or defaulted fields, so the same
//! shape round-trips through self-describing and non-self-describing codecs.

use crate::entities::{
    AccessMode, LinkSet, Payload, PayloadType, Revision, Uid,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// ITEM-LEVEL ENCODING
// =============================================================================

/// One payload entry as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadItem {
    pub key: String,
    pub value: String,
    /// `"str"` for plain values, `"json"` for JSON-encoded values.
    pub type_tag: String,
}

impl PayloadItem {
    pub fn new(key: impl Into<String>, value: impl Into<String>, payload_type: PayloadType) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            type_tag: payload_type.type_tag().to_string(),
        }
    }
}

/// Targets of one link type as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEntry {
    pub link_type: String,
    pub targets: Vec<String>,
}

/// Encodes a payload as wire items tagged with `payload_type`.
#[must_use]
pub fn payload_to_items(payload: &Payload, payload_type: PayloadType) -> Vec<PayloadItem> {
    payload
        .iter()
        .map(|(k, v)| PayloadItem::new(k, v, payload_type))
        .collect()
}

/// Decodes wire items into a payload. Later duplicates win.
#[must_use]
pub fn items_to_payload(items: &[PayloadItem]) -> Payload {
    items
        .iter()
        .map(|item| (item.key.clone(), item.value.clone()))
        .collect()
}

/// Encodes a link set as wire entries, one per link type.
#[must_use]
pub fn links_to_entries(links: &LinkSet) -> Vec<LinkEntry> {
    links
        .iter()
        .map(|(link_type, targets)| LinkEntry {
            link_type: link_type.to_string(),
            targets: targets.iter().cloned().collect(),
        })
        .collect()
}

/// Decodes wire entries into a link set.
#[must_use]
pub fn entries_to_links(entries: &[LinkEntry]) -> LinkSet {
    entries
        .iter()
        .map(|entry| (entry.link_type.as_str(), entry.targets.iter().cloned()))
        .collect()
}

// =============================================================================
// MESSAGES
// =============================================================================

/// Full state of an IU, published when it is added to an output buffer
/// and when a resend is requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IuSnapshot {
    pub uid: Uid,
    pub revision: Revision,
    pub category: String,
    pub owner_name: String,
    pub committed: bool,
    pub retracted: bool,
    pub read_only: bool,
    pub access_mode: AccessMode,
    pub payload_type: PayloadType,
    pub payload: Vec<PayloadItem>,
    pub links: Vec<LinkEntry>,
}

/// Payload change. With `is_delta == false`, `new_items` is the complete
/// replacement payload and `keys_to_remove` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadUpdate {
    pub uid: Uid,
    pub revision: Revision,
    pub is_delta: bool,
    pub writer_name: String,
    pub payload_type: PayloadType,
    pub new_items: Vec<PayloadItem>,
    pub keys_to_remove: Vec<String>,
}

/// Link change. With `is_delta == false`, `new_links` is the complete
/// replacement link set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkUpdate {
    pub uid: Uid,
    pub revision: Revision,
    pub is_delta: bool,
    pub writer_name: String,
    pub new_links: Vec<LinkEntry>,
    pub links_to_remove: Vec<LinkEntry>,
}

/// Commit of an IU, both as an RPC request and as a broadcast notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitNotice {
    pub uid: Uid,
    pub revision: Revision,
    pub writer_name: String,
}

/// Retraction of an IU by its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetractionNotice {
    pub uid: Uid,
    pub revision: Revision,
}

/// Request to republish an IU's full state onto a private category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResendRequest {
    pub uid: Uid,
    pub target_category: String,
}

/// Every message the bus carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IuMessage {
    Snapshot(IuSnapshot),
    PayloadUpdate(PayloadUpdate),
    LinkUpdate(LinkUpdate),
    Commit(CommitNotice),
    Retraction(RetractionNotice),
    Resend(ResendRequest),
}

impl IuMessage {
    /// Uid of the IU this message concerns.
    #[must_use]
    pub fn uid(&self) -> &Uid {
        match self {
            Self::Snapshot(m) => &m.uid,
            Self::PayloadUpdate(m) => &m.uid,
            Self::LinkUpdate(m) => &m.uid,
            Self::Commit(m) => &m.uid,
            Self::Retraction(m) => &m.uid,
            Self::Resend(m) => &m.uid,
        }
    }

    /// Short name of the message kind, for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Snapshot(_) => "snapshot",
            Self::PayloadUpdate(_) => "payload_update",
            Self::LinkUpdate(_) => "link_update",
            Self::Commit(_) => "commit",
            Self::Retraction(_) => "retraction",
            Self::Resend(_) => "resend",
        }
    }

    /// Identity of the buffer whose write caused this message, if it carries one.
    #[must_use]
    pub fn writer_name(&self) -> Option<&str> {
        match self {
            Self::PayloadUpdate(m) => Some(&m.writer_name),
            Self::LinkUpdate(m) => Some(&m.writer_name),
            Self::Commit(m) => Some(&m.writer_name),
            Self::Snapshot(_) | Self::Retraction(_) | Self::Resend(_) => None,
        }
    }

    /// Revision carried by the message, if any.
    #[must_use]
    pub fn revision(&self) -> Option<Revision> {
        match self {
            Self::Snapshot(m) => Some(m.revision),
            Self::PayloadUpdate(m) => Some(m.revision),
            Self::LinkUpdate(m) => Some(m.revision),
            Self::Commit(m) => Some(m.revision),
            Self::Retraction(m) => Some(m.revision),
            Self::Resend(_) => None,
        }
    }
}
