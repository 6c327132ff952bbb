//! The interface shared by local, remote and message IUs.
//!
//! | Variant            | Type       | Writes go to                        |
//! |--------------------|------------|-------------------------------------|
//! | Local (published)  | `LocalIu`  | in place, then broadcast            |
//! | Local message      | `LocalIu`  | in place only, after publication    |
//! | Remote proxy       | `RemoteIu` | owner via RPC, applied on success   |
//! | Remote message     | `RemoteIu` | in place only                       |

use super::edits::{LinkEdit, PayloadEdit};
use super::errors::IuError;
use iu_types::{AccessMode, LinkSet, Payload, PayloadType, Revision, Uid};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Shared handle to any IU variant.
pub type IuRef = Arc<dyn Iu>;

/// Capabilities of an incremental unit.
///
/// Accessors return copies taken under the IU lock.
pub trait Iu: Send + Sync + fmt::Debug {
    fn uid(&self) -> &Uid;

    fn category(&self) -> &str;

    fn access_mode(&self) -> AccessMode;

    fn payload_type(&self) -> PayloadType;

    fn revision(&self) -> Revision;

    /// Unique name of the owning output buffer, once known.
    fn owner_name(&self) -> Option<String>;

    fn is_committed(&self) -> bool;

    fn is_retracted(&self) -> bool;

    fn is_read_only(&self) -> bool;

    /// True for the authoritative copy.
    fn is_local(&self) -> bool;

    fn payload(&self) -> Payload;

    fn links(&self) -> LinkSet;

    /// Freezes the IU against further content writes.
    fn commit(&self) -> Result<(), IuError>;

    /// Withdraws the IU. Only the owner may retract a published IU.
    fn retract(&self) -> Result<(), IuError>;

    /// Applies a batch of puts and removals as one write.
    fn edit_payload(&self, edit: PayloadEdit) -> Result<(), IuError>;

    /// Replaces the whole payload.
    fn set_payload(&self, payload: Payload) -> Result<(), IuError>;

    /// Applies a batch of link operations as one write.
    fn edit_links(&self, edit: LinkEdit) -> Result<(), IuError>;

    /// Replaces the whole link set.
    fn replace_links(&self, links: LinkSet) -> Result<(), IuError>;

    fn is_message(&self) -> bool {
        self.access_mode() == AccessMode::Message
    }

    fn payload_value(&self, key: &str) -> Option<String> {
        self.payload().get(key).map(str::to_string)
    }

    fn link_targets(&self, link_type: &str) -> BTreeSet<String> {
        self.links().get(link_type)
    }

    fn put(&self, key: &str, value: &str) -> Result<(), IuError> {
        self.edit_payload(PayloadEdit::new().put(key, value))
    }

    fn remove(&self, key: &str) -> Result<(), IuError> {
        self.edit_payload(PayloadEdit::new().remove(key))
    }

    fn merge(&self, items: Payload) -> Result<(), IuError> {
        self.edit_payload(PayloadEdit::new().merge(items))
    }

    fn add_links(&self, link_type: &str, targets: &[&str]) -> Result<(), IuError> {
        self.edit_links(LinkEdit::new().add(link_type, targets.iter().copied()))
    }

    fn remove_links(&self, link_type: &str, targets: &[&str]) -> Result<(), IuError> {
        self.edit_links(LinkEdit::new().remove(link_type, targets.iter().copied()))
    }

    fn set_links(&self, link_type: &str, targets: &[&str]) -> Result<(), IuError> {
        self.edit_links(LinkEdit::new().set(link_type, targets.iter().copied()))
    }

    fn modify_links(&self, add: &LinkSet, remove: &LinkSet) -> Result<(), IuError> {
        self.edit_links(LinkEdit::new().modify(add, remove))
    }
}
