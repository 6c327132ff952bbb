//! # Remote IU
//!
//! Read-through proxy of an IU owned by another component.
//!
//! Writes are requests: the proxy keeps its lock, asks the owner over RPC
//! and applies the change only after the owner answers with a revision.
//! Updates broadcast by the owner are applied by the input buffer through the
//! `apply_*` methods, which never move the revision backwards.

use super::edits::{LinkChange, LinkEdit, PayloadChange, PayloadEdit};
use super::errors::IuError;
use super::iu::Iu;
use super::state::IuState;
use crate::ports::RemoteWriter;
use iu_bus::{RpcMethod, TransportError};
use iu_types::{
    AccessMode, CommitNotice, IuMessage, IuSnapshot, LinkSet, LinkUpdate, Payload, PayloadType,
    PayloadUpdate, RetractionNotice, Revision, Uid, FAILED_REVISION,
};
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::debug;

/// Proxy of an IU owned elsewhere.
pub struct RemoteIu {
    uid: Uid,
    category: String,
    access_mode: AccessMode,
    payload_type: PayloadType,
    state: Mutex<IuState>,
    writer: Weak<dyn RemoteWriter>,
}

impl RemoteIu {
    /// Builds a proxy from the owner's snapshot.
    pub(crate) fn from_snapshot(snapshot: &IuSnapshot, writer: Weak<dyn RemoteWriter>) -> Self {
        Self {
            uid: snapshot.uid.clone(),
            category: snapshot.category.clone(),
            access_mode: snapshot.access_mode,
            payload_type: snapshot.payload_type,
            state: Mutex::new(IuState::from_snapshot(snapshot)),
            writer,
        }
    }

    fn writer(&self) -> Result<Arc<dyn RemoteWriter>, IuError> {
        self.writer
            .upgrade()
            .ok_or(IuError::Transport(TransportError::Closed))
    }

    fn owner(&self, state: &IuState) -> Result<String, IuError> {
        state.owner_name.clone().ok_or_else(|| IuError::NotOwner {
            uid: self.uid.clone(),
        })
    }

    /// Sends `message` to the owner; `0` becomes `UpdateFailed`.
    fn request(
        &self,
        state: &IuState,
        method: RpcMethod,
        message: &IuMessage,
    ) -> Result<Revision, IuError> {
        let owner = self.owner(state)?;
        let revision = self.writer()?.call_owner(&owner, method, message)?;
        if revision == FAILED_REVISION {
            debug!(uid = %self.uid, method = %method, owner = %owner, "Remote write rejected");
            return Err(IuError::UpdateFailed {
                uid: self.uid.clone(),
            });
        }
        Ok(revision)
    }

    fn ensure_remote_writable(&self, state: &IuState) -> Result<(), IuError> {
        state.ensure_writable(&self.uid)?;
        state.ensure_not_read_only(&self.uid)
    }

    fn write_payload(&self, state: &mut IuState, change: PayloadChange) -> Result<(), IuError> {
        if self.is_message() {
            state.apply_payload(&change);
            return Ok(());
        }
        let writer_name = self.writer()?.writer_name().to_string();
        let request = change.to_message(&self.uid, state.revision, &writer_name, self.payload_type);
        let revision = self.request(state, RpcMethod::UpdatePayload, &IuMessage::PayloadUpdate(request))?;
        state.apply_payload(&change);
        state.advance_to(revision);
        Ok(())
    }

    fn write_links(&self, state: &mut IuState, change: LinkChange) -> Result<(), IuError> {
        if self.is_message() {
            state.apply_links(&change);
            return Ok(());
        }
        let writer_name = self.writer()?.writer_name().to_string();
        let request = change.to_message(&self.uid, state.revision, &writer_name);
        let revision = self.request(state, RpcMethod::UpdateLinks, &IuMessage::LinkUpdate(request))?;
        state.apply_links(&change);
        state.advance_to(revision);
        Ok(())
    }

    // =========================================================================
    // OWNER BROADCASTS (crate-visible, used by InputBuffer)
    // =========================================================================

    pub(crate) fn apply_payload_update(&self, update: &PayloadUpdate) {
        let mut state = self.state.lock();
        state.apply_payload(&PayloadChange::from_message(update));
        state.advance_to(update.revision);
    }

    pub(crate) fn apply_link_update(&self, update: &LinkUpdate) {
        let mut state = self.state.lock();
        state.apply_links(&LinkChange::from_message(update));
        state.advance_to(update.revision);
    }

    pub(crate) fn apply_commit(&self, notice: &CommitNotice) {
        let mut state = self.state.lock();
        state.committed = true;
        state.advance_to(notice.revision);
    }

    pub(crate) fn apply_retraction(&self, notice: &RetractionNotice) {
        let mut state = self.state.lock();
        state.retracted = true;
        state.advance_to(notice.revision);
    }
}

impl Iu for RemoteIu {
    fn uid(&self) -> &Uid {
        &self.uid
    }

    fn category(&self) -> &str {
        &self.category
    }

    fn access_mode(&self) -> AccessMode {
        self.access_mode
    }

    fn payload_type(&self) -> PayloadType {
        self.payload_type
    }

    fn revision(&self) -> Revision {
        self.state.lock().revision
    }

    fn owner_name(&self) -> Option<String> {
        self.state.lock().owner_name.clone()
    }

    fn is_committed(&self) -> bool {
        self.state.lock().committed
    }

    fn is_retracted(&self) -> bool {
        self.state.lock().retracted
    }

    fn is_read_only(&self) -> bool {
        self.state.lock().read_only
    }

    fn is_local(&self) -> bool {
        false
    }

    fn payload(&self) -> Payload {
        self.state.lock().payload.clone()
    }

    fn links(&self) -> LinkSet {
        self.state.lock().links.clone()
    }

    fn commit(&self) -> Result<(), IuError> {
        let mut state = self.state.lock();
        if self.is_message() {
            state.committed = true;
            return Ok(());
        }
        self.ensure_remote_writable(&state)?;
        let notice = CommitNotice {
            uid: self.uid.clone(),
            revision: state.revision,
            writer_name: self.writer()?.writer_name().to_string(),
        };
        let revision = self.request(&state, RpcMethod::Commit, &IuMessage::Commit(notice))?;
        state.committed = true;
        state.advance_to(revision);
        Ok(())
    }

    fn retract(&self) -> Result<(), IuError> {
        if !self.is_message() {
            return Err(IuError::NotOwner {
                uid: self.uid.clone(),
            });
        }
        self.state.lock().retracted = true;
        Ok(())
    }

    fn edit_payload(&self, edit: PayloadEdit) -> Result<(), IuError> {
        let mut state = self.state.lock();
        if !self.is_message() {
            self.ensure_remote_writable(&state)?;
        }
        if edit.is_empty() {
            return Ok(());
        }
        self.write_payload(&mut state, edit.into_change())
    }

    fn set_payload(&self, payload: Payload) -> Result<(), IuError> {
        let mut state = self.state.lock();
        if !self.is_message() {
            self.ensure_remote_writable(&state)?;
        }
        self.write_payload(&mut state, PayloadChange::Replace(payload))
    }

    fn edit_links(&self, edit: LinkEdit) -> Result<(), IuError> {
        let mut state = self.state.lock();
        if !self.is_message() {
            self.ensure_remote_writable(&state)?;
        }
        if edit.is_empty() {
            return Ok(());
        }
        let change = edit.resolve(&state.links);
        self.write_links(&mut state, change)
    }

    fn replace_links(&self, links: LinkSet) -> Result<(), IuError> {
        let mut state = self.state.lock();
        if !self.is_message() {
            self.ensure_remote_writable(&state)?;
        }
        let change = LinkChange::replace(&state.links, links);
        self.write_links(&mut state, change)
    }
}

impl fmt::Debug for RemoteIu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RemoteIu")
            .field("uid", &self.uid)
            .field("category", &self.category)
            .field("owner", &state.owner_name)
            .field("revision", &state.revision)
            .field("committed", &state.committed)
            .field("retracted", &state.retracted)
            .finish()
    }
}
