//! # Local IU
//!
//! The authoritative copy of an IU, held by the component that created it.
//!
//! Every write, local or requested over RPC, runs the same sequence under the
//! IU lock:
//!
//! ```text
//! lock ─▶ preconditions ─▶ publish delta (revision + 1) ─▶ apply ─▶ unlock
//! ```
//!
//! A failed publish leaves the state untouched, so an accepted write always
//! corresponds to exactly one revision and one broadcast.

use super::edits::{LinkChange, LinkEdit, PayloadChange, PayloadEdit};
use super::errors::IuError;
use super::iu::Iu;
use super::state::IuState;
use crate::ports::IuPublisher;
use iu_bus::TransportError;
use iu_types::{
    links_to_entries, payload_to_items, AccessMode, CommitNotice, IuMessage, IuSnapshot,
    LinkSet, LinkUpdate, Payload, PayloadType, PayloadUpdate, RetractionNotice, Revision, Uid,
    ANY_REVISION,
};
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};
use tracing::{debug, info};

/// Where the effect of a write goes.
enum Sink {
    /// Not yet added to a buffer: apply and count revisions, nothing to send.
    Unpublished,
    /// Published message IU: later writes stay in this process.
    LocalOnly,
    Broadcast(Arc<dyn IuPublisher>),
}

/// Authoritative IU owned by this component.
pub struct LocalIu {
    uid: Uid,
    category: String,
    access_mode: AccessMode,
    payload_type: PayloadType,
    state: Mutex<IuState>,
    publisher: OnceLock<Weak<dyn IuPublisher>>,
}

impl LocalIu {
    /// New persistent IU in `category` with a fresh uid.
    #[must_use]
    pub fn new(category: &str) -> Self {
        Self::with_access_mode(category, AccessMode::Push, false)
    }

    /// New fire-and-forget message IU. Messages are read-only for remote writers.
    #[must_use]
    pub fn message(category: &str) -> Self {
        Self::with_access_mode(category, AccessMode::Message, true)
    }

    fn with_access_mode(category: &str, access_mode: AccessMode, read_only: bool) -> Self {
        Self {
            uid: Uid::generate(),
            category: category.to_string(),
            access_mode,
            payload_type: PayloadType::default(),
            state: Mutex::new(IuState::new(Payload::new(), read_only)),
            publisher: OnceLock::new(),
        }
    }

    /// Replaces the generated uid.
    #[must_use]
    pub fn with_uid(mut self, uid: impl Into<Uid>) -> Self {
        self.uid = uid.into();
        self
    }

    /// Initial payload; does not count as a write.
    #[must_use]
    pub fn with_payload(self, payload: Payload) -> Self {
        self.state.lock().payload = payload;
        self
    }

    /// Initial links; does not count as a write.
    #[must_use]
    pub fn with_links(self, links: LinkSet) -> Self {
        self.state.lock().links = links;
        self
    }

    #[must_use]
    pub fn with_payload_type(mut self, payload_type: PayloadType) -> Self {
        self.payload_type = payload_type;
        self
    }

    /// Marks the IU read-only for remote writers.
    #[must_use]
    pub fn with_read_only(self, read_only: bool) -> Self {
        self.state.lock().read_only = read_only;
        self
    }

    /// Returns true once the IU has been added to an output buffer.
    #[must_use]
    pub fn is_published(&self) -> bool {
        self.publisher.get().is_some()
    }

    /// Full current state in wire form.
    #[must_use]
    pub fn snapshot(&self) -> IuSnapshot {
        let state = self.state.lock();
        let owner = state.owner_name.clone().unwrap_or_default();
        self.snapshot_of(&state, &owner)
    }

    fn snapshot_of(&self, state: &IuState, owner_name: &str) -> IuSnapshot {
        IuSnapshot {
            uid: self.uid.clone(),
            revision: state.revision,
            category: self.category.clone(),
            owner_name: owner_name.to_string(),
            committed: state.committed,
            retracted: state.retracted,
            read_only: state.read_only,
            access_mode: self.access_mode,
            payload_type: self.payload_type,
            payload: payload_to_items(&state.payload, self.payload_type),
            links: links_to_entries(&state.links),
        }
    }

    fn sink(&self) -> Result<Sink, IuError> {
        let Some(publisher) = self.publisher.get() else {
            return Ok(Sink::Unpublished);
        };
        if self.access_mode == AccessMode::Message {
            return Ok(Sink::LocalOnly);
        }
        publisher
            .upgrade()
            .map(Sink::Broadcast)
            .ok_or(IuError::Transport(TransportError::Closed))
    }

    // =========================================================================
    // BUFFER BINDING (crate-visible, used by OutputBuffer)
    // =========================================================================

    /// Binds the IU to `publisher` and broadcasts its full snapshot.
    ///
    /// The snapshot goes out under the IU lock, so no delta can precede it.
    pub(crate) fn bind(&self, publisher: &Arc<dyn IuPublisher>) -> Result<(), IuError> {
        let mut state = self.state.lock();
        if self.is_published() {
            return Err(IuError::AlreadyPublished {
                uid: self.uid.clone(),
            });
        }
        let owner = publisher.owner_name().to_string();
        let snapshot = self.snapshot_of(&state, &owner);
        publisher.publish(&self.category, &IuMessage::Snapshot(snapshot))?;

        state.owner_name = Some(owner);
        if self.publisher.set(Arc::downgrade(publisher)).is_err() {
            return Err(IuError::AlreadyPublished {
                uid: self.uid.clone(),
            });
        }
        debug!(uid = %self.uid, category = %self.category, "IU published");
        Ok(())
    }

    /// Publishes the current snapshot to `target_category`. Not a write.
    pub(crate) fn resend(
        &self,
        publisher: &dyn IuPublisher,
        target_category: &str,
    ) -> Result<Revision, IuError> {
        let state = self.state.lock();
        let snapshot = self.snapshot_of(&state, publisher.owner_name());
        publisher.publish(target_category, &IuMessage::Snapshot(snapshot))?;
        debug!(uid = %self.uid, target = target_category, "IU resent");
        Ok(state.revision)
    }

    // =========================================================================
    // REMOTE WRITES (crate-visible, used by the owner's RPC handlers)
    // =========================================================================

    fn check_remote(&self, state: &IuState, revision: Revision) -> Result<(), IuError> {
        state.ensure_writable(&self.uid)?;
        state.ensure_not_read_only(&self.uid)?;
        if revision != ANY_REVISION && revision != state.revision {
            debug!(
                uid = %self.uid,
                current = state.revision,
                requested = revision,
                "Stale remote write"
            );
            return Err(IuError::UpdateFailed {
                uid: self.uid.clone(),
            });
        }
        Ok(())
    }

    pub(crate) fn apply_remote_payload(&self, update: &PayloadUpdate) -> Result<Revision, IuError> {
        let mut state = self.state.lock();
        self.check_remote(&state, update.revision)?;
        self.write_payload(
            &mut state,
            PayloadChange::from_message(update),
            Some(&update.writer_name),
        )
    }

    pub(crate) fn apply_remote_links(&self, update: &LinkUpdate) -> Result<Revision, IuError> {
        let mut state = self.state.lock();
        self.check_remote(&state, update.revision)?;
        let change = match LinkChange::from_message(update) {
            LinkChange::Replace { links, .. } => LinkChange::replace(&state.links, links),
            delta => delta,
        };
        self.write_links(&mut state, change, Some(&update.writer_name))
    }

    pub(crate) fn apply_remote_commit(&self, notice: &CommitNotice) -> Result<Revision, IuError> {
        let mut state = self.state.lock();
        self.check_remote(&state, notice.revision)?;
        self.write_commit(&mut state, Some(&notice.writer_name))
    }

    // =========================================================================
    // WRITE SEQUENCES (caller holds the IU lock)
    // =========================================================================

    fn write_payload(
        &self,
        state: &mut IuState,
        change: PayloadChange,
        writer: Option<&str>,
    ) -> Result<Revision, IuError> {
        match self.sink()? {
            Sink::Unpublished => {
                state.apply_payload(&change);
                state.revision = state.next_revision();
            }
            Sink::LocalOnly => {
                state.apply_payload(&change);
                info!(uid = %self.uid, "Message IU payload changed after publication, local effect only");
            }
            Sink::Broadcast(publisher) => {
                let revision = state.next_revision();
                let writer = writer.unwrap_or(publisher.owner_name());
                let update = change.to_message(&self.uid, revision, writer, self.payload_type);
                publisher.publish(&self.category, &IuMessage::PayloadUpdate(update))?;
                state.apply_payload(&change);
                state.revision = revision;
                debug!(uid = %self.uid, revision = revision, writer = writer, "Payload updated");
            }
        }
        Ok(state.revision)
    }

    fn write_links(
        &self,
        state: &mut IuState,
        change: LinkChange,
        writer: Option<&str>,
    ) -> Result<Revision, IuError> {
        match self.sink()? {
            Sink::Unpublished => {
                state.apply_links(&change);
                state.revision = state.next_revision();
            }
            Sink::LocalOnly => {
                state.apply_links(&change);
                info!(uid = %self.uid, "Message IU links changed after publication, local effect only");
            }
            Sink::Broadcast(publisher) => {
                let revision = state.next_revision();
                let writer = writer.unwrap_or(publisher.owner_name());
                let update = change.to_message(&self.uid, revision, writer);
                publisher.publish(&self.category, &IuMessage::LinkUpdate(update))?;
                state.apply_links(&change);
                state.revision = revision;
                debug!(uid = %self.uid, revision = revision, writer = writer, "Links updated");
            }
        }
        Ok(state.revision)
    }

    fn write_commit(&self, state: &mut IuState, writer: Option<&str>) -> Result<Revision, IuError> {
        match self.sink()? {
            Sink::Unpublished => {
                state.committed = true;
                state.revision = state.next_revision();
            }
            Sink::LocalOnly => {
                state.committed = true;
                info!(uid = %self.uid, "Message IU committed after publication, local effect only");
            }
            Sink::Broadcast(publisher) => {
                let revision = state.next_revision();
                let notice = CommitNotice {
                    uid: self.uid.clone(),
                    revision,
                    writer_name: writer.unwrap_or(publisher.owner_name()).to_string(),
                };
                publisher.publish(&self.category, &IuMessage::Commit(notice))?;
                state.committed = true;
                state.revision = revision;
                debug!(uid = %self.uid, revision = revision, "IU committed");
            }
        }
        Ok(state.revision)
    }

    fn write_retraction(&self, state: &mut IuState) -> Result<Revision, IuError> {
        match self.sink()? {
            Sink::Unpublished => {
                state.retracted = true;
                state.revision = state.next_revision();
            }
            Sink::LocalOnly => state.retracted = true,
            Sink::Broadcast(publisher) => {
                let revision = state.next_revision();
                let notice = RetractionNotice {
                    uid: self.uid.clone(),
                    revision,
                };
                publisher.publish(&self.category, &IuMessage::Retraction(notice))?;
                state.retracted = true;
                state.revision = revision;
                debug!(uid = %self.uid, revision = revision, "IU retracted");
            }
        }
        Ok(state.revision)
    }
}

impl Iu for LocalIu {
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
        true
    }

    fn payload(&self) -> Payload {
        self.state.lock().payload.clone()
    }

    fn links(&self) -> LinkSet {
        self.state.lock().links.clone()
    }

    fn commit(&self) -> Result<(), IuError> {
        let mut state = self.state.lock();
        state.ensure_committable(&self.uid)?;
        self.write_commit(&mut state, None).map(drop)
    }

    fn retract(&self) -> Result<(), IuError> {
        let mut state = self.state.lock();
        if state.retracted {
            return Ok(());
        }
        self.write_retraction(&mut state).map(drop)
    }

    fn edit_payload(&self, edit: PayloadEdit) -> Result<(), IuError> {
        let mut state = self.state.lock();
        state.ensure_writable(&self.uid)?;
        if edit.is_empty() {
            return Ok(());
        }
        self.write_payload(&mut state, edit.into_change(), None)
            .map(drop)
    }

    fn set_payload(&self, payload: Payload) -> Result<(), IuError> {
        let mut state = self.state.lock();
        state.ensure_writable(&self.uid)?;
        self.write_payload(&mut state, PayloadChange::Replace(payload), None)
            .map(drop)
    }

    fn edit_links(&self, edit: LinkEdit) -> Result<(), IuError> {
        let mut state = self.state.lock();
        state.ensure_writable(&self.uid)?;
        if edit.is_empty() {
            return Ok(());
        }
        let change = edit.resolve(&state.links);
        self.write_links(&mut state, change, None).map(drop)
    }

    fn replace_links(&self, links: LinkSet) -> Result<(), IuError> {
        let mut state = self.state.lock();
        state.ensure_writable(&self.uid)?;
        let change = LinkChange::replace(&state.links, links);
        self.write_links(&mut state, change, None).map(drop)
    }
}

impl fmt::Debug for LocalIu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("LocalIu")
            .field("uid", &self.uid)
            .field("category", &self.category)
            .field("access_mode", &self.access_mode)
            .field("revision", &state.revision)
            .field("committed", &state.committed)
            .field("retracted", &state.retracted)
            .finish()
    }
}
