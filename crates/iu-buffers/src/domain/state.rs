//! Mutable state of one IU, guarded by the IU's lock.

use super::edits::{LinkChange, PayloadChange};
use super::errors::IuError;
use iu_types::{
    entries_to_links, items_to_payload, IuSnapshot, LinkSet, Payload, Revision, Uid,
    INITIAL_REVISION,
};

/// Everything about an IU that changes after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct IuState {
    pub revision: Revision,
    pub owner_name: Option<String>,
    pub committed: bool,
    pub retracted: bool,
    pub read_only: bool,
    pub payload: Payload,
    pub links: LinkSet,
}

impl IuState {
    pub(crate) fn new(payload: Payload, read_only: bool) -> Self {
        Self {
            revision: INITIAL_REVISION,
            owner_name: None,
            committed: false,
            retracted: false,
            read_only,
            payload,
            links: LinkSet::new(),
        }
    }

    pub(crate) fn from_snapshot(snapshot: &IuSnapshot) -> Self {
        Self {
            revision: snapshot.revision,
            owner_name: Some(snapshot.owner_name.clone()),
            committed: snapshot.committed,
            retracted: snapshot.retracted,
            read_only: snapshot.read_only,
            payload: items_to_payload(&snapshot.payload),
            links: entries_to_links(&snapshot.links),
        }
    }

    /// Content writes need an IU that is neither retracted nor committed.
    pub(crate) fn ensure_writable(&self, uid: &Uid) -> Result<(), IuError> {
        if self.retracted {
            return Err(IuError::Retracted { uid: uid.clone() });
        }
        if self.committed {
            return Err(IuError::Committed { uid: uid.clone() });
        }
        Ok(())
    }

    /// Same order as for writes: a second commit reports `Committed`.
    pub(crate) fn ensure_committable(&self, uid: &Uid) -> Result<(), IuError> {
        self.ensure_writable(uid)
    }

    pub(crate) fn ensure_not_read_only(&self, uid: &Uid) -> Result<(), IuError> {
        if self.read_only {
            return Err(IuError::ReadOnly { uid: uid.clone() });
        }
        Ok(())
    }

    pub(crate) fn apply_payload(&mut self, change: &PayloadChange) {
        change.apply_to(&mut self.payload);
    }

    pub(crate) fn apply_links(&mut self, change: &LinkChange) {
        change.apply_to(&mut self.links);
    }

    /// Moves the revision forward to `revision`; never moves it back.
    pub(crate) fn advance_to(&mut self, revision: Revision) {
        self.revision = self.revision.max(revision);
    }

    /// Revision the next accepted write will carry.
    pub(crate) fn next_revision(&self) -> Revision {
        self.revision + 1
    }
}
