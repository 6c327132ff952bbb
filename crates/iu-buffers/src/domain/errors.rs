//! IU error types.
//!
//! Precondition errors are raised at the call site and never cross the wire.
//! A rejected remote write reaches the requester only as `UpdateFailed`.

use iu_bus::{CodecError, TransportError};
use iu_types::Uid;
use thiserror::Error;

/// Errors raised by IU and buffer operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IuError {
    /// The IU is already bound to a buffer, or its uid is already in the table.
    #[error("IU {uid} is already published")]
    AlreadyPublished { uid: Uid },

    /// Content write or second commit on a committed IU.
    #[error("IU {uid} is committed")]
    Committed { uid: Uid },

    /// Write or commit on a retracted IU.
    #[error("IU {uid} is retracted")]
    Retracted { uid: Uid },

    /// Write attempted through a read-only proxy.
    #[error("IU {uid} is read-only")]
    ReadOnly { uid: Uid },

    /// The owner rejected a remote write (stale revision or owner-side rejection).
    #[error("Remote update of IU {uid} was rejected by its owner")]
    UpdateFailed { uid: Uid },

    /// The owner could not resend the IU.
    #[error("Resend of IU {uid} was rejected by its owner")]
    ResendFailed { uid: Uid },

    /// Operation reserved to the owner was attempted on a proxy.
    #[error("IU {uid} is not owned by this component")]
    NotOwner { uid: Uid },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}
