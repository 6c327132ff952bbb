//! # IU Types Crate
//!
//! Value types of the incremental unit (IU) model and the messages that carry
//! IU state between buffers.
//!
//! ## Design Principles
//!
//! - **Pure data**: nothing in this crate performs I/O or holds locks.
//! - **One schema**: every message exchanged over the transport is a variant of
//!   [`IuMessage`]; codecs in `iu-bus` only ever see this enum.
//! - **Revision `0` is reserved**: it means "failed" in RPC answers and
//!   "ignore the version check" in write requests, never a real revision.

pub mod entities;
pub mod ipc;

pub use entities::*;
pub use ipc::*;
