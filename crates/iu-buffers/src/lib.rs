//! # IU Buffers - Incremental Unit Synchronization
//!
//! Shares mutable, versioned data objects ("incremental units", IUs) between
//! loosely coupled components over a publish/subscribe transport.
//!
//! ## Purpose
//!
//! Every IU has exactly one owner. The owner's [`OutputBuffer`] holds the
//! authoritative [`LocalIu`] and broadcasts every change. Other components'
//! [`InputBuffer`]s mirror it as a [`RemoteIu`] proxy; writes to a proxy
//! travel to the owner as synchronous RPC calls and only take effect once the
//! owner accepts them.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|----------------------|
//! | Revision never decreases in one buffer | `domain/state.rs` - `IuState::advance_to()` |
//! | Committed IUs reject content writes | `domain/state.rs` - `IuState::ensure_writable()` |
//! | Accepted write = revision + 1, exactly | `domain/local.rs` - `LocalIu::write_*` under the IU lock |
//! | Stale remote writes rejected | `domain/local.rs` - `LocalIu::check_remote()` |
//! | Self-originated echoes discarded | `buffers/input.rs` - `InputShared::handle_frame()` |
//!
//! ## Write Paths
//!
//! ```text
//! LocalIu::put ──lock──▶ check ─▶ publish delta ─▶ apply ─▶ revision+1
//!
//! RemoteIu::put ──lock──▶ check ─▶ RPC updatePayload ──▶ OutputBuffer
//!                                                          │ lock LocalIu
//!                                                          │ revision check
//!                                                          │ publish delta (writer = requester)
//!               ◀──────────── new revision (0 = rejected) ─┘
//!               apply locally, revision = answer
//! ```
//!
//! ## Lifecycle per IU
//!
//! ```text
//! [OPEN] ──commit──▶ [COMMITTED]
//!    │                    │
//!    └──retract──▶ [RETRACTED] ◀──retract──┘
//! ```
//!
//! Commit and retraction are independent one-way flags. Retraction is checked
//! before commit: a retracted IU reports `Retracted` for every write.
//!
//! ## Module Structure
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  buffers/  - OutputBuffer, InputBuffer (transport wiring)       │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  ports/outbound.rs - IuPublisher, RemoteWriter                  │
//! │  events/           - EventHandlerRegistry                       │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  domain/ - Iu trait, LocalIu, RemoteIu, edits, state rules      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod buffers;
pub mod config;
pub mod domain;
pub mod events;
pub mod ports;

pub use buffers::{BufferContext, InputBuffer, OutputBuffer};
pub use config::BufferConfig;
pub use domain::{Iu, IuError, IuRef, LinkEdit, LocalIu, PayloadEdit, RemoteIu};
pub use events::{CategoryFilter, EventHandlerRegistry, HandlerId, IuEvent, IuEventHandler};

// Re-export the value types callers need alongside the buffers.
pub use iu_types::{AccessMode, IuEventType, LinkSet, Payload, PayloadType, Revision, Uid};
