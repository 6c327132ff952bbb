//! # IU Bus - Transport Port for Incremental Unit Buffers
//!
//! The buffers never talk to a network directly. They see the transport only
//! through the [`Transport`] trait object built once at process start.
//!
//! ## Primitives
//!
//! ```text
//! ┌──────────────┐  publish(topic)   ┌───────────┐  subscribe(topic)  ┌─────────────┐
//! │ OutputBuffer │ ────────────────▶ │ Transport │ ─────────────────▶ │ InputBuffer │
//! │              │ ◀──────────────── │           │ ◀───────────────── │  RemoteIu   │
//! └──────────────┘   serve(endpoint) └───────────┘  connect(endpoint)  └─────────────┘
//! ```
//!
//! - **Topics** are `/iu/channel/<channel>/category/<category>`.
//! - **RPC endpoints** are named by the owning buffer's unique name.
//! - **Frames** carry the codec schema name next to the bytes, so peers with
//!   different outbound codecs still understand each other.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod codec;
pub mod memory;
pub mod subscription;
pub mod topic;
pub mod transport;

pub use codec::{BincodeCodec, Codec, CodecError, CodecTable, JsonCodec, WireCodec};
pub use memory::InMemoryTransport;
pub use topic::Topic;
pub use transport::{
    Frame, FrameHandler, RpcClient, RpcHandler, RpcMethod, Transport, TransportError,
    TransportHandle,
};

/// Channel used when none is configured.
pub const DEFAULT_CHANNEL: &str = "default";

/// Prefix of every topic path.
pub const TOPIC_ROOT: &str = "/iu/channel";
