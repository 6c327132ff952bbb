//! Ports layer for the IU buffers.
//!
//! IUs reach the transport only through these traits, implemented by the
//! buffers that own or proxy them.

pub mod outbound;

pub use outbound::*;
