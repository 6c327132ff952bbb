//! Outbound (Driven) ports used by IUs.

use crate::domain::IuError;
use iu_bus::RpcMethod;
use iu_types::{IuMessage, Revision};

/// Broadcast side of an output buffer, as seen by its local IUs.
pub trait IuPublisher: Send + Sync {
    /// Unique name of the owning buffer; local writes carry it as writer name.
    fn owner_name(&self) -> &str;

    /// Publishes `message` to the topic of `category` on the buffer's channel.
    fn publish(&self, category: &str, message: &IuMessage) -> Result<(), IuError>;
}

/// RPC side of an input buffer, as seen by its remote IU proxies.
pub trait RemoteWriter: Send + Sync {
    /// Unique name of the input buffer; sent as writer name for self-echo detection.
    fn writer_name(&self) -> &str;

    /// Calls `method` on the output buffer named `owner`.
    ///
    /// # Returns
    /// - `Ok(0)`: the owner rejected the request
    /// - `Ok(revision)`: the new revision of the IU
    /// - `Err`: the call never reached an answer
    fn call_owner(
        &self,
        owner: &str,
        method: RpcMethod,
        message: &IuMessage,
    ) -> Result<Revision, IuError>;
}
