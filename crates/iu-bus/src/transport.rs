//! # Transport Port
//!
//! The contract between the buffers and whatever moves bytes between them.
//!
//! ## Delivery Rules
//!
//! | Primitive   | Thread                          | Blocking |
//! |-------------|---------------------------------|----------|
//! | `publish`   | caller                          | no       |
//! | `subscribe` | handler runs on a dispatch thread owned by the subscription | - |
//! | `call`      | caller, until the endpoint answers | yes   |

use crate::codec::CodecError;
use crate::topic::Topic;
use iu_types::Revision;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// An encoded message plus the name of the codec that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub schema: String,
    pub data: Arc<[u8]>,
}

impl Frame {
    #[must_use]
    pub fn new(schema: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            schema: schema.into(),
            data: data.into(),
        }
    }
}

/// Callback invoked once per frame delivered to a subscription.
pub type FrameHandler = Arc<dyn Fn(Frame) + Send + Sync>;

/// Errors raised by transport primitives.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The transport or the handle was shut down.
    #[error("Transport closed")]
    Closed,

    /// No one serves the addressed RPC endpoint.
    #[error("No RPC endpoint named {0}")]
    NoSuchEndpoint(String),

    /// The RPC endpoint name is already served.
    #[error("RPC endpoint {0} is already served")]
    EndpointInUse(String),

    /// A frame could not be encoded or decoded.
    #[error("Codec failure: {0}")]
    Codec(#[from] CodecError),

    /// Underlying I/O failure.
    #[error("Transport I/O failure: {0}")]
    Io(String),
}

/// Remote procedures exposed by an output buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcMethod {
    UpdatePayload,
    UpdateLinks,
    Commit,
    ResendRequest,
}

impl RpcMethod {
    /// Name of the method on the wire.
    #[must_use]
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::UpdatePayload => "updatePayload",
            Self::UpdateLinks => "updateLinks",
            Self::Commit => "commit",
            Self::ResendRequest => "requestResend",
        }
    }

    /// Parses a wire name.
    #[must_use]
    pub fn from_wire_name(name: &str) -> Option<Self> {
        match name {
            "updatePayload" => Some(Self::UpdatePayload),
            "updateLinks" => Some(Self::UpdateLinks),
            "commit" => Some(Self::Commit),
            "requestResend" => Some(Self::ResendRequest),
            _ => None,
        }
    }
}

impl fmt::Display for RpcMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Server side of an RPC endpoint.
///
/// Answers with the new revision, or `0` when the request was rejected.
pub trait RpcHandler: Send + Sync {
    fn handle(&self, method: RpcMethod, frame: Frame) -> Result<Revision, TransportError>;
}

/// Anything the transport handed out that can be switched off.
pub trait TransportHandle: Send + Sync {
    /// Stops delivery through this handle. Idempotent.
    ///
    /// After it returns no further callback runs, except the one in flight
    /// when called from the handle's own dispatch thread.
    fn deactivate(&self);

    fn is_active(&self) -> bool;
}

/// Client side of an RPC endpoint.
pub trait RpcClient: TransportHandle {
    /// Endpoint this client talks to.
    fn endpoint(&self) -> &str;

    /// Invokes `method` and blocks until the endpoint answers.
    fn call(&self, method: RpcMethod, frame: Frame) -> Result<Revision, TransportError>;
}

/// Publish/subscribe plus request/response, addressed by topic and endpoint.
pub trait Transport: Send + Sync {
    /// Queues `frame` to every active subscription on `topic`.
    ///
    /// Returns the number of subscriptions reached; zero is not an error.
    fn publish(&self, topic: &Topic, frame: Frame) -> Result<usize, TransportError>;

    fn subscribe(
        &self,
        topic: &Topic,
        handler: FrameHandler,
    ) -> Result<Box<dyn TransportHandle>, TransportError>;

    fn serve(
        &self,
        endpoint: &str,
        handler: Arc<dyn RpcHandler>,
    ) -> Result<Box<dyn TransportHandle>, TransportError>;

    fn connect(&self, endpoint: &str) -> Result<Arc<dyn RpcClient>, TransportError>;
}
