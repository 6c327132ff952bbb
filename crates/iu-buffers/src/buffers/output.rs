//! # Output Buffer
//!
//! Owns the local IUs of a component, publishes their state and serves the
//! RPC endpoint through which remote proxies request writes.
//!
//! ## RPC Outcomes
//!
//! Every handler is total: it answers the new revision on success and `0` for
//! every failure, which is logged here and never raised to the caller.
//!
//! | Method          | Rejected when                                         |
//! |-----------------|-------------------------------------------------------|
//! | `updatePayload` | unknown uid, stale revision, committed, retracted, read-only |
//! | `updateLinks`   | same as `updatePayload`                               |
//! | `commit`        | same as `updatePayload`                               |
//! | `requestResend` | unknown uid, empty target category                    |
//!
//! Handlers registered on the buffer see successful remote writes as events
//! with `local == true`, fired after the IU lock has been released.

use super::{unique_name, BufferContext};
use crate::domain::{Iu, IuError, LocalIu};
use crate::events::{EventHandlerRegistry, HandlerId, IuEvent, IuEventHandler};
use crate::ports::IuPublisher;
use iu_bus::{CodecTable, Frame, RpcHandler, RpcMethod, Topic, Transport, TransportError, TransportHandle};
use iu_types::{
    CommitNotice, IuEventType, IuMessage, LinkUpdate, PayloadUpdate, ResendRequest, Revision,
    Uid, FAILED_REVISION,
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Owning endpoint for the IUs a component creates.
pub struct OutputBuffer {
    inner: Arc<OutputShared>,
}

pub(crate) struct OutputShared {
    unique_name: String,
    channel: String,
    transport: Arc<dyn Transport>,
    codecs: Arc<CodecTable>,
    ius: RwLock<HashMap<Uid, Arc<LocalIu>>>,
    handlers: EventHandlerRegistry,
    endpoint: Mutex<Option<Box<dyn TransportHandle>>>,
    closed: AtomicBool,
}

impl OutputBuffer {
    /// Creates the buffer and serves its RPC endpoint.
    pub fn new(component: &str, context: &BufferContext) -> Result<Self, IuError> {
        let inner = Arc::new(OutputShared {
            unique_name: unique_name(component, "out"),
            channel: context.config.channel.clone(),
            transport: Arc::clone(&context.transport),
            codecs: Arc::clone(&context.codecs),
            ius: RwLock::new(HashMap::new()),
            handlers: EventHandlerRegistry::new(),
            endpoint: Mutex::new(None),
            closed: AtomicBool::new(false),
        });

        let endpoint = RpcEndpoint {
            buffer: Arc::downgrade(&inner),
        };
        let handle = inner
            .transport
            .serve(&inner.unique_name, Arc::new(endpoint))?;
        *inner.endpoint.lock() = Some(handle);

        info!(
            buffer = %inner.unique_name,
            channel = %inner.channel,
            codec = inner.codecs.outbound_schema(),
            "Output buffer created"
        );
        Ok(Self { inner })
    }

    /// Name of the RPC endpoint and owner name of every IU added here.
    #[must_use]
    pub fn unique_name(&self) -> &str {
        &self.inner.unique_name
    }

    #[must_use]
    pub fn channel(&self) -> &str {
        &self.inner.channel
    }

    /// Binds `iu` to this buffer and publishes its snapshot.
    ///
    /// Message IUs are published but not kept.
    pub fn add(&self, iu: Arc<LocalIu>) -> Result<(), IuError> {
        self.inner.ensure_open()?;
        let publisher: Arc<dyn IuPublisher> = self.inner.clone();

        if iu.is_message() {
            iu.bind(&publisher)?;
            debug!(buffer = %self.inner.unique_name, uid = %iu.uid(), "Message IU sent");
            return Ok(());
        }

        let mut ius = self.inner.ius.write();
        if ius.contains_key(iu.uid()) {
            return Err(IuError::AlreadyPublished {
                uid: iu.uid().clone(),
            });
        }
        iu.bind(&publisher)?;
        ius.insert(iu.uid().clone(), iu);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, uid: &str) -> Option<Arc<LocalIu>> {
        self.inner.get(uid)
    }

    /// Copy of the IU table.
    #[must_use]
    pub fn ius(&self) -> Vec<Arc<LocalIu>> {
        self.inner.ius.read().values().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.ius.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.ius.read().is_empty()
    }

    /// Retracts an IU of this buffer. Returns false if the uid is unknown.
    ///
    /// The IU stays in the table.
    pub fn retract(&self, uid: &str) -> Result<bool, IuError> {
        let Some(iu) = self.inner.get(uid) else {
            return Ok(false);
        };
        iu.retract()?;
        Ok(true)
    }

    pub fn register_handler(&self, handler: IuEventHandler) -> HandlerId {
        self.inner.handlers.register(handler)
    }

    pub fn unregister_handler(&self, id: HandlerId) -> bool {
        self.inner.handlers.unregister(id)
    }

    /// Withdraws the RPC endpoint. Idempotent.
    pub fn close(&self) {
        self.inner.close();
    }
}

impl Drop for OutputBuffer {
    fn drop(&mut self) {
        self.inner.close();
    }
}

impl OutputShared {
    fn ensure_open(&self) -> Result<(), IuError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(IuError::Transport(TransportError::Closed));
        }
        Ok(())
    }

    fn get(&self, uid: &str) -> Option<Arc<LocalIu>> {
        self.ius.read().get(uid).cloned()
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(endpoint) = self.endpoint.lock().take() {
            endpoint.deactivate();
        }
        info!(buffer = %self.unique_name, "Output buffer closed");
    }

    fn notify(&self, iu: Arc<LocalIu>, event_type: IuEventType) {
        let event = IuEvent {
            category: iu.category().to_string(),
            iu,
            event_type,
            local: true,
        };
        self.handlers.dispatch(&event);
    }

    // =========================================================================
    // RPC HANDLERS
    // =========================================================================

    fn lookup(&self, uid: &Uid, method: RpcMethod) -> Option<Arc<LocalIu>> {
        let iu = self.get(uid.as_str());
        if iu.is_none() {
            warn!(buffer = %self.unique_name, uid = %uid, method = %method, "Remote request for unknown IU");
        }
        iu
    }

    fn answer(
        &self,
        iu: Arc<LocalIu>,
        method: RpcMethod,
        writer: &str,
        outcome: Result<Revision, IuError>,
        event_type: IuEventType,
    ) -> Revision {
        match outcome {
            Ok(revision) => {
                debug!(uid = %iu.uid(), method = %method, writer = writer, revision = revision, "Remote write applied");
                self.notify(iu, event_type);
                revision
            }
            Err(e) => {
                warn!(uid = %iu.uid(), method = %method, writer = writer, error = %e, "Remote write rejected");
                FAILED_REVISION
            }
        }
    }

    fn remote_update_payload(&self, update: &PayloadUpdate) -> Revision {
        let Some(iu) = self.lookup(&update.uid, RpcMethod::UpdatePayload) else {
            return FAILED_REVISION;
        };
        let outcome = iu.apply_remote_payload(update);
        self.answer(iu, RpcMethod::UpdatePayload, &update.writer_name, outcome, IuEventType::Updated)
    }

    fn remote_update_links(&self, update: &LinkUpdate) -> Revision {
        let Some(iu) = self.lookup(&update.uid, RpcMethod::UpdateLinks) else {
            return FAILED_REVISION;
        };
        let outcome = iu.apply_remote_links(update);
        self.answer(iu, RpcMethod::UpdateLinks, &update.writer_name, outcome, IuEventType::LinksUpdated)
    }

    fn remote_commit(&self, notice: &CommitNotice) -> Revision {
        let Some(iu) = self.lookup(&notice.uid, RpcMethod::Commit) else {
            return FAILED_REVISION;
        };
        let outcome = iu.apply_remote_commit(notice);
        self.answer(iu, RpcMethod::Commit, &notice.writer_name, outcome, IuEventType::Committed)
    }

    fn remote_resend(&self, request: &ResendRequest) -> Revision {
        if request.target_category.is_empty() {
            warn!(uid = %request.uid, "Resend request without target category");
            return FAILED_REVISION;
        }
        let Some(iu) = self.lookup(&request.uid, RpcMethod::ResendRequest) else {
            return FAILED_REVISION;
        };
        match iu.resend(self, &request.target_category) {
            Ok(revision) => revision,
            Err(e) => {
                warn!(uid = %request.uid, error = %e, "Resend failed");
                FAILED_REVISION
            }
        }
    }

    fn handle_request(&self, method: RpcMethod, frame: &Frame) -> Revision {
        let message = match self.codecs.decode(frame) {
            Ok(message) => message,
            Err(e) => {
                warn!(buffer = %self.unique_name, method = %method, error = %e, "Undecodable RPC request");
                return FAILED_REVISION;
            }
        };
        match (method, &message) {
            (RpcMethod::UpdatePayload, IuMessage::PayloadUpdate(update)) => {
                self.remote_update_payload(update)
            }
            (RpcMethod::UpdateLinks, IuMessage::LinkUpdate(update)) => {
                self.remote_update_links(update)
            }
            (RpcMethod::Commit, IuMessage::Commit(notice)) => self.remote_commit(notice),
            (RpcMethod::ResendRequest, IuMessage::Resend(request)) => self.remote_resend(request),
            (method, message) => {
                warn!(method = %method, kind = message.kind(), "RPC method does not match request");
                FAILED_REVISION
            }
        }
    }
}

impl IuPublisher for OutputShared {
    fn owner_name(&self) -> &str {
        &self.unique_name
    }

    fn publish(&self, category: &str, message: &IuMessage) -> Result<(), IuError> {
        self.ensure_open()?;
        let frame = self.codecs.encode(message)?;
        let topic = Topic::new(&self.channel, category);
        let receivers = self.transport.publish(&topic, frame)?;
        debug!(
            buffer = %self.unique_name,
            topic = %topic,
            uid = %message.uid(),
            kind = message.kind(),
            receivers = receivers,
            "IU message published"
        );
        Ok(())
    }
}

/// RPC endpoint of an output buffer. Holds the buffer weakly so the
/// transport's routing table does not keep it alive.
struct RpcEndpoint {
    buffer: Weak<OutputShared>,
}

impl RpcHandler for RpcEndpoint {
    fn handle(&self, method: RpcMethod, frame: Frame) -> Result<Revision, TransportError> {
        let buffer = self.buffer.upgrade().ok_or(TransportError::Closed)?;
        if buffer.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        Ok(buffer.handle_request(method, &frame))
    }
}
