//! # Input Buffer
//!
//! Mirrors the IUs of the categories a component is interested in.
//!
//! ## Frame Handling
//!
//! | Message          | Known uid                         | Unknown uid              |
//! |------------------|-----------------------------------|--------------------------|
//! | Snapshot (push)  | ignored, first snapshot wins      | proxy inserted, ADDED    |
//! | Snapshot (message) | -                               | MESSAGE, never stored    |
//! | Payload update   | applied, UPDATED                  | logged, dropped          |
//! | Link update      | applied, LINKSUPDATED             | logged, dropped          |
//! | Commit notice    | applied, COMMITTED                | logged, dropped          |
//! | Retraction       | marked, RETRACTED, proxy kept     | logged, dropped          |
//!
//! Updates whose writer name equals this buffer's own name are echoes of
//! writes this buffer already applied after the owner's answer; they are
//! dropped before lookup.
//!
//! Every buffer also listens on a private category `<prefix>-<suffix>` where
//! owners deliver snapshots requested with [`InputBuffer::request_resend`].

use super::{random_suffix, unique_name, BufferContext};
use crate::domain::{Iu, IuError, RemoteIu};
use crate::events::{CategoryFilter, EventHandlerRegistry, HandlerId, IuEvent, IuEventHandler};
use crate::ports::RemoteWriter;
use iu_bus::{
    CodecTable, Frame, FrameHandler, RpcClient, RpcMethod, Topic, Transport, TransportError,
    TransportHandle,
};
use iu_types::{
    AccessMode, CommitNotice, IuEventType, IuMessage, IuSnapshot, LinkUpdate, PayloadUpdate,
    ResendRequest, RetractionNotice, Revision, Uid, FAILED_REVISION,
};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Consuming endpoint: proxies of IUs owned by other buffers.
pub struct InputBuffer {
    inner: Arc<InputShared>,
}

pub(crate) struct InputShared {
    unique_name: String,
    channel: String,
    private_category: String,
    transport: Arc<dyn Transport>,
    codecs: Arc<CodecTable>,
    ius: RwLock<HashMap<Uid, Arc<RemoteIu>>>,
    handlers: EventHandlerRegistry,
    subscriptions: Mutex<HashMap<String, Box<dyn TransportHandle>>>,
    owners: Mutex<HashMap<String, Arc<dyn RpcClient>>>,
    closed: AtomicBool,
    this: Weak<InputShared>,
}

impl InputBuffer {
    /// Creates the buffer and subscribes to `categories` plus its private category.
    pub fn new<I, S>(component: &str, categories: I, context: &BufferContext) -> Result<Self, IuError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let config = &context.config;
        let inner = Arc::new_cyclic(|this| InputShared {
            unique_name: unique_name(component, "in"),
            channel: config.channel.clone(),
            private_category: format!("{}-{}", config.private_category_prefix, random_suffix()),
            transport: Arc::clone(&context.transport),
            codecs: Arc::clone(&context.codecs),
            ius: RwLock::new(HashMap::new()),
            handlers: EventHandlerRegistry::new(),
            subscriptions: Mutex::new(HashMap::new()),
            owners: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
            this: this.clone(),
        });

        let buffer = Self { inner };
        buffer
            .inner
            .subscribe_categories(std::iter::once(buffer.inner.private_category.clone()))?;
        buffer
            .inner
            .subscribe_categories(categories.into_iter().map(Into::into))?;

        info!(
            buffer = %buffer.inner.unique_name,
            channel = %buffer.inner.channel,
            private_category = %buffer.inner.private_category,
            "Input buffer created"
        );
        Ok(buffer)
    }

    /// Writer name sent with every remote write of this buffer's proxies.
    #[must_use]
    pub fn unique_name(&self) -> &str {
        &self.inner.unique_name
    }

    #[must_use]
    pub fn channel(&self) -> &str {
        &self.inner.channel
    }

    /// Category on which requested resends arrive.
    #[must_use]
    pub fn private_category(&self) -> &str {
        &self.inner.private_category
    }

    /// Subscribed categories, without the private one.
    #[must_use]
    pub fn categories(&self) -> BTreeSet<String> {
        self.inner
            .subscriptions
            .lock()
            .keys()
            .filter(|category| **category != self.inner.private_category)
            .cloned()
            .collect()
    }

    /// Proxy for `uid`, if this buffer has seen its snapshot.
    ///
    /// Message IUs are never stored, so they are not returned here, not even
    /// while their `MESSAGE` event is being dispatched. Handlers reach them
    /// only through [`IuEvent::iu`].
    #[must_use]
    pub fn get(&self, uid: &str) -> Option<Arc<RemoteIu>> {
        self.inner.ius.read().get(uid).cloned()
    }

    /// Copy of the proxy table.
    #[must_use]
    pub fn ius(&self) -> Vec<Arc<RemoteIu>> {
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

    /// Starts listening on more categories. Known categories are skipped.
    pub fn add_category_interests<I, S>(&self, categories: I) -> Result<(), IuError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner
            .subscribe_categories(categories.into_iter().map(Into::into))
    }

    /// Stops listening on categories. Proxies already received stay in the table.
    pub fn remove_category_interests<I, S>(&self, categories: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let removed: Vec<(String, Box<dyn TransportHandle>)> = {
            let mut subscriptions = self.inner.subscriptions.lock();
            categories
                .into_iter()
                .map(Into::into)
                .filter(|category| *category != self.inner.private_category)
                .filter_map(|category| {
                    subscriptions
                        .remove(&category)
                        .map(|handle| (category, handle))
                })
                .collect()
        };
        for (category, handle) in removed {
            handle.deactivate();
            info!(buffer = %self.inner.unique_name, category = %category, "Category interest removed");
        }
    }

    /// Registers a handler. A handler restricted to specific categories also
    /// subscribes this buffer to them.
    pub fn register_handler(&self, handler: IuEventHandler) -> Result<HandlerId, IuError> {
        if let CategoryFilter::Only(categories) = handler.categories() {
            self.add_category_interests(categories.iter().cloned())?;
        }
        Ok(self.inner.handlers.register(handler))
    }

    pub fn unregister_handler(&self, id: HandlerId) -> bool {
        self.inner.handlers.unregister(id)
    }

    /// Asks `owner` to republish `uid` on this buffer's private category.
    pub fn request_resend(&self, uid: &str, owner: &str) -> Result<(), IuError> {
        let uid = Uid::from(uid);
        let request = IuMessage::Resend(ResendRequest {
            uid: uid.clone(),
            target_category: self.inner.private_category.clone(),
        });
        let revision = self
            .inner
            .call_owner(owner, RpcMethod::ResendRequest, &request)?;
        if revision == FAILED_REVISION {
            return Err(IuError::ResendFailed { uid });
        }
        debug!(buffer = %self.inner.unique_name, uid = %uid, owner = owner, "Resend requested");
        Ok(())
    }

    /// Deactivates every subscription and RPC client. Idempotent.
    pub fn close(&self) {
        self.inner.close();
    }
}

impl Drop for InputBuffer {
    fn drop(&mut self) {
        self.inner.close();
    }
}

impl InputShared {
    fn ensure_open(&self) -> Result<(), IuError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(IuError::Transport(TransportError::Closed));
        }
        Ok(())
    }

    fn subscribe_categories(&self, categories: impl Iterator<Item = String>) -> Result<(), IuError> {
        self.ensure_open()?;
        let mut subscriptions = self.subscriptions.lock();
        for category in categories {
            if subscriptions.contains_key(&category) {
                continue;
            }
            let topic = Topic::new(&self.channel, &category);
            let this = self.this.clone();
            let handler: FrameHandler = Arc::new(move |frame: Frame| {
                if let Some(buffer) = this.upgrade() {
                    buffer.handle_frame(&frame);
                }
            });
            let handle = self.transport.subscribe(&topic, handler)?;
            subscriptions.insert(category.clone(), handle);
            info!(buffer = %self.unique_name, category = %category, "Category interest added");
        }
        Ok(())
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let subscriptions = std::mem::take(&mut *self.subscriptions.lock());
        for handle in subscriptions.into_values() {
            handle.deactivate();
        }
        let owners = std::mem::take(&mut *self.owners.lock());
        for client in owners.into_values() {
            client.deactivate();
        }
        info!(buffer = %self.unique_name, "Input buffer closed");
    }

    fn client_for(&self, owner: &str) -> Result<Arc<dyn RpcClient>, IuError> {
        let mut owners = self.owners.lock();
        if let Some(client) = owners.get(owner) {
            return Ok(Arc::clone(client));
        }
        let client = self.transport.connect(owner)?;
        owners.insert(owner.to_string(), Arc::clone(&client));
        Ok(client)
    }

    fn notify(&self, iu: Arc<RemoteIu>, event_type: IuEventType) {
        let event = IuEvent {
            category: iu.category().to_string(),
            iu,
            event_type,
            local: false,
        };
        self.handlers.dispatch(&event);
    }

    // =========================================================================
    // INBOUND FRAMES (dispatch threads)
    // =========================================================================

    fn handle_frame(&self, frame: &Frame) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let message = match self.codecs.decode(frame) {
            Ok(message) => message,
            Err(e) => {
                warn!(buffer = %self.unique_name, schema = %frame.schema, error = %e, "Undecodable frame dropped");
                return;
            }
        };
        if message.writer_name() == Some(self.unique_name.as_str()) {
            debug!(buffer = %self.unique_name, uid = %message.uid(), kind = message.kind(), "Self-echo discarded");
            return;
        }
        match message {
            IuMessage::Snapshot(snapshot) => self.on_snapshot(&snapshot),
            IuMessage::PayloadUpdate(update) => self.on_payload_update(&update),
            IuMessage::LinkUpdate(update) => self.on_link_update(&update),
            IuMessage::Commit(notice) => self.on_commit(&notice),
            IuMessage::Retraction(notice) => self.on_retraction(&notice),
            IuMessage::Resend(request) => {
                debug!(buffer = %self.unique_name, uid = %request.uid, "Resend request on a topic ignored");
            }
        }
    }

    fn writer(&self) -> Weak<dyn RemoteWriter> {
        let writer: Weak<dyn RemoteWriter> = self.this.clone();
        writer
    }

    fn on_snapshot(&self, snapshot: &IuSnapshot) {
        let proxy = Arc::new(RemoteIu::from_snapshot(snapshot, self.writer()));

        if snapshot.access_mode == AccessMode::Message {
            debug!(buffer = %self.unique_name, uid = %snapshot.uid, "Message IU received");
            self.notify(proxy, IuEventType::Message);
            return;
        }

        {
            let mut ius = self.ius.write();
            if ius.contains_key(&snapshot.uid) {
                debug!(buffer = %self.unique_name, uid = %snapshot.uid, "Duplicate snapshot ignored");
                return;
            }
            ius.insert(snapshot.uid.clone(), Arc::clone(&proxy));
        }
        debug!(
            buffer = %self.unique_name,
            uid = %snapshot.uid,
            category = %snapshot.category,
            revision = snapshot.revision,
            "IU added"
        );
        self.notify(proxy, IuEventType::Added);
    }

    fn known(&self, uid: &Uid, kind: &str) -> Option<Arc<RemoteIu>> {
        let iu = self.ius.read().get(uid).cloned();
        if iu.is_none() {
            warn!(buffer = %self.unique_name, uid = %uid, kind = kind, "Update for unknown IU dropped");
        }
        iu
    }

    fn on_payload_update(&self, update: &PayloadUpdate) {
        if let Some(iu) = self.known(&update.uid, "payload_update") {
            iu.apply_payload_update(update);
            self.notify(iu, IuEventType::Updated);
        }
    }

    fn on_link_update(&self, update: &LinkUpdate) {
        if let Some(iu) = self.known(&update.uid, "link_update") {
            iu.apply_link_update(update);
            self.notify(iu, IuEventType::LinksUpdated);
        }
    }

    fn on_commit(&self, notice: &CommitNotice) {
        if let Some(iu) = self.known(&notice.uid, "commit") {
            iu.apply_commit(notice);
            self.notify(iu, IuEventType::Committed);
        }
    }

    fn on_retraction(&self, notice: &RetractionNotice) {
        if let Some(iu) = self.known(&notice.uid, "retraction") {
            iu.apply_retraction(notice);
            self.notify(iu, IuEventType::Retracted);
        }
    }
}

impl RemoteWriter for InputShared {
    fn writer_name(&self) -> &str {
        &self.unique_name
    }

    fn call_owner(
        &self,
        owner: &str,
        method: RpcMethod,
        message: &IuMessage,
    ) -> Result<Revision, IuError> {
        self.ensure_open()?;
        let client = self.client_for(owner)?;
        let frame = self.codecs.encode(message)?;
        Ok(client.call(method, frame)?)
    }
}
