//! # In-Memory Transport
//!
//! Process-local implementation of [`Transport`]. Any number of buffers can
//! share one instance, which is how components of a single process (and the
//! integration tests) talk to each other.
//!
//! - `publish` clones the frame into each subscriber's unbounded queue.
//! - `call` runs the endpoint's handler synchronously on the caller's thread.

use crate::subscription::Subscription;
use crate::topic::Topic;
use crate::transport::{
    Frame, FrameHandler, RpcClient, RpcHandler, RpcMethod, Transport, TransportError,
    TransportHandle,
};
use iu_types::Revision;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tracing::{debug, warn};

struct SubscriberSlot {
    id: u64,
    sender: mpsc::UnboundedSender<Frame>,
}

/// Routing tables shared between the transport and its handles.
pub(crate) struct Registry {
    topics: RwLock<HashMap<String, Vec<SubscriberSlot>>>,
    endpoints: RwLock<HashMap<String, Arc<dyn RpcHandler>>>,
}

impl Registry {
    fn new() -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            endpoints: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) fn remove_subscriber(&self, topic: &Topic, id: u64) {
        let mut topics = self.topics.write();
        let Some(slots) = topics.get_mut(topic.as_str()) else {
            return;
        };
        slots.retain(|slot| slot.id != id);
        if slots.is_empty() {
            topics.remove(topic.as_str());
        }
    }

    fn remove_endpoint(&self, endpoint: &str) {
        self.endpoints.write().remove(endpoint);
    }

    fn endpoint(&self, endpoint: &str) -> Option<Arc<dyn RpcHandler>> {
        self.endpoints.read().get(endpoint).cloned()
    }
}

/// Transport connecting buffers within one process.
pub struct InMemoryTransport {
    registry: Arc<Registry>,
    next_subscription: AtomicU64,
    frames_published: AtomicU64,
}

impl InMemoryTransport {
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry::new()),
            next_subscription: AtomicU64::new(1),
            frames_published: AtomicU64::new(0),
        }
    }

    /// Total frames accepted by `publish`.
    #[must_use]
    pub fn frames_published(&self) -> u64 {
        self.frames_published.load(Ordering::Relaxed)
    }

    /// Number of active subscriptions on `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.registry
            .topics
            .read()
            .get(topic.as_str())
            .map_or(0, Vec::len)
    }

    /// Returns true if `endpoint` is currently served.
    #[must_use]
    pub fn is_served(&self, endpoint: &str) -> bool {
        self.registry.endpoints.read().contains_key(endpoint)
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for InMemoryTransport {
    fn publish(&self, topic: &Topic, frame: Frame) -> Result<usize, TransportError> {
        self.frames_published.fetch_add(1, Ordering::Relaxed);

        let topics = self.registry.topics.read();
        let Some(slots) = topics.get(topic.as_str()) else {
            debug!(topic = %topic, "Frame published with no subscribers");
            return Ok(0);
        };

        let mut delivered = 0;
        for slot in slots {
            if slot.sender.send(frame.clone()).is_ok() {
                delivered += 1;
            }
        }
        debug!(topic = %topic, receivers = delivered, "Frame published");
        Ok(delivered)
    }

    fn subscribe(
        &self,
        topic: &Topic,
        handler: FrameHandler,
    ) -> Result<Box<dyn TransportHandle>, TransportError> {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();

        let subscription = Subscription::spawn(
            id,
            topic.clone(),
            Arc::downgrade(&self.registry),
            receiver,
            handler,
        )?;

        self.registry
            .topics
            .write()
            .entry(topic.as_str().to_string())
            .or_default()
            .push(SubscriberSlot { id, sender });

        Ok(Box::new(subscription))
    }

    fn serve(
        &self,
        endpoint: &str,
        handler: Arc<dyn RpcHandler>,
    ) -> Result<Box<dyn TransportHandle>, TransportError> {
        let mut endpoints = self.registry.endpoints.write();
        if endpoints.contains_key(endpoint) {
            return Err(TransportError::EndpointInUse(endpoint.to_string()));
        }
        endpoints.insert(endpoint.to_string(), handler);
        debug!(endpoint = endpoint, "RPC endpoint served");

        Ok(Box::new(EndpointHandle {
            endpoint: endpoint.to_string(),
            registry: Arc::downgrade(&self.registry),
            active: AtomicBool::new(true),
        }))
    }

    fn connect(&self, endpoint: &str) -> Result<Arc<dyn RpcClient>, TransportError> {
        debug!(endpoint = endpoint, "RPC client created");
        Ok(Arc::new(InMemoryRpcClient {
            endpoint: endpoint.to_string(),
            registry: Arc::downgrade(&self.registry),
            active: AtomicBool::new(true),
        }))
    }
}

/// Handle to a served RPC endpoint.
struct EndpointHandle {
    endpoint: String,
    registry: Weak<Registry>,
    active: AtomicBool,
}

impl TransportHandle for EndpointHandle {
    fn deactivate(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.remove_endpoint(&self.endpoint);
        }
        debug!(endpoint = %self.endpoint, "RPC endpoint withdrawn");
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Drop for EndpointHandle {
    fn drop(&mut self) {
        self.deactivate();
    }
}

/// Client calling handlers registered on the same transport.
struct InMemoryRpcClient {
    endpoint: String,
    registry: Weak<Registry>,
    active: AtomicBool,
}

impl TransportHandle for InMemoryRpcClient {
    fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl RpcClient for InMemoryRpcClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn call(&self, method: RpcMethod, frame: Frame) -> Result<Revision, TransportError> {
        if !self.is_active() {
            return Err(TransportError::Closed);
        }
        let registry = self.registry.upgrade().ok_or(TransportError::Closed)?;
        let Some(handler) = registry.endpoint(&self.endpoint) else {
            warn!(endpoint = %self.endpoint, method = %method, "RPC call to unknown endpoint");
            return Err(TransportError::NoSuchEndpoint(self.endpoint.clone()));
        };
        handler.handle(method, frame)
    }
}
