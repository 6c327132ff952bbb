//! # Subscriptions
//!
//! Each subscription owns an unbounded queue and one dispatch thread that
//! drains it into the subscriber's handler. Frames published to one topic
//! therefore reach a given subscriber in publish order, and a slow handler
//! only delays its own subscription.

use crate::memory::Registry;
use crate::topic::Topic;
use crate::transport::{Frame, FrameHandler, TransportError, TransportHandle};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle, ThreadId};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Handle to an active subscription.
///
/// Dropping it deactivates the subscription.
pub struct Subscription {
    id: u64,
    topic: Topic,
    registry: Weak<Registry>,
    active: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
}

impl Subscription {
    /// Starts the dispatch thread for a freshly registered queue.
    pub(crate) fn spawn(
        id: u64,
        topic: Topic,
        registry: Weak<Registry>,
        mut receiver: mpsc::UnboundedReceiver<Frame>,
        handler: FrameHandler,
    ) -> Result<Self, TransportError> {
        let active = Arc::new(AtomicBool::new(true));
        let worker_active = Arc::clone(&active);

        let worker = thread::Builder::new()
            .name(format!("iu-dispatch-{id}"))
            .spawn(move || {
                while let Some(frame) = receiver.blocking_recv() {
                    if !worker_active.load(Ordering::Acquire) {
                        break;
                    }
                    handler(frame);
                }
            })
            .map_err(|e| TransportError::Io(e.to_string()))?;

        let worker_id = worker.thread().id();
        debug!(topic = %topic, subscription = id, "Subscription created");

        Ok(Self {
            id,
            topic,
            registry,
            active,
            worker: Mutex::new(Some(worker)),
            worker_id,
        })
    }
}

impl TransportHandle for Subscription {
    fn deactivate(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }

        // Dropping the queue's sender lets the worker's receive loop end.
        if let Some(registry) = self.registry.upgrade() {
            registry.remove_subscriber(&self.topic, self.id);
        }

        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        if thread::current().id() == self.worker_id {
            debug!(topic = %self.topic, subscription = self.id, "Subscription deactivated from its own dispatch thread");
            return;
        }
        if worker.join().is_err() {
            warn!(topic = %self.topic, subscription = self.id, "Dispatch thread panicked");
        }
        debug!(topic = %self.topic, subscription = self.id, "Subscription deactivated");
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.deactivate();
    }
}
