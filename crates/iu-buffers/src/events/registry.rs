//! # Event Handler Registry
//!
//! Decouples "an IU changed" from "who cares".
//!
//! A handler matches an event when its type filter contains the event type
//! AND its category filter matches the IU's category. Matching handlers run
//! synchronously, in registration order, on the thread that delivered the
//! change. Dispatch iterates over a snapshot of the handler list, so handlers
//! may register or unregister handlers while running.

use crate::domain::IuRef;
use iu_types::IuEventType;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::error;

/// A state change of one IU, as seen by one buffer.
#[derive(Debug, Clone)]
pub struct IuEvent {
    pub iu: IuRef,
    pub event_type: IuEventType,
    pub category: String,
    /// True when an output buffer reports a remote write to one of its own IUs.
    pub local: bool,
}

/// Categories a handler listens to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(BTreeSet<String>),
}

impl CategoryFilter {
    /// Filter for the given categories. No categories means all of them.
    pub fn only<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let categories: BTreeSet<String> = categories.into_iter().map(Into::into).collect();
        if categories.is_empty() {
            Self::All
        } else {
            Self::Only(categories)
        }
    }

    #[must_use]
    pub fn matches(&self, category: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(categories) => categories.contains(category),
        }
    }
}

type Callback = dyn Fn(&IuEvent) -> anyhow::Result<()> + Send + Sync;

/// A callback plus the events it wants.
#[derive(Clone)]
pub struct IuEventHandler {
    callback: Arc<Callback>,
    event_types: BTreeSet<IuEventType>,
    categories: CategoryFilter,
}

impl IuEventHandler {
    /// Handler for every event type in every category.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&IuEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
            event_types: IuEventType::ALL.into_iter().collect(),
            categories: CategoryFilter::All,
        }
    }

    /// Restricts the handler to `event_types`. An empty list keeps all types.
    #[must_use]
    pub fn for_event_types(mut self, event_types: impl IntoIterator<Item = IuEventType>) -> Self {
        let event_types: BTreeSet<IuEventType> = event_types.into_iter().collect();
        if !event_types.is_empty() {
            self.event_types = event_types;
        }
        self
    }

    /// Restricts the handler to `categories`. An empty list keeps all categories.
    #[must_use]
    pub fn for_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = CategoryFilter::only(categories);
        self
    }

    #[must_use]
    pub fn categories(&self) -> &CategoryFilter {
        &self.categories
    }

    #[must_use]
    pub fn matches(&self, event_type: IuEventType, category: &str) -> bool {
        self.event_types.contains(&event_type) && self.categories.matches(category)
    }

    fn call(&self, event: &IuEvent) -> anyhow::Result<()> {
        (self.callback)(event)
    }
}

impl fmt::Debug for IuEventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IuEventHandler")
            .field("event_types", &self.event_types)
            .field("categories", &self.categories)
            .finish_non_exhaustive()
    }
}

/// Identifies a registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler-{}", self.0)
    }
}

/// Ordered list of handlers, safe for concurrent registration and dispatch.
#[derive(Debug, Default)]
pub struct EventHandlerRegistry {
    handlers: RwLock<Vec<(HandlerId, Arc<IuEventHandler>)>>,
    next_id: AtomicU64,
}

impl EventHandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handler: IuEventHandler) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers.write().push((id, Arc::new(handler)));
        id
    }

    /// Removes a handler. Returns false if it was not registered.
    pub fn unregister(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|(registered, _)| *registered != id);
        handlers.len() != before
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }

    /// Calls every matching handler in registration order.
    ///
    /// A failing handler is logged and does not stop the dispatch.
    /// Returns the number of handlers invoked.
    pub fn dispatch(&self, event: &IuEvent) -> usize {
        let snapshot: Vec<(HandlerId, Arc<IuEventHandler>)> = self.handlers.read().clone();
        let mut invoked = 0;
        for (id, handler) in snapshot {
            if !handler.matches(event.event_type, &event.category) {
                continue;
            }
            invoked += 1;
            if let Err(e) = handler.call(event) {
                error!(
                    handler = %id,
                    uid = %event.iu.uid(),
                    event = %event.event_type,
                    category = %event.category,
                    error = %e,
                    "Event handler failed"
                );
            }
        }
        invoked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LocalIu;
    use parking_lot::Mutex;

    fn event(event_type: IuEventType, category: &str) -> IuEvent {
        IuEvent {
            iu: Arc::new(LocalIu::new(category)),
            event_type,
            category: category.to_string(),
            local: false,
        }
    }

    fn recording(log: &Arc<Mutex<Vec<String>>>, name: &str) -> IuEventHandler {
        let log = Arc::clone(log);
        let name = name.to_string();
        IuEventHandler::new(move |e| {
            log.lock().push(format!("{name}:{}", e.event_type));
            Ok(())
        })
    }

    #[test]
    fn test_empty_category_filter_matches_all() {
        assert_eq!(CategoryFilter::only(Vec::<String>::new()), CategoryFilter::All);
        assert!(CategoryFilter::All.matches("anything"));

        let only = CategoryFilter::only(["cat1"]);
        assert!(only.matches("cat1"));
        assert!(!only.matches("cat2"));
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let registry = EventHandlerRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        registry.register(recording(&log, "first"));
        registry.register(recording(&log, "second"));

        assert_eq!(registry.dispatch(&event(IuEventType::Added, "cat1")), 2);
        assert_eq!(*log.lock(), vec!["first:ADDED", "second:ADDED"]);
    }

    #[test]
    fn test_type_and_category_filters() {
        let registry = EventHandlerRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        registry.register(
            recording(&log, "updates")
                .for_event_types([IuEventType::Updated])
                .for_categories(["cat1"]),
        );

        registry.dispatch(&event(IuEventType::Added, "cat1"));
        registry.dispatch(&event(IuEventType::Updated, "cat2"));
        registry.dispatch(&event(IuEventType::Updated, "cat1"));
        assert_eq!(*log.lock(), vec!["updates:UPDATED"]);
    }

    #[test]
    fn test_failing_handler_does_not_stop_dispatch() {
        let registry = EventHandlerRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        registry.register(IuEventHandler::new(|_| anyhow::bail!("boom")));
        registry.register(recording(&log, "after"));

        assert_eq!(registry.dispatch(&event(IuEventType::Committed, "cat1")), 2);
        assert_eq!(log.lock().len(), 1);
    }

    #[test]
    fn test_unregister() {
        let registry = EventHandlerRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let id = registry.register(recording(&log, "gone"));
        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        assert!(registry.is_empty());
        assert_eq!(registry.dispatch(&event(IuEventType::Added, "cat1")), 0);
    }

    #[test]
    fn test_handler_may_register_during_dispatch() {
        let registry = Arc::new(EventHandlerRegistry::new());
        let inner = Arc::clone(&registry);
        registry.register(IuEventHandler::new(move |_| {
            inner.register(IuEventHandler::new(|_| Ok(())));
            Ok(())
        }));

        assert_eq!(registry.dispatch(&event(IuEventType::Added, "cat1")), 1);
        assert_eq!(registry.len(), 2);
    }
}
