//! Batched payload and link edits.
//!
//! An edit is built by the caller, then resolved against the IU's state under
//! the IU lock into a change: exactly one revision and one delta message.

use iu_types::{
    entries_to_links, items_to_payload, links_to_entries, payload_to_items, LinkSet, LinkUpdate,
    Payload, PayloadType, PayloadUpdate, Revision, Uid,
};
use std::collections::BTreeSet;

// =============================================================================
// PAYLOAD
// =============================================================================

/// Puts and removals applied to a payload as one write.
///
/// A later operation on the same key overrides an earlier one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayloadEdit {
    puts: Payload,
    removals: BTreeSet<String>,
}

impl PayloadEdit {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn put(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        self.removals.remove(&key);
        self.puts.insert(key, value);
        self
    }

    #[must_use]
    pub fn remove(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.puts.remove(&key);
        self.removals.insert(key);
        self
    }

    /// Puts every item of `items`.
    #[must_use]
    pub fn merge<K, V, I>(self, items: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        items
            .into_iter()
            .fold(self, |edit, (key, value)| edit.put(key, value))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.puts.is_empty() && self.removals.is_empty()
    }

    pub(crate) fn into_change(self) -> PayloadChange {
        PayloadChange::Delta {
            puts: self.puts,
            removals: self.removals.into_iter().collect(),
        }
    }
}

/// A resolved payload write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PayloadChange {
    /// Disjoint puts and removals.
    Delta { puts: Payload, removals: Vec<String> },
    /// Whole-payload replacement.
    Replace(Payload),
}

impl PayloadChange {
    pub(crate) fn apply_to(&self, payload: &mut Payload) {
        match self {
            Self::Delta { puts, removals } => {
                for key in removals {
                    payload.remove(key);
                }
                for (key, value) in puts.iter() {
                    payload.insert(key, value);
                }
            }
            Self::Replace(new_payload) => *payload = new_payload.clone(),
        }
    }

    pub(crate) fn to_message(
        &self,
        uid: &Uid,
        revision: Revision,
        writer_name: &str,
        payload_type: PayloadType,
    ) -> PayloadUpdate {
        let (is_delta, new_items, keys_to_remove) = match self {
            Self::Delta { puts, removals } => (
                true,
                payload_to_items(puts, payload_type),
                removals.clone(),
            ),
            Self::Replace(payload) => (false, payload_to_items(payload, payload_type), Vec::new()),
        };
        PayloadUpdate {
            uid: uid.clone(),
            revision,
            is_delta,
            writer_name: writer_name.to_string(),
            payload_type,
            new_items,
            keys_to_remove,
        }
    }

    pub(crate) fn from_message(update: &PayloadUpdate) -> Self {
        let items = items_to_payload(&update.new_items);
        if update.is_delta {
            Self::Delta {
                puts: items,
                removals: update.keys_to_remove.clone(),
            }
        } else {
            Self::Replace(items)
        }
    }
}

// =============================================================================
// LINKS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum LinkOp {
    Add(String, Vec<String>),
    Remove(String, Vec<String>),
    Set(String, Vec<String>),
}

/// Link additions, removals and per-type replacements applied as one write.
///
/// Operations are applied in order; the resulting delta is the difference
/// between the IU's links before and after.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkEdit {
    ops: Vec<LinkOp>,
}

impl LinkEdit {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn add<I, S>(mut self, link_type: &str, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ops.push(LinkOp::Add(
            link_type.to_string(),
            targets.into_iter().map(Into::into).collect(),
        ));
        self
    }

    #[must_use]
    pub fn remove<I, S>(mut self, link_type: &str, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ops.push(LinkOp::Remove(
            link_type.to_string(),
            targets.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Makes `targets` the complete target set of `link_type`.
    #[must_use]
    pub fn set<I, S>(mut self, link_type: &str, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ops.push(LinkOp::Set(
            link_type.to_string(),
            targets.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Removes every link in `remove`, then adds every link in `add`.
    #[must_use]
    pub fn modify(mut self, add: &LinkSet, remove: &LinkSet) -> Self {
        for (link_type, targets) in remove.iter() {
            self = self.remove(link_type, targets.iter().cloned());
        }
        for (link_type, targets) in add.iter() {
            self = self.add(link_type, targets.iter().cloned());
        }
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Resolves the edit against `current` into a delta.
    pub(crate) fn resolve(&self, current: &LinkSet) -> LinkChange {
        let mut target = current.clone();
        for op in &self.ops {
            match op {
                LinkOp::Add(link_type, targets) => target.add(link_type, targets.iter().cloned()),
                LinkOp::Remove(link_type, targets) => target.remove(link_type, targets),
                LinkOp::Set(link_type, targets) => {
                    let existing = target.get(link_type);
                    target.remove(link_type, &existing);
                    target.add(link_type, targets.iter().cloned());
                }
            }
        }
        let (add, remove) = diff_links(current, &target);
        LinkChange::Delta { add, remove }
    }
}

/// Links present only in `to` and links present only in `from`.
fn diff_links(from: &LinkSet, to: &LinkSet) -> (LinkSet, LinkSet) {
    let mut added = LinkSet::new();
    let mut removed = LinkSet::new();
    for (link_type, targets) in to.iter() {
        let before = from.get(link_type);
        added.add(link_type, targets.difference(&before).cloned());
    }
    for (link_type, targets) in from.iter() {
        let after = to.get(link_type);
        removed.add(link_type, targets.difference(&after).cloned());
    }
    (added, removed)
}

/// A resolved link write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LinkChange {
    Delta { add: LinkSet, remove: LinkSet },
    /// Complete replacement. `removed` lists what the old set had beyond it.
    Replace { links: LinkSet, removed: LinkSet },
}

impl LinkChange {
    pub(crate) fn replace(current: &LinkSet, links: LinkSet) -> Self {
        let (_, removed) = diff_links(current, &links);
        Self::Replace { links, removed }
    }

    pub(crate) fn apply_to(&self, links: &mut LinkSet) {
        match self {
            Self::Delta { add, remove } => links.apply(add, remove),
            Self::Replace { links: new_links, .. } => *links = new_links.clone(),
        }
    }

    pub(crate) fn to_message(&self, uid: &Uid, revision: Revision, writer_name: &str) -> LinkUpdate {
        let (is_delta, new_links, links_to_remove) = match self {
            Self::Delta { add, remove } => (true, add, remove),
            Self::Replace { links, removed } => (false, links, removed),
        };
        LinkUpdate {
            uid: uid.clone(),
            revision,
            is_delta,
            writer_name: writer_name.to_string(),
            new_links: links_to_entries(new_links),
            links_to_remove: links_to_entries(links_to_remove),
        }
    }

    pub(crate) fn from_message(update: &LinkUpdate) -> Self {
        let new_links = entries_to_links(&update.new_links);
        let other = entries_to_links(&update.links_to_remove);
        if update.is_delta {
            Self::Delta {
                add: new_links,
                remove: other,
            }
        } else {
            Self::Replace {
                links: new_links,
                removed: other,
            }
        }
    }
}
