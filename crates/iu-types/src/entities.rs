//! # Core Entities
//!
//! Identity, versioning and content types of an incremental unit.
//!
//! ## Clusters
//!
//! - **Identity & versioning**: `Uid`, `Revision`
//! - **Classification**: `AccessMode`, `PayloadType`, `IuEventType`
//! - **Content**: `Payload` (key/value map), `LinkSet` (typed link graph)

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

// =============================================================================
// IDENTITY & VERSIONING
// =============================================================================

/// Version stamp of an IU. Starts at 1 and grows by one per accepted write.
pub type Revision = u64;

/// Revision value answered by an owner when it rejects a remote write.
pub const FAILED_REVISION: Revision = 0;

/// Revision value a writer sends to skip the owner's version check.
pub const ANY_REVISION: Revision = 0;

/// Revision of a freshly created IU.
pub const INITIAL_REVISION: Revision = 1;

/// Globally unique identifier of an IU.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Uid(String);

impl Uid {
    /// Generates a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Uid {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Uid {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for Uid {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Uid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// CLASSIFICATION
// =============================================================================

/// How an IU is shared with other components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AccessMode {
    /// Persistent IU mirrored by every interested input buffer.
    #[default]
    Push,
    /// Fire-and-forget IU that only exists for the duration of handler dispatch.
    Message,
}

impl AccessMode {
    /// Wire tag of the access mode.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Push => "PUSH",
            Self::Message => "MESSAGE",
        }
    }
}

/// Interpretation of payload values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PayloadType {
    /// Plain strings.
    #[default]
    Str,
    /// Strings holding serialized JSON documents.
    Json,
}

impl PayloadType {
    /// Item-level type tag carried by every payload item on the wire.
    #[must_use]
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::Str => "str",
            Self::Json => "json",
        }
    }
}

/// Kinds of state change reported to event handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IuEventType {
    /// A remote IU was seen for the first time.
    Added,
    /// The payload changed.
    Updated,
    /// The IU was committed.
    Committed,
    /// The link set changed.
    LinksUpdated,
    /// The IU was retracted.
    Retracted,
    /// The IU was deleted.
    Deleted,
    /// A message IU arrived.
    Message,
}

impl IuEventType {
    /// Every event type, in declaration order.
    pub const ALL: [IuEventType; 7] = [
        Self::Added,
        Self::Updated,
        Self::Committed,
        Self::LinksUpdated,
        Self::Retracted,
        Self::Deleted,
        Self::Message,
    ];

    /// Upper-case name of the event type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "ADDED",
            Self::Updated => "UPDATED",
            Self::Committed => "COMMITTED",
            Self::LinksUpdated => "LINKSUPDATED",
            Self::Retracted => "RETRACTED",
            Self::Deleted => "DELETED",
            Self::Message => "MESSAGE",
        }
    }
}

impl fmt::Display for IuEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// CONTENT
// =============================================================================

/// Key/value content of an IU. Keys are unique; order is irrelevant.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Payload(HashMap<String, String>);

impl Payload {
    /// Creates an empty payload.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Returns true if `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Inserts or overwrites an item, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Removes an item, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the items in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Payload {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<HashMap<String, String>> for Payload {
    fn from(map: HashMap<String, String>) -> Self {
        Self(map)
    }
}

impl IntoIterator for Payload {
    type Item = (String, String);
    type IntoIter = std::collections::hash_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Typed links from an IU to other IUs: link type -> set of target uids.
///
/// A link type is only present while it has at least one target.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LinkSet(BTreeMap<String, BTreeSet<String>>);

impl LinkSet {
    /// Creates an empty link set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds targets under `link_type`. Duplicate targets collapse.
    pub fn add<I, S>(&mut self, link_type: &str, targets: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut targets = targets.into_iter().map(Into::into).peekable();
        if targets.peek().is_none() {
            return;
        }
        self.0.entry(link_type.to_string()).or_default().extend(targets);
    }

    /// Removes targets from `link_type`, dropping the type once it is empty.
    pub fn remove<I, S>(&mut self, link_type: &str, targets: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let Some(existing) = self.0.get_mut(link_type) else {
            return;
        };
        for target in targets {
            existing.remove(target.as_ref());
        }
        if existing.is_empty() {
            self.0.remove(link_type);
        }
    }

    /// Applies a delta: removals first, then additions.
    pub fn apply(&mut self, add: &LinkSet, remove: &LinkSet) {
        for (link_type, targets) in remove.iter() {
            self.remove(link_type, targets);
        }
        for (link_type, targets) in add.iter() {
            self.add(link_type, targets.iter().cloned());
        }
    }

    /// Targets of one link type (empty if the type is absent).
    #[must_use]
    pub fn get(&self, link_type: &str) -> BTreeSet<String> {
        self.0.get(link_type).cloned().unwrap_or_default()
    }

    /// Returns true if `target` is linked under `link_type`.
    #[must_use]
    pub fn contains(&self, link_type: &str, target: &str) -> bool {
        self.0
            .get(link_type)
            .is_some_and(|targets| targets.contains(target))
    }

    /// Iterates over `(link_type, targets)` in link-type order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Link types currently present.
    pub fn link_types(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Returns true if no link type is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, I, S> FromIterator<(K, I)> for LinkSet
where
    K: AsRef<str>,
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, I)>>(iter: T) -> Self {
        let mut links = LinkSet::new();
        for (link_type, targets) in iter {
            links.add(link_type.as_ref(), targets);
        }
        links
    }
}
