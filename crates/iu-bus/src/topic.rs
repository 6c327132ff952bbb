//! # Topics
//!
//! Publish/subscribe addresses, namespaced by channel and category.

use crate::TOPIC_ROOT;
use std::fmt;

/// A publish/subscribe address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic {
    channel: String,
    category: String,
    path: String,
}

impl Topic {
    /// Topic of `category` on `channel`.
    #[must_use]
    pub fn new(channel: &str, category: &str) -> Self {
        Self {
            channel: channel.to_string(),
            category: category.to_string(),
            path: format!("{TOPIC_ROOT}/{channel}/category/{category}"),
        }
    }

    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Full topic path.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}
