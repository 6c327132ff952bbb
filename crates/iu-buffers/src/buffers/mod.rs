//! Buffers: the endpoints that own and mirror IUs on a transport.

pub mod input;
pub mod output;

pub use input::InputBuffer;
pub use output::OutputBuffer;

use crate::config::BufferConfig;
use iu_bus::{CodecTable, Transport};
use std::fmt;
use std::sync::Arc;

/// Everything a buffer needs from its process: the transport, the codec
/// table and the configuration. Built once, cloned into every buffer.
#[derive(Clone)]
pub struct BufferContext {
    pub transport: Arc<dyn Transport>,
    pub codecs: Arc<CodecTable>,
    pub config: BufferConfig,
}

impl BufferContext {
    /// Context whose codec table follows `config.wire_codec`.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, config: BufferConfig) -> Self {
        let codecs = Arc::new(config.codec_table());
        Self {
            transport,
            codecs,
            config,
        }
    }
}

impl fmt::Debug for BufferContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferContext")
            .field("codecs", &self.codecs)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Globally unique buffer name: component name plus a random suffix.
pub(crate) fn unique_name(component: &str, side: &str) -> String {
    format!("iu/{component}/{}/{side}", random_suffix())
}

pub(crate) fn random_suffix() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}
