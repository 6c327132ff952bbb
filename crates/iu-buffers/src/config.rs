//! Buffer configuration from environment variables.

use iu_bus::{CodecTable, WireCodec, DEFAULT_CHANNEL};
use std::env;
use tracing::warn;

/// Settings shared by the buffers of one component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferConfig {
    /// Channel that namespaces every topic.
    pub channel: String,

    /// Codec used for outbound frames. Inbound frames are decoded by schema.
    pub wire_codec: WireCodec,

    /// Prefix of each input buffer's private resend category.
    pub private_category_prefix: String,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            channel: DEFAULT_CHANNEL.to_string(),
            wire_codec: WireCodec::Json,
            private_category_prefix: "private".to_string(),
        }
    }
}

impl BufferConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `IU_CHANNEL`: Channel name (default: default)
    /// - `IU_WIRE_CODEC`: `json` or `bincode` (default: json)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            channel: env::var("IU_CHANNEL").unwrap_or(defaults.channel),

            wire_codec: env::var("IU_WIRE_CODEC")
                .ok()
                .and_then(|v| match v.parse() {
                    Ok(codec) => Some(codec),
                    Err(e) => {
                        warn!(value = %v, error = %e, "Ignoring IU_WIRE_CODEC");
                        None
                    }
                })
                .unwrap_or(defaults.wire_codec),

            private_category_prefix: defaults.private_category_prefix,
        }
    }

    /// Same configuration on another channel.
    #[must_use]
    pub fn with_channel(mut self, channel: &str) -> Self {
        self.channel = channel.to_string();
        self
    }

    #[must_use]
    pub fn with_wire_codec(mut self, wire_codec: WireCodec) -> Self {
        self.wire_codec = wire_codec;
        self
    }

    /// Codec table encoding with the configured wire codec.
    #[must_use]
    pub fn codec_table(&self) -> CodecTable {
        CodecTable::standard(self.wire_codec)
    }
}
