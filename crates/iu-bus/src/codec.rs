//! # Codec Table
//!
//! Converts [`IuMessage`] values to frames and back.
//!
//! The table is constructed once and shared as `Arc<CodecTable>`; buffers
//! receive it at construction. Decoding picks the codec named by the frame,
//! encoding always uses the configured outbound codec.

use crate::transport::Frame;
use iu_types::IuMessage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while converting messages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Encoding failed: {0}")]
    Encode(String),

    #[error("Decoding failed: {0}")]
    Decode(String),

    /// The frame names a codec this table does not know.
    #[error("Unknown wire schema: {0}")]
    UnknownSchema(String),
}

/// One wire encoding of [`IuMessage`].
pub trait Codec: Send + Sync {
    /// Name stamped on every frame this codec produces.
    fn schema(&self) -> &'static str;

    fn encode(&self, message: &IuMessage) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, data: &[u8]) -> Result<IuMessage, CodecError>;
}

/// Human-readable JSON encoding.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl JsonCodec {
    pub const SCHEMA: &'static str = "iu-json";
}

impl Codec for JsonCodec {
    fn schema(&self) -> &'static str {
        Self::SCHEMA
    }

    fn encode(&self, message: &IuMessage) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(message).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode(&self, data: &[u8]) -> Result<IuMessage, CodecError> {
        serde_json::from_slice(data).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

/// Compact binary encoding.
#[derive(Debug, Default, Clone, Copy)]
pub struct BincodeCodec;

impl BincodeCodec {
    pub const SCHEMA: &'static str = "iu-bincode";
}

impl Codec for BincodeCodec {
    fn schema(&self) -> &'static str {
        Self::SCHEMA
    }

    fn encode(&self, message: &IuMessage) -> Result<Vec<u8>, CodecError> {
        bincode::serialize(message).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode(&self, data: &[u8]) -> Result<IuMessage, CodecError> {
        bincode::deserialize(data).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

/// Selects the outbound codec of a [`CodecTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WireCodec {
    #[default]
    Json,
    Bincode,
}

impl WireCodec {
    #[must_use]
    pub fn schema(&self) -> &'static str {
        match self {
            Self::Json => JsonCodec::SCHEMA,
            Self::Bincode => BincodeCodec::SCHEMA,
        }
    }
}

impl FromStr for WireCodec {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "bincode" => Ok(Self::Bincode),
            other => Err(CodecError::UnknownSchema(other.to_string())),
        }
    }
}

/// Codecs known to a process, keyed by schema name.
#[derive(Clone)]
pub struct CodecTable {
    codecs: HashMap<&'static str, Arc<dyn Codec>>,
    outbound: &'static str,
}

impl CodecTable {
    /// Table with the JSON and bincode codecs, encoding with `outbound`.
    #[must_use]
    pub fn standard(outbound: WireCodec) -> Self {
        let mut codecs: HashMap<&'static str, Arc<dyn Codec>> = HashMap::new();
        codecs.insert(JsonCodec::SCHEMA, Arc::new(JsonCodec));
        codecs.insert(BincodeCodec::SCHEMA, Arc::new(BincodeCodec));
        Self {
            codecs,
            outbound: outbound.schema(),
        }
    }

    /// Schema name of the outbound codec.
    #[must_use]
    pub fn outbound_schema(&self) -> &'static str {
        self.outbound
    }

    /// Encodes `message` with the outbound codec.
    pub fn encode(&self, message: &IuMessage) -> Result<Frame, CodecError> {
        let codec = self
            .codecs
            .get(self.outbound)
            .ok_or_else(|| CodecError::UnknownSchema(self.outbound.to_string()))?;
        Ok(Frame::new(self.outbound, codec.encode(message)?))
    }

    /// Decodes `frame` with the codec its schema names.
    pub fn decode(&self, frame: &Frame) -> Result<IuMessage, CodecError> {
        let codec = self
            .codecs
            .get(frame.schema.as_str())
            .ok_or_else(|| CodecError::UnknownSchema(frame.schema.clone()))?;
        codec.decode(&frame.data)
    }
}

impl Default for CodecTable {
    fn default() -> Self {
        Self::standard(WireCodec::default())
    }
}

impl fmt::Debug for CodecTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut schemas: Vec<&str> = self.codecs.keys().copied().collect();
        schemas.sort_unstable();
        f.debug_struct("CodecTable")
            .field("schemas", &schemas)
            .field("outbound", &self.outbound)
            .finish()
    }
}
