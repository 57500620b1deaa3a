//! Lazily decoded payloads.
//!
//! A [`Payload`] holds encoded bytes and decodes them on first use into an
//! immutable snapshot. The decode runs once; its result, value or error, is
//! memoized and returned to every later caller, on any thread.

use std::fmt;
use std::sync::{Arc, OnceLock};

use serde_json::Value;

use crate::error::{OverlayError, Result};
use crate::immutable::{ImmutableMap, ImmutableSequence};
use crate::value::{ImmutableValue, ValueKind};

/// Decodes raw bytes into a native value.
pub trait Codec: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<Value>;
}

/// JSON codec backed by `serde_json`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        serde_json::from_slice(bytes).map_err(|e| OverlayError::Decode(e.to_string()))
    }
}

/// Encoded bytes plus the codec that reads them.
pub struct Payload {
    bytes: Arc<[u8]>,
    codec: Option<Arc<dyn Codec>>,
    decoded: OnceLock<Result<ImmutableValue>>,
}

impl Payload {
    /// A payload with no codec. Loading it fails with `MissingDecoder`
    /// unless the bytes are empty.
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
            codec: None,
            decoded: OnceLock::new(),
        }
    }

    /// A JSON payload.
    pub fn json(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::new(bytes).with_codec(JsonCodec)
    }

    pub fn with_codec(mut self, codec: impl Codec + 'static) -> Self {
        self.codec = Some(Arc::new(codec));
        self.decoded = OnceLock::new();
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Decodes the payload, once.
    ///
    /// Empty bytes load as `Null` without consulting the codec.
    pub fn load(&self) -> Result<ImmutableValue> {
        self.decoded.get_or_init(|| self.decode()).clone()
    }

    /// Like [`Payload::load`], requiring a map.
    pub fn load_map(&self) -> Result<ImmutableMap> {
        match self.load()? {
            ImmutableValue::Map(map) => Ok(map),
            other => Err(OverlayError::UnexpectedType {
                expected: ValueKind::Map,
                actual: other.kind(),
            }),
        }
    }

    /// Like [`Payload::load`], requiring a sequence.
    pub fn load_sequence(&self) -> Result<ImmutableSequence> {
        match self.load()? {
            ImmutableValue::Sequence(seq) => Ok(seq),
            other => Err(OverlayError::UnexpectedType {
                expected: ValueKind::Sequence,
                actual: other.kind(),
            }),
        }
    }

    fn decode(&self) -> Result<ImmutableValue> {
        if self.bytes.is_empty() {
            return Ok(ImmutableValue::Null);
        }
        let codec = self.codec.as_ref().ok_or(OverlayError::MissingDecoder)?;
        match codec.decode(&self.bytes) {
            Ok(value) => Ok(ImmutableValue::from_native(value)),
            Err(err) => {
                tracing::debug!(len = self.bytes.len(), error = %err, "payload decode failed");
                Err(err)
            }
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload")
            .field("len", &self.bytes.len())
            .field("has_codec", &self.codec.is_some())
            .field("loaded", &self.decoded.get().is_some())
            .finish()
    }
}
