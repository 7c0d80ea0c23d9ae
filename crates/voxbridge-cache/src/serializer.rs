//! Value serialization with conditional compression.
//!
//! ## Wire Format
//!
//! Every stored payload carries an explicit format tag so decode never has
//! to guess by trial and error:
//!
//! ```text
//! t:<compact JSON>      scalar values (string, number, bool, null)
//! b:<MessagePack>       composite values (arrays, objects)
//! gz:<gzip stream>      either of the above, compressed past the threshold
//! ```
//!
//! Scalars stay human-readable in the store; composites get the compact
//! binary encoding. Payloads above the configured threshold are gzipped and
//! prefixed with the compression marker.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde_json::Value;
use voxbridge_core::{CacheError, Result};

/// Marker prefixed to compressed payloads.
pub const COMPRESSION_MARKER: &[u8] = b"gz:";

/// Tag for the compact text encoding of scalars.
const TEXT_TAG: &[u8] = b"t:";

/// Tag for the structured binary encoding of composites.
const BINARY_TAG: &[u8] = b"b:";

/// Check whether an encoded payload is compressed.
pub fn is_compressed(data: &[u8]) -> bool {
    data.starts_with(COMPRESSION_MARKER)
}

/// Encoder/decoder for cached values.
#[derive(Debug, Clone)]
pub struct Serializer {
    compression_enabled: bool,
    compression_threshold: usize,
}

impl Serializer {
    pub fn new(compression_enabled: bool, compression_threshold: usize) -> Self {
        Self {
            compression_enabled,
            compression_threshold,
        }
    }

    /// Encode a value into tagged bytes, compressing large payloads.
    pub fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        let payload = if is_scalar(value) {
            let mut buf = Vec::with_capacity(TEXT_TAG.len() + 16);
            buf.extend_from_slice(TEXT_TAG);
            serde_json::to_writer(&mut buf, value)?;
            buf
        } else {
            let mut buf = Vec::from(BINARY_TAG);
            buf.extend_from_slice(&rmp_serde::to_vec(value)?);
            buf
        };

        if self.compression_enabled && payload.len() > self.compression_threshold {
            let mut encoder = GzEncoder::new(Vec::from(COMPRESSION_MARKER), Compression::default());
            encoder.write_all(&payload)?;
            return Ok(encoder.finish()?);
        }

        Ok(payload)
    }

    /// Decode tagged bytes back into a value.
    ///
    /// A payload with an unknown tag, or one that fails to inflate or
    /// deserialize, is a hard error: a corrupt value must not silently
    /// become an empty result.
    pub fn decode(&self, data: &[u8]) -> Result<Value> {
        let inflated;
        let payload: &[u8] = if let Some(compressed) = data.strip_prefix(COMPRESSION_MARKER) {
            let mut decoder = GzDecoder::new(compressed);
            let mut buf = Vec::new();
            decoder.read_to_end(&mut buf)?;
            inflated = buf;
            &inflated
        } else {
            data
        };

        if let Some(text) = payload.strip_prefix(TEXT_TAG) {
            Ok(serde_json::from_slice(text)?)
        } else if let Some(binary) = payload.strip_prefix(BINARY_TAG) {
            Ok(rmp_serde::from_slice(binary)?)
        } else {
            Err(CacheError::serialization("unknown format tag in payload"))
        }
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn serializer() -> Serializer {
        Serializer::new(true, 1024)
    }

    #[test]
    fn test_scalar_uses_text_tag() {
        let s = serializer();
        for value in [json!("hello"), json!(42), json!(1.5), json!(true), json!(null)] {
            let encoded = s.encode(&value).expect("encode scalar");
            assert!(encoded.starts_with(b"t:"), "scalar should be text-tagged");
            assert_eq!(s.decode(&encoded).expect("decode scalar"), value);
        }
    }

    #[test]
    fn test_composite_uses_binary_tag() {
        let s = serializer();
        let value = json!({"name": "Acme Plumbing", "phones": ["+14155551234"], "rating": 4.5});
        let encoded = s.encode(&value).expect("encode composite");
        assert!(encoded.starts_with(b"b:"), "composite should be binary-tagged");
        assert_eq!(s.decode(&encoded).expect("decode composite"), value);
    }

    #[test]
    fn test_large_value_compressed_with_marker() {
        let s = serializer();
        let value = json!({"chunks": vec!["knowledge base passage"; 200]});
        let encoded = s.encode(&value).expect("encode large value");
        assert!(is_compressed(&encoded), "expected compression marker");
        assert_eq!(s.decode(&encoded).expect("decode large value"), value);
    }

    #[test]
    fn test_small_value_not_compressed() {
        let s = serializer();
        let encoded = s.encode(&json!("short")).expect("encode");
        assert!(!is_compressed(&encoded));
    }

    #[test]
    fn test_compression_disabled() {
        let s = Serializer::new(false, 16);
        let value = json!({"chunks": vec!["text"; 100]});
        let encoded = s.encode(&value).expect("encode");
        assert!(!is_compressed(&encoded));
        assert_eq!(s.decode(&encoded).expect("decode"), value);
    }

    #[test]
    fn test_unknown_tag_is_hard_error() {
        let s = serializer();
        assert!(s.decode(b"x:whatever").is_err());
        assert!(s.decode(b"").is_err());
    }

    #[test]
    fn test_corrupt_compressed_payload_is_hard_error() {
        let s = serializer();
        assert!(s.decode(b"gz:not actually gzip").is_err());
    }
}
