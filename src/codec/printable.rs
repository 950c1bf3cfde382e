//! Printable codec: base64 over the binary encoding.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use super::{BinaryCodec, Codec, CodecError};
use crate::value::Dict;

/// Base64 wrapper around [`BinaryCodec`].
///
/// Use it when the transport only carries text, e.g. a payload stored
/// directly in a cookie value.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64Codec;

impl Codec for Base64Codec {
    fn encode(&self, dict: &Dict) -> Result<Vec<u8>, CodecError> {
        let raw = BinaryCodec.encode(dict)?;
        if raw.is_empty() {
            return Ok(raw);
        }
        Ok(STANDARD.encode(raw).into_bytes())
    }

    fn decode(&self, data: &[u8]) -> Result<Dict, CodecError> {
        if data.is_empty() {
            return Ok(Dict::new());
        }
        let raw = STANDARD.decode(data)?;
        BinaryCodec.decode(&raw)
    }

    fn name(&self) -> &'static str {
        "base64"
    }
}
