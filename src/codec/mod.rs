//! Serialization codecs.
//!
//! A codec turns a session [`Dict`] into bytes for a provider and back.
//! Every codec follows the same two rules:
//!
//! - an empty dict encodes to zero bytes, so providers can skip the payload;
//! - zero bytes decode to an empty dict.
//!
//! Malformed input is reported as a [`CodecError`], never a panic.
//!
//! ## Codecs
//!
//! - [`BinaryCodec`]: compact self-describing MessagePack-compatible encoding (default)
//! - [`Base64Codec`]: standard base64 over the binary encoding, for text-only transports
//! - [`JsonCodec`]: serde/JSON encoding, an interoperability fallback
//!
//! ## Example
//!
//! ```rust
//! use session_keeper::codec::{BinaryCodec, Codec};
//! use session_keeper::{Dict, Value};
//!
//! let mut dict = Dict::new();
//! dict.insert("user".into(), Value::from("ferris"));
//!
//! let bytes = BinaryCodec.encode(&dict).unwrap();
//! assert_eq!(BinaryCodec.decode(&bytes).unwrap(), dict);
//! ```

mod binary;
mod json;
mod printable;

use thiserror::Error;

use crate::value::Dict;

pub use binary::BinaryCodec;
pub use json::JsonCodec;
pub use printable::Base64Codec;

/// Maximum nesting depth of lists and maps accepted by the codecs.
pub const MAX_DEPTH: usize = 64;

/// Converts a session dictionary to bytes and back.
pub trait Codec: Send + Sync {
    /// Encode a dictionary. An empty dictionary yields an empty vector.
    fn encode(&self, dict: &Dict) -> Result<Vec<u8>, CodecError>;

    /// Decode bytes produced by [`Codec::encode`]. Empty input yields an empty dictionary.
    fn decode(&self, data: &[u8]) -> Result<Dict, CodecError>;

    /// Codec name, used in logs.
    fn name(&self) -> &'static str;
}

/// Codec failures.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Input ended in the middle of a value.
    #[error("unexpected end of input")]
    Truncated,

    /// Unknown or unsupported type marker.
    #[error("unsupported type marker 0x{0:02x}")]
    InvalidMarker(u8),

    /// The top-level value is not a map.
    #[error("top-level value is not a map")]
    NotAMap,

    /// Map key is not a string.
    #[error("map key is not a string")]
    NonStringKey,

    /// String payload is not UTF-8.
    #[error("invalid UTF-8 in string value")]
    InvalidUtf8,

    /// Unsigned integer does not fit in an i64.
    #[error("integer out of range: {0}")]
    IntegerOverflow(u64),

    /// Value nesting exceeds [`MAX_DEPTH`].
    #[error("value nesting exceeds {MAX_DEPTH} levels")]
    TooDeep,

    /// Input has bytes left after the top-level value.
    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),

    /// A string, binary or collection is too long to encode.
    #[error("length {0} exceeds the encodable maximum")]
    TooLong(usize),

    /// Base64 layer failed.
    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// JSON layer failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn sample() -> Dict {
        let mut nested = Dict::new();
        nested.insert("theme".into(), Value::from("dark"));
        nested.insert("size".into(), Value::Int(-12));

        let mut dict = Dict::new();
        dict.insert("foo".into(), Value::from("bar"));
        dict.insert("count".into(), Value::Int(1_000_000_007));
        dict.insert("ratio".into(), Value::Float(0.25));
        dict.insert("admin".into(), Value::Bool(true));
        dict.insert("token".into(), Value::Bytes(vec![0, 1, 2, 255]));
        dict.insert(
            "tags".into(),
            Value::List(vec![Value::from("a"), Value::Int(2), Value::Bool(false)]),
        );
        dict.insert("prefs".into(), Value::Map(nested));
        dict
    }

    fn codecs() -> Vec<Box<dyn Codec>> {
        vec![Box::new(BinaryCodec), Box::new(Base64Codec), Box::new(JsonCodec)]
    }

    #[test]
    fn test_roundtrip_all_codecs() {
        let dict = sample();
        for codec in codecs() {
            let bytes = codec.encode(&dict).unwrap();
            let decoded = codec.decode(&bytes).unwrap();
            assert_eq!(decoded, dict, "codec {} lost data", codec.name());
        }
    }

    #[test]
    fn test_empty_dict_is_empty_bytes() {
        for codec in codecs() {
            assert!(codec.encode(&Dict::new()).unwrap().is_empty());
            assert!(codec.decode(&[]).unwrap().is_empty());
        }
    }

    #[test]
    fn test_garbage_is_an_error_not_a_panic() {
        let garbage: &[&[u8]] = &[b"\xff\xff", b"\x81", b"not valid at all", b"\x81\xa1k\xdb\xff"];
        for codec in codecs() {
            for input in garbage {
                assert!(codec.decode(input).is_err(), "codec {} accepted {:?}", codec.name(), input);
            }
        }
    }
}
