//! serde/JSON fallback codec.

use super::{Codec, CodecError};
use crate::value::Dict;

/// Generic serde-derived codec.
///
/// Values are written in serde's externally tagged form
/// (`{"Str":"bar"}`, `{"Bytes":[1,2]}`), so every variant survives the trip.
/// Larger than [`super::BinaryCodec`] but readable by any JSON tooling.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, dict: &Dict) -> Result<Vec<u8>, CodecError> {
        if dict.is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::to_vec(dict)?)
    }

    fn decode(&self, data: &[u8]) -> Result<Dict, CodecError> {
        if data.is_empty() {
            return Ok(Dict::new());
        }
        Ok(serde_json::from_slice(data)?)
    }

    fn name(&self) -> &'static str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_tagged_representation() {
        let mut dict = Dict::new();
        dict.insert("foo".into(), Value::from("bar"));

        let encoded = JsonCodec.encode(&dict).unwrap();
        assert_eq!(encoded, br#"{"foo":{"Str":"bar"}}"#.to_vec());
    }

    #[test]
    fn test_bytes_and_list_stay_distinct() {
        let mut dict = Dict::new();
        dict.insert("b".into(), Value::Bytes(vec![1, 2]));
        dict.insert("l".into(), Value::List(vec![Value::Int(1), Value::Int(2)]));

        let decoded = JsonCodec.decode(&JsonCodec.encode(&dict).unwrap()).unwrap();
        assert_eq!(decoded, dict);
    }

    #[test]
    fn test_wrong_shape_is_error() {
        assert!(matches!(JsonCodec.decode(b"[1,2,3]"), Err(CodecError::Json(_))));
    }
}
