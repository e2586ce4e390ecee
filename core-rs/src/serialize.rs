//! Text (de)serialization (spec §4.7): JSON stringify with a tolerant
//! parser on the way back in, plus the raw-byte text envelope that lets a
//! text-only backend round-trip `setRaw`/`getRaw`.

use crate::error::{Result, StoreError};
use crate::value::Value;
use base64::Engine;

const RAW_ENVELOPE_PREFIX: &str = "__unistore_raw__:";

/// Converts a `Value` to its text-channel representation.
///
/// Fails fast on values that cannot be represented as JSON (spec: "refuse on
/// non-primitive values without a serialization hook"). `Value::Bytes`
/// never reaches this function directly -- callers route raw values through
/// [`encode_raw`] instead.
pub fn stringify(value: &Value) -> Result<String> {
    match value {
        Value::Bytes(_) => Err(StoreError::SerializationFailure(
            "raw byte values must go through encode_raw, not stringify".to_string(),
        )),
        Value::Null => Ok("null".to_string()),
        Value::String(s) => Ok(s.clone()),
        other => serde_json::to_string(other)
            .map_err(|e| StoreError::SerializationFailure(e.to_string())),
    }
}

/// Best-effort text-to-value decoder.
///
/// - Valid JSON (object, array-as-string, number, bool, null) parses as such.
/// - A bare primitive literal (`true`, `false`, `null`, an integer, a float)
///   decodes to that literal even without JSON's strict quoting.
/// - Anything else comes back as the original string, verbatim.
pub fn parse(text: &str) -> Value {
    let trimmed = text.trim();
    match trimmed {
        "null" => return Value::Null,
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(n) = trimmed.parse::<i64>() {
        return Value::Number(serde_json::Number::from(n));
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(text) {
        if matches!(json, serde_json::Value::Object(_) | serde_json::Value::Array(_)) {
            return Value::from(json);
        }
    }
    Value::String(text.to_string())
}

/// Encodes an opaque byte sequence into a tagged text envelope: the byte
/// length followed by a base64 body, so a text-only backend can still carry
/// `setRaw`/`getRaw` payloads.
pub fn encode_raw(bytes: &[u8]) -> String {
    format!(
        "{RAW_ENVELOPE_PREFIX}{}:{}",
        bytes.len(),
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Inverse of [`encode_raw`]. Text that isn't a recognized envelope is
/// returned as its own UTF-8 bytes, unchanged.
pub fn decode_raw(text: &str) -> Vec<u8> {
    if let Some(rest) = text.strip_prefix(RAW_ENVELOPE_PREFIX) {
        if let Some((len_str, body)) = rest.split_once(':') {
            if let Ok(len) = len_str.parse::<usize>() {
                if let Ok(decoded) = base64::engine::general_purpose::STANDARD.decode(body) {
                    if decoded.len() == len {
                        return decoded;
                    }
                }
            }
        }
    }
    text.as_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stringify_primitives() {
        assert_eq!(stringify(&Value::Null).unwrap(), "null");
        assert_eq!(stringify(&Value::Bool(true)).unwrap(), "true");
        assert_eq!(stringify(&Value::String("hi".into())).unwrap(), "hi");
    }

    #[test]
    fn stringify_object() {
        let v = Value::from(json!({"n": 1}));
        let s = stringify(&v).unwrap();
        assert_eq!(serde_json::from_str::<serde_json::Value>(&s).unwrap(), json!({"n": 1}));
    }

    #[test]
    fn stringify_bytes_fails() {
        assert!(stringify(&Value::Bytes(vec![1])).is_err());
    }

    #[test]
    fn parse_literals() {
        assert_eq!(parse("true"), Value::Bool(true));
        assert_eq!(parse("false"), Value::Bool(false));
        assert_eq!(parse("null"), Value::Null);
        assert_eq!(parse("42"), Value::Number(42.into()));
    }

    #[test]
    fn parse_json_object() {
        match parse(r#"{"a":1}"#) {
            Value::Object(m) => assert_eq!(m.get("a"), Some(&json!(1))),
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn parse_falls_back_to_raw_string() {
        assert_eq!(parse("hello world"), Value::String("hello world".into()));
    }

    #[test]
    fn raw_envelope_round_trips() {
        let bytes = vec![0u8, 255, 16, 3, 200];
        let encoded = encode_raw(&bytes);
        assert_eq!(decode_raw(&encoded), bytes);
    }

    #[test]
    fn unrecognized_text_decodes_as_its_own_bytes() {
        assert_eq!(decode_raw("plain text"), b"plain text".to_vec());
    }

    #[test]
    fn empty_bytes_round_trip() {
        let encoded = encode_raw(&[]);
        assert_eq!(decode_raw(&encoded), Vec::<u8>::new());
    }
}
