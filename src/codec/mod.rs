//! Encoded payload codec
//!
//! Market-event bodies are stored as JSON text. JSON is documented, stable
//! across restarts and readable from any language, so a data set written here
//! can be replayed by another implementation.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Payload codec errors
#[derive(Debug, Error)]
pub enum CodecError {
    /// Value cannot be expressed in the payload value model
    #[error("payload not encodable: {0}")]
    Encode(#[source] serde_json::Error),
    /// Stored blob is not valid JSON or does not match the target type
    #[error("payload not decodable: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Encode a structured value into its storage blob
pub fn encode(value: &Value) -> Result<String, CodecError> {
    serde_json::to_string(value).map_err(CodecError::Encode)
}

/// Decode a storage blob back into a structured value
pub fn decode(blob: &str) -> Result<Value, CodecError> {
    serde_json::from_str(blob).map_err(CodecError::Decode)
}

/// Encode any serializable payload
///
/// Fails for values outside the model, e.g. maps with non-string keys.
pub fn encode_payload<T: Serialize + ?Sized>(payload: &T) -> Result<String, CodecError> {
    serde_json::to_string(payload).map_err(CodecError::Encode)
}

/// Decode a blob into a typed payload
pub fn decode_payload<T: DeserializeOwned>(blob: &str) -> Result<T, CodecError> {
    serde_json::from_str(blob).map_err(CodecError::Decode)
}

/// Encode every element of a sequence, failing on the first bad element
pub fn encode_all<T: Serialize>(payloads: &[T]) -> Result<Vec<String>, CodecError> {
    payloads.iter().map(encode_payload).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_round_trip_nested_value() {
        let value = json!({
            "symbol": "BTC/USD",
            "last": 42500.25,
            "bid": null,
            "active": true,
            "levels": [[100.5, 2], [101, 0.125]],
            "info": {"seq": 18446744073709551615u64, "neg": -12}
        });

        let blob = encode(&value).unwrap();
        assert_eq!(decode(&blob).unwrap(), value);
    }

    #[test]
    fn test_round_trip_awkward_floats() {
        let value = json!([0.1, 1e-300, 123456789.123456789, -0.0000001, f64::MAX]);
        let blob = encode(&value).unwrap();
        assert_eq!(decode(&blob).unwrap(), value);
    }

    #[test]
    fn test_round_trip_unicode_strings() {
        let value = json!({"name": "ビットコイン", "quote": "\"escaped\"\n"});
        let blob = encode(&value).unwrap();
        assert_eq!(decode(&blob).unwrap(), value);
    }

    #[test]
    fn test_candle_encodes_as_plain_array() {
        let blob = encode_payload(&[100.0, 110.0, 95.0, 105.0, 50.0]).unwrap();
        assert_eq!(blob, "[100.0,110.0,95.0,105.0,50.0]");
        let candle: Vec<f64> = decode_payload(&blob).unwrap();
        assert_eq!(candle, vec![100.0, 110.0, 95.0, 105.0, 50.0]);
    }

    #[test]
    fn test_non_string_keys_rejected() {
        let mut map = HashMap::new();
        map.insert((1, 2), "level");
        let result = encode_payload(&map);
        assert!(matches!(result, Err(CodecError::Encode(_))));
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(matches!(decode("{not json"), Err(CodecError::Decode(_))));
    }

    #[test]
    fn test_encode_all_stops_on_bad_element() {
        let mut bad = HashMap::new();
        bad.insert((0, 0), 1);
        let payloads = vec![HashMap::new(), bad];
        assert!(encode_all(&payloads).is_err());
    }

    const CHARS: &[char] = &[
        'a', 'Z', '0', ' ', '"', '\\', '\n', '/', 'é', 'ビ', '€', '\u{1F4B0}',
    ];

    fn random_string(rng: &mut StdRng) -> String {
        let len = rng.random_range(0..8);
        (0..len)
            .map(|_| CHARS[rng.random_range(0..CHARS.len())])
            .collect()
    }

    fn random_float(rng: &mut StdRng) -> f64 {
        let mantissa: f64 = rng.random::<f64>() * 10.0;
        let scaled = mantissa * 10f64.powi(rng.random_range(-300..300));
        if rng.random_bool(0.5) {
            -scaled
        } else {
            scaled
        }
    }

    fn random_value(rng: &mut StdRng, depth: u32) -> Value {
        let kinds = if depth == 0 { 6 } else { 8 };
        match rng.random_range(0..kinds) {
            0 => Value::Null,
            1 => Value::Bool(rng.random()),
            2 => Value::from(rng.random::<i64>()),
            3 => Value::from(rng.random::<u64>()),
            4 => Value::from(random_float(rng)),
            5 => Value::String(random_string(rng)),
            6 => (0..rng.random_range(0..5))
                .map(|_| random_value(rng, depth - 1))
                .collect(),
            _ => Value::Object(
                (0..rng.random_range(0..5))
                    .map(|_| (random_string(rng), random_value(rng, depth - 1)))
                    .collect(),
            ),
        }
    }

    #[test]
    fn test_round_trip_generated_values() {
        let mut rng = StdRng::seed_from_u64(0x71c4_5eed);
        for _ in 0..2000 {
            let value = random_value(&mut rng, 4);
            let blob = encode(&value).unwrap();
            assert_eq!(decode(&blob).unwrap(), value, "blob: {blob}");
        }
    }
}
