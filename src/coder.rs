/// Encoding primitives shared by every keychain token format.
///
/// Tokens are ordered lists of byte strings carried as a single printable
/// string: parts joined by `.`, each part URL-safe base64 without `=`
/// padding. Part meaning is positional and fixed per caller.
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{KeychainError, Result};

/// Byte width of a binary UUID.
pub const UUID_LEN: usize = 16;

/// Encode bytes as URL-safe base64 without `=` padding.
pub fn trimmed_b64_encode(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

/// Decode URL-safe unpadded base64. Any byte outside the `A–Z a–z 0–9 - _`
/// alphabet (including `=`, `+`, and `/`) is rejected.
pub fn trimmed_b64_decode(data: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(data)
        .map_err(|e| KeychainError::Encoding(format!("invalid base64: {e}")))
}

pub fn safe_json_encode(value: &Value) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| KeychainError::Encoding(format!("JSON encode failed: {e}")))
}

pub fn safe_json_decode(data: &str) -> Result<Value> {
    serde_json::from_str(data)
        .map_err(|e| KeychainError::Encoding(format!("JSON decode failed: {e}")))
}

/// Serialize an ordered list of byte strings as a dot-joined payload.
pub fn stringify_payload(parts: &[&[u8]]) -> String {
    parts
        .iter()
        .map(|part| trimmed_b64_encode(part))
        .collect::<Vec<_>>()
        .join(".")
}

/// Split a payload into its parts and decode each.
///
/// When `expected_parts` is given, any other part count fails. Empty parts
/// are always rejected.
pub fn parse_payload(payload: &str, expected_parts: Option<usize>) -> Result<Vec<Vec<u8>>> {
    let parts: Vec<&str> = payload.split('.').collect();
    if let Some(expected) = expected_parts {
        if parts.len() != expected {
            return Err(KeychainError::Encoding(format!(
                "payload has {} parts (expected {expected})",
                parts.len()
            )));
        }
    }
    parts
        .iter()
        .map(|part| {
            if part.is_empty() {
                return Err(KeychainError::Encoding(
                    "payload contains an empty part".to_string(),
                ));
            }
            trimmed_b64_decode(part)
        })
        .collect()
}

/// Compress a canonical `8-4-4-4-12` hyphenated UUID string to 16 bytes.
///
/// Only the canonical lowercase form is accepted; simple, braced, urn, and
/// uppercase renderings are rejected.
pub fn compress_uuid(uuid: &str) -> Result<[u8; UUID_LEN]> {
    let parsed =
        Uuid::parse_str(uuid).map_err(|e| KeychainError::Encoding(format!("invalid UUID: {e}")))?;
    if parsed.as_hyphenated().to_string() != uuid {
        return Err(KeychainError::Encoding(
            "UUID is not in canonical hyphenated form".to_string(),
        ));
    }
    Ok(*parsed.as_bytes())
}

/// Expand 16 bytes back into the canonical hyphenated UUID string.
pub fn decompress_uuid(bytes: &[u8]) -> Result<String> {
    let uuid = Uuid::from_slice(bytes).map_err(|_| {
        KeychainError::Encoding(format!(
            "binary UUID is {} bytes (expected {UUID_LEN})",
            bytes.len()
        ))
    })?;
    Ok(uuid.as_hyphenated().to_string())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_b64_roundtrip() {
        let data = b"keychain payload \x00\xff\x7f";
        let encoded = trimmed_b64_encode(data);
        assert!(!encoded.contains('='));
        assert_eq!(trimmed_b64_decode(&encoded).unwrap(), data);
    }

    #[test]
    fn test_b64_decode_rejects_standard_alphabet() {
        for input in ["AA==", "a+b", "a/b", "not base64!"] {
            assert!(trimmed_b64_decode(input).is_err(), "accepted {input:?}");
        }
    }

    #[test]
    fn test_json_roundtrip() {
        let value = json!({"user": "a", "pw": "b", "n": 3, "flags": [true, null]});
        let encoded = safe_json_encode(&value).unwrap();
        assert_eq!(safe_json_decode(&encoded).unwrap(), value);
    }

    #[test]
    fn test_json_decode_rejects_garbage() {
        assert!(safe_json_decode("{not json").is_err());
    }

    #[test]
    fn test_payload_roundtrip() {
        let parts: [&[u8]; 3] = [b"first", b"\x00\x01\x02", b"third part"];
        let payload = stringify_payload(&parts);
        let parsed = parse_payload(&payload, Some(3)).unwrap();
        assert_eq!(parsed.len(), 3);
        for (parsed_part, part) in parsed.iter().zip(parts) {
            assert_eq!(parsed_part.as_slice(), part);
        }
    }

    #[test]
    fn test_payload_part_count_mismatch() {
        let payload = stringify_payload(&[b"one", b"two"]);
        assert!(parse_payload(&payload, Some(3)).is_err());
        assert!(parse_payload(&payload, Some(1)).is_err());
        assert!(parse_payload(&payload, None).is_ok());
    }

    #[test]
    fn test_payload_empty_part_rejected() {
        assert!(parse_payload("", Some(1)).is_err());
        assert!(parse_payload("YQ..YQ", None).is_err());
    }

    #[test]
    fn test_uuid_roundtrip() {
        let uuid = "f81d4fae-7dec-11d0-a765-00a0c91e6bf6";
        let bytes = compress_uuid(uuid).unwrap();
        assert_eq!(decompress_uuid(&bytes).unwrap(), uuid);
    }

    #[test]
    fn test_uuid_rejects_non_canonical_forms() {
        for input in [
            "f81d4fae7dec11d0a76500a0c91e6bf6",
            "F81D4FAE-7DEC-11D0-A765-00A0C91E6BF6",
            "{f81d4fae-7dec-11d0-a765-00a0c91e6bf6}",
            "urn:uuid:f81d4fae-7dec-11d0-a765-00a0c91e6bf6",
            "not-a-uuid",
        ] {
            assert!(compress_uuid(input).is_err(), "accepted {input:?}");
        }
    }

    #[test]
    fn test_decompress_uuid_wrong_length() {
        assert!(decompress_uuid(&[0u8; 15]).is_err());
        assert!(decompress_uuid(&[0u8; 17]).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn prop_b64_roundtrip(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
            let encoded = trimmed_b64_encode(&bytes);
            prop_assert!(!encoded.contains('='));
            prop_assert_eq!(trimmed_b64_decode(&encoded).unwrap(), bytes);
        }

        #[test]
        fn prop_payload_roundtrip(
            parts in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..64), 1..6),
        ) {
            let borrowed: Vec<&[u8]> = parts.iter().map(|p| p.as_slice()).collect();
            let payload = stringify_payload(&borrowed);
            let parsed = parse_payload(&payload, Some(parts.len())).unwrap();
            prop_assert_eq!(parsed, parts);
        }

        #[test]
        fn prop_uuid_roundtrip(bytes in any::<[u8; 16]>()) {
            let uuid = decompress_uuid(&bytes).unwrap();
            prop_assert_eq!(compress_uuid(&uuid).unwrap(), bytes);
        }
    }
}
