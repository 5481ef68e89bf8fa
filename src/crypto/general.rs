/// Symmetric encryption for keychain tokens: AES-256-GCM with a random
/// 12-byte nonce.
///
/// Token layout: `[nonce(12) | ciphertext+tag]`, carried as a two-part
/// payload. Associated data is `nonce[4..8]`, a fixed public derivation
/// that every conforming token uses; omitting or varying it makes tokens
/// unopenable.
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use serde_json::Value;

use crate::coder;
use crate::crypto::sensitive::SensitiveBytes32;
use crate::crypto::{decrypt_error, entropy};
use crate::error::{KeychainError, Result};

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// Associated data bound into every seal: bytes 4 through 7 of the nonce.
fn aad(nonce: &[u8]) -> &[u8] {
    &nonce[4..8]
}

/// Generate a random 256-bit symmetric key.
pub fn generate_key() -> SensitiveBytes32 {
    SensitiveBytes32::new(entropy::random_array())
}

/// JSON-encode `data` and seal it under `key`.
pub fn encrypt(data: &Value, key: &SensitiveBytes32) -> Result<String> {
    let plaintext = coder::safe_json_encode(data)?;
    let nonce_bytes: [u8; NONCE_LEN] = entropy::random_array();

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| KeychainError::Internal(format!("AES-256-GCM init failed: {e}")))?;

    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: plaintext.as_bytes(),
                aad: aad(&nonce_bytes),
            },
        )
        .map_err(|_| KeychainError::Internal("AES-256-GCM seal failed".to_string()))?;

    Ok(coder::stringify_payload(&[&nonce_bytes, &ciphertext]))
}

/// Open a token sealed by [`encrypt`] and JSON-decode the plaintext.
///
/// Bad shape, wrong key, tag mismatch, and JSON failure are identical to
/// the caller.
pub fn decrypt(token: &str, key: &SensitiveBytes32) -> Result<Value> {
    let parts = coder::parse_payload(token, Some(2)).map_err(|_| decrypt_error())?;
    let nonce = &parts[0];
    let ciphertext = &parts[1];

    if nonce.len() != NONCE_LEN {
        return Err(decrypt_error());
    }

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| decrypt_error())?;

    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext.as_slice(),
                aad: aad(nonce),
            },
        )
        .map_err(|_| decrypt_error())?;

    let text = String::from_utf8(plaintext).map_err(|_| decrypt_error())?;
    coder::safe_json_decode(&text).map_err(|_| decrypt_error())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::error::KeychainError;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = generate_key();
        let value = json!({"user": "a", "pw": "b", "count": 3});

        let token = encrypt(&value, &key).unwrap();
        assert_eq!(decrypt(&token, &key).unwrap(), value);
    }

    #[test]
    fn test_token_shape() {
        let key = generate_key();
        let token = encrypt(&json!("x"), &key).unwrap();

        let parts = crate::coder::parse_payload(&token, Some(2)).unwrap();
        assert_eq!(parts[0].len(), NONCE_LEN);
        // ciphertext carries the JSON plaintext plus the tag
        assert_eq!(parts[1].len(), "\"x\"".len() + TAG_LEN);
    }

    #[test]
    fn test_wrong_key_fails() {
        let key1 = generate_key();
        let key2 = generate_key();

        let token = encrypt(&json!("secret"), &key1).unwrap();
        assert!(matches!(
            decrypt(&token, &key2),
            Err(KeychainError::Decrypt(_))
        ));
    }

    #[test]
    fn test_tampered_token_fails() {
        let key = generate_key();
        let token = encrypt(&json!("secret"), &key).unwrap();

        let mut chars: Vec<char> = token.chars().collect();
        let last = chars.len() - 1;
        chars[last] = if chars[last] == 'A' { 'B' } else { 'A' };
        let tampered: String = chars.into_iter().collect();

        assert!(matches!(
            decrypt(&tampered, &key),
            Err(KeychainError::Decrypt(_))
        ));
    }

    #[test]
    fn test_wrong_part_count_fails() {
        let key = generate_key();
        let token = encrypt(&json!("x"), &key).unwrap();

        let extended = format!("{token}.YQ");
        assert!(matches!(
            decrypt(&extended, &key),
            Err(KeychainError::Decrypt(_))
        ));
        assert!(decrypt("", &key).is_err());
    }

    #[test]
    fn test_fresh_nonce_per_encrypt() {
        let key = generate_key();
        let value = json!("same plaintext");

        let t1 = encrypt(&value, &key).unwrap();
        let t2 = encrypt(&value, &key).unwrap();

        assert_ne!(t1, t2);
        assert_eq!(decrypt(&t1, &key).unwrap(), decrypt(&t2, &key).unwrap());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_roundtrip(text in ".*", key_bytes in any::<[u8; 32]>()) {
            let key = SensitiveBytes32::new(key_bytes);
            let value = Value::String(text);
            let token = encrypt(&value, &key).unwrap();
            prop_assert_eq!(decrypt(&token, &key).unwrap(), value);
        }
    }
}
