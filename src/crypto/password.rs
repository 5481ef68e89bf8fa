/// Password-based sealing: Argon2id key derivation over the symmetric
/// layer.
///
/// Token layout: `[salt(16) | general-token-bytes]`, carried as a two-part
/// payload. The inner value is a complete `general` token produced with the
/// derived key.
///
/// Parameters follow libsodium's moderate profile and are pinned: tokens
/// already issued can only be opened with these exact values.
use argon2::{Algorithm, Argon2, Params, Version};
use serde_json::Value;

use crate::coder;
use crate::crypto::sensitive::SensitiveBytes32;
use crate::crypto::{decrypt_error, entropy, general};
use crate::error::{KeychainError, Result};

/// Argon2id salt width.
pub const SALT_LEN: usize = 16;

const ARGON2_TIME_COST: u32 = 3;
const ARGON2_MEMORY_KIB: u32 = 262_144; // 256 MiB
const ARGON2_PARALLELISM: u32 = 1;

/// JSON-encode `data` and seal it under a key derived from `password` and
/// a fresh random salt.
pub fn encrypt(data: &Value, password: &str) -> Result<String> {
    let salt: [u8; SALT_LEN] = entropy::random_array();
    let key = derive_key(password, &salt)?;
    let inner = general::encrypt(data, &key)?;
    Ok(coder::stringify_payload(&[&salt, inner.as_bytes()]))
}

/// Open a token sealed by [`encrypt`] with the same password.
pub fn decrypt(token: &str, password: &str) -> Result<Value> {
    let parts = coder::parse_payload(token, Some(2)).map_err(|_| decrypt_error())?;
    let salt = &parts[0];
    if salt.len() != SALT_LEN {
        return Err(decrypt_error());
    }
    let inner = std::str::from_utf8(&parts[1]).map_err(|_| decrypt_error())?;

    let key = derive_key(password, salt)?;
    general::decrypt(inner, &key)
}

/// Derive a 32-byte symmetric key from a password and salt via Argon2id.
fn derive_key(password: &str, salt: &[u8]) -> Result<SensitiveBytes32> {
    let params = Params::new(
        ARGON2_MEMORY_KIB,
        ARGON2_TIME_COST,
        ARGON2_PARALLELISM,
        Some(general::KEY_LEN),
    )
    .map_err(|e| KeychainError::Internal(format!("invalid Argon2id params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut output = [0u8; general::KEY_LEN];
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut output)
        .map_err(|e| KeychainError::Internal(format!("Argon2id derivation failed: {e}")))?;

    Ok(SensitiveBytes32::new(output))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::KeychainError;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let value = json!({"api_key": "k-123"});
        let token = encrypt(&value, "correct horse battery staple").unwrap();
        assert_eq!(
            decrypt(&token, "correct horse battery staple").unwrap(),
            value
        );
    }

    #[test]
    fn test_wrong_password_fails() {
        let token = encrypt(&json!("secret"), "right password").unwrap();
        assert!(matches!(
            decrypt(&token, "wrong password"),
            Err(KeychainError::Decrypt(_))
        ));
    }

    #[test]
    fn test_token_shape_and_fresh_salt() {
        let t1 = encrypt(&json!("x"), "pw").unwrap();
        let t2 = encrypt(&json!("x"), "pw").unwrap();
        assert_ne!(t1, t2);

        let parts = crate::coder::parse_payload(&t1, Some(2)).unwrap();
        assert_eq!(parts[0].len(), SALT_LEN);
        // the inner part is itself a two-part general token
        let inner = std::str::from_utf8(&parts[1]).unwrap();
        assert!(crate::coder::parse_payload(inner, Some(2)).is_ok());
    }

    #[test]
    fn test_wrong_part_count_fails() {
        assert!(matches!(
            decrypt("YQ", "pw"),
            Err(KeychainError::Decrypt(_))
        ));
        assert!(matches!(
            decrypt("YQ.YQ.YQ", "pw"),
            Err(KeychainError::Decrypt(_))
        ));
    }
}
