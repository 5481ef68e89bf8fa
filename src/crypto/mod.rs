/// Cryptographic transforms layered by the keychain.
///
/// Three cooperating encryptors, each a module with `encrypt`/`decrypt`
/// free functions over JSON values:
/// - `general`: AES-256-GCM under the keychain's 32-byte symmetric key,
/// - `pair`: X25519 + XSalsa20-Poly1305 under the keychain's keypair,
/// - `password`: Argon2id-derived key over the symmetric layer.
///
/// Every encryptor emits dot-joined URL-safe base64 tokens and satisfies
/// `decrypt(encrypt(x, k), k) = x` for JSON-representable `x`.
pub mod entropy;
pub mod general;
pub mod pair;
pub mod password;
pub mod sensitive;

use crate::error::KeychainError;

/// The one decryption error the crypto layer reports. A distinguishable
/// response would leak oracle information.
pub(crate) fn decrypt_error() -> KeychainError {
    KeychainError::Decrypt("token could not be opened".to_string())
}
