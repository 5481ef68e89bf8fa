/// Asymmetric authenticated encryption: X25519 + XSalsa20-Poly1305
/// (`crypto_box`), with a fresh ephemeral sender keypair per message.
///
/// Token layout: `[nonce(24) | ephemeral_public(32) | ciphertext+tag]`,
/// carried as a three-part payload. Holders of the recipient public key can
/// seal; only the holder of the recipient secret can open.
use crypto_box::aead::Aead;
use crypto_box::{Nonce, PublicKey, SalsaBox, SecretKey};
use rand::rngs::OsRng;
use serde_json::Value;

use crate::coder;
use crate::crypto::sensitive::SensitiveBytes32;
use crate::crypto::{decrypt_error, entropy};
use crate::error::{KeychainError, Result};

pub const PAIR_KEY_LEN: usize = 32;
pub const PAIR_NONCE_LEN: usize = 24;

/// An X25519 keypair. The public half is part of a keychain's identity;
/// the secret half gates reads.
pub struct PairKeyPair {
    pub public: [u8; PAIR_KEY_LEN],
    pub secret: SensitiveBytes32,
}

/// Generate a fresh X25519 keypair.
pub fn generate_keys() -> PairKeyPair {
    let secret = SecretKey::generate(&mut OsRng);
    let public = *secret.public_key().as_bytes();
    PairKeyPair {
        public,
        secret: SensitiveBytes32::new(secret.to_bytes()),
    }
}

/// JSON-encode `data` and seal it for the holder of `recipient_public`.
///
/// The ephemeral secret lives only for the duration of this call.
pub fn encrypt(data: &Value, recipient_public: &[u8; PAIR_KEY_LEN]) -> Result<String> {
    let plaintext = coder::safe_json_encode(data)?;
    let nonce_bytes: [u8; PAIR_NONCE_LEN] = entropy::random_array();

    let ephemeral_secret = SecretKey::generate(&mut OsRng);
    let ephemeral_public = *ephemeral_secret.public_key().as_bytes();

    let sealer = SalsaBox::new(&PublicKey::from(*recipient_public), &ephemeral_secret);
    let ciphertext = sealer
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
        .map_err(|_| KeychainError::Internal("pair seal failed".to_string()))?;

    Ok(coder::stringify_payload(&[
        &nonce_bytes,
        &ephemeral_public,
        &ciphertext,
    ]))
}

/// Open a token sealed by [`encrypt`] with the recipient secret key.
pub fn decrypt(token: &str, secret: &SensitiveBytes32) -> Result<Value> {
    let parts = coder::parse_payload(token, Some(3)).map_err(|_| decrypt_error())?;
    let nonce = &parts[0];
    let ephemeral_public = &parts[1];
    let ciphertext = &parts[2];

    if nonce.len() != PAIR_NONCE_LEN {
        return Err(decrypt_error());
    }
    let ephemeral_public: [u8; PAIR_KEY_LEN] = ephemeral_public
        .as_slice()
        .try_into()
        .map_err(|_| decrypt_error())?;

    let opener = SalsaBox::new(
        &PublicKey::from(ephemeral_public),
        &SecretKey::from(*secret.as_bytes()),
    );
    let plaintext = opener
        .decrypt(Nonce::from_slice(nonce), ciphertext.as_slice())
        .map_err(|_| decrypt_error())?;

    let text = String::from_utf8(plaintext).map_err(|_| decrypt_error())?;
    coder::safe_json_decode(&text).map_err(|_| decrypt_error())
}
