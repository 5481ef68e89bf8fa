/// The keychain aggregate.
///
/// A keychain owns a UUID identity, a three-part credential set, and
/// optionally the pair secret key. Writing a credential layers the
/// asymmetric seal (pair public) under the symmetric seal (general key),
/// so a write-only instance can accept credentials it can never read.
/// Reading requires the pair secret, installed either at generation time
/// or later through one of the unlock protocols.
use once_cell::sync::OnceCell;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::coder;
use crate::crypto::sensitive::{SensitiveBytes32, SensitiveVec};
use crate::crypto::{decrypt_error, entropy, general, pair, password};
use crate::error::{KeychainError, Result};

/// Number of parts in the credential set.
const CREDENTIAL_PARTS: usize = 3;

/// The credential triple forming a keychain's write-capable identity.
///
/// Positional order is fixed: binary UUID, general key, pair public key.
pub struct Credentials {
    uuid_bytes: [u8; coder::UUID_LEN],
    general_key: SensitiveBytes32,
    pair_public: [u8; pair::PAIR_KEY_LEN],
}

impl Credentials {
    fn from_parts(parts: &[Vec<u8>]) -> Result<Self> {
        if parts.len() != CREDENTIAL_PARTS {
            return Err(KeychainError::InvalidCredential(format!(
                "keychain key has {} parts (expected {CREDENTIAL_PARTS})",
                parts.len()
            )));
        }

        let uuid_bytes: [u8; coder::UUID_LEN] = parts[0].as_slice().try_into().map_err(|_| {
            KeychainError::InvalidCredential(format!(
                "UUID part is {} bytes (expected {})",
                parts[0].len(),
                coder::UUID_LEN
            ))
        })?;

        let general_key = SensitiveBytes32::from_slice(&parts[1]).ok_or_else(|| {
            KeychainError::InvalidCredential(format!(
                "general key part is {} bytes (expected {})",
                parts[1].len(),
                general::KEY_LEN
            ))
        })?;

        let pair_public: [u8; pair::PAIR_KEY_LEN] =
            parts[2].as_slice().try_into().map_err(|_| {
                KeychainError::InvalidCredential(format!(
                    "pair public key part is {} bytes (expected {})",
                    parts[2].len(),
                    pair::PAIR_KEY_LEN
                ))
            })?;

        Ok(Self {
            uuid_bytes,
            general_key,
            pair_public,
        })
    }

    /// Serialize as the three-part payload handed to write-only instances.
    fn stringify(&self) -> String {
        coder::stringify_payload(&[
            &self.uuid_bytes,
            self.general_key.as_bytes(),
            &self.pair_public,
        ])
    }
}

/// A freshly issued `(password, token)` pair for a later unlock.
pub struct PasswordAndToken {
    pub password: String,
    pub token: String,
}

pub struct Keychain {
    uuid: Uuid,
    credentials: Credentials,
    /// Present iff unlocked. The one-shot cell makes the unlock transition
    /// monotonic through `&self`; there is no relock.
    pair_secret: OnceCell<SensitiveBytes32>,
    /// True iff the aggregate was constructed with the secret at birth.
    /// Unlocking later does not grant key retrieval.
    can_retrieve_keys: bool,
}

impl Keychain {
    /// Create a brand-new keychain: fresh UUID, general key, and pair
    /// keypair. The result is unlocked and may export its keys.
    pub fn generate() -> Result<Self> {
        let uuid = Uuid::new_v4();
        let general_key = general::generate_key();
        let keypair = pair::generate_keys();

        let credentials = Credentials {
            uuid_bytes: *uuid.as_bytes(),
            general_key,
            pair_public: keypair.public,
        };

        let keychain = Self::adopt(credentials, Some(keypair.secret))?;
        info!(uuid = %keychain.uuid, "Generated new keychain");
        Ok(keychain)
    }

    /// Adopt a keychain from its serialized three-part key. The result is
    /// locked, write-only, and may never export its keys.
    pub fn from_keychain_key(keychain_key: &str) -> Result<Self> {
        let parts = coder::parse_payload(keychain_key, Some(CREDENTIAL_PARTS))
            .map_err(|e| KeychainError::InvalidCredential(format!("malformed keychain key: {e}")))?;
        let credentials = Credentials::from_parts(&parts)?;

        let keychain = Self::adopt(credentials, None)?;
        info!(uuid = %keychain.uuid, "Adopted keychain from serialized key");
        Ok(keychain)
    }

    /// Internal constructor both factories route through. A supplied
    /// secret is verified against the pair public key before installation.
    fn adopt(credentials: Credentials, pair_secret: Option<SensitiveBytes32>) -> Result<Self> {
        let uuid = Uuid::from_bytes(credentials.uuid_bytes);
        let can_retrieve_keys = pair_secret.is_some();

        let keychain = Self {
            uuid,
            credentials,
            pair_secret: OnceCell::new(),
            can_retrieve_keys,
        };

        if let Some(secret) = pair_secret {
            keychain.verify_and_install(secret)?;
        }

        Ok(keychain)
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn is_unlocked(&self) -> bool {
        self.pair_secret.get().is_some()
    }

    pub fn can_retrieve_keys(&self) -> bool {
        self.can_retrieve_keys
    }

    /// Unlock with a `(password, token)` pair issued by
    /// [`generate_password_and_token`](Self::generate_password_and_token).
    ///
    /// Already-unlocked keychains return silently. A token that fails at
    /// the password layer (the outer layer opened) is an
    /// [`KeychainError::InvalidPassword`]; any other structural failure is
    /// a decrypt error.
    pub fn unlock(&self, password_input: &str, token: &str) -> Result<()> {
        if self.is_unlocked() {
            return Ok(());
        }

        // Outer layer: the token is sealed under the general key.
        let sealed = general::decrypt(token, &self.credentials.general_key)?;
        let sealed = sealed.as_str().ok_or_else(decrypt_error)?;

        // Password layer. Only a failure here indicts the password.
        let encoded_secret = password::decrypt(sealed, password_input).map_err(|e| match e {
            KeychainError::Decrypt(_) => KeychainError::InvalidPassword,
            other => other,
        })?;
        let encoded_secret = encoded_secret.as_str().ok_or_else(decrypt_error)?;

        let secret_bytes =
            SensitiveVec::new(coder::trimmed_b64_decode(encoded_secret).map_err(|_| decrypt_error())?);
        let secret =
            SensitiveBytes32::from_slice(secret_bytes.as_bytes()).ok_or_else(decrypt_error)?;

        self.verify_and_install(secret)?;
        info!(uuid = %self.uuid, "Keychain unlocked with password token");
        Ok(())
    }

    /// Unlock with a master key exported by
    /// [`master_key`](Self::master_key).
    ///
    /// The key is validated even when the keychain is already unlocked; a
    /// wrong secret is never accepted silently.
    pub fn unlock_with_master_key(&self, master_key: &str) -> Result<()> {
        let secret_bytes = SensitiveVec::new(coder::trimmed_b64_decode(master_key).map_err(|_| {
            KeychainError::InvalidCredential("master key is not valid base64".to_string())
        })?);
        let secret = SensitiveBytes32::from_slice(secret_bytes.as_bytes()).ok_or_else(|| {
            KeychainError::InvalidCredential("master key has the wrong length".to_string())
        })?;

        self.verify_and_install(secret)?;
        info!(uuid = %self.uuid, "Keychain unlocked with master key");
        Ok(())
    }

    /// Seal a credential value. No lock required: this is the write path
    /// a read-only instance must support.
    pub fn encrypt_credential(&self, value: &Value) -> Result<String> {
        let inner = pair::encrypt(value, &self.credentials.pair_public)?;
        general::encrypt(&Value::String(inner), &self.credentials.general_key)
    }

    /// Open a credential token. Requires the pair secret.
    pub fn decrypt_credential(&self, token: &str) -> Result<Value> {
        let secret = self.pair_secret()?;
        let inner = general::decrypt(token, &self.credentials.general_key)?;
        let inner = inner.as_str().ok_or_else(decrypt_error)?;
        pair::decrypt(inner, secret)
    }

    /// Issue a fresh `(password, token)` pair that re-seals the pair
    /// secret for a later unlock. Requires the pair secret.
    ///
    /// The token is additionally sealed under the general key, so a stolen
    /// token cannot be attacked offline without the general key as well.
    pub fn generate_password_and_token(&self) -> Result<PasswordAndToken> {
        let secret = self.pair_secret()?;

        let password_out = entropy::generate_password(entropy::PASSWORD_LEN);
        let encoded_secret = Value::String(coder::trimmed_b64_encode(secret.as_bytes()));

        let inner = password::encrypt(&encoded_secret, &password_out)?;
        let token = general::encrypt(&Value::String(inner), &self.credentials.general_key)?;

        Ok(PasswordAndToken {
            password: password_out,
            token,
        })
    }

    /// The serialized three-part keychain key (write-only identity).
    /// Only keychains that held their secret from birth may export it.
    pub fn keychain_key(&self) -> Result<String> {
        if !self.can_retrieve_keys {
            return Err(KeychainError::KeyAccessForbidden);
        }
        Ok(self.credentials.stringify())
    }

    /// The base64-encoded pair secret. Granting it grants full read.
    pub fn master_key(&self) -> Result<String> {
        let secret = self.pair_secret()?;
        if !self.can_retrieve_keys {
            return Err(KeychainError::KeyAccessForbidden);
        }
        Ok(coder::trimmed_b64_encode(secret.as_bytes()))
    }

    fn pair_secret(&self) -> Result<&SensitiveBytes32> {
        self.pair_secret.get().ok_or(KeychainError::Locked)
    }

    /// Check a candidate pair secret against the keychain's public key,
    /// then install it. The check is a full seal/open round-trip: the
    /// asymmetric primitive alone would accept any 32-byte scalar.
    fn verify_and_install(&self, candidate: SensitiveBytes32) -> Result<()> {
        let verifier = Value::String(coder::trimmed_b64_encode(&entropy::random_bytes(32)));

        let sealed = pair::encrypt(&verifier, &self.credentials.pair_public)?;
        let opened = pair::decrypt(&sealed, &candidate).map_err(|_| mismatch_error())?;
        if opened != verifier {
            return Err(mismatch_error());
        }

        // A lost race means a concurrent unlock installed a secret that
        // passed the same check.
        let _ = self.pair_secret.set(candidate);
        Ok(())
    }
}

fn mismatch_error() -> KeychainError {
    KeychainError::InvalidCredential(
        "pair secret does not match the keychain's public key".to_string(),
    )
}

impl std::fmt::Debug for Keychain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keychain")
            .field("uuid", &self.uuid)
            .field("unlocked", &self.is_unlocked())
            .field("can_retrieve_keys", &self.can_retrieve_keys)
            .finish_non_exhaustive()
    }
}
