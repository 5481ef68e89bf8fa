/// Process-wide keychain wiring.
///
/// The core never reads configuration itself: a [`KeychainKeyProvider`]
/// hands the context a serialized keychain key, and the context adopts it
/// once and shares the instance.
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::info;

use crate::error::{KeychainError, Result};
use crate::keychain::Keychain;

/// Where the serialized keychain key comes from.
pub trait KeychainKeyProvider: Send + Sync {
    fn keychain_key(&self) -> Result<String>;
}

/// Reads the keychain key from an environment variable.
pub struct EnvKeyProvider {
    var: String,
}

impl EnvKeyProvider {
    pub const DEFAULT_VAR: &'static str = "KEYCHAIN_KEY";

    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvKeyProvider {
    fn default() -> Self {
        Self::new(Self::DEFAULT_VAR)
    }
}

impl KeychainKeyProvider for EnvKeyProvider {
    fn keychain_key(&self) -> Result<String> {
        std::env::var(&self.var).map_err(|_| {
            KeychainError::InvalidCredential(format!(
                "environment variable {} is not set",
                self.var
            ))
        })
    }
}

/// Supplies a fixed keychain key (embedding and tests).
pub struct StaticKeyProvider {
    key: String,
}

impl StaticKeyProvider {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl KeychainKeyProvider for StaticKeyProvider {
    fn keychain_key(&self) -> Result<String> {
        Ok(self.key.clone())
    }
}

/// Adopts the configured keychain lazily, once, and shares it.
pub struct KeychainContext {
    provider: Box<dyn KeychainKeyProvider>,
    slot: OnceCell<Arc<Keychain>>,
}

impl KeychainContext {
    pub fn new(provider: Box<dyn KeychainKeyProvider>) -> Self {
        Self {
            provider,
            slot: OnceCell::new(),
        }
    }

    /// The shared keychain for this context, adopted from the provider on
    /// first call. Initialization is single-flight; a failure leaves the
    /// slot empty so a later call can retry.
    pub fn current(&self) -> Result<Arc<Keychain>> {
        self.slot
            .get_or_try_init(|| {
                let key = self.provider.keychain_key()?;
                let keychain = Keychain::from_keychain_key(&key)?;
                info!(uuid = %keychain.uuid(), "Installed process-wide keychain");
                Ok(Arc::new(keychain))
            })
            .cloned()
    }
}
