use thiserror::Error;

#[derive(Error, Debug)]
pub enum KeychainError {
    #[error("Encoding failed: {0}")]
    Encoding(String),

    /// Decryption failures are indistinguishable on purpose: tag mismatch,
    /// wrong key, and malformed token shape all carry the same message.
    #[error("Decryption failed: {0}")]
    Decrypt(String),

    #[error("Invalid password")]
    InvalidPassword,

    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("Keychain is locked")]
    Locked,

    #[error("Key retrieval is not permitted for this keychain")]
    KeyAccessForbidden,

    #[error("Internal invariant violated: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, KeychainError>;
