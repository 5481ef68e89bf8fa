/// OS randomness for nonces, salts, keypair seeds, and issued passwords.
use rand::rngs::OsRng;
use rand::{Rng, RngCore};

/// Character set for generated keychain passwords.
const PASSWORD_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Length of passwords issued alongside new keychain tokens.
pub const PASSWORD_LEN: usize = 32;

/// Fill a fixed-width array with OS randomness.
pub fn random_array<const N: usize>() -> [u8; N] {
    let mut out = [0u8; N];
    OsRng.fill_bytes(&mut out);
    out
}

/// Draw `len` random bytes from the OS.
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    OsRng.fill_bytes(&mut out);
    out
}

/// Generate a random alphanumeric password of the given length.
///
/// Drawn from `OsRng`: generated passwords guard keychain secrets.
pub fn generate_password(length: usize) -> String {
    let mut rng = OsRng;
    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..PASSWORD_CHARS.len());
            PASSWORD_CHARS[idx] as char
        })
        .collect()
}
