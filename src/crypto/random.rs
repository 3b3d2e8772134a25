use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;
use rand::distr::Alphanumeric;
use sha2::{Digest, Sha512};

/// Random handle used for invitations and password-reset tokens.
///
/// SHA-512 over 32 random bytes, hex encoded (128 characters).
#[must_use]
pub fn random_hash() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    hex::encode(Sha512::digest(bytes))
}

/// Session identifier: 64 random bytes, URL-safe base64.
#[must_use]
pub fn session_id() -> String {
    let mut bytes = [0u8; 64];
    rand::rng().fill(&mut bytes[..]);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Lowercase alphanumeric suffix for collision-free file names.
#[must_use]
pub fn random_suffix(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

/// Alphanumeric password for generated accounts.
#[must_use]
pub fn random_password(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_hash_is_128_hex_chars() {
        let hash = random_hash();
        assert_eq!(hash.len(), 128);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(hash, random_hash());
    }

    #[test]
    fn session_id_encodes_64_bytes() {
        let sid = session_id();
        let decoded = URL_SAFE_NO_PAD.decode(&sid).unwrap();
        assert_eq!(decoded.len(), 64);
        assert!(!sid.contains('+') && !sid.contains('/'));
    }

    #[test]
    fn suffix_is_lowercase() {
        let suffix = random_suffix(8);
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }
}
