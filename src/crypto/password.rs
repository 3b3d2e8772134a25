use anyhow::{Context, Result};
use rand::Rng;
use std::sync::OnceLock;
use zeroize::Zeroizing;

/// Length of the per-user salt in bytes.
pub const SALT_LENGTH: usize = 32;

const SALT_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

static DUMMY_HASH: OnceLock<String> = OnceLock::new();

/// Generate a salt of [`SALT_LENGTH`] characters drawn from letters, digits and punctuation.
#[must_use]
pub fn generate_salt() -> String {
    let mut rng = rand::rng();
    (0..SALT_LENGTH)
        .map(|_| char::from(SALT_ALPHABET[rng.random_range(0..SALT_ALPHABET.len())]))
        .collect()
}

fn salted(plain: &str, salt: &str) -> Zeroizing<Vec<u8>> {
    let mut buf = Zeroizing::new(Vec::with_capacity(plain.len() + salt.len()));
    buf.extend_from_slice(plain.as_bytes());
    buf.extend_from_slice(salt.as_bytes());
    buf
}

/// Hash `plain ∥ salt` with bcrypt at the given cost.
///
/// The concatenated buffer is zeroed when this returns. CPU bound: call it
/// from `spawn_blocking` inside async code.
pub fn hash_password(plain: &str, salt: &str, cost: u32) -> Result<String> {
    let input = salted(plain, salt);
    bcrypt::hash(input.as_slice(), cost).context("Failed to hash password")
}

/// Returns true iff `stored_hash` is the bcrypt hash of `plain ∥ salt`.
pub fn verify_password(plain: &str, salt: &str, stored_hash: &str) -> Result<bool> {
    let input = salted(plain, salt);
    bcrypt::verify(input.as_slice(), stored_hash).context("Failed to verify password")
}

fn dummy_hash(cost: u32) -> Result<String> {
    bcrypt::hash("quillpress-timing-equalizer", cost).context("Failed to prepare dummy hash")
}

/// Computes the fixed hash used by [`verify_dummy`] ahead of the first login.
///
/// CPU bound like [`hash_password`]. Later calls are no-ops.
pub fn prepare_dummy_hash(cost: u32) -> Result<()> {
    if DUMMY_HASH.get().is_none() {
        let _ = DUMMY_HASH.set(dummy_hash(cost)?);
    }
    Ok(())
}

/// Run a bcrypt comparison against a fixed hash and discard the result.
///
/// Used when the account does not exist so that a failed lookup costs the
/// same time as a failed password.
pub fn verify_dummy(plain: &str, cost: u32) {
    let hash = DUMMY_HASH.get_or_init(|| dummy_hash(cost).unwrap_or_default());
    if hash.is_empty() {
        return;
    }
    let _ = bcrypt::verify(plain, hash);
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_COST: u32 = 4;

    #[test]
    fn salt_has_expected_length_and_alphabet() {
        let salt = generate_salt();
        assert_eq!(salt.len(), SALT_LENGTH);
        assert!(salt.bytes().all(|b| SALT_ALPHABET.contains(&b)));
    }

    #[test]
    fn salts_differ() {
        assert_ne!(generate_salt(), generate_salt());
    }

    #[test]
    fn hash_verify() {
        let salt = generate_salt();
        let hash = hash_password("correct horse battery", &salt, TEST_COST).unwrap();

        assert!(verify_password("correct horse battery", &salt, &hash).unwrap());
        assert!(!verify_password("wrong horse battery", &salt, &hash).unwrap());
    }

    #[test]
    fn verification_depends_on_salt() {
        let salt = generate_salt();
        let other_salt = generate_salt();
        let hash = hash_password("1234567890123", &salt, TEST_COST).unwrap();

        assert!(!verify_password("1234567890123", &other_salt, &hash).unwrap());
    }

    #[test]
    fn stored_hash_is_bcrypt_of_concatenation() {
        let salt = generate_salt();
        let hash = hash_password("secret-password", &salt, TEST_COST).unwrap();
        let concatenated = format!("secret-password{salt}");

        assert!(bcrypt::verify(concatenated, &hash).unwrap());
    }

    #[test]
    fn dummy_hash_is_ready_before_first_use() {
        prepare_dummy_hash(TEST_COST).unwrap();
        let hash = DUMMY_HASH.get().unwrap();
        assert!(hash.starts_with("$2b$04$"));

        prepare_dummy_hash(TEST_COST).unwrap();
        assert_eq!(DUMMY_HASH.get().unwrap(), hash);
    }

    #[test]
    fn dummy_verify_does_not_panic() {
        verify_dummy("anything", TEST_COST);
        verify_dummy("anything else", TEST_COST);
    }
}
