//! API key generation and hashing

use rand::Rng;
use sha2::{Digest, Sha256};

/// API key prefix
const KEY_PREFIX: &str = "dsk";

/// Length of the random part
const RANDOM_LEN: usize = 32;

/// Generate a new API key.
/// Format: dsk_<random_32chars>
pub fn generate_api_key() -> String {
    let random_part: String = rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(RANDOM_LEN)
        .map(char::from)
        .collect();

    format!("{}_{}", KEY_PREFIX, random_part)
}

/// Display prefix kept alongside the hash: "dsk_" plus 8 characters
pub fn key_prefix(api_key: &str) -> String {
    api_key.chars().take(KEY_PREFIX.len() + 1 + 8).collect()
}

/// Only the hash of a key is stored
pub fn hash_api_key(api_key: &str) -> String {
    hex::encode(Sha256::digest(api_key.as_bytes()))
}

/// Validate API key format
pub fn validate_key_format(api_key: &str) -> bool {
    match api_key.split_once('_') {
        Some((prefix, random)) => {
            prefix == KEY_PREFIX
                && random.len() == RANDOM_LEN
                && random.chars().all(|c| c.is_ascii_alphanumeric())
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_api_key() {
        let key = generate_api_key();
        assert!(key.starts_with("dsk_"));
        assert!(validate_key_format(&key));
        assert_ne!(key, generate_api_key());
    }

    #[test]
    fn test_key_prefix() {
        assert_eq!(
            key_prefix("dsk_a1b2c3d4e5f6g7h8i9j0k1l2m3n4o5p6"),
            "dsk_a1b2c3d4"
        );
    }

    #[test]
    fn test_validate_key_format() {
        assert!(validate_key_format("dsk_a1b2c3d4e5f6g7h8i9j0k1l2m3n4o5p6"));
        assert!(!validate_key_format("invalid"));
        assert!(!validate_key_format("dsk_short"));
        assert!(!validate_key_format("abc_a1b2c3d4e5f6g7h8i9j0k1l2m3n4o5p6"));
    }

    #[test]
    fn test_hash_is_stable() {
        assert_eq!(hash_api_key("dsk_x"), hash_api_key("dsk_x"));
        assert_ne!(hash_api_key("dsk_x"), hash_api_key("dsk_y"));
    }
}
