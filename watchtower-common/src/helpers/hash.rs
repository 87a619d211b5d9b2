use data_encoding::HEXLOWER;
use sha2::{Digest, Sha256};

use crate::Secret;

/// Length of a hex-encoded token digest.
pub const TOKEN_DIGEST_LEN: usize = 64;

pub fn generate_token_secret() -> Secret<String> {
    Secret::random()
}

/// One-way digest stored in place of a bearer secret.
pub fn token_digest(secret: &str) -> String {
    HEXLOWER.encode(&Sha256::digest(secret.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_fixed_length_hex() {
        for input in ["", "a", "a much longer bearer secret than usual"] {
            let digest = token_digest(input);
            assert_eq!(digest.len(), TOKEN_DIGEST_LEN);
            assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn digest_matches_known_sha256() {
        assert_eq!(
            token_digest("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn digest_does_not_contain_secret() {
        let secret = generate_token_secret();
        let digest = token_digest(secret.expose_secret());
        assert_ne!(&digest, secret.expose_secret());
        assert!(!digest.contains(secret.expose_secret().as_str()));
        assert_eq!(digest, token_digest(secret.expose_secret()));
    }
}
