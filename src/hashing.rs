//! Salted password hashing.
//!
//! Hashes are SHA-256 over `salt || value`, hex encoded.  With more than one
//! round the previous hex digest becomes the next value.

use sha2::{Digest, Sha256};

pub const DEFAULT_SALT: &str = "abcd";
pub const DEFAULT_ROUNDS: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHasher {
    salt: String,
    rounds: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_SALT, DEFAULT_ROUNDS)
    }
}

impl PasswordHasher {
    /// A round count of zero is treated as one.
    pub fn new(salt: impl Into<String>, rounds: u32) -> Self {
        Self {
            salt: salt.into(),
            rounds: rounds.max(1),
        }
    }

    pub fn hash(&self, plaintext: &str) -> String {
        let mut value = plaintext.to_string();
        for _ in 0..self.rounds {
            let mut hasher = Sha256::new();
            hasher.update(self.salt.as_bytes());
            hasher.update(value.as_bytes());
            value = hex::encode(hasher.finalize());
        }
        value
    }

    pub fn verify(&self, plaintext: &str, hash: &str) -> bool {
        self.hash(plaintext) == hash
    }
}
