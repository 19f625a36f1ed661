//! Salted password digests and session-token derivation.
//!
//! All functions here are pure. A salt is the hex digest of a seed (by convention
//! the wall-clock time of the call). A salted hash is the hex digest of the salt
//! followed by the hex digest of the password. Session tokens and admin keys are
//! minted with the same derivation from a fresh seed, so a token has exactly the
//! shape of a credential hash.

use std::fmt;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

macro_rules! hex_string_type {
    ($(#[$m:meta])* $name:ident) => {
        $(#[$m])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str { &self.0 }
            pub fn into_string(self) -> String { self.0 }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self { Self(s) }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self { Self(s.to_string()) }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool { self.0 == other }
        }
    };
}

hex_string_type!(
    /// Per-account salt: hex digest of the seed it was derived from.
    Salt
);
hex_string_type!(
    /// Stored password digest.
    SaltedHash
);
hex_string_type!(
    /// Session token or admin API key.
    Key
);

fn digest_hex(input: &[u8]) -> String {
    hex::encode(Sha256::digest(input))
}

/// Seed for salts and tokens: the current UTC time with nanosecond precision.
pub fn time_seed() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn derive_salt(seed: &str) -> Salt {
    Salt(digest_hex(seed.as_bytes()))
}

/// Digest of `salt ‖ hex(digest(password))`.
pub fn derive(password: &str, salt: &Salt) -> SaltedHash {
    let mut h = Sha256::new();
    h.update(salt.as_str().as_bytes());
    h.update(digest_hex(password.as_bytes()).as_bytes());
    SaltedHash(hex::encode(h.finalize()))
}

/// Registration primitive: fresh salt from `seed`, then [`derive`].
pub fn hashed_and_salt(password: &str, seed: &str) -> (SaltedHash, Salt) {
    let salt = derive_salt(seed);
    let hash = derive(password, &salt);
    (hash, salt)
}

pub fn verify(password: &str, salt: &Salt, hash: &SaltedHash) -> bool {
    derive(password, salt) == *hash
}

/// Mint a token from `password` and a fresh `seed`. Same derivation as a credential hash.
pub fn issue_token(password: &str, seed: &str) -> Key {
    Key(derive(password, &derive_salt(seed)).0)
}
