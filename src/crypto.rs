//! Token generation and hashing for invitation links.

use rand::rngs::OsRng;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

/// Default number of random characters in an invitation token.
///
/// 48 alphanumeric characters carry ~5.95 bits of entropy each, roughly
/// 285 bits total - above the 256-bit floor for unguessable tokens.
pub const DEFAULT_TOKEN_RANDOM_LEN: usize = 48;

/// A wrapper for sensitive string data that prevents accidental logging.
///
/// `SecretString` implements `Debug` and `Display` to show `[REDACTED]`
/// instead of the actual content. Plain invitation tokens travel through the
/// crate wrapped in this type.
///
/// # Example
///
/// ```rust
/// use parapet::crypto::SecretString;
///
/// let token = SecretString::new("abc123");
/// assert_eq!(format!("{:?}", token), "SecretString([REDACTED])");
/// assert_eq!(token.expose_secret(), "abc123");
/// ```
#[derive(Clone)]
pub struct SecretString(String);

impl SecretString {
    /// Creates a new `SecretString` from any type convertible to a `String`.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Exposes the secret value.
    ///
    /// Use only at the point the value is actually needed, such as hashing
    /// or embedding in a join URL.
    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SecretString {}

impl Serialize for SecretString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // Expose the actual value for serialization (returning tokens in API responses)
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(SecretString(s))
    }
}

/// Generates an invitation token: a millisecond timestamp prefix in lowercase
/// hex, a separator, and `random_len` characters from the OS CSPRNG.
///
/// The prefix exists only to aid debugging and log sorting. It carries no
/// security value and must never be used for expiry decisions - expiry lives
/// on the link record.
///
/// The whole token is URL-safe and fits a `/join/{token}` path segment.
pub fn generate_invite_token(random_len: usize) -> String {
    let prefix = format!("{:x}", chrono::Utc::now().timestamp_millis());
    let random: String = (0..random_len)
        .map(|_| char::from(OsRng.sample(rand::distributions::Alphanumeric)))
        .collect();
    format!("{prefix}-{random}")
}

/// Generates a token with the default random length.
pub fn generate_invite_token_default() -> String {
    generate_invite_token(DEFAULT_TOKEN_RANDOM_LEN)
}

/// Hashes a token using SHA-256 for storage.
/// Tokens are high-entropy random strings, so a fast hash is appropriate;
/// only the hash is persisted and lookups go through it.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token_random_length() {
        let token = generate_invite_token(48);
        let (_, random) = token.split_once('-').expect("token has a prefix");
        assert_eq!(random.len(), 48);
    }

    #[test]
    fn test_generate_token_unique() {
        let token1 = generate_invite_token(48);
        let token2 = generate_invite_token(48);
        assert_ne!(token1, token2);
    }

    #[test]
    fn test_generate_token_url_safe() {
        let token = generate_invite_token_default();
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));
    }

    #[test]
    fn test_hash_token_deterministic() {
        assert_eq!(hash_token("abc123"), hash_token("abc123"));
        assert_ne!(hash_token("abc123"), hash_token("abc124"));
    }

    #[test]
    fn test_hash_token_length() {
        // SHA-256 produces 64 hex characters
        assert_eq!(hash_token("anytoken").len(), 64);
    }

    #[test]
    fn test_secret_string_redacted() {
        let secret = SecretString::new("tok");
        assert_eq!(format!("{secret:?}"), "SecretString([REDACTED])");
        assert_eq!(format!("{secret}"), "[REDACTED]");
        assert_eq!(secret.expose_secret(), "tok");
    }
}
