use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// A 32-byte optimistic-lock digest.
///
/// Stored in documents as standard base64 (44 characters).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OlockHash([u8; 32]);

impl OlockHash {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    /// Parse the base64 form written into documents.
    pub fn from_base64(s: &str) -> Result<Self, HashDecodeError> {
        let bytes = STANDARD
            .decode(s)
            .map_err(|e| HashDecodeError::InvalidBase64(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| HashDecodeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            })?;
        Ok(Self(arr))
    }

    /// First 8 hex characters, for logs.
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Debug for OlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OlockHash({})", self.short_hex())
    }
}

impl fmt::Display for OlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

/// Errors from decoding a stored hash.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HashDecodeError {
    #[error("invalid base64: {0}")]
    InvalidBase64(String),

    #[error("invalid digest length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Domain-separated BLAKE3 hasher.
///
/// The domain tag is fed before any content so digests from different
/// purposes never collide, and so a future change of the canonical encoding
/// can bump the tag instead of silently changing meaning.
pub struct DigestHasher {
    domain: &'static str,
}

impl DigestHasher {
    /// Hasher for optimistic-lock digests.
    pub const OLOCK: Self = Self {
        domain: "cfgdoc-olock-v1",
    };

    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// An incremental hasher already primed with the domain tag.
    pub fn start(&self) -> blake3::Hasher {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> OlockHash {
        let mut hasher = self.start();
        hasher.update(data);
        finish(hasher)
    }

    pub fn domain(&self) -> &str {
        self.domain
    }
}

pub(crate) fn finish(hasher: blake3::Hasher) -> OlockHash {
    OlockHash(*hasher.finalize().as_bytes())
}
