//! Signing service: owner identity derivation and deploy signatures.

use std::fmt;

use ed25519_dalek::{Signer as _, SigningKey};

pub const SIG_ALGORITHM_ED25519: &str = "ed25519";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningError {
    /// Private key material is malformed.
    InvalidKey(String),
    /// A signature or public key inside an envelope does not verify.
    InvalidSignature(String),
}

impl fmt::Display for SigningError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SigningError::InvalidKey(m) => write!(f, "invalid signing key: {m}"),
            SigningError::InvalidSignature(m) => write!(f, "invalid signature: {m}"),
        }
    }
}

impl std::error::Error for SigningError {}

/// Holds the owner's signing material. Used once per deployment attempt.
pub trait Signer: Send + Sync {
    /// Public identity that will own every slot this signer writes
    /// (lowercase hex public key).
    fn owner_identity(&self) -> String;

    /// Sign an arbitrary payload.
    fn sign(&self, payload: &[u8]) -> Vec<u8>;

    fn algorithm(&self) -> &'static str {
        SIG_ALGORITHM_ED25519
    }
}

/// Ed25519 signer over a 32-byte secret seed.
pub struct Ed25519Signer {
    key: SigningKey,
}

impl Ed25519Signer {
    pub fn from_bytes(seed: &[u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(seed),
        }
    }

    /// Parse a hex-encoded 32-byte seed. Surrounding whitespace and an
    /// optional `0x` prefix are tolerated.
    pub fn from_hex(hex_key: &str) -> Result<Self, SigningError> {
        let trimmed = hex_key.trim();
        let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(trimmed).map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        let seed: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            SigningError::InvalidKey(format!("expected 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self::from_bytes(&seed))
    }
}

impl fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519Signer")
            .field("owner", &self.owner_identity())
            .field("key", &"<REDACTED>")
            .finish()
    }
}

impl Signer for Ed25519Signer {
    fn owner_identity(&self) -> String {
        hex::encode(self.key.verifying_key().to_bytes())
    }

    fn sign(&self, payload: &[u8]) -> Vec<u8> {
        self.key.sign(payload).to_bytes().to_vec()
    }
}
