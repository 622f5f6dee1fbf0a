//! Ed25519 signer implementation.

use super::verifier::Ed25519Verifier;
use crate::{Did, Ed25519Signature, Principal, Signer};

/// An `Ed25519` `did:key` signer backed by an `ed25519_dalek` signing key.
#[derive(Debug, Clone)]
pub struct Ed25519Signer {
    did: Ed25519Verifier,
    signer: ed25519_dalek::SigningKey,
}

impl From<ed25519_dalek::SigningKey> for Ed25519Signer {
    fn from(signer: ed25519_dalek::SigningKey) -> Self {
        let did = Ed25519Verifier::from(&signer);
        Self { did, signer }
    }
}

impl Ed25519Signer {
    /// Generate a new Ed25519 keypair from the system RNG.
    #[must_use]
    pub fn generate() -> Self {
        ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng).into()
    }

    /// Import a keypair from a 32-byte seed.
    #[must_use]
    pub fn import(seed: &[u8; 32]) -> Self {
        ed25519_dalek::SigningKey::from_bytes(seed).into()
    }

    /// Export the 32-byte seed.
    #[must_use]
    pub fn export(&self) -> [u8; 32] {
        self.signer.to_bytes()
    }

    /// Get the associated Ed25519 DID (verifier).
    #[must_use]
    pub const fn ed25519_did(&self) -> &Ed25519Verifier {
        &self.did
    }
}

impl std::fmt::Display for Ed25519Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.did)
    }
}

impl Signer<Ed25519Signature> for Ed25519Signer {
    async fn sign(&self, payload: &[u8]) -> Result<Ed25519Signature, signature::Error> {
        use ed25519_dalek::Signer as _;
        self.signer.try_sign(payload)
    }
}

impl Principal for Ed25519Signer {
    fn did(&self) -> Did {
        self.did.did()
    }
}
