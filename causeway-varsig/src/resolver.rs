//! DID-to-verifier resolution.

use std::future::Future;

use crate::{Did, Signature, Verifier};

/// Resolves a [`Did`] to a [`Verifier`] for signature type `S`.
///
/// Given a DID string, looks up or derives the public key material
/// needed to verify signatures. Async to support network-based
/// DID methods (e.g. did:web, did:plc).
pub trait Resolver<S: Signature> {
    /// Error type for resolution failures.
    type Error: std::error::Error;

    /// Resolve a DID to a verifier for signature type `S`.
    fn resolve(&self, did: &Did) -> impl Future<Output = Result<impl Verifier<S>, Self::Error>>;
}
