//! Ed25519 `did:key` signer, verifier and resolver.
//!
//! A concrete implementation of the [`Signer`][crate::Signer] /
//! [`Verifier`][crate::Verifier] / [`Resolver`][crate::Resolver]
//! contracts backed by `ed25519-dalek`. Used by the workspace test
//! suites and available to hosts that don't bring their own key store.

mod error;
mod resolver;
mod signer;
mod verifier;

pub use error::{Ed25519DidFromStrError, Ed25519ResolveError};
pub use resolver::Ed25519KeyResolver;
pub use signer::Ed25519Signer;
pub use verifier::Ed25519Verifier;
