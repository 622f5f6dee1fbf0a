#![warn(missing_docs)]

//! Principal and signature interfaces for the causeway capability core.
//!
//! The capability engine never touches key material directly. It consumes
//! the contracts defined here:
//!
//! - [`Principal`]: anything identified by a [`Did`]
//! - [`Signer`]: produces a [`Signature`] over payload bytes
//! - [`Verifier`]: checks a signature against payload bytes
//! - [`Resolver`]: resolves an issuer DID to a [`Verifier`]
//!
//! The [`ed25519`] module provides a concrete `did:key` implementation of
//! all four, used by the test suites and by hosts that don't bring their
//! own key store.

pub mod did;
pub use did::Did;

mod principal;
pub use principal::Principal;

pub mod signature;
pub use signature::{Signature, signer::Signer, verifier::Verifier};

pub mod resolver;
pub use resolver::Resolver;

pub mod eddsa;
pub use eddsa::Ed25519Signature;

pub mod ed25519;
