//! Signature trait and signing/verification re-exports.

pub mod signer;
pub mod verifier;

use ::signature::SignatureEncoding;
use causeway_common::{ConditionalSend, ConditionalSync};
use std::fmt::Debug;

pub use signer::Signer;
pub use verifier::Verifier;

/// Cryptographic signature produced by a [`Signer`] and checked by a
/// [`Verifier`].
///
/// UCAN tokens carry the raw signature bytes in their payload, so the
/// only requirements are a byte encoding ([`SignatureEncoding`] gives
/// `to_bytes` plus `TryFrom<&[u8]>`) and cross-target thread bounds.
pub trait Signature: SignatureEncoding + Debug + ConditionalSend + ConditionalSync {}
