//! EdDSA signature support.

use crate::Signature;

/// An Ed25519 signature (64 bytes).
///
/// Re-uses the `ed25519` signature type, which already carries the
/// byte-encoding contract [`Signature`] requires.
pub type Ed25519Signature = ed25519_dalek::Signature;

impl Signature for Ed25519Signature {}
