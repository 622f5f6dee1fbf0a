//! Ed25519 credential errors.

/// Error when parsing an Ed25519 `did:key` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Ed25519DidFromStrError {
    /// The string is not of the form `did:key:...`.
    #[error("expected a did:key identifier")]
    InvalidDidHeader,

    /// The identifier is missing the `z` base58btc multibase prefix.
    #[error("expected base58btc multibase prefix 'z'")]
    MissingBase58Prefix,

    /// The decoded bytes are not an ed25519 public key.
    #[error("invalid ed25519 public key")]
    InvalidKey,
}

/// Error when resolving a DID to an Ed25519 verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error(transparent)]
pub struct Ed25519ResolveError(#[from] pub Ed25519DidFromStrError);
