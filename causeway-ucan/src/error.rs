//! Error types for token decoding, delegation and archives.

use crate::payload::VERSION;
use ipld_core::cid::Cid;
use serde_ipld_dagcbor::error::CodecError;
use thiserror::Error;

/// Error decoding a token payload from its bytes.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// DAG-CBOR decoding failed.
    #[error("token decoding failed: {0}")]
    Codec(#[from] CodecError),

    /// The token declares a version this codec does not speak.
    #[error("unsupported ucan version {found:?}, expected {VERSION:?}")]
    UnsupportedVersion {
        /// The version string carried by the token.
        found: String,
    },
}

/// Error producing a delegation through the builder.
#[derive(Debug, Error)]
pub enum DelegateError {
    /// No audience was provided.
    #[error("delegation requires an audience")]
    MissingAudience,

    /// Payload encoding failed.
    #[error("encoding error: {0}")]
    Encoding(#[from] CodecError),

    /// The issuer failed to sign the payload.
    #[error("signing error: {0}")]
    Signing(#[from] signature::Error),
}

/// Error type for delegation signature verification.
#[derive(Debug, Error)]
pub enum SignatureVerificationError<E: std::error::Error = signature::Error> {
    /// Payload encoding failed.
    #[error("encoding error: {0}")]
    EncodingError(CodecError),

    /// DID resolution failed.
    #[error("resolution error: {0}")]
    ResolutionError(E),

    /// Cryptographic verification failed.
    #[error("verification error: {0}")]
    VerificationError(signature::Error),
}

/// Error attaching a block to a delegation.
#[derive(Debug, Clone, Copy, Error)]
pub enum AttachError {
    /// The delegation's block set was already exported; it is sealed
    /// against further attachments.
    #[error("delegation is sealed; blocks cannot be attached after export")]
    AlreadySealed,
}

/// Error producing an archive from a delegation.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Descriptor or header encoding failed.
    #[error("archive encoding failed: {0}")]
    Encoding(#[from] CodecError),

    /// Writing the container stream failed.
    #[error("archive write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Error decoding a CARv1 container.
#[derive(Debug, Error)]
pub enum CarDecodeError {
    /// The header is not valid DAG-CBOR of the expected shape.
    #[error("car header decoding failed: {0}")]
    Header(CodecError),

    /// The stream ended inside a length-prefixed section.
    #[error("unexpected end of car stream")]
    Truncated,

    /// A section carries an invalid CID.
    #[error("invalid cid in car stream: {0}")]
    Cid(#[from] ipld_core::cid::Error),

    /// A varint length prefix is malformed.
    #[error("invalid varint in car stream")]
    Varint,

    /// The container is not CARv1.
    #[error("unsupported car version {0}")]
    Version(u64),

    /// The container must carry exactly one root.
    #[error("expected exactly one car root, found {0}")]
    RootCount(usize),
}

/// Error extracting a delegation from archive bytes.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The container itself failed to decode.
    #[error(transparent)]
    Car(#[from] CarDecodeError),

    /// The descriptor block is missing from the container.
    #[error("archive descriptor block {0} is missing")]
    MissingDescriptor(Cid),

    /// The descriptor is not a single-entry `{"ucan@<version>": link}` map.
    #[error("malformed archive descriptor")]
    MalformedDescriptor,

    /// The descriptor names a variant outside the supported set.
    #[error("unknown archive variant {0:?}")]
    UnknownVariant(String),

    /// The root block the descriptor links to is missing.
    #[error("archive root block {0} is missing")]
    MissingRoot(Cid),

    /// The root block does not decode as a token of a supported version.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}
