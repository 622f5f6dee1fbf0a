#![warn(missing_docs)]

//! UCAN token codec, delegation views and archives.
//!
//! A [UCAN](https://github.com/ucan-wg/spec) is a signed capability token
//! naming an issuer, an audience, a set of capabilities and a list of
//! proof links. This crate covers the content-addressed plumbing of the
//! causeway capability core:
//!
//! 1. [`Block`] / [`BlockStore`]: raw bytes under a CID, and the shared
//!    arena a delegation's proof graph lives in
//! 2. [`Payload`]: the UCAN `0.9.1` token codec over DAG-CBOR
//! 3. [`Delegation`]: a lazy, cached view over a root block plus the
//!    blocks reachable from it, materializing proof delegations on demand
//! 4. [`archive`]: a CARv1 container packaging a delegation and every
//!    reachable block for transport over an arbitrary byte channel
//!
//! Capability matching and proof-chain validation live in
//! `causeway-capability`, which consumes the views defined here.

pub mod block;
pub use block::{Block, BlockStore};

pub mod cid;
pub use cid::to_dagcbor_cid;

pub(crate) mod codec;

pub mod capability;
pub use capability::Capability;

pub mod time;
pub use time::Timestamp;

pub mod payload;
pub use payload::{Payload, UnsignedPayload, VERSION};

pub mod delegation;
pub use delegation::{Ancestors, Delegation, Proof, builder::DelegationBuilder};

pub mod archive;
pub use archive::extract;

pub mod error;
pub use error::{
    ArchiveError, AttachError, CarDecodeError, DecodeError, DelegateError, ExtractError,
    SignatureVerificationError,
};
