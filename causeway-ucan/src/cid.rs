//! Content identifier helpers.

use ipld_core::cid::{Cid, multihash::Multihash};
use sha2::{Digest, Sha256};

/// Multicodec code for DAG-CBOR.
pub const DAG_CBOR_CODE: u64 = 0x71;

/// Multihash code for SHA-256.
const SHA2_256_CODE: u64 = 0x12;

/// Compute the CIDv1 of a DAG-CBOR encoded byte sequence.
#[must_use]
#[allow(clippy::expect_used)]
pub fn to_dagcbor_cid(bytes: &[u8]) -> Cid {
    let digest = Sha256::digest(bytes);
    // A 32-byte digest always fits the 64-byte multihash buffer
    let multihash =
        Multihash::wrap(SHA2_256_CODE, digest.as_slice()).expect("SHA-256 digest is 32 bytes");
    Cid::new_v1(DAG_CBOR_CODE, multihash)
}
