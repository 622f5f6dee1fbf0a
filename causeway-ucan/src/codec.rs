//! DAG-CBOR encode/decode helpers.

use ipld_core::codec::Codec;
use serde::{Serialize, de::DeserializeOwned};
use serde_ipld_dagcbor::{codec::DagCborCodec, error::CodecError};

/// Encode `value` as DAG-CBOR bytes.
pub(crate) fn encode<T: Serialize + DeserializeOwned>(value: &T) -> Result<Vec<u8>, CodecError> {
    let mut buffer = Vec::new();
    <DagCborCodec as Codec<T>>::encode(&mut buffer, value)?;
    Ok(buffer)
}

/// Decode `bytes` as DAG-CBOR.
pub(crate) fn decode<T: DeserializeOwned + Serialize>(mut bytes: &[u8]) -> Result<T, CodecError> {
    <DagCborCodec as Codec<T>>::decode(&mut bytes)
}
