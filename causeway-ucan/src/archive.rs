//! The delegation archive container.
//!
//! A delegation travels over byte channels as a CARv1 container whose
//! single root is a small *descriptor* block: a one-entry DAG-CBOR map
//! `{ "ucan@<version>": rootLink }`. The indirection keeps the container
//! shape stable across future token versions. The remaining blocks are
//! everything reachable from the delegation's root.

use crate::{
    Block, BlockStore, Delegation,
    codec,
    error::{ArchiveError, CarDecodeError, ExtractError},
    payload::VERSION,
};
use causeway_varsig::Signature;
use ipld_core::{cid::Cid, ipld::Ipld};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Archive variants this codec can consume.
const SUPPORTED_VARIANTS: [&str; 1] = ["ucan@0.9.1"];

/// CARv1 header.
#[derive(Debug, Serialize, Deserialize)]
struct CarHeader {
    roots: Vec<Cid>,
    version: u64,
}

fn write_varint(out: &mut Vec<u8>, value: u64) -> Result<(), ArchiveError> {
    leb128::write::unsigned(out, value)?;
    Ok(())
}

fn read_varint(cursor: &mut std::io::Cursor<&[u8]>) -> Result<u64, CarDecodeError> {
    leb128::read::unsigned(cursor).map_err(|error| match error {
        leb128::read::Error::IoError(_) => CarDecodeError::Truncated,
        leb128::read::Error::Overflow => CarDecodeError::Varint,
    })
}

/// Encode a CARv1 stream with the given roots and blocks.
fn write_car(roots: &[Cid], blocks: &[Block]) -> Result<Vec<u8>, ArchiveError> {
    let header = codec::encode(&CarHeader {
        roots: roots.to_vec(),
        version: 1,
    })?;

    let mut out = Vec::new();
    write_varint(&mut out, header.len() as u64)?;
    out.extend_from_slice(&header);

    for block in blocks {
        let cid_bytes = block.cid().to_bytes();
        write_varint(&mut out, (cid_bytes.len() + block.bytes().len()) as u64)?;
        out.extend_from_slice(&cid_bytes);
        out.extend_from_slice(block.bytes());
    }
    Ok(out)
}

/// Decode a CARv1 stream into its roots and a block store.
fn read_car(bytes: &[u8]) -> Result<(Vec<Cid>, BlockStore), CarDecodeError> {
    let mut cursor = std::io::Cursor::new(bytes);

    let header_len = read_varint(&mut cursor)? as usize;
    let header_start = cursor.position() as usize;
    let header_end = header_start
        .checked_add(header_len)
        .filter(|end| *end <= bytes.len())
        .ok_or(CarDecodeError::Truncated)?;
    let header: CarHeader = codec::decode(&bytes[header_start..header_end])
        .map_err(CarDecodeError::Header)?;
    if header.version != 1 {
        return Err(CarDecodeError::Version(header.version));
    }
    cursor.set_position(header_end as u64);

    let store = BlockStore::new();
    while (cursor.position() as usize) < bytes.len() {
        let section_len = read_varint(&mut cursor)? as usize;
        let section_start = cursor.position() as usize;
        let section_end = section_start
            .checked_add(section_len)
            .filter(|end| *end <= bytes.len())
            .ok_or(CarDecodeError::Truncated)?;

        let cid = Cid::read_bytes(&mut cursor)?;
        let data_start = cursor.position() as usize;
        if data_start > section_end {
            return Err(CarDecodeError::Truncated);
        }
        store.insert(Block::new(cid, bytes[data_start..section_end].to_vec()));
        cursor.set_position(section_end as u64);
    }

    Ok((header.roots, store))
}

impl<S: Signature> Delegation<S> {
    /// Pack this delegation and every reachable block into a
    /// content-addressed container for transport.
    ///
    /// Seals the delegation against further
    /// [`attach`][Delegation::attach] calls.
    ///
    /// # Errors
    ///
    /// Returns an [`ArchiveError`] if encoding the descriptor or the
    /// container fails.
    pub fn archive(&self) -> Result<Vec<u8>, ArchiveError> {
        let mut blocks: Vec<Block> = self.iterate_blocks().collect();

        let mut variant = BTreeMap::new();
        variant.insert(format!("ucan@{VERSION}"), Ipld::Link(self.link()));
        let descriptor = Block::dag_cbor(codec::encode(&Ipld::Map(variant))?);
        let root = *descriptor.cid();
        blocks.push(descriptor);

        debug!(root = %self.cid(), blocks = blocks.len(), "archiving delegation");
        write_car(&[root], &blocks)
    }
}

/// Unpack a [`Delegation`] from archive bytes.
///
/// # Errors
///
/// Returns an [`ExtractError`] if the container is malformed, does not
/// carry exactly one root, names an unsupported variant, or the linked
/// root block is missing or undecodable.
pub fn extract<S: Signature>(bytes: &[u8]) -> Result<Delegation<S>, ExtractError> {
    let (roots, store) = read_car(bytes)?;
    let [root] = roots.as_slice() else {
        return Err(CarDecodeError::RootCount(roots.len()).into());
    };

    let descriptor = store
        .get(root)
        .ok_or(ExtractError::MissingDescriptor(*root))?;
    let variant: Ipld =
        codec::decode(descriptor.bytes()).map_err(|_| ExtractError::MalformedDescriptor)?;
    let Ipld::Map(map) = variant else {
        return Err(ExtractError::MalformedDescriptor);
    };
    let mut entries = map.into_iter();
    let (Some((tag, Ipld::Link(link))), None) = (entries.next(), entries.next()) else {
        return Err(ExtractError::MalformedDescriptor);
    };
    if !SUPPORTED_VARIANTS.contains(&tag.as_str()) {
        return Err(ExtractError::UnknownVariant(tag));
    }

    let root_block = store.get(&link).ok_or(ExtractError::MissingRoot(link))?;
    debug!(root = %link, blocks = store.len(), "extracting delegation");
    Ok(Delegation::view(root_block, store)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Capability;
    use causeway_varsig::{Ed25519Signature, Principal, ed25519::Ed25519Signer};
    use testresult::TestResult;

    #[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
    use wasm_bindgen_test::wasm_bindgen_test;

    fn test_signer(seed: u8) -> Ed25519Signer {
        Ed25519Signer::import(&[seed; 32])
    }

    async fn simple_delegation(seed: u8) -> Delegation<Ed25519Signature> {
        let issuer = test_signer(seed);
        let audience = test_signer(seed.wrapping_add(1));
        Delegation::builder()
            .issuer(issuer.clone())
            .audience(&audience)
            .capability(Capability::new("store/add", issuer.did().to_string()))
            .lifetime(3600)
            .delegate()
            .await
            .unwrap()
    }

    #[cfg_attr(not(all(target_arch = "wasm32", target_os = "unknown")), tokio::test)]
    #[cfg_attr(all(target_arch = "wasm32", target_os = "unknown"), wasm_bindgen_test)]
    async fn archive_extract_round_trip() -> TestResult {
        let delegation = simple_delegation(1).await;

        let bytes = delegation.archive()?;
        let extracted: Delegation<Ed25519Signature> = extract(&bytes)?;

        assert_eq!(extracted.cid(), delegation.cid());
        assert_eq!(extracted.capabilities(), delegation.capabilities());
        assert_eq!(extracted.issuer(), delegation.issuer());
        Ok(())
    }

    #[cfg_attr(not(all(target_arch = "wasm32", target_os = "unknown")), tokio::test)]
    #[cfg_attr(all(target_arch = "wasm32", target_os = "unknown"), wasm_bindgen_test)]
    async fn round_trip_preserves_proof_chain() -> TestResult {
        let carol = test_signer(10);
        let alice = test_signer(11);
        let bob = test_signer(12);

        let inner = Delegation::<Ed25519Signature>::builder()
            .issuer(carol.clone())
            .audience(&alice)
            .capability(Capability::new("store/add", carol.did().to_string()))
            .lifetime(3600)
            .delegate()
            .await?;
        let outer = Delegation::builder()
            .issuer(alice.clone())
            .audience(&bob)
            .capability(Capability::new("store/add", carol.did().to_string()))
            .lifetime(3600)
            .proof(inner.clone())
            .delegate()
            .await?;

        let bytes = outer.archive()?;
        let extracted: Delegation<Ed25519Signature> = extract(&bytes)?;

        let proofs = extracted.proofs();
        assert_eq!(proofs.len(), 1);
        let resolved = proofs[0].delegation().expect("proof should travel along");
        assert_eq!(resolved.cid(), inner.cid());
        Ok(())
    }

    #[cfg_attr(not(all(target_arch = "wasm32", target_os = "unknown")), tokio::test)]
    #[cfg_attr(all(target_arch = "wasm32", target_os = "unknown"), wasm_bindgen_test)]
    async fn extract_rejects_multiple_roots() -> TestResult {
        let delegation = simple_delegation(20).await;
        let root = delegation.root().clone();

        let bytes = write_car(&[*root.cid(), *root.cid()], &[root])?;
        let result = extract::<Ed25519Signature>(&bytes);
        assert!(matches!(
            result,
            Err(ExtractError::Car(CarDecodeError::RootCount(2)))
        ));
        Ok(())
    }

    #[cfg_attr(not(all(target_arch = "wasm32", target_os = "unknown")), tokio::test)]
    #[cfg_attr(all(target_arch = "wasm32", target_os = "unknown"), wasm_bindgen_test)]
    async fn extract_rejects_unknown_variant() -> TestResult {
        let delegation = simple_delegation(30).await;

        let mut variant = BTreeMap::new();
        variant.insert("ucan@9.9.9".to_string(), Ipld::Link(delegation.link()));
        let descriptor = Block::dag_cbor(codec::encode(&Ipld::Map(variant))?);
        let bytes = write_car(
            &[*descriptor.cid()],
            &[delegation.root().clone(), descriptor],
        )?;

        let result = extract::<Ed25519Signature>(&bytes);
        assert!(matches!(result, Err(ExtractError::UnknownVariant(tag)) if tag == "ucan@9.9.9"));
        Ok(())
    }

    #[cfg_attr(not(all(target_arch = "wasm32", target_os = "unknown")), tokio::test)]
    #[cfg_attr(all(target_arch = "wasm32", target_os = "unknown"), wasm_bindgen_test)]
    async fn extract_rejects_missing_root_block() -> TestResult {
        let delegation = simple_delegation(40).await;

        let mut variant = BTreeMap::new();
        variant.insert(format!("ucan@{VERSION}"), Ipld::Link(delegation.link()));
        let descriptor = Block::dag_cbor(codec::encode(&Ipld::Map(variant))?);
        // Descriptor only; the linked root block is absent
        let bytes = write_car(&[*descriptor.cid()], &[descriptor])?;

        let result = extract::<Ed25519Signature>(&bytes);
        assert!(matches!(result, Err(ExtractError::MissingRoot(_))));
        Ok(())
    }

    #[cfg_attr(not(all(target_arch = "wasm32", target_os = "unknown")), tokio::test)]
    #[cfg_attr(all(target_arch = "wasm32", target_os = "unknown"), wasm_bindgen_test)]
    async fn extract_rejects_truncated_stream() -> TestResult {
        let delegation = simple_delegation(50).await;
        let mut bytes = delegation.archive()?;
        bytes.truncate(bytes.len() - 10);

        let result = extract::<Ed25519Signature>(&bytes);
        assert!(result.is_err());
        Ok(())
    }

    #[cfg_attr(not(all(target_arch = "wasm32", target_os = "unknown")), tokio::test)]
    #[cfg_attr(all(target_arch = "wasm32", target_os = "unknown"), wasm_bindgen_test)]
    async fn attached_blocks_travel_in_the_archive() -> TestResult {
        let delegation = simple_delegation(60).await;
        let attachment = Block::dag_cbor(vec![1, 2, 3]);
        delegation.attach(attachment.clone())?;

        let bytes = delegation.archive()?;
        let extracted: Delegation<Ed25519Signature> = extract(&bytes)?;
        assert!(extracted.blocks().contains(attachment.cid()));
        Ok(())
    }
}
