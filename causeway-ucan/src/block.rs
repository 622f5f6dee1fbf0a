//! Content-addressed blocks and the shared block store.

use crate::cid::to_dagcbor_cid;
use ipld_core::cid::Cid;
use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

/// A content-addressed block: raw bytes under a [`Cid`].
///
/// Equality is over the CID; the bytes of two equal blocks are identical
/// by construction (content addressing).
#[derive(Debug, Clone, Eq)]
pub struct Block {
    cid: Cid,
    bytes: Vec<u8>,
}

impl Block {
    /// Wrap pre-addressed bytes. The caller asserts that `cid` addresses
    /// `bytes` under its declared codec and hash.
    #[must_use]
    pub const fn new(cid: Cid, bytes: Vec<u8>) -> Self {
        Self { cid, bytes }
    }

    /// Address `bytes` as a DAG-CBOR block.
    #[must_use]
    pub fn dag_cbor(bytes: Vec<u8>) -> Self {
        let cid = to_dagcbor_cid(&bytes);
        Self { cid, bytes }
    }

    /// The block's content identifier.
    #[must_use]
    pub const fn cid(&self) -> &Cid {
        &self.cid
    }

    /// The block's raw bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.cid == other.cid
    }
}

impl std::hash::Hash for Block {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::hash::Hash::hash(&self.cid, state);
    }
}

/// A shared mapping from CID to [`Block`].
///
/// Keys are the canonical string form of the CID: link values decoded by
/// different codecs may differ structurally while addressing the same
/// content, and the canonical string is the representation they agree on.
///
/// The store is a cheap-clone handle; clones share the same map. Lookup
/// is the only operation validation performs; insertion happens at the
/// decode boundary and through [`Delegation::attach`][crate::Delegation::attach].
#[derive(Debug, Clone, Default)]
pub struct BlockStore {
    inner: Arc<RwLock<HashMap<String, Block>>>,
}

impl BlockStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a block by CID.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn get(&self, cid: &Cid) -> Option<Block> {
        self.inner
            .read()
            .expect("block store lock poisoned")
            .get(&cid.to_string())
            .cloned()
    }

    /// Whether the store holds a block for `cid`.
    #[must_use]
    pub fn contains(&self, cid: &Cid) -> bool {
        self.get(cid).is_some()
    }

    /// Insert a block, keyed by its canonical CID string.
    #[allow(clippy::expect_used)]
    pub fn insert(&self, block: Block) {
        self.inner
            .write()
            .expect("block store lock poisoned")
            .insert(block.cid().to_string(), block);
    }

    /// Number of blocks held.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn len(&self) -> usize {
        self.inner.read().expect("block store lock poisoned").len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every block currently held.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn blocks(&self) -> Vec<Block> {
        self.inner
            .read()
            .expect("block store lock poisoned")
            .values()
            .cloned()
            .collect()
    }
}

impl FromIterator<Block> for BlockStore {
    fn from_iter<I: IntoIterator<Item = Block>>(iter: I) -> Self {
        let store = Self::new();
        for block in iter {
            store.insert(block);
        }
        store
    }
}
