//! UCAN delegation views.
//!
//! A [`Delegation`] is the logical unit the proof-chain validator
//! consumes: a root token block plus a [`BlockStore`] holding proof
//! delegation blocks and caveat-referenced data blocks. The view is a
//! cheap-clone handle; proof materialization and signature verification
//! are computed once and cached.

pub mod builder;

use crate::{
    Block, BlockStore, Capability, Payload, Timestamp,
    error::{AttachError, DecodeError, SignatureVerificationError},
    payload::VERSION,
};
use causeway_varsig::{Did, Resolver, Signature, Verifier};
use ipld_core::{cid::Cid, ipld::Ipld};
use once_cell::sync::OnceCell;
use std::{
    collections::{BTreeMap, HashSet},
    fmt::Debug,
    sync::{Arc, RwLock},
};
use tracing::warn;

/// Fact key under which attached block links are recorded.
///
/// Receivers treat the list as an opaque envelope hint.
pub const ATTACHMENTS_FACT: &str = "ucan/attachments";

/// A proof referenced by a delegation.
///
/// Resolved to a [`Delegation`] when its block is present in the shared
/// store, otherwise a bare link the validator must fetch or fail on.
#[derive(Debug, Clone)]
pub enum Proof<S: Signature> {
    /// The proof's block was present and decoded.
    Delegation(Delegation<S>),

    /// The proof is known only by its content address.
    Link(Cid),
}

impl<S: Signature> Proof<S> {
    /// The content address of this proof.
    #[must_use]
    pub fn link(&self) -> Cid {
        match self {
            Proof::Delegation(delegation) => *delegation.cid(),
            Proof::Link(cid) => *cid,
        }
    }

    /// The resolved delegation, if this proof carries one.
    #[must_use]
    pub const fn delegation(&self) -> Option<&Delegation<S>> {
        match self {
            Proof::Delegation(delegation) => Some(delegation),
            Proof::Link(_) => None,
        }
    }
}

impl<S: Signature> From<Delegation<S>> for Proof<S> {
    fn from(delegation: Delegation<S>) -> Self {
        Proof::Delegation(delegation)
    }
}

impl<S: Signature> From<Cid> for Proof<S> {
    fn from(cid: Cid) -> Self {
        Proof::Link(cid)
    }
}

struct Inner<S: Signature> {
    root: Block,
    payload: Payload<S>,
    blocks: BlockStore,
    proofs: OnceCell<Vec<Proof<S>>>,
    verified: OnceCell<()>,
    attachments: RwLock<Vec<Block>>,
    sealed: OnceCell<()>,
}

/// A UCAN viewed as a node in a proof chain.
///
/// Created by [`DelegationBuilder::delegate`][builder::DelegationBuilder]
/// (signs a fresh payload) or by [`Delegation::view`] /
/// [`extract`][crate::archive::extract] (wraps received bytes). Immutable
/// once constructed, apart from the pre-export [`attach`][Self::attach]
/// window.
pub struct Delegation<S: Signature>(Arc<Inner<S>>);

impl<S: Signature> Clone for Delegation<S> {
    fn clone(&self) -> Self {
        Delegation(Arc::clone(&self.0))
    }
}

impl<S: Signature> Delegation<S> {
    /// Creates a blank [`DelegationBuilder`][builder::DelegationBuilder]
    /// instance.
    #[must_use]
    pub fn builder() -> builder::DelegationBuilder<S> {
        builder::DelegationBuilder::new()
    }

    /// View a received root block against a store of reachable blocks.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if the root bytes are not a token of a
    /// supported version.
    pub fn view(root: Block, blocks: BlockStore) -> Result<Self, DecodeError> {
        let payload: Payload<S> = crate::codec::decode(root.bytes())?;
        if payload.version() != VERSION {
            return Err(DecodeError::UnsupportedVersion {
                found: payload.version().to_string(),
            });
        }
        Ok(Self::from_parts(root, payload, blocks))
    }

    pub(crate) fn from_parts(root: Block, payload: Payload<S>, blocks: BlockStore) -> Self {
        Delegation(Arc::new(Inner {
            root,
            payload,
            blocks,
            proofs: OnceCell::new(),
            verified: OnceCell::new(),
            attachments: RwLock::new(Vec::new()),
            sealed: OnceCell::new(),
        }))
    }

    /// The root block's content identifier.
    #[must_use]
    pub fn cid(&self) -> &Cid {
        self.0.root.cid()
    }

    /// The root block's content identifier, by value.
    #[must_use]
    pub fn link(&self) -> Cid {
        *self.cid()
    }

    /// The root block's raw bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        self.0.root.bytes()
    }

    /// The root block.
    #[must_use]
    pub fn root(&self) -> &Block {
        &self.0.root
    }

    /// The decoded token payload.
    #[must_use]
    pub fn data(&self) -> &Payload<S> {
        &self.0.payload
    }

    /// The store of blocks reachable from this delegation.
    #[must_use]
    pub fn blocks(&self) -> &BlockStore {
        &self.0.blocks
    }

    /// Getter for the `iss` field.
    #[must_use]
    pub fn issuer(&self) -> &Did {
        self.data().issuer()
    }

    /// Getter for the `aud` field.
    #[must_use]
    pub fn audience(&self) -> &Did {
        self.data().audience()
    }

    /// Getter for the `att` field.
    #[must_use]
    pub fn capabilities(&self) -> &[Capability] {
        self.data().capabilities()
    }

    /// Getter for the `exp` field.
    #[must_use]
    pub fn expiration(&self) -> Timestamp {
        self.data().expiration()
    }

    /// Getter for the `nbf` field.
    #[must_use]
    pub fn not_before(&self) -> Option<Timestamp> {
        self.data().not_before()
    }

    /// Getter for the `nnc` field.
    #[must_use]
    pub fn nonce(&self) -> Option<&str> {
        self.data().nonce()
    }

    /// Getter for the `fct` field.
    #[must_use]
    pub fn facts(&self) -> &[BTreeMap<String, Ipld>] {
        self.data().facts()
    }

    /// Getter for the `v` field.
    #[must_use]
    pub fn version(&self) -> &str {
        self.data().version()
    }

    /// Getter for the `s` field.
    #[must_use]
    pub fn signature(&self) -> &S {
        self.data().signature()
    }

    /// The proofs of this delegation, in declared order.
    ///
    /// A proof whose block is present in the shared store is returned as
    /// a [`Proof::Delegation`] over that store; otherwise as a bare
    /// [`Proof::Link`]. The result is memoized.
    pub fn proofs(&self) -> &[Proof<S>] {
        self.0.proofs.get_or_init(|| {
            self.data()
                .proofs()
                .iter()
                .map(|cid| match self.0.blocks.get(cid) {
                    Some(block) => match Delegation::view(block, self.0.blocks.clone()) {
                        Ok(delegation) => Proof::Delegation(delegation),
                        Err(error) => {
                            warn!(%cid, %error, "proof block present but undecodable");
                            Proof::Link(*cid)
                        }
                    },
                    None => Proof::Link(*cid),
                })
                .collect()
        })
    }

    /// Depth-first traversal over every resolved ancestor delegation,
    /// post-order: children are yielded before the delegation that
    /// references them. This delegation itself is not yielded.
    #[must_use]
    pub fn iterate(&self) -> Ancestors<S> {
        Ancestors::new(self)
    }

    /// Every block reachable from this delegation: the root block, the
    /// blocks of resolved proofs (recursively) and any blocks referenced
    /// by caveat or fact links, attached blocks included.
    ///
    /// First consumption seals the delegation against further
    /// [`attach`][Self::attach] calls.
    pub fn iterate_blocks(&self) -> impl Iterator<Item = Block> {
        let _ = self.0.sealed.set(());

        let mut seen: HashSet<String> = HashSet::new();
        let mut out: Vec<Block> = Vec::new();

        let push = |block: Block, out: &mut Vec<Block>, seen: &mut HashSet<String>| {
            if seen.insert(block.cid().to_string()) {
                out.push(block);
            }
        };

        #[allow(clippy::expect_used)]
        let attachments = self
            .0
            .attachments
            .read()
            .expect("attachments lock poisoned")
            .clone();
        for block in attachments {
            push(block, &mut out, &mut seen);
        }

        for delegation in std::iter::once(self.clone()).chain(self.iterate()) {
            for cid in delegation.embedded_links() {
                if let Some(block) = self.0.blocks.get(&cid) {
                    push(block, &mut out, &mut seen);
                }
            }
            push(delegation.root().clone(), &mut out, &mut seen);
        }

        out.into_iter()
    }

    /// Add a block referenced by this delegation's caveats.
    ///
    /// Allowed only before the block set is first exported.
    ///
    /// # Errors
    ///
    /// Returns [`AttachError::AlreadySealed`] once
    /// [`iterate_blocks`][Self::iterate_blocks] has been consumed.
    #[allow(clippy::expect_used)]
    pub fn attach(&self, block: Block) -> Result<(), AttachError> {
        if self.0.sealed.get().is_some() {
            return Err(AttachError::AlreadySealed);
        }
        self.0.blocks.insert(block.clone());
        self.0
            .attachments
            .write()
            .expect("attachments lock poisoned")
            .push(block);
        Ok(())
    }

    /// Verify the issuer's signature over the canonical payload bytes.
    ///
    /// The resolver resolves the issuer DID to a verifier, then verifies
    /// the signature. A successful verification is cached; the bytes are
    /// content-addressed and never change.
    ///
    /// # Errors
    ///
    /// Returns a [`SignatureVerificationError`] if signature verification
    /// fails.
    pub async fn verify_signature<R>(
        &self,
        resolver: &R,
    ) -> Result<(), SignatureVerificationError<R::Error>>
    where
        R: Resolver<S>,
    {
        if self.0.verified.get().is_some() {
            return Ok(());
        }
        let payload = self
            .data()
            .unsigned()
            .signing_bytes()
            .map_err(SignatureVerificationError::EncodingError)?;
        let verifier = resolver
            .resolve(self.issuer())
            .await
            .map_err(SignatureVerificationError::ResolutionError)?;
        Verifier::verify(&verifier, &payload, self.signature())
            .await
            .map_err(SignatureVerificationError::VerificationError)?;
        let _ = self.0.verified.set(());
        Ok(())
    }

    /// Links embedded in this delegation's caveats and facts.
    fn embedded_links(&self) -> Vec<Cid> {
        let mut links = Vec::new();
        for capability in self.capabilities() {
            for value in capability.caveats().values() {
                collect_links(value, &mut links);
            }
        }
        for fact in self.facts() {
            for value in fact.values() {
                collect_links(value, &mut links);
            }
        }
        links
    }
}

fn collect_links(value: &Ipld, out: &mut Vec<Cid>) {
    match value {
        Ipld::Link(cid) => out.push(*cid),
        Ipld::List(items) => {
            for item in items {
                collect_links(item, out);
            }
        }
        Ipld::Map(map) => {
            for item in map.values() {
                collect_links(item, out);
            }
        }
        _ => {}
    }
}

impl<S: Signature> Debug for Delegation<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Delegation").field(self.cid()).finish()
    }
}

impl<S: Signature> PartialEq for Delegation<S> {
    fn eq(&self, other: &Self) -> bool {
        self.cid() == other.cid()
    }
}

impl<S: Signature> Eq for Delegation<S> {}

struct Frame<S: Signature> {
    node: Delegation<S>,
    children: Vec<Delegation<S>>,
    next: usize,
}

impl<S: Signature> Frame<S> {
    fn new(node: Delegation<S>) -> Self {
        let children = node
            .proofs()
            .iter()
            .filter_map(Proof::delegation)
            .cloned()
            .collect();
        Self {
            node,
            children,
            next: 0,
        }
    }
}

/// Post-order iterator over a delegation's resolved ancestors.
///
/// Owns an explicit frame stack; traversal is bounded by chain depth.
pub struct Ancestors<S: Signature> {
    stack: Vec<Frame<S>>,
    roots: std::vec::IntoIter<Delegation<S>>,
}

impl<S: Signature> Ancestors<S> {
    fn new(delegation: &Delegation<S>) -> Self {
        let roots: Vec<Delegation<S>> = delegation
            .proofs()
            .iter()
            .filter_map(Proof::delegation)
            .cloned()
            .collect();
        Self {
            stack: Vec::new(),
            roots: roots.into_iter(),
        }
    }
}

impl<S: Signature> Iterator for Ancestors<S> {
    type Item = Delegation<S>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(frame) = self.stack.last_mut() {
                if frame.next < frame.children.len() {
                    let child = frame.children[frame.next].clone();
                    frame.next += 1;
                    self.stack.push(Frame::new(child));
                } else {
                    #[allow(clippy::expect_used)]
                    let frame = self.stack.pop().expect("stack is non-empty");
                    return Some(frame.node);
                }
            } else if let Some(root) = self.roots.next() {
                self.stack.push(Frame::new(root));
            } else {
                return None;
            }
        }
    }
}
