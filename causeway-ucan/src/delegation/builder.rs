//! Delegation builder.

use super::{ATTACHMENTS_FACT, Delegation, Proof};
use crate::{
    Block, BlockStore, Capability, Timestamp,
    error::DelegateError,
    payload::{Payload, UnsignedPayload, VERSION},
};
use causeway_varsig::{Did, Principal, Signature, Signer};
use ipld_core::ipld::Ipld;
use std::collections::BTreeMap;

/// Lifetime applied when neither `expiration` nor `lifetime` is set.
///
/// Tokens are short-lived in lieu of revocation.
const DEFAULT_LIFETIME: u64 = 30;

/// Marker for a builder that has no issuer yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIssuer;

/// Builder for [`Delegation`] values.
///
/// The issuer is supplied as anything that is both a
/// [`Signer`] and a [`Principal`]; [`delegate`][Self::delegate] signs the
/// assembled payload and wires proof blocks into the new delegation's
/// block store.
#[derive(Debug)]
pub struct DelegationBuilder<S: Signature, I = NoIssuer> {
    issuer: I,
    audience: Option<Did>,
    capabilities: Vec<Capability>,
    expiration: Option<Timestamp>,
    lifetime: Option<u64>,
    not_before: Option<Timestamp>,
    facts: Vec<BTreeMap<String, Ipld>>,
    nonce: Option<String>,
    proofs: Vec<Proof<S>>,
    attachments: Vec<Block>,
}

impl<S: Signature> DelegationBuilder<S, NoIssuer> {
    /// Creates a blank builder.
    #[must_use]
    pub fn new() -> Self {
        DelegationBuilder {
            issuer: NoIssuer,
            audience: None,
            capabilities: Vec::new(),
            expiration: None,
            lifetime: None,
            not_before: None,
            facts: Vec::new(),
            nonce: None,
            proofs: Vec::new(),
            attachments: Vec::new(),
        }
    }
}

impl<S: Signature> Default for DelegationBuilder<S, NoIssuer> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Signature, I> DelegationBuilder<S, I> {
    /// Set the issuer; it will sign the payload.
    pub fn issuer<J>(self, issuer: J) -> DelegationBuilder<S, J>
    where
        J: Signer<S> + Principal,
    {
        DelegationBuilder {
            issuer,
            audience: self.audience,
            capabilities: self.capabilities,
            expiration: self.expiration,
            lifetime: self.lifetime,
            not_before: self.not_before,
            facts: self.facts,
            nonce: self.nonce,
            proofs: self.proofs,
            attachments: self.attachments,
        }
    }

    /// Set the audience principal.
    #[must_use]
    pub fn audience(mut self, audience: &impl Principal) -> Self {
        self.audience = Some(audience.did());
        self
    }

    /// Add a capability to delegate.
    #[must_use]
    pub fn capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    /// Add several capabilities to delegate.
    #[must_use]
    pub fn capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities.extend(capabilities);
        self
    }

    /// Set an absolute expiration time.
    #[must_use]
    pub fn expiration(mut self, expiration: Timestamp) -> Self {
        self.expiration = Some(expiration);
        self
    }

    /// Expire `seconds` from now. Ignored when an absolute expiration
    /// was set.
    #[must_use]
    pub fn lifetime(mut self, seconds: u64) -> Self {
        self.lifetime = Some(seconds);
        self
    }

    /// Set the not-before bound.
    #[must_use]
    pub fn not_before(mut self, not_before: Timestamp) -> Self {
        self.not_before = Some(not_before);
        self
    }

    /// Append a fact.
    #[must_use]
    pub fn fact(mut self, fact: BTreeMap<String, Ipld>) -> Self {
        self.facts.push(fact);
        self
    }

    /// Set the nonce.
    #[must_use]
    pub fn nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Add a proof. A resolved [`Delegation`] contributes its blocks to
    /// the new delegation's store; a bare link is carried as-is.
    #[must_use]
    pub fn proof(mut self, proof: impl Into<Proof<S>>) -> Self {
        self.proofs.push(proof.into());
        self
    }

    /// Attach a block that the delegated capabilities' caveats reference.
    /// Its link is recorded under the `ucan/attachments` fact.
    #[must_use]
    pub fn attach(mut self, block: Block) -> Self {
        self.attachments.push(block);
        self
    }
}

impl<S: Signature, I: Signer<S> + Principal> DelegationBuilder<S, I> {
    /// Sign the assembled payload and produce a [`Delegation`].
    ///
    /// # Errors
    ///
    /// Returns a [`DelegateError`] when the audience is missing, or when
    /// encoding or signing fails.
    pub async fn delegate(self) -> Result<Delegation<S>, DelegateError> {
        let audience = self.audience.ok_or(DelegateError::MissingAudience)?;
        let expiration = self.expiration.unwrap_or_else(|| {
            Timestamp::now().plus_secs(self.lifetime.unwrap_or(DEFAULT_LIFETIME))
        });

        let mut facts = self.facts;
        if !self.attachments.is_empty() {
            let links = self
                .attachments
                .iter()
                .map(|block| Ipld::Link(*block.cid()))
                .collect();
            let mut fact = BTreeMap::new();
            fact.insert(ATTACHMENTS_FACT.to_string(), Ipld::List(links));
            facts.push(fact);
        }

        let unsigned = UnsignedPayload {
            version: VERSION.to_string(),
            issuer: self.issuer.did(),
            audience,
            capabilities: self.capabilities,
            proofs: self.proofs.iter().map(Proof::link).collect(),
            facts,
            expiration,
            not_before: self.not_before,
            nonce: self.nonce,
        };

        let signature = self.issuer.sign(&unsigned.signing_bytes()?).await?;
        let payload = Payload::new(unsigned, signature);
        let bytes = crate::codec::encode(&payload)?;
        let root = Block::dag_cbor(bytes);

        let blocks = BlockStore::new();
        for proof in &self.proofs {
            if let Proof::Delegation(delegation) = proof {
                blocks.insert(delegation.root().clone());
                for block in delegation.blocks().blocks() {
                    blocks.insert(block);
                }
            }
        }
        for block in self.attachments {
            blocks.insert(block);
        }

        Ok(Delegation::from_parts(root, payload, blocks))
    }
}
