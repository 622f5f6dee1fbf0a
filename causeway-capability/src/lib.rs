#![warn(missing_docs)]

//! Capability descriptors, delegation algebra and proof-chain validation.
//!
//! This crate turns untyped capability sources carried by UCAN tokens
//! into typed values and decides whether an invoked capability is backed
//! by a valid delegation chain:
//!
//! - [`Descriptor`]: a declarative parser for one capability shape — the
//!   ability it matches, a resource parser, an ordered map of caveat
//!   parsers and a derivation predicate
//! - [`Selector`]: the delegation algebra — [`capability`] (direct),
//!   [`or`] (disjunction), [`and`] (conjunction) and [`derive`]
//!   (derivation from another capability shape)
//! - [`access`]: the proof-chain validator — walks a delegation's proofs
//!   confirming issuer authority, audience chaining, validity bounds,
//!   signatures and capability derivation, and returns either a proof
//!   trace or a structured [`InvalidClaim`]
//!
//! Every rejection is a first-class value; see [`error`].

mod ability;
pub use ability::Ability;

mod resource;
pub use resource::{Resource, any_uri, did_uri, scheme};

mod descriptor;
pub use descriptor::{
    CapabilityValue, CaveatParser, Descriptor, DerivesFn, GroupDerivesFn, MatchOutcome, WithParser,
};

mod selector;
pub use selector::{Match, SelectResult, Selector, and, capability, derive, or};

mod access;
pub use access::{
    Access, DidOwnership, IssuePolicy, NeverResolve, ProofResolver, ProofTrace, ResolveError,
    access,
};

pub mod error;
pub use error::{AccessError, Cause, EscalationError, InvalidClaim, ParseError};
