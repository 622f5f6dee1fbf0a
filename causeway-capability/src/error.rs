//! The rejection taxonomy.
//!
//! Every way a claim can fail to validate is a first-class value, never
//! an opaque exception. `Display` for each value is a single line
//! suitable for logs; [`InvalidClaim::render`] additionally produces a
//! nested, indented tree of causes so a developer can see *why* a token
//! did not authorize a claim.

use crate::descriptor::CapabilityValue;
use causeway_ucan::{Capability, Timestamp};
use causeway_varsig::Did;
use ipld_core::cid::Cid;
use std::fmt::Write as _;
use thiserror::Error;

/// Failure to parse a capability field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The `with` field is not a valid URI.
    #[error("invalid URI {uri:?}: {reason}")]
    InvalidUri {
        /// The offending string.
        uri: String,
        /// Why it failed to parse.
        reason: String,
    },

    /// The `with` field has the wrong URI scheme.
    #[error("expected a {expected}: URI, got {found}:")]
    SchemeMismatch {
        /// The scheme the descriptor requires.
        expected: &'static str,
        /// The scheme the source carried.
        found: String,
    },

    /// The `can` field is not a valid ability.
    #[error("invalid ability {can:?}: {reason}")]
    InvalidAbility {
        /// The offending string.
        can: String,
        /// Why it failed to parse.
        reason: String,
    },

    /// A caveat failed its parser.
    #[error("invalid caveat {key:?}: {reason}")]
    InvalidCaveat {
        /// The caveat key.
        key: String,
        /// Why it failed to parse.
        reason: String,
    },
}

/// A claimed capability escalates beyond what was delegated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct EscalationError {
    /// Why the derivation was rejected.
    pub reason: String,
}

impl EscalationError {
    /// Create an escalation with the given reason.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// A structured reason a proof or capability was rejected during
/// validation. Causes form a tree: a [`Cause::Session`] wraps the
/// rejections collected while exploring one proof delegation.
#[derive(Debug, Clone, Error)]
pub enum Cause {
    /// No descriptor in the matcher set recognized the `can` field.
    #[error("capability {capability} is not known")]
    UnknownCapability {
        /// The raw source capability.
        capability: Capability,
    },

    /// The `can` matched but `with` or a caveat failed to parse.
    #[error("capability {capability} is malformed: {cause}")]
    MalformedCapability {
        /// The raw source capability.
        capability: Capability,
        /// The parse failure.
        cause: ParseError,
    },

    /// The derivation predicate rejected the transition.
    #[error("claimed {claimed} escalates delegated {delegated}: {cause}")]
    EscalatedCapability {
        /// The capability being claimed.
        claimed: CapabilityValue,
        /// The capability the parent delegated.
        delegated: CapabilityValue,
        /// Why the derivation was rejected.
        cause: EscalationError,
    },

    /// A proof's audience is not the consuming delegation's issuer.
    #[error("proof {delegation} has audience {actual}, expected {expected}")]
    InvalidAudience {
        /// The offending proof.
        delegation: Cid,
        /// The issuer the proof had to be addressed to.
        expected: Did,
        /// The audience the proof carries.
        actual: Did,
    },

    /// A proof's signature did not verify under its issuer's key.
    #[error("proof {delegation} has an invalid signature")]
    InvalidSignature {
        /// The offending proof.
        delegation: Cid,
    },

    /// A proof's expiration is in the past.
    #[error("proof {delegation} expired at {expired_at} (now {now})")]
    Expired {
        /// The offending proof.
        delegation: Cid,
        /// Its expiration time.
        expired_at: Timestamp,
        /// The validation time.
        now: Timestamp,
    },

    /// A proof's not-before bound is in the future.
    #[error("proof {delegation} is not valid before {active_at} (now {now})")]
    NotValidYet {
        /// The offending proof.
        delegation: Cid,
        /// Its not-before time.
        active_at: Timestamp,
        /// The validation time.
        now: Timestamp,
    },

    /// A proof link could not be resolved to a delegation.
    #[error("proof {link} could not be resolved: {reason}")]
    UnresolvedProof {
        /// The unresolved link.
        link: Cid,
        /// Why resolution failed.
        reason: String,
    },

    /// The rejections collected while exploring one proof delegation.
    #[error("proof {delegation} did not authorize the claim")]
    Session {
        /// The proof that was explored.
        delegation: Cid,
        /// Every rejection encountered under it.
        causes: Vec<Cause>,
    },
}

impl Cause {
    fn render_into(&self, indent: usize, out: &mut String) {
        let _ = writeln!(out, "{:indent$}- {self}", "", indent = indent);
        if let Cause::Session { causes, .. } = self {
            for cause in causes {
                cause.render_into(indent + 2, out);
            }
        }
    }
}

/// No proof chain derived the claim.
#[derive(Debug, Clone, Error)]
#[error("claim {claim} is not authorized")]
pub struct InvalidClaim {
    /// A rendering of the claim that failed.
    pub claim: String,

    /// Every rejection encountered, in exploration order.
    pub causes: Vec<Cause>,
}

impl InvalidClaim {
    /// Render the full cause tree, nested and indented.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = format!("{self}\n");
        for cause in &self.causes {
            cause.render_into(2, &mut out);
        }
        out
    }
}

/// Outcome of [`access`][crate::access] when the claim is not granted.
#[derive(Debug, Clone, Error)]
pub enum AccessError {
    /// No valid delegation path exists from a self-issued capability
    /// down to the claim.
    #[error(transparent)]
    InvalidClaim(#[from] InvalidClaim),

    /// The cancel token fired; no partial result is produced.
    #[error("validation was cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cid(n: u8) -> Cid {
        causeway_ucan::to_dagcbor_cid(&[n])
    }

    #[test]
    fn causes_render_on_a_single_line() {
        let cause = Cause::UnknownCapability {
            capability: Capability::new("store/add", "did:key:zAlice"),
        };
        assert!(!cause.to_string().contains('\n'));
    }

    #[test]
    fn invalid_claim_renders_a_nested_tree() {
        let claim = InvalidClaim {
            claim: "store/add".to_string(),
            causes: vec![Cause::Session {
                delegation: cid(1),
                causes: vec![Cause::InvalidSignature { delegation: cid(2) }],
            }],
        };

        let rendered = claim.render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("not authorized"));
        assert!(lines[1].starts_with("  - "));
        assert!(lines[2].starts_with("    - "));
    }
}
