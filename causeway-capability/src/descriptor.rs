//! Capability descriptors: declarative parsers producing typed
//! capabilities from untyped sources.

use crate::{
    Ability, Resource,
    error::{EscalationError, ParseError},
    resource::any_uri,
};
use causeway_ucan::Capability;
use ipld_core::ipld::Ipld;
use std::{collections::BTreeMap, fmt, sync::Arc};

/// Parser from a raw `with` string to a structured [`Resource`].
pub type WithParser = Arc<dyn Fn(&str) -> Result<Resource, ParseError> + Send + Sync>;

/// Parser for a single named caveat. Receives the raw value when the
/// source carries the key, `None` otherwise; returns the structured
/// value to keep, or `None` to omit the caveat.
pub type CaveatParser =
    Arc<dyn Fn(Option<&Ipld>) -> Result<Option<Ipld>, ParseError> + Send + Sync>;

/// Binary derivation predicate: does `claimed` stay within `delegated`?
pub type DerivesFn =
    Arc<dyn Fn(&CapabilityValue, &CapabilityValue) -> Result<(), EscalationError> + Send + Sync>;

/// Derivation predicate over a parent match group (used by the `derive`
/// combinator, whose `from` selector may be a conjunction).
pub type GroupDerivesFn =
    Arc<dyn Fn(&CapabilityValue, &[CapabilityValue]) -> Result<(), EscalationError> + Send + Sync>;

/// A parsed, typed capability: the output of a successful match.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityValue {
    /// The concrete ability.
    pub can: Ability,

    /// The parsed resource.
    pub with: Resource,

    /// The parsed caveats.
    pub nb: BTreeMap<String, Ipld>,
}

impl fmt::Display for CapabilityValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{can: {}, with: {}}}", self.can, self.with)
    }
}

/// Outcome of applying a [`Descriptor`] to a raw capability source.
#[derive(Debug, Clone)]
pub enum MatchOutcome {
    /// The source parsed under this descriptor.
    Match(CapabilityValue),

    /// The `can` field did not match; another descriptor may handle the
    /// source.
    Unknown(Capability),

    /// The `can` matched but `with` or a caveat failed to parse.
    Malformed(Capability, ParseError),
}

/// A declarative capability shape.
///
/// Declares the concrete ability it matches (pattern matching is the
/// algebra layer's concern), a parser for the `with` URI, an ordered map
/// of caveat parsers, and a derivation predicate consulted during
/// proof-chain search. Represented as a struct of function objects.
#[derive(Clone)]
pub struct Descriptor {
    can: Ability,
    with: WithParser,
    nb: Vec<(String, CaveatParser)>,
    derives: DerivesFn,
}

impl Descriptor {
    /// Create a descriptor for the given concrete ability, accepting any
    /// absolute URI, no caveats, and the default derivation predicate
    /// (equal resource, delegated caveats repeated verbatim).
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] if `can` is not a valid ability.
    pub fn new(can: &str) -> Result<Self, ParseError> {
        Ok(Self {
            can: Ability::parse(can)?,
            with: any_uri(),
            nb: Vec::new(),
            derives: Arc::new(default_derives),
        })
    }

    /// Replace the `with` parser.
    #[must_use]
    pub fn with_parser(mut self, parser: WithParser) -> Self {
        self.with = parser;
        self
    }

    /// Append a named caveat parser. Caveats are evaluated in the order
    /// they are declared.
    #[must_use]
    pub fn caveat(
        mut self,
        key: impl Into<String>,
        parser: impl Fn(Option<&Ipld>) -> Result<Option<Ipld>, ParseError> + Send + Sync + 'static,
    ) -> Self {
        self.nb.push((key.into(), Arc::new(parser)));
        self
    }

    /// Replace the derivation predicate.
    #[must_use]
    pub fn derives(
        mut self,
        derives: impl Fn(&CapabilityValue, &CapabilityValue) -> Result<(), EscalationError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.derives = Arc::new(derives);
        self
    }

    /// The ability this descriptor matches.
    #[must_use]
    pub const fn can(&self) -> &Ability {
        &self.can
    }

    /// Run the derivation predicate.
    ///
    /// # Errors
    ///
    /// Returns the predicate's [`EscalationError`] when `claimed`
    /// escalates beyond `delegated`.
    pub fn check_derives(
        &self,
        claimed: &CapabilityValue,
        delegated: &CapabilityValue,
    ) -> Result<(), EscalationError> {
        (self.derives)(claimed, delegated)
    }

    /// Apply this descriptor to a raw capability source.
    #[must_use]
    pub fn match_source(&self, source: &Capability) -> MatchOutcome {
        if source.can != self.can.as_str() {
            return MatchOutcome::Unknown(source.clone());
        }

        let with = match (self.with)(&source.with) {
            Ok(with) => with,
            Err(cause) => return MatchOutcome::Malformed(source.clone(), cause),
        };

        let caveats = source.caveats();
        let mut nb = BTreeMap::new();
        for (key, parser) in &self.nb {
            match parser(caveats.get(key)) {
                Ok(Some(value)) => {
                    nb.insert(key.clone(), value);
                }
                Ok(None) => {}
                Err(cause) => return MatchOutcome::Malformed(source.clone(), cause),
            }
        }

        MatchOutcome::Match(CapabilityValue {
            can: self.can.clone(),
            with,
            nb,
        })
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("can", &self.can)
            .field("nb", &self.nb.iter().map(|(key, _)| key).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Default derivation rule: the resource must be identical, and every
/// caveat the parent delegated must be repeated verbatim by the claim.
/// Descriptors with richer semantics replace this via
/// [`Descriptor::derives`].
fn default_derives(
    claimed: &CapabilityValue,
    delegated: &CapabilityValue,
) -> Result<(), EscalationError> {
    if claimed.with != delegated.with {
        return Err(EscalationError::new(format!(
            "resource {} is not covered by {}",
            claimed.with, delegated.with
        )));
    }
    for (key, value) in &delegated.nb {
        if claimed.nb.get(key) != Some(value) {
            return Err(EscalationError::new(format!(
                "caveat {key:?} violates the delegated constraint"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::did_uri;

    fn source(can: &str, with: &str) -> Capability {
        Capability::new(can, with)
    }

    #[test]
    fn can_mismatch_is_unknown() {
        let descriptor = Descriptor::new("store/add").unwrap();
        let outcome = descriptor.match_source(&source("upload/add", "did:key:zAlice"));
        assert!(matches!(outcome, MatchOutcome::Unknown(_)));
    }

    #[test]
    fn bad_uri_is_malformed() {
        let descriptor = Descriptor::new("store/add").unwrap();
        let outcome = descriptor.match_source(&source("store/add", "not a uri"));
        assert!(matches!(
            outcome,
            MatchOutcome::Malformed(_, ParseError::InvalidUri { .. })
        ));
    }

    #[test]
    fn wrong_scheme_is_malformed() {
        let descriptor = Descriptor::new("store/add")
            .unwrap()
            .with_parser(did_uri());
        let outcome = descriptor.match_source(&source("store/add", "https://example.com/"));
        assert!(matches!(
            outcome,
            MatchOutcome::Malformed(_, ParseError::SchemeMismatch { .. })
        ));
    }

    #[test]
    fn caveat_parsers_run_in_declared_order() {
        let descriptor = Descriptor::new("store/add")
            .unwrap()
            .caveat("size", |value| match value {
                Some(Ipld::Integer(size)) if *size >= 0 => Ok(Some(Ipld::Integer(*size))),
                Some(_) => Err(ParseError::InvalidCaveat {
                    key: "size".to_string(),
                    reason: "expected a non-negative integer".to_string(),
                }),
                None => Ok(None),
            });

        let mut nb = BTreeMap::new();
        nb.insert("size".to_string(), Ipld::Integer(42));
        let outcome =
            descriptor.match_source(&source("store/add", "did:key:zAlice").with_caveats(nb));
        let MatchOutcome::Match(value) = outcome else {
            panic!("expected a match");
        };
        assert_eq!(value.nb.get("size"), Some(&Ipld::Integer(42)));

        let mut bad = BTreeMap::new();
        bad.insert("size".to_string(), Ipld::String("huge".to_string()));
        let outcome =
            descriptor.match_source(&source("store/add", "did:key:zAlice").with_caveats(bad));
        assert!(matches!(
            outcome,
            MatchOutcome::Malformed(_, ParseError::InvalidCaveat { .. })
        ));
    }

    #[test]
    fn default_derives_requires_equal_resource() {
        let descriptor = Descriptor::new("store/add").unwrap();
        let alice = CapabilityValue {
            can: Ability::parse("store/add").unwrap(),
            with: Resource::parse("did:key:zAlice").unwrap(),
            nb: BTreeMap::new(),
        };
        let bob = CapabilityValue {
            with: Resource::parse("did:key:zBob").unwrap(),
            ..alice.clone()
        };

        assert!(descriptor.check_derives(&alice, &alice).is_ok());
        assert!(descriptor.check_derives(&bob, &alice).is_err());
    }

    #[test]
    fn default_derives_requires_delegated_caveats_to_be_repeated() {
        let descriptor = Descriptor::new("store/add").unwrap();
        let mut delegated = CapabilityValue {
            can: Ability::parse("store/add").unwrap(),
            with: Resource::parse("did:key:zAlice").unwrap(),
            nb: BTreeMap::new(),
        };
        delegated
            .nb
            .insert("size".to_string(), Ipld::Integer(1024));

        let unconstrained = CapabilityValue {
            nb: BTreeMap::new(),
            ..delegated.clone()
        };

        assert!(descriptor.check_derives(&delegated, &delegated).is_ok());
        // Dropping the delegated caveat widens the claim
        assert!(descriptor.check_derives(&unconstrained, &delegated).is_err());
        // A claim may carry caveats the parent did not
        assert!(descriptor.check_derives(&delegated, &unconstrained).is_ok());
    }
}
