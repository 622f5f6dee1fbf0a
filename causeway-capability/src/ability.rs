//! Ability strings and their pattern algebra.

use crate::error::ParseError;
use std::{fmt, str::FromStr};

/// An action identifier: a concrete `namespace/verb`, a segment wildcard
/// `namespace/*`, or the top wildcard `*`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Ability(String);

impl Ability {
    /// Parse an ability string.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] unless the string is `*` or a
    /// `/`-separated path with no empty segments.
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        if s == "*" {
            return Ok(Ability(s.to_string()));
        }
        if !s.contains('/') {
            return Err(ParseError::InvalidAbility {
                can: s.to_string(),
                reason: "expected namespace/verb, namespace/* or *".to_string(),
            });
        }
        if s.split('/').any(str::is_empty) {
            return Err(ParseError::InvalidAbility {
                can: s.to_string(),
                reason: "ability segments must not be empty".to_string(),
            });
        }
        Ok(Ability(s.to_string()))
    }

    /// The raw ability string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the top wildcard `*`.
    #[must_use]
    pub fn is_any(&self) -> bool {
        self.0 == "*"
    }

    /// Whether this is a pattern (`*` or `namespace/*`).
    #[must_use]
    pub fn is_pattern(&self) -> bool {
        self.is_any() || self.0.ends_with("/*")
    }

    /// The namespace prefix of a segment pattern, `"store/*"` → `"store/"`.
    fn pattern_prefix(&self) -> Option<&str> {
        self.0.strip_suffix('*').filter(|_| self.0.ends_with("/*"))
    }

    /// The more specific of two compatible abilities, or `None` when
    /// they are incompatible.
    ///
    /// - `*` against anything yields the other side
    /// - two segment patterns yield that pattern when equal and are
    ///   incompatible otherwise, even when one prefix extends the other
    /// - a segment pattern against a concrete ability under its
    ///   namespace yields the concrete ability
    /// - equal concrete strings yield that string
    ///
    /// Commutative on concrete strings.
    #[must_use]
    pub fn intersect(provided: &Ability, claimed: &Ability) -> Option<Ability> {
        if provided.is_any() {
            return Some(claimed.clone());
        }
        if claimed.is_any() {
            return Some(provided.clone());
        }
        if provided.is_pattern() && claimed.is_pattern() {
            if provided == claimed {
                return Some(provided.clone());
            }
            return None;
        }
        if let Some(prefix) = claimed.pattern_prefix() {
            if provided.0.starts_with(prefix) {
                return Some(provided.clone());
            }
        }
        if let Some(prefix) = provided.pattern_prefix() {
            if claimed.0.starts_with(prefix) {
                return Some(claimed.clone());
            }
        }
        if provided == claimed {
            return Some(provided.clone());
        }
        None
    }
}

impl FromStr for Ability {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
