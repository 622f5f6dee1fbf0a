//! Resource URIs and `with`-field parsers.

use crate::{descriptor::WithParser, error::ParseError};
use causeway_ucan::capability::UCAN_RESOURCE;
use std::{fmt, str::FromStr, sync::Arc};
use url::Url;

/// The resource a capability applies to: an absolute URI, or the
/// meta-resource `ucan:*` meaning "every resource the issuer holds
/// proofs for".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    /// The `ucan:*` meta-resource.
    Ucan,

    /// An absolute URI.
    Uri(Url),
}

impl Resource {
    /// Parse a raw `with` string.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] when the string is not `ucan:*` and not
    /// an absolute URI.
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        if s == UCAN_RESOURCE {
            return Ok(Resource::Ucan);
        }
        let url = Url::parse(s).map_err(|error| ParseError::InvalidUri {
            uri: s.to_string(),
            reason: error.to_string(),
        })?;
        Ok(Resource::Uri(url))
    }

    /// The URI scheme, or `"ucan"` for the meta-resource.
    #[must_use]
    pub fn scheme(&self) -> &str {
        match self {
            Resource::Ucan => "ucan",
            Resource::Uri(url) => url.scheme(),
        }
    }

    /// The underlying URL, when this is a concrete URI.
    #[must_use]
    pub const fn url(&self) -> Option<&Url> {
        match self {
            Resource::Ucan => None,
            Resource::Uri(url) => Some(url),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Ucan => f.write_str(UCAN_RESOURCE),
            Resource::Uri(url) => f.write_str(url.as_str()),
        }
    }
}

impl FromStr for Resource {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A `with` parser accepting any absolute URI.
#[must_use]
pub fn any_uri() -> WithParser {
    Arc::new(Resource::parse)
}

/// A `with` parser accepting only URIs of the given scheme.
#[must_use]
pub fn scheme(expected: &'static str) -> WithParser {
    Arc::new(move |s: &str| {
        let resource = Resource::parse(s)?;
        if resource.scheme() != expected {
            return Err(ParseError::SchemeMismatch {
                expected,
                found: resource.scheme().to_string(),
            });
        }
        Ok(resource)
    })
}

/// A `with` parser accepting `did:` URIs.
#[must_use]
pub fn did_uri() -> WithParser {
    scheme("did")
}
