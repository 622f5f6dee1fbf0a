//! Raw capability sources as they appear on the wire.

use ipld_core::ipld::Ipld;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

/// The meta-resource meaning "every resource the issuer holds proofs for".
pub const UCAN_RESOURCE: &str = "ucan:*";

/// An untyped capability as carried by a token's `att` field.
///
/// `can` is an ability string (`namespace/verb`, `namespace/*` or `*`),
/// `with` an absolute URI or the [`UCAN_RESOURCE`] meta-resource, and
/// `nb` an arbitrary structured map of additional caveats. Typed parsing
/// and matching happen in `causeway-capability`; this type is the wire
/// shape only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    /// Ability string, e.g. `store/add`.
    pub can: String,

    /// Resource URI the ability applies to.
    pub with: String,

    /// Caveats constraining the capability, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nb: Option<BTreeMap<String, Ipld>>,
}

impl Capability {
    /// A capability with no caveats.
    #[must_use]
    pub fn new(can: impl Into<String>, with: impl Into<String>) -> Self {
        Self {
            can: can.into(),
            with: with.into(),
            nb: None,
        }
    }

    /// Attach caveats to this capability.
    #[must_use]
    pub fn with_caveats(mut self, nb: BTreeMap<String, Ipld>) -> Self {
        self.nb = Some(nb);
        self
    }

    /// Whether this capability names the `ucan:*` meta-resource.
    #[must_use]
    pub fn is_redelegation(&self) -> bool {
        self.with == UCAN_RESOURCE
    }

    /// The caveat map, empty when absent.
    #[must_use]
    pub fn caveats(&self) -> &BTreeMap<String, Ipld> {
        static EMPTY: BTreeMap<String, Ipld> = BTreeMap::new();
        self.nb.as_ref().unwrap_or(&EMPTY)
    }

    /// Convert to an [`Ipld`] map (used for signing-byte encoding).
    #[must_use]
    pub(crate) fn to_ipld(&self) -> Ipld {
        let mut map = BTreeMap::new();
        map.insert("can".to_string(), Ipld::String(self.can.clone()));
        map.insert("with".to_string(), Ipld::String(self.with.clone()));
        if let Some(nb) = &self.nb {
            map.insert("nb".to_string(), Ipld::Map(nb.clone()));
        }
        Ipld::Map(map)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{can: {}, with: {}}}", self.can, self.with)
    }
}
