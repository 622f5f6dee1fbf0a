//! The UCAN 0.9.1 token payload codec.
//!
//! A token is a single DAG-CBOR map carrying the issuer, audience,
//! capabilities, proof links, facts, validity bounds and the issuer's
//! signature. Encoding is deterministic — re-encoding a decoded payload
//! yields identical bytes, which content addressing depends on.

use crate::{Capability, Timestamp, codec};
use causeway_varsig::{Did, Signature};
use ipld_core::{cid::Cid, ipld::Ipld};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{self, MapAccess, Visitor},
    ser::SerializeMap,
};
use serde_ipld_dagcbor::error::CodecError;
use signature::SignatureEncoding as _;
use std::{borrow::Cow, collections::BTreeMap, marker::PhantomData};

/// The UCAN specification version this codec implements.
pub const VERSION: &str = "0.9.1";

/// The unsigned fields of a token payload.
///
/// This is the view the issuer signs: [`signing_bytes`][Self::signing_bytes]
/// is the canonical DAG-CBOR encoding of every field except the signature.
#[derive(Debug, Clone, PartialEq)]
pub struct UnsignedPayload {
    pub(crate) version: String,
    pub(crate) issuer: Did,
    pub(crate) audience: Did,
    pub(crate) capabilities: Vec<Capability>,
    pub(crate) proofs: Vec<Cid>,
    pub(crate) facts: Vec<BTreeMap<String, Ipld>>,
    pub(crate) expiration: Timestamp,
    pub(crate) not_before: Option<Timestamp>,
    pub(crate) nonce: Option<String>,
}

impl UnsignedPayload {
    /// Getter for the `iss` field.
    #[must_use]
    pub const fn issuer(&self) -> &Did {
        &self.issuer
    }

    /// Getter for the `aud` field.
    #[must_use]
    pub const fn audience(&self) -> &Did {
        &self.audience
    }

    /// Getter for the `att` field.
    #[must_use]
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Getter for the `prf` field.
    #[must_use]
    pub fn proofs(&self) -> &[Cid] {
        &self.proofs
    }

    /// Getter for the `fct` field.
    #[must_use]
    pub fn facts(&self) -> &[BTreeMap<String, Ipld>] {
        &self.facts
    }

    /// Getter for the `exp` field.
    #[must_use]
    pub const fn expiration(&self) -> Timestamp {
        self.expiration
    }

    /// Getter for the `nbf` field.
    #[must_use]
    pub const fn not_before(&self) -> Option<Timestamp> {
        self.not_before
    }

    /// Getter for the `nnc` field.
    #[must_use]
    pub fn nonce(&self) -> Option<&str> {
        self.nonce.as_deref()
    }

    /// Getter for the `v` field.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The canonical bytes an issuer signs: the DAG-CBOR encoding of
    /// this payload without the signature field.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if encoding fails.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, CodecError> {
        codec::encode(&self.to_ipld())
    }

    fn to_ipld(&self) -> Ipld {
        let mut map = BTreeMap::new();
        map.insert(
            "att".to_string(),
            Ipld::List(self.capabilities.iter().map(Capability::to_ipld).collect()),
        );
        map.insert(
            "aud".to_string(),
            Ipld::String(self.audience.as_str().to_string()),
        );
        map.insert(
            "exp".to_string(),
            Ipld::Integer(i128::from(self.expiration.to_unix())),
        );
        map.insert(
            "fct".to_string(),
            Ipld::List(
                self.facts
                    .iter()
                    .map(|fact| Ipld::Map(fact.clone()))
                    .collect(),
            ),
        );
        map.insert(
            "iss".to_string(),
            Ipld::String(self.issuer.as_str().to_string()),
        );
        if let Some(nbf) = self.not_before {
            map.insert("nbf".to_string(), Ipld::Integer(i128::from(nbf.to_unix())));
        }
        if let Some(nonce) = &self.nonce {
            map.insert("nnc".to_string(), Ipld::String(nonce.clone()));
        }
        map.insert(
            "prf".to_string(),
            Ipld::List(self.proofs.iter().copied().map(Ipld::Link).collect()),
        );
        map.insert("v".to_string(), Ipld::String(self.version.clone()));
        Ipld::Map(map)
    }
}

/// A complete, signed token payload.
#[derive(Debug, Clone)]
pub struct Payload<S: Signature> {
    pub(crate) unsigned: UnsignedPayload,
    pub(crate) signature: S,
}

impl<S: Signature> Payload<S> {
    /// Assemble a payload from its unsigned fields and signature.
    #[must_use]
    pub const fn new(unsigned: UnsignedPayload, signature: S) -> Self {
        Self { unsigned, signature }
    }

    /// The unsigned view of this payload.
    #[must_use]
    pub const fn unsigned(&self) -> &UnsignedPayload {
        &self.unsigned
    }

    /// Getter for the `s` field.
    #[must_use]
    pub const fn signature(&self) -> &S {
        &self.signature
    }

    /// Getter for the `iss` field.
    #[must_use]
    pub const fn issuer(&self) -> &Did {
        self.unsigned.issuer()
    }

    /// Getter for the `aud` field.
    #[must_use]
    pub const fn audience(&self) -> &Did {
        self.unsigned.audience()
    }

    /// Getter for the `att` field.
    #[must_use]
    pub fn capabilities(&self) -> &[Capability] {
        self.unsigned.capabilities()
    }

    /// Getter for the `prf` field.
    #[must_use]
    pub fn proofs(&self) -> &[Cid] {
        self.unsigned.proofs()
    }

    /// Getter for the `fct` field.
    #[must_use]
    pub fn facts(&self) -> &[BTreeMap<String, Ipld>] {
        self.unsigned.facts()
    }

    /// Getter for the `exp` field.
    #[must_use]
    pub const fn expiration(&self) -> Timestamp {
        self.unsigned.expiration()
    }

    /// Getter for the `nbf` field.
    #[must_use]
    pub const fn not_before(&self) -> Option<Timestamp> {
        self.unsigned.not_before()
    }

    /// Getter for the `nnc` field.
    #[must_use]
    pub fn nonce(&self) -> Option<&str> {
        self.unsigned.nonce()
    }

    /// Getter for the `v` field.
    #[must_use]
    pub fn version(&self) -> &str {
        self.unsigned.version()
    }
}

impl<S: Signature> Serialize for Payload<S> {
    fn serialize<Ser: serde::Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        let u = &self.unsigned;
        let len = 8 + usize::from(u.not_before.is_some()) + usize::from(u.nonce.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("att", &u.capabilities)?;
        map.serialize_entry("aud", &u.audience)?;
        map.serialize_entry("exp", &u.expiration)?;
        map.serialize_entry("fct", &u.facts)?;
        map.serialize_entry("iss", &u.issuer)?;
        if let Some(nbf) = u.not_before {
            map.serialize_entry("nbf", &nbf)?;
        }
        if let Some(nonce) = &u.nonce {
            map.serialize_entry("nnc", nonce)?;
        }
        map.serialize_entry("prf", &u.proofs)?;
        // Wrap signature bytes in serde_bytes::Bytes to ensure it
        // serializes as CBOR bytes
        map.serialize_entry("s", &serde_bytes::Bytes::new(self.signature.to_bytes().as_ref()))?;
        map.serialize_entry("v", &u.version)?;
        map.end()
    }
}

impl<'de, S: Signature> Deserialize<'de> for Payload<S> {
    #[allow(clippy::too_many_lines)]
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PayloadVisitor<S>(PhantomData<S>);

        impl<'de, S: Signature> Visitor<'de> for PayloadVisitor<S> {
            type Value = Payload<S>;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a map with keys att,aud,exp,fct,iss,prf,s,v and optional nbf,nnc")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut version: Option<String> = None;
                let mut issuer: Option<Did> = None;
                let mut audience: Option<Did> = None;
                let mut capabilities: Option<Vec<Capability>> = None;
                let mut proofs: Option<Vec<Cid>> = None;
                let mut facts: Option<Vec<BTreeMap<String, Ipld>>> = None;
                let mut expiration: Option<Timestamp> = None;
                let mut not_before: Option<Timestamp> = None;
                let mut nonce: Option<String> = None;
                let mut signature: Option<S> = None;

                while let Some(key) = map.next_key::<Cow<'de, str>>()? {
                    match key.as_ref() {
                        "v" => {
                            if version.is_some() {
                                return Err(de::Error::duplicate_field("v"));
                            }
                            version = Some(map.next_value()?);
                        }
                        "iss" => {
                            if issuer.is_some() {
                                return Err(de::Error::duplicate_field("iss"));
                            }
                            issuer = Some(map.next_value()?);
                        }
                        "aud" => {
                            if audience.is_some() {
                                return Err(de::Error::duplicate_field("aud"));
                            }
                            audience = Some(map.next_value()?);
                        }
                        "att" => {
                            if capabilities.is_some() {
                                return Err(de::Error::duplicate_field("att"));
                            }
                            capabilities = Some(map.next_value()?);
                        }
                        "prf" => {
                            if proofs.is_some() {
                                return Err(de::Error::duplicate_field("prf"));
                            }
                            proofs = Some(map.next_value()?);
                        }
                        "fct" => {
                            if facts.is_some() {
                                return Err(de::Error::duplicate_field("fct"));
                            }
                            facts = Some(map.next_value()?);
                        }
                        "exp" => {
                            if expiration.is_some() {
                                return Err(de::Error::duplicate_field("exp"));
                            }
                            expiration = Some(map.next_value()?);
                        }
                        "nbf" => {
                            if not_before.is_some() {
                                return Err(de::Error::duplicate_field("nbf"));
                            }
                            not_before = Some(map.next_value()?);
                        }
                        "nnc" => {
                            if nonce.is_some() {
                                return Err(de::Error::duplicate_field("nnc"));
                            }
                            nonce = Some(map.next_value()?);
                        }
                        "s" => {
                            if signature.is_some() {
                                return Err(de::Error::duplicate_field("s"));
                            }
                            let ipld: Ipld = map.next_value()?;
                            let Ipld::Bytes(bytes) = ipld else {
                                return Err(de::Error::custom("expected signature to be bytes"));
                            };
                            signature = Some(
                                S::try_from(bytes.as_slice())
                                    .map_err(|_| de::Error::custom("invalid signature bytes"))?,
                            );
                        }
                        other => {
                            return Err(de::Error::unknown_field(
                                other,
                                &[
                                    "att", "aud", "exp", "fct", "iss", "nbf", "nnc", "prf", "s",
                                    "v",
                                ],
                            ));
                        }
                    }
                }

                let version = version.ok_or_else(|| de::Error::missing_field("v"))?;
                let issuer = issuer.ok_or_else(|| de::Error::missing_field("iss"))?;
                let audience = audience.ok_or_else(|| de::Error::missing_field("aud"))?;
                let capabilities =
                    capabilities.ok_or_else(|| de::Error::missing_field("att"))?;
                let proofs = proofs.ok_or_else(|| de::Error::missing_field("prf"))?;
                let expiration = expiration.ok_or_else(|| de::Error::missing_field("exp"))?;
                let signature = signature.ok_or_else(|| de::Error::missing_field("s"))?;

                Ok(Payload {
                    unsigned: UnsignedPayload {
                        version,
                        issuer,
                        audience,
                        capabilities,
                        proofs,
                        facts: facts.unwrap_or_default(),
                        expiration,
                        not_before,
                        nonce,
                    },
                    signature,
                })
            }
        }

        deserializer.deserialize_map(PayloadVisitor(PhantomData))
    }
}
