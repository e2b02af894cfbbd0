//! Signed delegation links.
//!
//! A chain starts with a [`RootLink`], signed by an Ethereum wallet through
//! a SIWE message, and continues with [`DerivedLink`]s, each signed by the
//! Ed25519 key of the previous link's audience. The two are verified by
//! entirely different procedures, so they are separate variants of
//! [`DelegationLink`] rather than one shape with optional fields.

use crate::{authority::SiweRootAuthority, error::LinkSignatureError, error::SiweError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{fmt, str::FromStr};
use tinycloud_capability::CapabilityGrant;
use tinycloud_credentials::{Ed25519Signature, ethereum::EthereumSignature};
use tinycloud_varsig::{Did, Principal, Resolver, Signer, Verifier};

/// Prepended to the canonical JSON of a derived link before signing.
const SIGNING_DOMAIN: &[u8] = b"tinycloud-delegation/1\n";

/// Content reference to a link: the hex SHA-256 of its canonical JSON,
/// signature included.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LinkRef([u8; 32]);

impl LinkRef {
    /// Wraps a raw digest.
    #[must_use]
    pub const fn from_bytes(digest: [u8; 32]) -> Self {
        Self(digest)
    }

    /// The raw digest.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for LinkRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for LinkRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LinkRef({self})")
    }
}

impl FromStr for LinkRef {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut digest = [0u8; 32];
        hex::decode_to_slice(s, &mut digest)?;
        Ok(Self(digest))
    }
}

impl TryFrom<String> for LinkRef {
    type Error = hex::FromHexError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<LinkRef> for String {
    fn from(link_ref: LinkRef) -> Self {
        link_ref.to_string()
    }
}

/// One signed step of a delegation chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DelegationLink {
    /// The wallet-signed first link.
    Root(RootLink),
    /// A link signed by the previous link's audience.
    Derived(DerivedLink),
}

impl DelegationLink {
    /// The delegator.
    #[must_use]
    pub fn issuer(&self) -> &Did {
        match self {
            Self::Root(link) => &link.issuer,
            Self::Derived(link) => &link.issuer,
        }
    }

    /// The delegate.
    #[must_use]
    pub fn audience(&self) -> &Did {
        match self {
            Self::Root(link) => &link.audience,
            Self::Derived(link) => &link.audience,
        }
    }

    /// The delegated capability.
    #[must_use]
    pub fn grant(&self) -> &CapabilityGrant {
        match self {
            Self::Root(link) => &link.grant,
            Self::Derived(link) => &link.grant,
        }
    }

    /// Reference to the parent link; `None` exactly for root links.
    #[must_use]
    pub fn parent(&self) -> Option<&LinkRef> {
        match self {
            Self::Root(_) => None,
            Self::Derived(link) => Some(&link.parent),
        }
    }

    /// Returns `true` for a root link.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        matches!(self, Self::Root(_))
    }

    /// The canonical JSON encoding of this link.
    #[must_use]
    pub fn to_canonical_json(&self) -> Vec<u8> {
        #[allow(clippy::expect_used)]
        serde_json::to_vec(self).expect("delegation links always serialize")
    }

    /// The reference children use to point at this link.
    #[must_use]
    pub fn link_ref(&self) -> LinkRef {
        LinkRef(Sha256::digest(self.to_canonical_json()).into())
    }
}

impl From<RootLink> for DelegationLink {
    fn from(link: RootLink) -> Self {
        Self::Root(link)
    }
}

impl From<DerivedLink> for DelegationLink {
    fn from(link: DerivedLink) -> Self {
        Self::Derived(link)
    }
}

/// The first link: the space owner's wallet authorizing a session key.
///
/// Its proof is the SIWE message and wallet signature, which carry the
/// grant as a ReCap resource and the session key DID as the message URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootLink {
    /// The wallet's `did:pkh`.
    pub issuer: Did,
    /// The session key's `did:key`.
    pub audience: Did,
    /// The granted capability.
    pub grant: CapabilityGrant,
    /// The signed SIWE message.
    pub authority: SiweRootAuthority,
}

impl RootLink {
    /// Builds the root link `authority` implies for `audience`.
    ///
    /// # Errors
    ///
    /// Returns a [`SiweError`] if the message does not encode a grant.
    pub fn new(authority: SiweRootAuthority, audience: Did) -> Result<Self, SiweError> {
        Ok(Self {
            issuer: authority.issuer(),
            audience,
            grant: authority.grant()?,
            authority,
        })
    }

    /// Checks the wallet signature and that the signed message says what
    /// this link claims: same issuer, same audience, same grant.
    ///
    /// # Errors
    ///
    /// Returns the first [`SiweError`] found.
    pub fn verify<E: Resolver<EthereumSignature>>(&self, wallets: &E) -> Result<(), SiweError> {
        let signer = self.authority.issuer();
        if self.issuer != signer {
            return Err(SiweError::IssuerMismatch {
                expected: signer,
                found: self.issuer.clone(),
            });
        }
        self.authority.verify(wallets)?;
        if self.authority.message().uri != self.audience.as_str() {
            return Err(SiweError::UriMismatch {
                expected: self.audience.clone(),
                found: self.authority.message().uri.clone(),
            });
        }
        if self.authority.grant()? != self.grant {
            return Err(SiweError::GrantMismatch);
        }
        Ok(())
    }
}

/// A link signed by an Ed25519 session or share key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedLink {
    /// The signing key's `did:key`; the parent's audience.
    pub issuer: Did,
    /// The delegate.
    pub audience: Did,
    /// The delegated capability.
    pub grant: CapabilityGrant,
    /// Reference to the parent link.
    pub parent: LinkRef,
    /// Ed25519 signature over [`DerivedLink::signing_payload`].
    #[serde(with = "base64_signature")]
    pub signature: Ed25519Signature,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SigningPayload<'a> {
    issuer: &'a Did,
    audience: &'a Did,
    grant: &'a CapabilityGrant,
    parent: &'a LinkRef,
}

impl DerivedLink {
    /// Signs a link from `issuer` to `audience`.
    ///
    /// No attenuation check happens here; [`crate::ChainBuilder::delegate`]
    /// is the checked way to extend a chain.
    ///
    /// # Errors
    ///
    /// Returns [`signature::Error`] if `issuer` cannot sign.
    pub fn sign<S: Signer<Ed25519Signature> + Principal>(
        issuer: &S,
        audience: Did,
        grant: CapabilityGrant,
        parent: LinkRef,
    ) -> Result<Self, signature::Error> {
        let issuer_did = issuer.did();
        let payload = Self::signing_payload(&issuer_did, &audience, &grant, &parent);
        let signature = issuer.sign(&payload)?;
        Ok(Self {
            issuer: issuer_did,
            audience,
            grant,
            parent,
            signature,
        })
    }

    /// The bytes a derived link signature covers.
    #[must_use]
    pub fn signing_payload(
        issuer: &Did,
        audience: &Did,
        grant: &CapabilityGrant,
        parent: &LinkRef,
    ) -> Vec<u8> {
        let payload = SigningPayload {
            issuer,
            audience,
            grant,
            parent,
        };
        let mut bytes = SIGNING_DOMAIN.to_vec();
        #[allow(clippy::expect_used)]
        serde_json::to_writer(&mut bytes, &payload).expect("signing payloads always serialize");
        bytes
    }

    /// Verifies the signature against the key the issuer DID resolves to.
    ///
    /// # Errors
    ///
    /// Returns a [`LinkSignatureError`] if the issuer does not resolve or
    /// the signature does not match.
    pub fn verify<K: Resolver<Ed25519Signature>>(&self, keys: &K) -> Result<(), LinkSignatureError> {
        let payload = Self::signing_payload(&self.issuer, &self.audience, &self.grant, &self.parent);
        keys.resolve(&self.issuer)
            .map_err(|e| LinkSignatureError::Unresolvable {
                did: self.issuer.clone(),
                reason: e.to_string(),
            })?
            .verify(&payload, &self.signature)
            .map_err(|_| LinkSignatureError::Mismatch(self.issuer.clone()))
    }
}

mod base64_signature {
    use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};
    use tinycloud_credentials::Ed25519Signature;

    pub(super) fn serialize<S: Serializer>(
        signature: &Ed25519Signature,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&URL_SAFE_NO_PAD.encode(signature.to_bytes()))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Ed25519Signature, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let bytes = URL_SAFE_NO_PAD.decode(&encoded).map_err(D::Error::custom)?;
        let bytes: [u8; 64] = bytes
            .try_into()
            .map_err(|_| D::Error::custom("ed25519 signatures are 64 bytes"))?;
        Ok(Ed25519Signature::from_bytes(&bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use testresult::TestResult;
    use tinycloud_capability::Timestamp;
    use tinycloud_credentials::{Ed25519KeyResolver, KeyMaterial};

    fn grant(path: &str, actions: &[&str]) -> CapabilityGrant {
        CapabilityGrant::new(
            path.parse().unwrap(),
            actions.iter().map(|a| a.parse().unwrap()),
            Timestamp::from_unix(2_000_000_000),
        )
        .unwrap()
    }

    fn derived(issuer: &KeyMaterial, audience: &KeyMaterial) -> DerivedLink {
        DerivedLink::sign(
            issuer,
            audience.did(),
            grant("/photos", &["kv/get"]),
            LinkRef::from_bytes([7; 32]),
        )
        .unwrap()
    }

    #[test]
    fn it_verifies_a_signed_link() -> TestResult {
        let issuer = KeyMaterial::from_seed(&[1; 32]);
        let audience = KeyMaterial::from_seed(&[2; 32]);
        derived(&issuer, &audience).verify(&Ed25519KeyResolver)?;
        Ok(())
    }

    #[test]
    fn it_detects_a_tampered_grant() {
        let issuer = KeyMaterial::from_seed(&[1; 32]);
        let audience = KeyMaterial::from_seed(&[2; 32]);
        let mut link = derived(&issuer, &audience);
        link.grant = grant("/", &["kv/get", "kv/put"]);

        assert_eq!(
            link.verify(&Ed25519KeyResolver),
            Err(LinkSignatureError::Mismatch(issuer.did()))
        );
    }

    #[test]
    fn it_detects_a_substituted_issuer() {
        let issuer = KeyMaterial::from_seed(&[1; 32]);
        let audience = KeyMaterial::from_seed(&[2; 32]);
        let mut link = derived(&issuer, &audience);
        link.issuer = audience.did();

        assert!(link.verify(&Ed25519KeyResolver).is_err());
    }

    #[test]
    fn it_round_trips_through_tagged_json() -> TestResult {
        let issuer = KeyMaterial::from_seed(&[1; 32]);
        let audience = KeyMaterial::from_seed(&[2; 32]);
        let link = DelegationLink::from(derived(&issuer, &audience));

        let json = serde_json::to_value(&link)?;
        assert_eq!(json["type"], "derived");
        assert_eq!(json["parent"], hex::encode([7; 32]));
        assert_eq!(json["grant"]["pathPrefix"], "/photos");

        let decoded: DelegationLink = serde_json::from_value(json)?;
        assert_eq!(decoded, link);
        assert_eq!(decoded.link_ref(), link.link_ref());
        Ok(())
    }

    #[test]
    fn it_changes_the_reference_with_the_signature() -> TestResult {
        let issuer = KeyMaterial::from_seed(&[1; 32]);
        let a = derived(&issuer, &KeyMaterial::from_seed(&[2; 32]));
        let b = derived(&issuer, &KeyMaterial::from_seed(&[3; 32]));

        assert_ne!(
            DelegationLink::from(a).link_ref(),
            DelegationLink::from(b).link_ref()
        );
        Ok(())
    }

    #[test]
    fn it_parses_link_refs_from_hex() -> TestResult {
        let link_ref = LinkRef::from_bytes([0xab; 32]);
        assert_eq!(link_ref.to_string().parse::<LinkRef>()?, link_ref);
        assert!("abcd".parse::<LinkRef>().is_err());
        Ok(())
    }
}
