//! Ed25519 `did:key` derivation and verifier.

use super::{Ed25519Signature, error::DidError};
use base58::{FromBase58, ToBase58};
use serde::{Deserialize, Deserializer, Serialize};
use std::{fmt, str::FromStr};
use tinycloud_varsig::{Did, Principal, Verifier};

/// Prefix of every `did:key` string.
pub const DID_KEY_PREFIX: &str = "did:key:";

/// Multicodec code for `ed25519-pub`.
pub const ED25519_MULTICODEC: u64 = 0xed;

/// `ED25519_MULTICODEC` as an unsigned varint.
const ED25519_PUB_PREFIX: [u8; 2] = [0xed, 0x01];

/// Multibase prefix for base58btc.
const BASE58BTC: char = 'z';

/// Derive the `did:key` identity of a raw Ed25519 public key.
///
/// # Errors
///
/// Returns [`DidError::InvalidKeyLength`] unless `public_key` is 32 bytes.
pub fn derive_did(public_key: &[u8]) -> Result<Did, DidError> {
    let key: &[u8; 32] = public_key
        .try_into()
        .map_err(|_| DidError::InvalidKeyLength(public_key.len()))?;
    Ok(did_for(key))
}

pub(crate) fn did_for(public_key: &[u8; 32]) -> Did {
    let mut raw = Vec::with_capacity(34);
    raw.extend_from_slice(&ED25519_PUB_PREFIX);
    raw.extend_from_slice(public_key);
    let did = format!("{DID_KEY_PREFIX}{BASE58BTC}{}", raw.to_base58());
    #[allow(clippy::expect_used)]
    did.parse().expect("did:key strings are valid DIDs")
}

/// Recover the raw Ed25519 public key from a `did:key` string.
///
/// Only the canonical form [`derive_did`] produces is accepted: the
/// two-byte `ed25519-pub` varint followed by exactly 32 key bytes, with no
/// DID URL fragment. The returned bytes are not checked to be a valid curve
/// point; [`Ed25519Verifier`] does that.
///
/// # Errors
///
/// - [`DidError::MalformedDid`] if the prefix, multibase tag, base58
///   alphabet or multicodec varint is wrong, or a fragment is present
/// - [`DidError::UnsupportedKeyType`] if the multicodec is not `ed25519-pub`
/// - [`DidError::InvalidKeyLength`] if the key is not 32 bytes
pub fn public_key_from_did(did: &str) -> Result<[u8; 32], DidError> {
    let multibase = did
        .strip_prefix(DID_KEY_PREFIX)
        .ok_or_else(|| DidError::MalformedDid(format!("expected {DID_KEY_PREFIX} prefix")))?;
    if multibase.contains(['#', '?', '/']) {
        return Err(DidError::MalformedDid("unexpected DID URL component".into()));
    }
    let b58 = multibase.strip_prefix(BASE58BTC).ok_or_else(|| {
        DidError::MalformedDid(format!("expected base58btc multibase prefix '{BASE58BTC}'"))
    })?;
    let decoded = b58
        .from_base58()
        .map_err(|e| DidError::MalformedDid(format!("invalid base58btc: {e:?}")))?;

    let mut cursor: &[u8] = &decoded;
    let code = leb128::read::unsigned(&mut cursor)
        .map_err(|e| DidError::MalformedDid(format!("invalid multicodec varint: {e}")))?;
    if code != ED25519_MULTICODEC {
        return Err(DidError::UnsupportedKeyType(code));
    }
    if !decoded.starts_with(&ED25519_PUB_PREFIX) {
        return Err(DidError::MalformedDid("non-minimal multicodec varint".into()));
    }

    <[u8; 32]>::try_from(&decoded[ED25519_PUB_PREFIX.len()..])
        .map_err(|_| DidError::InvalidKeyLength(decoded.len() - ED25519_PUB_PREFIX.len()))
}

/// An Ed25519 public key, identified by its `did:key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ed25519Verifier(pub ed25519_dalek::VerifyingKey);

impl Ed25519Verifier {
    /// Build a verifier from raw public key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DidError::InvalidKeyLength`] or [`DidError::InvalidPoint`].
    pub fn from_bytes(public_key: &[u8]) -> Result<Self, DidError> {
        let key: &[u8; 32] = public_key
            .try_into()
            .map_err(|_| DidError::InvalidKeyLength(public_key.len()))?;
        ed25519_dalek::VerifyingKey::from_bytes(key)
            .map(Self)
            .map_err(|_| DidError::InvalidPoint)
    }

    /// Raw public key bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }
}

impl From<ed25519_dalek::VerifyingKey> for Ed25519Verifier {
    fn from(key: ed25519_dalek::VerifyingKey) -> Self {
        Self(key)
    }
}

impl From<&ed25519_dalek::SigningKey> for Ed25519Verifier {
    fn from(key: &ed25519_dalek::SigningKey) -> Self {
        Self(key.verifying_key())
    }
}

impl fmt::Display for Ed25519Verifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", did_for(self.0.as_bytes()))
    }
}

impl FromStr for Ed25519Verifier {
    type Err = DidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(&public_key_from_did(s)?)
    }
}

impl Verifier<Ed25519Signature> for Ed25519Verifier {
    fn verify(&self, msg: &[u8], signature: &Ed25519Signature) -> Result<(), signature::Error> {
        self.0.verify_strict(msg, signature)
    }
}

impl Principal for Ed25519Verifier {
    fn did(&self) -> Did {
        did_for(self.0.as_bytes())
    }
}

impl Serialize for Ed25519Verifier {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Ed25519Verifier {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let did = String::deserialize(deserializer)?;
        did.parse().map_err(serde::de::Error::custom)
    }
}
