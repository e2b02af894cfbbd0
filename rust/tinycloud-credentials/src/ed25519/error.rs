//! Error types for Ed25519 key operations.

use crate::key::JwkError;
use thiserror::Error;

/// Errors converting between public keys and `did:key` strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DidError {
    /// The public key is not 32 bytes long.
    #[error("expected a 32 byte ed25519 public key, got {0} bytes")]
    InvalidKeyLength(usize),

    /// The DID prefix, multibase prefix, base58 alphabet or multicodec varint
    /// is wrong.
    #[error("malformed did:key: {0}")]
    MalformedDid(String),

    /// The multicodec tag is well formed but is not ed25519-pub.
    #[error("unsupported did:key type: multicodec {0:#x}")]
    UnsupportedKeyType(u64),

    /// The bytes do not encode a point on the curve.
    #[error("did:key does not encode a valid ed25519 point")]
    InvalidPoint,
}

/// Errors from creating, importing or exporting [`super::KeyMaterial`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// The JWK is not an OKP/Ed25519 key with valid members.
    #[error(transparent)]
    InvalidJwk(#[from] JwkError),

    /// A private key was required but this material is public-only.
    #[error("no private key available for key {0}")]
    NoPrivateKey(String),

    /// Raw key bytes have the wrong length.
    #[error(transparent)]
    Did(#[from] DidError),

    /// The platform CSPRNG is unavailable.
    #[error("RNG error: {0}")]
    Rng(getrandom::Error),
}

/// Error type for Ed25519 DID resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Ed25519ResolveError {
    /// The DID uses a method other than `did:key`.
    #[error("cannot resolve {0} to an ed25519 key")]
    UnsupportedMethod(String),

    /// The DID could not be parsed as an Ed25519 did:key.
    #[error("invalid ed25519 did:key: {0}")]
    InvalidDid(#[from] DidError),
}
