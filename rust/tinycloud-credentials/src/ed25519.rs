//! Ed25519 key material, `did:key` identities and signer implementations.
//!
//! Session keys and share-link keys are Ed25519. Their identity is a
//! `did:key` derived purely from the public key:
//!
//! ```text
//! did:key:z<base58btc(varint(0xed) || public_key)>
//! ```
//!
//! Verifiers always recompute the DID from key bytes rather than trusting a
//! supplied value, so derivation must be deterministic.

mod error;
mod resolver;
mod signer;
mod verifier;

pub use ed25519_dalek::Signature as Ed25519Signature;
pub use error::{DidError, Ed25519ResolveError, KeyError};
pub use resolver::Ed25519KeyResolver;
pub use signer::KeyMaterial;
pub use verifier::{
    DID_KEY_PREFIX, ED25519_MULTICODEC, Ed25519Verifier, derive_did, public_key_from_did,
};

/// JWK curve name for Ed25519 keys.
pub const ED25519_CURVE: &str = "Ed25519";

/// JWK key type for octet key pairs.
pub const OKP_KEY_TYPE: &str = "OKP";
