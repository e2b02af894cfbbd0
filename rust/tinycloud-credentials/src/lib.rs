//! Concrete key and signing types for tinycloud delegations.
//!
//! This crate provides the credential implementations that satisfy the
//! [`Signer`], [`Verifier`] and [`Resolver`] traits from `tinycloud-varsig`.
//!
//! Implementations:
//! - **Ed25519** session keys addressed by `did:key` (enabled by the
//!   `ed25519` feature, on by default)
//! - **Ethereum** wallet keys addressed by `did:pkh:eip155`, signing with
//!   EIP-191 recoverable secp256k1 signatures (enabled by the `ethereum`
//!   feature, on by default)
//!
//! [`Signer`]: tinycloud_varsig::Signer
//! [`Verifier`]: tinycloud_varsig::Verifier
//! [`Resolver`]: tinycloud_varsig::Resolver

pub mod key;

#[cfg(feature = "ed25519")]
pub mod ed25519;
#[cfg(feature = "ed25519")]
pub use ed25519::*;

#[cfg(feature = "ethereum")]
pub mod ethereum;

pub use key::Jwk;
