//! DID-to-verifier resolution.

use crate::{
    did::Did,
    signature::{SignatureEncoding, Verifier},
};

/// Resolves a DID to a [`Verifier`] for signature type `S`.
///
/// Given a DID string, derives the public key material needed to verify
/// signatures. Both resolution methods used here (`did:key` and
/// `did:pkh`) are self-certifying, so resolution is synchronous.
pub trait Resolver<S: SignatureEncoding> {
    /// Error type for resolution failures.
    type Error: std::error::Error;

    /// Resolve a DID to a verifier for signature type `S`.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the DID cannot be resolved by this resolver.
    fn resolve(&self, did: &Did) -> Result<impl Verifier<S>, Self::Error>;
}

impl<S: SignatureEncoding, R: Resolver<S>> Resolver<S> for &R {
    type Error = R::Error;

    fn resolve(&self, did: &Did) -> Result<impl Verifier<S>, Self::Error> {
        (**self).resolve(did)
    }
}
