//! Signature creation and verification traits.
//!
//! Both traits are synchronous: signing and verifying are pure computation
//! over bytes and never touch the network or disk.

pub use ::signature::{Error, SignatureEncoding};

/// Produces a cryptographic signature of type `S` over a payload.
pub trait Signer<S: SignatureEncoding> {
    /// Sign `payload` and return the signature.
    ///
    /// # Errors
    ///
    /// Returns [`Error`] if the key cannot sign (e.g. it is public-only).
    fn sign(&self, payload: &[u8]) -> Result<S, Error>;
}

/// Verifies that a signature of type `S` is valid for a given payload.
///
/// Generic over `S` so a single principal can verify several signature
/// algorithms.
pub trait Verifier<S: SignatureEncoding> {
    /// Verify that `signature` is valid for `payload`.
    ///
    /// # Errors
    ///
    /// Returns [`Error`] when the signature does not verify.
    fn verify(&self, payload: &[u8], signature: &S) -> Result<(), Error>;
}

impl<S: SignatureEncoding, T: Signer<S>> Signer<S> for &T {
    fn sign(&self, payload: &[u8]) -> Result<S, Error> {
        (**self).sign(payload)
    }
}

impl<S: SignatureEncoding, T: Verifier<S>> Verifier<S> for &T {
    fn verify(&self, payload: &[u8], signature: &S) -> Result<(), Error> {
        (**self).verify(payload, signature)
    }
}
