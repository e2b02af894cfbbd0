//! `did:pkh` resolver.

use super::{
    address::EthereumAddress,
    error::PkhResolveError,
    verifier::{Eip191Verifier, EthereumSignature},
};
use tinycloud_varsig::{Did, Resolver, Verifier};

/// Resolves `did:pkh:eip155` DIDs to EIP-191 verifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct PkhResolver;

impl Resolver<EthereumSignature> for PkhResolver {
    type Error = PkhResolveError;

    fn resolve(&self, did: &Did) -> Result<impl Verifier<EthereumSignature>, Self::Error> {
        if did.method() != "pkh" {
            return Err(PkhResolveError::UnsupportedMethod(did.to_string()));
        }
        let (_, address) = EthereumAddress::from_did(did)?;
        Ok(Eip191Verifier(address))
    }
}
