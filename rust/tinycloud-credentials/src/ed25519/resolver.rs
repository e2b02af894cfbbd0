//! Ed25519 DID key resolver.

use super::{
    Ed25519Signature,
    error::{DidError, Ed25519ResolveError},
    verifier::Ed25519Verifier,
};
use tinycloud_varsig::{Did, Principal, Resolver, Verifier};

/// Resolves `did:key` strings to Ed25519 verifiers.
///
/// Resolution is a pure recomputation of the public key from the DID. A DID
/// only resolves if it is exactly the one its key derives, so each key has
/// one identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519KeyResolver;

impl Resolver<Ed25519Signature> for Ed25519KeyResolver {
    type Error = Ed25519ResolveError;

    fn resolve(&self, did: &Did) -> Result<impl Verifier<Ed25519Signature>, Self::Error> {
        if did.method() != "key" {
            return Err(Ed25519ResolveError::UnsupportedMethod(did.to_string()));
        }
        let verifier: Ed25519Verifier = did.as_str().parse()?;
        if &verifier.did() != did {
            return Err(DidError::MalformedDid(format!("{did} is not in canonical form")).into());
        }
        Ok(verifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ed25519::KeyMaterial;
    use testresult::TestResult;
    use tinycloud_varsig::{Principal, Signer};

    #[test]
    fn it_resolves_a_did_key_to_a_working_verifier() -> TestResult {
        let key = KeyMaterial::from_seed(&[5; 32]);
        let signature = key.sign(b"hello")?;
        let did = key.did();
        let verifier = Ed25519KeyResolver.resolve(&did)?;
        verifier.verify(b"hello", &signature)?;
        Ok(())
    }

    #[test]
    fn it_refuses_aliases_of_a_key() -> TestResult {
        let key = KeyMaterial::from_seed(&[5; 32]);
        let fragment: Did = format!("{}#alias", key.did()).parse()?;
        assert!(matches!(
            Ed25519KeyResolver.resolve(&fragment),
            Err(Ed25519ResolveError::InvalidDid(_))
        ));
        Ok(())
    }

    #[test]
    fn it_refuses_other_methods() -> TestResult {
        let did: Did = "did:pkh:eip155:1:0x0000000000000000000000000000000000000000".parse()?;
        assert!(matches!(
            Ed25519KeyResolver.resolve(&did),
            Err(Ed25519ResolveError::UnsupportedMethod(_))
        ));
        Ok(())
    }
}
