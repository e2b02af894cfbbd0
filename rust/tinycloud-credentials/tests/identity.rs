//! Key material and identity derivation across both key families.

use pretty_assertions::assert_eq;
use testresult::TestResult;
use tinycloud_credentials::{
    DidError, Ed25519KeyResolver, Jwk, KeyMaterial, derive_did,
    ethereum::{EthereumSigner, PkhResolver},
    public_key_from_did,
};
use tinycloud_varsig::{Principal, Resolver, Signer, Verifier};

#[test]
fn it_derives_the_same_did_from_every_representation() -> TestResult {
    let key = KeyMaterial::from_seed(&[11; 32]);

    let from_bytes = derive_did(&key.public_key())?;
    let from_verifier = key.verifier().did();
    let from_jwk = KeyMaterial::import_jwk(&key.export_jwk(false)?)?.did();

    assert_eq!(from_bytes, key.did());
    assert_eq!(from_verifier, key.did());
    assert_eq!(from_jwk, key.did());
    assert_eq!(public_key_from_did(key.did().as_str())?, key.public_key());
    Ok(())
}

#[test]
fn it_reads_a_persisted_key_file() -> TestResult {
    let stored = KeyMaterial::from_seed(&[12; 32]).export_jwk(true)?.to_string();

    let jwk: Jwk = stored.parse()?;
    let key = KeyMaterial::import_jwk(&jwk)?;
    let signature = key.sign(b"persisted")?;

    Ed25519KeyResolver
        .resolve(&key.did())?
        .verify(b"persisted", &signature)?;
    Ok(())
}

#[test]
fn it_rejects_short_public_keys() {
    assert_eq!(derive_did(&[0; 31]), Err(DidError::InvalidKeyLength(31)));
}

#[test]
fn it_keeps_session_and_wallet_resolvers_apart() -> TestResult {
    let session = KeyMaterial::from_seed(&[13; 32]);
    let wallet = EthereumSigner::from_slice(&[14; 32])?;

    assert!(PkhResolver.resolve(&session.did()).is_err());
    assert!(Ed25519KeyResolver.resolve(&wallet.did(1)).is_err());

    let signature = wallet.sign(b"sign in")?;
    PkhResolver
        .resolve(&wallet.did(1))?
        .verify(b"sign in", &signature)?;
    Ok(())
}
