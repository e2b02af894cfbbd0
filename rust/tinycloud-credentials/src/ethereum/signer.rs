//! secp256k1 wallet signer.

use super::{
    address::EthereumAddress,
    verifier::{EthereumSignature, eip191_hash},
};
use k256::ecdsa::SigningKey;
use std::fmt;
use tinycloud_varsig::{Did, Signer};

/// An Ethereum wallet key that signs EIP-191 `personal_sign` messages.
///
/// Browser and CLI collaborators normally sign with an external wallet;
/// this type exists for headless environments that hold the key directly.
#[derive(Clone)]
pub struct EthereumSigner {
    key: SigningKey,
    address: EthereumAddress,
}

impl EthereumSigner {
    /// Import a raw 32 byte secret key.
    ///
    /// # Errors
    ///
    /// Returns [`signature::Error`] if the bytes are not a valid scalar.
    pub fn from_slice(secret: &[u8]) -> Result<Self, signature::Error> {
        Ok(SigningKey::from_slice(secret)?.into())
    }

    /// Import a hex secret key, with or without a `0x` prefix.
    ///
    /// # Errors
    ///
    /// Returns [`signature::Error`] if the hex or the scalar is invalid.
    pub fn from_hex(secret: &str) -> Result<Self, signature::Error> {
        let digits = secret.strip_prefix("0x").unwrap_or(secret);
        let bytes = hex::decode(digits).map_err(|_| signature::Error::new())?;
        Self::from_slice(&bytes)
    }

    /// Generate a random wallet key.
    ///
    /// # Errors
    ///
    /// Returns [`signature::Error`] if the CSPRNG is unavailable.
    pub fn generate() -> Result<Self, signature::Error> {
        let mut secret = [0u8; 32];
        getrandom::getrandom(&mut secret).map_err(|_| signature::Error::new())?;
        Self::from_slice(&secret)
    }

    /// The wallet's address.
    #[must_use]
    pub const fn address(&self) -> EthereumAddress {
        self.address
    }

    /// The wallet's `did:pkh` on `chain_id`.
    #[must_use]
    pub fn did(&self, chain_id: u64) -> Did {
        self.address.to_did(chain_id)
    }
}

impl From<SigningKey> for EthereumSigner {
    fn from(key: SigningKey) -> Self {
        let address = EthereumAddress::from_verifying_key(key.verifying_key());
        Self { key, address }
    }
}

impl fmt::Debug for EthereumSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EthereumSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl Signer<EthereumSignature> for EthereumSigner {
    fn sign(&self, msg: &[u8]) -> Result<EthereumSignature, signature::Error> {
        let (signature, recovery) = self.key.sign_prehash_recoverable(&eip191_hash(msg))?;
        let mut bytes = [0u8; 65];
        bytes[..64].copy_from_slice(&signature.to_bytes());
        bytes[64] = recovery.to_byte() + 27;
        Ok(EthereumSignature(bytes))
    }
}
