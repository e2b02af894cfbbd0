//! Ethereum wallet identities and EIP-191 signatures.
//!
//! The root of every delegation chain is an Ethereum account. Its identity
//! is a `did:pkh:eip155:<chain id>:<address>` DID and its signature is a
//! 65 byte recoverable secp256k1 signature over an EIP-191
//! `personal_sign` digest. Verification recovers the signing address and
//! compares it with the claimed one.

mod address;
mod error;
mod resolver;
mod signer;
mod verifier;

pub use address::{EthereumAddress, PKH_EIP155_PREFIX};
pub use error::{AddressError, PkhResolveError};
pub use resolver::PkhResolver;
pub use signer::EthereumSigner;
pub use verifier::{Eip191Verifier, EthereumSignature, eip191_hash, recover_address};

use sha3::{Digest, Keccak256};

/// Keccak-256, Ethereum's hash function.
#[must_use]
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}
