//! Error types for Ethereum identities.

use thiserror::Error;

/// Errors parsing an [`super::EthereumAddress`] or `did:pkh`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// Not `0x` followed by 40 hex digits.
    #[error("malformed ethereum address: {0}")]
    Malformed(String),

    /// Mixed-case address whose EIP-55 checksum does not match.
    #[error("ethereum address {0} fails its EIP-55 checksum")]
    Checksum(String),

    /// Not a `did:pkh:eip155:<chain id>:<address>` DID.
    #[error("malformed did:pkh: {0}")]
    MalformedPkh(String),
}

/// Error type for `did:pkh` resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PkhResolveError {
    /// The DID uses a method other than `did:pkh`.
    #[error("cannot resolve {0} to an ethereum account")]
    UnsupportedMethod(String),

    /// The DID is not a valid eip155 `did:pkh`.
    #[error(transparent)]
    InvalidDid(#[from] AddressError),
}
