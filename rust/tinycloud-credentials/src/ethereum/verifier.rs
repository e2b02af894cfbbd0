//! EIP-191 recoverable signatures and their verifier.

use super::{address::EthereumAddress, keccak256};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize};
use signature::SignatureEncoding;
use std::{fmt, str::FromStr};
use tinycloud_varsig::Verifier;

/// A 65 byte `r || s || v` secp256k1 signature as produced by wallets.
///
/// `v` may be either `0`/`1` or the legacy `27`/`28`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct EthereumSignature(pub [u8; 65]);

impl EthereumSignature {
    /// The recovery id, normalised to `0` or `1`.
    fn recovery_byte(&self) -> Option<u8> {
        match self.0[64] {
            v @ (0 | 1) => Some(v),
            v @ (27 | 28) => Some(v - 27),
            _ => None,
        }
    }
}

impl SignatureEncoding for EthereumSignature {
    type Repr = [u8; 65];
}

impl TryFrom<&[u8]> for EthereumSignature {
    type Error = signature::Error;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        <[u8; 65]>::try_from(bytes)
            .map(Self)
            .map_err(|_| signature::Error::new())
    }
}

impl From<EthereumSignature> for [u8; 65] {
    fn from(signature: EthereumSignature) -> Self {
        signature.0
    }
}

impl fmt::Display for EthereumSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for EthereumSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EthereumSignature({self})")
    }
}

impl FromStr for EthereumSignature {
    type Err = signature::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let mut bytes = [0u8; 65];
        hex::decode_to_slice(digits, &mut bytes).map_err(|_| signature::Error::new())?;
        Ok(Self(bytes))
    }
}

impl Serialize for EthereumSignature {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EthereumSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse()
            .map_err(|_| serde::de::Error::custom("expected a 65 byte hex signature"))
    }
}

/// The EIP-191 `personal_sign` digest of `message`:
/// `keccak256("\x19Ethereum Signed Message:\n" || len(message) || message)`.
#[must_use]
pub fn eip191_hash(message: &[u8]) -> [u8; 32] {
    let mut prefixed = format!("\x19Ethereum Signed Message:\n{}", message.len()).into_bytes();
    prefixed.extend_from_slice(message);
    keccak256(&prefixed)
}

/// Recover the address that produced `signature` over `message`.
///
/// # Errors
///
/// Returns [`signature::Error`] if `v` is out of range or recovery fails.
pub fn recover_address(
    message: &[u8],
    signature: &EthereumSignature,
) -> Result<EthereumAddress, signature::Error> {
    let hash = eip191_hash(message);
    let recovery = signature
        .recovery_byte()
        .and_then(RecoveryId::from_byte)
        .ok_or_else(signature::Error::new)?;
    let mut sig = Signature::from_slice(&signature.0[..64])?;
    let mut recovery = recovery;
    // k256 only accepts low-s signatures; flipping s flips the y parity.
    if let Some(normalized) = sig.normalize_s() {
        sig = normalized;
        recovery = RecoveryId::new(!recovery.is_y_odd(), recovery.is_x_reduced());
    }
    let key = VerifyingKey::recover_from_prehash(&hash, &sig, recovery)?;
    Ok(EthereumAddress::from_verifying_key(&key))
}

/// Verifies EIP-191 signatures claimed to come from one address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eip191Verifier(pub EthereumAddress);

impl Verifier<EthereumSignature> for Eip191Verifier {
    fn verify(&self, msg: &[u8], signature: &EthereumSignature) -> Result<(), signature::Error> {
        if recover_address(msg, signature)? == self.0 {
            Ok(())
        } else {
            Err(signature::Error::new())
        }
    }
}
