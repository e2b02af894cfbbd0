//! EIP-55 checksummed Ethereum addresses.

use super::{error::AddressError, keccak256};
use k256::{ecdsa::VerifyingKey, elliptic_curve::sec1::ToEncodedPoint};
use serde::{Deserialize, Deserializer, Serialize};
use std::{fmt, str::FromStr};
use tinycloud_varsig::Did;

/// Prefix of an eip155 `did:pkh`.
pub const PKH_EIP155_PREFIX: &str = "did:pkh:eip155:";

/// A 20 byte Ethereum account address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EthereumAddress(pub [u8; 20]);

impl EthereumAddress {
    /// Derive the address of a secp256k1 public key: the last 20 bytes of
    /// the Keccak-256 hash of the uncompressed point (without its `0x04` tag).
    #[must_use]
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        let point = key.as_affine().to_encoded_point(false);
        let hash = keccak256(&point.as_bytes()[1..]);
        let mut address = [0u8; 20];
        address.copy_from_slice(&hash[12..]);
        Self(address)
    }

    /// The `did:pkh` identity of this account on `chain_id`.
    #[must_use]
    pub fn to_did(&self, chain_id: u64) -> Did {
        #[allow(clippy::expect_used)]
        format!("{PKH_EIP155_PREFIX}{chain_id}:{self}")
            .parse()
            .expect("did:pkh strings are valid DIDs")
    }

    /// Split a `did:pkh:eip155:<chain id>:<address>` into its parts.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::MalformedPkh`] or an address error.
    pub fn from_did(did: &Did) -> Result<(u64, Self), AddressError> {
        let rest = did
            .as_str()
            .strip_prefix(PKH_EIP155_PREFIX)
            .ok_or_else(|| AddressError::MalformedPkh(did.to_string()))?;
        let (chain_id, address) = rest
            .split_once(':')
            .ok_or_else(|| AddressError::MalformedPkh(did.to_string()))?;
        let chain_id = chain_id
            .parse()
            .map_err(|_| AddressError::MalformedPkh(did.to_string()))?;
        Ok((chain_id, address.parse()?))
    }

    /// EIP-55 mixed-case checksum encoding, `0x` prefixed.
    #[must_use]
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = keccak256(lower.as_bytes());
        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = (hash[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0f;
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }
}

impl fmt::Display for EthereumAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl fmt::Debug for EthereumAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl FromStr for EthereumAddress {
    type Err = AddressError;

    /// Accepts all-lowercase, all-uppercase or correctly checksummed input.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .ok_or_else(|| AddressError::Malformed(s.to_string()))?;
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|_| AddressError::Malformed(s.to_string()))?;
        let address = Self(bytes);

        let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
        if has_lower && has_upper && address.to_checksum() != s {
            return Err(AddressError::Checksum(s.to_string()));
        }
        Ok(address)
    }
}

impl Serialize for EthereumAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_checksum())
    }
}

impl<'de> Deserialize<'de> for EthereumAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testresult::TestResult;

    // Test vectors from EIP-55.
    const CHECKSUMMED: [&str; 4] = [
        "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
        "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
        "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
        "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
    ];

    #[test]
    fn it_produces_eip55_checksums() -> TestResult {
        for expected in CHECKSUMMED {
            let address: EthereumAddress = expected.to_lowercase().parse()?;
            assert_eq!(address.to_string(), expected);
        }
        Ok(())
    }

    #[test]
    fn it_rejects_a_bad_checksum() {
        let bad = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAeD";
        assert_eq!(
            bad.parse::<EthereumAddress>(),
            Err(AddressError::Checksum(bad.into()))
        );
    }

    #[test]
    fn it_rejects_malformed_input() {
        assert!("5aaeb6053f3e94c9b9a09f33669435e7ef1beaed".parse::<EthereumAddress>().is_err());
        assert!("0x5aaeb6".parse::<EthereumAddress>().is_err());
        assert!("0xzzaeb6053f3e94c9b9a09f33669435e7ef1beaed".parse::<EthereumAddress>().is_err());
    }

    #[test]
    fn it_round_trips_through_did_pkh() -> TestResult {
        let address: EthereumAddress = CHECKSUMMED[0].parse()?;
        let did = address.to_did(1);
        assert_eq!(
            did.as_str(),
            "did:pkh:eip155:1:0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"
        );
        assert_eq!(EthereumAddress::from_did(&did)?, (1, address));
        Ok(())
    }

    #[test]
    fn it_derives_the_address_of_a_known_key() -> TestResult {
        // Private key 0x...01 controls this well known address.
        let mut secret = [0u8; 32];
        secret[31] = 1;
        let key = k256::ecdsa::SigningKey::from_slice(&secret)?;
        let address = EthereumAddress::from_verifying_key(key.verifying_key());
        assert_eq!(
            address.to_string(),
            "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf"
        );
        Ok(())
    }
}
