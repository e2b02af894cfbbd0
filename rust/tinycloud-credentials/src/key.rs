//! JSON Web Key import/export types.
//!
//! Key files persisted by profile storage and the key embedded in a share
//! token both use this representation: `{kty, crv, x, d?, kid?}` with
//! base64url (unpadded) members.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Error produced when a JWK is structurally invalid for the requested use.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid JWK: {0}")]
pub struct JwkError(pub String);

/// A JSON Web Key ([RFC 7517]) for an octet key pair.
///
/// The private member `d` is never printed by the [`Debug`] impl.
///
/// [RFC 7517]: https://www.rfc-editor.org/rfc/rfc7517
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type, `"OKP"` for Ed25519.
    pub kty: String,

    /// Curve name, `"Ed25519"` for session keys.
    pub crv: String,

    /// Public key, base64url.
    pub x: String,

    /// Private key seed, base64url.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,

    /// Key identifier.
    #[serde(rename = "kid", default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
}

impl Jwk {
    /// Build an `OKP` key with the given curve from raw public (and
    /// optionally private) bytes.
    #[must_use]
    pub fn okp(crv: &str, public_key: &[u8], private_key: Option<&[u8]>) -> Self {
        Self {
            kty: "OKP".into(),
            crv: crv.into(),
            x: URL_SAFE_NO_PAD.encode(public_key),
            d: private_key.map(|d| URL_SAFE_NO_PAD.encode(d)),
            key_id: None,
        }
    }

    /// Set the `kid` member.
    #[must_use]
    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }

    /// Require `kty` and `crv` to have the given values.
    ///
    /// # Errors
    ///
    /// Returns [`JwkError`] naming the mismatching member.
    pub fn expect_type(&self, kty: &str, crv: &str) -> Result<(), JwkError> {
        if self.kty != kty {
            return Err(JwkError(format!("expected kty {kty}, got {}", self.kty)));
        }
        if self.crv != crv {
            return Err(JwkError(format!("expected crv {crv}, got {}", self.crv)));
        }
        Ok(())
    }

    /// Decode the public member `x` into exactly `N` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`JwkError`] if `x` is not base64url or has the wrong length.
    pub fn public_bytes<const N: usize>(&self) -> Result<[u8; N], JwkError> {
        decode_member("x", &self.x)
    }

    /// Decode the private member `d`, if present, into exactly `N` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`JwkError`] if `d` is present but not base64url or has the
    /// wrong length.
    pub fn private_bytes<const N: usize>(&self) -> Result<Option<[u8; N]>, JwkError> {
        self.d.as_deref().map(|d| decode_member("d", d)).transpose()
    }
}

fn decode_member<const N: usize>(name: &str, value: &str) -> Result<[u8; N], JwkError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|e| JwkError(format!("member {name} is not base64url: {e}")))?;
    <[u8; N]>::try_from(bytes.as_slice()).map_err(|_| {
        JwkError(format!(
            "member {name} decodes to {} bytes, expected {N}",
            bytes.len()
        ))
    })
}

impl fmt::Debug for Jwk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Jwk")
            .field("kty", &self.kty)
            .field("crv", &self.crv)
            .field("x", &self.x)
            .field("d", &self.d.as_ref().map(|_| "<redacted>"))
            .field("kid", &self.key_id)
            .finish()
    }
}

impl FromStr for Jwk {
    type Err = JwkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s).map_err(|e| JwkError(format!("not a JWK object: {e}")))
    }
}

impl fmt::Display for Jwk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testresult::TestResult;

    #[test]
    fn it_parses_a_key_file() -> TestResult {
        let jwk: Jwk = r#"{"kty":"OKP","crv":"Ed25519","x":"AQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQE","kid":"default"}"#
            .parse()?;
        jwk.expect_type("OKP", "Ed25519")?;
        assert_eq!(jwk.public_bytes::<32>()?, [1u8; 32]);
        assert_eq!(jwk.private_bytes::<32>()?, None);
        assert_eq!(jwk.key_id.as_deref(), Some("default"));
        Ok(())
    }

    #[test]
    fn it_rejects_wrong_length_members() {
        let jwk = Jwk::okp("Ed25519", &[1u8; 31], None);
        assert!(jwk.public_bytes::<32>().is_err());
    }

    #[test]
    fn it_never_prints_the_private_member() {
        let jwk = Jwk::okp("Ed25519", &[1u8; 32], Some(&[9u8; 32]));
        let debug = format!("{jwk:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains(jwk.d.as_deref().unwrap_or_default()));
    }
}
