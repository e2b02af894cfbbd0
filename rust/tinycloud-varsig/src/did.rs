//! DID (Decentralized Identifier) types.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// A [Decentralized Identifier][spec] string.
///
/// Wraps a raw DID string like `did:key:z6Mk...` or
/// `did:pkh:eip155:1:0xAb...`. Use [`method()`][Did::method] to inspect the
/// DID method at runtime.
///
/// [spec]: https://www.w3.org/TR/did-core/
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Did(String);

impl Did {
    /// Get the raw DID string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the DID method name (e.g. `"key"` for `did:key:...`,
    /// `"pkh"` for `did:pkh:...`).
    #[must_use]
    pub fn method(&self) -> &str {
        let after_did = &self.0["did:".len()..];
        after_did.split(':').next().unwrap_or_default()
    }

    /// Returns everything after `did:<method>:`.
    #[must_use]
    pub fn identifier(&self) -> &str {
        let after_did = &self.0["did:".len()..];
        after_did
            .split_once(':')
            .map(|(_, identifier)| identifier)
            .unwrap_or_default()
    }
}

impl AsRef<str> for Did {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&Did> for Did {
    fn from(did: &Did) -> Self {
        did.clone()
    }
}

impl fmt::Debug for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error when parsing a DID string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid DID: {0}")]
pub struct DidParseError(pub String);

impl FromStr for Did {
    type Err = DidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(rest) = s.strip_prefix("did:") else {
            return Err(DidParseError(format!("expected did: prefix, got: {s}")));
        };
        // Must have at least did:method:identifier
        match rest.split_once(':') {
            Some((method, identifier)) if !method.is_empty() && !identifier.is_empty() => {
                Ok(Did(s.to_string()))
            }
            _ => Err(DidParseError(format!(
                "expected did:method:identifier, got: {s}"
            ))),
        }
    }
}

impl TryFrom<String> for Did {
    type Error = DidParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl Serialize for Did {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Did {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testresult::TestResult;

    #[test]
    fn it_parses_method_and_identifier() -> TestResult {
        let did: Did = "did:pkh:eip155:1:0xb9c5714089478a327f09197987f16f9e5d936e8a".parse()?;
        assert_eq!(did.method(), "pkh");
        assert_eq!(
            did.identifier(),
            "eip155:1:0xb9c5714089478a327f09197987f16f9e5d936e8a"
        );
        Ok(())
    }

    #[test]
    fn it_rejects_strings_without_method() {
        assert!("did:".parse::<Did>().is_err());
        assert!("did:key".parse::<Did>().is_err());
        assert!("did::abc".parse::<Did>().is_err());
        assert!("key:z6Mk".parse::<Did>().is_err());
    }

    #[test]
    fn it_serializes_as_a_plain_string() -> TestResult {
        let did: Did = "did:key:z6MkhaXgBZDvotDkL5257faiztiGiC2QtKLGpbnnEGta2doK".parse()?;
        let json = serde_json::to_string(&did)?;
        assert_eq!(
            json,
            "\"did:key:z6MkhaXgBZDvotDkL5257faiztiGiC2QtKLGpbnnEGta2doK\""
        );
        let back: Did = serde_json::from_str(&json)?;
        assert_eq!(back, did);
        assert!(serde_json::from_str::<Did>("\"not-a-did\"").is_err());
        Ok(())
    }
}
