//! Share tokens: a one-hop delegation and its private key in a URL-safe
//! string.
//!
//! # Security
//!
//! A share token embeds the **private** key of the delegation's audience.
//! Anyone holding the token can exercise the shared capability, offline,
//! without contacting the sharer: the token is a bearer credential exactly
//! as powerful as the grant it carries. Share narrowly scoped, short-lived
//! grants, and treat tokens like passwords.
//!
//! # Format
//!
//! ```text
//! tc1:<base64url(JSON)>
//!
//! {
//!   "key":        { "kty": "OKP", "crv": "Ed25519", "x": "...", "d": "..." },
//!   "keyDid":     "did:key:z6Mk...",
//!   "delegation": { "type": "derived", ... },
//!   "path":       "/photos/vacation.jpg",
//!   "host":       "https://node.tinycloud.xyz/",
//!   "spaceId":    "tinycloud:pkh:eip155:1:0x...:default",
//!   "version":    1
//! }
//! ```

use crate::{
    chain::DelegationChain,
    error::TokenError,
    link::DelegationLink,
    space::{HostContext, SpaceId},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tinycloud_capability::ResourcePath;
use tinycloud_credentials::{Jwk, KeyMaterial};
use tinycloud_varsig::{Did, Principal};
use url::Url;

/// Prefix of version 1 tokens.
pub const TOKEN_PREFIX: &str = "tc1:";

/// The payload version this codec reads and writes.
pub const TOKEN_VERSION: u64 = 1;

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenPayload {
    key: Jwk,
    key_did: Did,
    delegation: DelegationLink,
    path: ResourcePath,
    host: Url,
    space_id: SpaceId,
    version: u64,
}

/// A decoded share token.
///
/// `chain` holds only the shared link. It is not verified by decoding:
/// run [`crate::ChainVerifier`] with a proof store that knows its parents
/// before trusting it.
#[derive(Debug, Clone)]
pub struct SharedDelegation {
    /// The one-link chain fragment.
    pub chain: DelegationChain,
    /// The share key, private half included.
    pub key: KeyMaterial,
    /// Where to redeem the token.
    pub context: HostContext,
    /// The shared path.
    pub path: ResourcePath,
}

/// Encodes and decodes share tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShareTokenCodec;

impl ShareTokenCodec {
    /// Encodes the last link of `chain` together with `ephemeral_key`, the
    /// key it delegates to.
    ///
    /// The private half of `ephemeral_key` is written into the token. See
    /// the [module documentation](self).
    ///
    /// # Errors
    ///
    /// - [`TokenError::KeyMismatch`] if `ephemeral_key` does not hold `chain`
    /// - [`TokenError::Key`] if `ephemeral_key` has no private key
    pub fn encode(
        chain: &DelegationChain,
        ephemeral_key: &KeyMaterial,
        context: &HostContext,
    ) -> Result<String, TokenError> {
        let key_did = ephemeral_key.did();
        if &key_did != chain.holder() {
            return Err(TokenError::KeyMismatch {
                expected: chain.holder().clone(),
                found: key_did,
            });
        }
        let payload = TokenPayload {
            key: ephemeral_key.export_jwk(true)?,
            key_did,
            delegation: chain.last().clone(),
            path: chain.grant().path_prefix().clone(),
            host: context.host.clone(),
            space_id: context.space_id.clone(),
            version: TOKEN_VERSION,
        };
        let json = serde_json::to_vec(&payload)
            .map_err(|e| TokenError::MalformedToken(e.to_string()))?;
        Ok(format!("{TOKEN_PREFIX}{}", URL_SAFE_NO_PAD.encode(json)))
    }

    /// Decodes a share token. The `tc1:` prefix is optional.
    ///
    /// # Errors
    ///
    /// - [`TokenError::UnsupportedVersion`] for any other `tc<N>:` prefix
    ///   or payload version
    /// - [`TokenError::MalformedToken`] for anything structurally wrong,
    ///   including a key that does not match the delegation audience
    pub fn decode(token: &str) -> Result<SharedDelegation, TokenError> {
        let token = token.trim();
        let body = match token.strip_prefix(TOKEN_PREFIX) {
            Some(body) => body,
            None => {
                if let Some(prefix) = version_prefix(token) {
                    return Err(TokenError::UnsupportedVersion(prefix.to_string()));
                }
                token
            }
        };

        let malformed = TokenError::MalformedToken;
        let json = URL_SAFE_NO_PAD
            .decode(body.trim_end_matches('='))
            .map_err(|e| malformed(format!("invalid base64url: {e}")))?;
        let value: Value =
            serde_json::from_slice(&json).map_err(|e| malformed(format!("invalid JSON: {e}")))?;
        match value.get("version").and_then(Value::as_u64) {
            Some(TOKEN_VERSION) => {}
            Some(version) => return Err(TokenError::UnsupportedVersion(version.to_string())),
            None => return Err(malformed("missing version".into())),
        }
        let payload: TokenPayload =
            serde_json::from_value(value).map_err(|e| malformed(e.to_string()))?;

        let key = KeyMaterial::import_jwk(&payload.key)
            .map_err(|e| malformed(format!("invalid share key: {e}")))?;
        if !key.has_private_key() {
            return Err(malformed("share key has no private key".into()));
        }
        if key.did() != payload.key_did {
            return Err(malformed("keyDid does not match the share key".into()));
        }
        if payload.delegation.audience() != &payload.key_did {
            return Err(malformed("delegation is not addressed to the share key".into()));
        }
        if !payload.delegation.grant().path_prefix().contains(&payload.path) {
            return Err(malformed("path is outside the delegated scope".into()));
        }

        Ok(SharedDelegation {
            chain: DelegationChain::new(payload.delegation),
            key,
            context: HostContext {
                host: payload.host,
                space_id: payload.space_id,
            },
            path: payload.path,
        })
    }
}

/// `Some("tc<N>:")` if `token` starts with a version prefix.
fn version_prefix(token: &str) -> Option<&str> {
    let (prefix, _) = token.split_once(':')?;
    let version = prefix.strip_prefix("tc")?;
    (!version.is_empty() && version.bytes().all(|b| b.is_ascii_digit()))
        .then(|| &token[..=prefix.len()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use testresult::TestResult;

    #[test]
    fn it_recognizes_other_versions() {
        assert_eq!(version_prefix("tc2:abc"), Some("tc2:"));
        assert_eq!(version_prefix("tc10:abc"), Some("tc10:"));
        assert_eq!(version_prefix("eyJrZXkiOnt9fQ"), None);
        assert_eq!(version_prefix("tcx:abc"), None);
    }

    #[test]
    fn it_rejects_unknown_prefixes() {
        assert_eq!(
            ShareTokenCodec::decode("tc2:eyJ2ZXJzaW9uIjoyfQ").unwrap_err(),
            TokenError::UnsupportedVersion("tc2:".into())
        );
    }

    #[test]
    fn it_rejects_unknown_payload_versions() -> TestResult {
        let token = format!("tc1:{}", URL_SAFE_NO_PAD.encode(br#"{"version":2}"#));
        assert_eq!(
            ShareTokenCodec::decode(&token).unwrap_err(),
            TokenError::UnsupportedVersion("2".into())
        );
        Ok(())
    }

    #[test]
    fn it_rejects_garbage() {
        for token in ["tc1:", "tc1:!!!", "tc1:e30", "not a token"] {
            assert!(
                matches!(
                    ShareTokenCodec::decode(token),
                    Err(TokenError::MalformedToken(_))
                ),
                "{token} should be malformed"
            );
        }
    }
}
