//! Ed25519 key material: generation, JWK import/export and signing.

use super::{
    ED25519_CURVE, Ed25519Signature, OKP_KEY_TYPE,
    error::KeyError,
    verifier::{Ed25519Verifier, did_for},
};
use crate::key::{Jwk, JwkError};
use std::fmt;
use tinycloud_varsig::{Did, Principal, Signer};

/// An Ed25519 keypair, or a public-only reference to one.
///
/// The public key is always derived from the private key when one is
/// present, and neither changes after construction. Only the DID (a public
/// derivation) ever leaves this type in a delegation link.
#[derive(Clone)]
pub struct KeyMaterial {
    key_id: String,
    verifier: Ed25519Verifier,
    signing_key: Option<ed25519_dalek::SigningKey>,
}

impl KeyMaterial {
    /// Key id assigned when none is given.
    pub const DEFAULT_KEY_ID: &'static str = "default";

    /// Generate a fresh keypair from a random 32 byte seed.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Rng`] if the platform CSPRNG is unavailable.
    pub fn generate() -> Result<Self, KeyError> {
        let mut seed = [0u8; 32];
        getrandom::getrandom(&mut seed).map_err(KeyError::Rng)?;
        Ok(Self::from_seed(&seed))
    }

    /// Deterministically derive a keypair from a 32 byte seed.
    #[must_use]
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        ed25519_dalek::SigningKey::from_bytes(seed).into()
    }

    /// Build a public-only reference from raw public key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Did`] if the bytes are not a valid public key.
    pub fn from_public_key(public_key: &[u8]) -> Result<Self, KeyError> {
        Ok(Ed25519Verifier::from_bytes(public_key)?.into())
    }

    /// Import a key from a JWK.
    ///
    /// Requires `kty == "OKP"`, `crv == "Ed25519"`, a 32 byte `x` and, if
    /// present, a 32 byte `d` whose public key equals `x`. A `kid` member
    /// becomes the key id.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidJwk`] on any of the above violations.
    pub fn import_jwk(jwk: &Jwk) -> Result<Self, KeyError> {
        jwk.expect_type(OKP_KEY_TYPE, ED25519_CURVE)?;
        let x = jwk.public_bytes::<32>()?;
        let verifier = Ed25519Verifier::from_bytes(&x)
            .map_err(|e| JwkError(format!("member x is not an ed25519 public key: {e}")))?;

        let mut material = match jwk.private_bytes::<32>()? {
            Some(d) => {
                let material = Self::from_seed(&d);
                if material.verifier != verifier {
                    return Err(JwkError("member x does not match member d".into()).into());
                }
                material
            }
            None => Self::from(verifier),
        };
        if let Some(key_id) = &jwk.key_id {
            material.key_id.clone_from(key_id);
        }
        Ok(material)
    }

    /// Export this key as a JWK.
    ///
    /// `x` is always emitted; `d` only when `include_private` is set.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::NoPrivateKey`] if private export is requested for
    /// public-only material.
    pub fn export_jwk(&self, include_private: bool) -> Result<Jwk, KeyError> {
        let private_key = if include_private {
            let key = self
                .signing_key
                .as_ref()
                .ok_or_else(|| KeyError::NoPrivateKey(self.key_id.clone()))?;
            Some(key.to_bytes())
        } else {
            None
        };
        Ok(Jwk::okp(
            ED25519_CURVE,
            self.verifier.0.as_bytes(),
            private_key.as_ref().map(<[u8; 32]>::as_slice),
        )
        .with_key_id(self.key_id.clone()))
    }

    /// Replace the key id.
    #[must_use]
    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = key_id.into();
        self
    }

    /// The key id.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Raw public key bytes.
    #[must_use]
    pub fn public_key(&self) -> [u8; 32] {
        self.verifier.to_bytes()
    }

    /// The public half of this key.
    #[must_use]
    pub const fn verifier(&self) -> &Ed25519Verifier {
        &self.verifier
    }

    /// Whether this material can sign.
    #[must_use]
    pub const fn has_private_key(&self) -> bool {
        self.signing_key.is_some()
    }

    /// Drop the private key, keeping a public-only reference.
    #[must_use]
    pub fn to_public(&self) -> Self {
        Self {
            key_id: self.key_id.clone(),
            verifier: self.verifier,
            signing_key: None,
        }
    }
}

impl From<ed25519_dalek::SigningKey> for KeyMaterial {
    fn from(key: ed25519_dalek::SigningKey) -> Self {
        Self {
            key_id: Self::DEFAULT_KEY_ID.into(),
            verifier: Ed25519Verifier::from(&key),
            signing_key: Some(key),
        }
    }
}

impl From<Ed25519Verifier> for KeyMaterial {
    fn from(verifier: Ed25519Verifier) -> Self {
        Self {
            key_id: Self::DEFAULT_KEY_ID.into(),
            verifier,
            signing_key: None,
        }
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("key_id", &self.key_id)
            .field("did", &self.verifier.to_string())
            .field("private", &self.has_private_key())
            .finish()
    }
}

impl fmt::Display for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.verifier)
    }
}

impl Signer<Ed25519Signature> for KeyMaterial {
    fn sign(&self, msg: &[u8]) -> Result<Ed25519Signature, signature::Error> {
        use signature::Signer as _;
        self.signing_key
            .as_ref()
            .ok_or_else(signature::Error::new)?
            .try_sign(msg)
    }
}

impl Principal for KeyMaterial {
    fn did(&self) -> Did {
        did_for(self.verifier.0.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use testresult::TestResult;
    use tinycloud_varsig::Verifier;

    fn test_key(seed: u8) -> KeyMaterial {
        KeyMaterial::from_seed(&[seed; 32])
    }

    #[test]
    fn it_generates_distinct_keys() -> TestResult {
        let a = KeyMaterial::generate()?;
        let b = KeyMaterial::generate()?;
        assert_ne!(a.public_key(), b.public_key());
        assert!(a.has_private_key());
        assert_eq!(a.key_id(), KeyMaterial::DEFAULT_KEY_ID);
        Ok(())
    }

    #[test]
    fn it_signs_and_verifies() -> TestResult {
        let key = test_key(42);
        let signature = key.sign(b"payload")?;
        key.verifier().verify(b"payload", &signature)?;
        assert!(key.verifier().verify(b"tampered", &signature).is_err());
        Ok(())
    }

    #[test]
    fn it_refuses_to_sign_with_public_only_material() {
        let key = test_key(1).to_public();
        assert!(key.sign(b"payload").is_err());
    }

    #[test]
    fn it_round_trips_through_a_private_jwk() -> TestResult {
        let key = test_key(7).with_key_id("alice");
        let jwk = key.export_jwk(true)?;
        assert_eq!(jwk.key_id.as_deref(), Some("alice"));
        assert!(jwk.d.is_some());

        let restored = KeyMaterial::import_jwk(&jwk)?;
        assert_eq!(restored.did(), key.did());
        assert_eq!(restored.key_id(), "alice");
        assert!(restored.has_private_key());
        Ok(())
    }

    #[test]
    fn it_exports_only_x_for_public_jwk() -> TestResult {
        let jwk = test_key(7).export_jwk(false)?;
        assert_eq!(jwk.d, None);
        let restored = KeyMaterial::import_jwk(&jwk)?;
        assert!(!restored.has_private_key());
        Ok(())
    }

    #[test]
    fn it_fails_private_export_without_private_key() {
        let key = test_key(7).to_public();
        assert_eq!(
            key.export_jwk(true),
            Err(KeyError::NoPrivateKey("default".into()))
        );
    }

    #[test]
    fn it_rejects_jwks_of_the_wrong_type() -> TestResult {
        let mut jwk = test_key(7).export_jwk(true)?;
        jwk.crv = "X25519".into();
        assert!(matches!(
            KeyMaterial::import_jwk(&jwk),
            Err(KeyError::InvalidJwk(_))
        ));

        let mut jwk = test_key(7).export_jwk(true)?;
        jwk.kty = "EC".into();
        assert!(matches!(
            KeyMaterial::import_jwk(&jwk),
            Err(KeyError::InvalidJwk(_))
        ));
        Ok(())
    }

    #[test]
    fn it_rejects_a_jwk_whose_x_does_not_match_d() -> TestResult {
        let mut jwk = test_key(7).export_jwk(true)?;
        jwk.x = test_key(8).export_jwk(false)?.x;
        assert!(matches!(
            KeyMaterial::import_jwk(&jwk),
            Err(KeyError::InvalidJwk(_))
        ));
        Ok(())
    }

    #[test]
    fn it_does_not_leak_the_private_key_in_debug() {
        let key = test_key(9);
        let debug = format!("{key:?}");
        assert!(debug.contains("private: true"));
        assert!(debug.contains(&key.to_string()));
    }
}
