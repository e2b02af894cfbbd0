//! An in-memory keyring of session keys and the chains that empower them.

use crate::{chain::DelegationChain, error::SessionError};
use std::collections::BTreeMap;
use tinycloud_credentials::{Jwk, KeyMaterial};
use tinycloud_varsig::{Did, Principal};
use tracing::debug;

#[derive(Debug, Clone)]
struct Session {
    key: KeyMaterial,
    chain: Option<DelegationChain>,
}

/// Session keys by key id.
///
/// A fresh manager holds one generated key under
/// [`KeyMaterial::DEFAULT_KEY_ID`]. Every operation taking an
/// `Option<&str>` key id falls back to that default. Persisting keys and
/// chains is left to the caller; export them with
/// [`SessionManager::jwk`] and [`SessionManager::chain`].
#[derive(Debug, Clone)]
pub struct SessionManager {
    sessions: BTreeMap<String, Session>,
}

impl SessionManager {
    /// Creates a manager with a freshly generated default key.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Key`] if the CSPRNG is unavailable.
    pub fn new() -> Result<Self, SessionError> {
        let mut manager = Self {
            sessions: BTreeMap::new(),
        };
        manager.create_session_key(None)?;
        Ok(manager)
    }

    /// Generates a key under `key_id`.
    ///
    /// # Errors
    ///
    /// - [`SessionError::KeyExists`] if the id is taken
    /// - [`SessionError::Key`] if the CSPRNG is unavailable
    pub fn create_session_key(&mut self, key_id: Option<&str>) -> Result<String, SessionError> {
        let key_id = resolve(key_id).to_string();
        if self.sessions.contains_key(&key_id) {
            return Err(SessionError::KeyExists(key_id));
        }
        let key = KeyMaterial::generate()?.with_key_id(key_id.clone());
        debug!(%key_id, did = %key.did(), "created session key");
        self.sessions.insert(key_id.clone(), Session { key, chain: None });
        Ok(key_id)
    }

    /// Imports `jwk` under `key_id`, replacing an existing key only if
    /// `replace` is set. Replacing a key drops its chain.
    ///
    /// # Errors
    ///
    /// - [`SessionError::KeyExists`] if the id is taken and `replace` is unset
    /// - [`SessionError::Key`] if the JWK is invalid
    pub fn import_session_key(
        &mut self,
        jwk: &Jwk,
        key_id: Option<&str>,
        replace: bool,
    ) -> Result<String, SessionError> {
        let key_id = resolve(key_id).to_string();
        if self.sessions.contains_key(&key_id) && !replace {
            return Err(SessionError::KeyExists(key_id));
        }
        let key = KeyMaterial::import_jwk(jwk)?.with_key_id(key_id.clone());
        self.sessions.insert(key_id.clone(), Session { key, chain: None });
        Ok(key_id)
    }

    /// All key ids, sorted.
    #[must_use]
    pub fn list_session_keys(&self) -> Vec<String> {
        self.sessions.keys().cloned().collect()
    }

    /// Moves the key `from` to the id `to`.
    ///
    /// # Errors
    ///
    /// - [`SessionError::KeyNotFound`] if `from` does not exist
    /// - [`SessionError::KeyExists`] if `to` is taken
    pub fn rename_session_key(&mut self, from: &str, to: &str) -> Result<(), SessionError> {
        if self.sessions.contains_key(to) {
            return Err(SessionError::KeyExists(to.to_string()));
        }
        let mut session = self
            .sessions
            .remove(from)
            .ok_or_else(|| SessionError::KeyNotFound(from.to_string()))?;
        session.key = session.key.with_key_id(to);
        self.sessions.insert(to.to_string(), session);
        Ok(())
    }

    /// The key stored under `key_id`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::KeyNotFound`] if there is none.
    pub fn key(&self, key_id: Option<&str>) -> Result<&KeyMaterial, SessionError> {
        Ok(&self.session(key_id)?.key)
    }

    /// The `did:key` of the key stored under `key_id`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::KeyNotFound`] if there is none.
    pub fn did(&self, key_id: Option<&str>) -> Result<Did, SessionError> {
        Ok(self.key(key_id)?.did())
    }

    /// The key stored under `key_id` as a JWK, with its `kid` set.
    ///
    /// # Errors
    ///
    /// - [`SessionError::KeyNotFound`] if there is none
    /// - [`SessionError::Key`] if a private export is requested for a
    ///   public-only key
    pub fn jwk(&self, key_id: Option<&str>, include_private: bool) -> Result<Jwk, SessionError> {
        Ok(self.key(key_id)?.export_jwk(include_private)?)
    }

    /// Attaches the chain that empowers the key stored under `key_id`.
    ///
    /// # Errors
    ///
    /// - [`SessionError::KeyNotFound`] if there is no such key
    /// - [`SessionError::ChainMismatch`] if the chain is held by another key
    pub fn set_chain(
        &mut self,
        key_id: Option<&str>,
        chain: DelegationChain,
    ) -> Result<(), SessionError> {
        let key_id = resolve(key_id);
        let session = self
            .sessions
            .get_mut(key_id)
            .ok_or_else(|| SessionError::KeyNotFound(key_id.to_string()))?;
        if chain.holder() != &session.key.did() {
            return Err(SessionError::ChainMismatch {
                key_id: key_id.to_string(),
                holder: chain.holder().clone(),
            });
        }
        session.chain = Some(chain);
        Ok(())
    }

    /// The chain attached to the key stored under `key_id`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::KeyNotFound`] if there is no such key.
    pub fn chain(&self, key_id: Option<&str>) -> Result<Option<&DelegationChain>, SessionError> {
        Ok(self.session(key_id)?.chain.as_ref())
    }

    fn session(&self, key_id: Option<&str>) -> Result<&Session, SessionError> {
        let key_id = resolve(key_id);
        self.sessions
            .get(key_id)
            .ok_or_else(|| SessionError::KeyNotFound(key_id.to_string()))
    }
}

fn resolve(key_id: Option<&str>) -> &str {
    key_id.unwrap_or(KeyMaterial::DEFAULT_KEY_ID)
}
