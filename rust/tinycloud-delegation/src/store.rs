//! Proof stores: where a verifier finds the parents of a chain fragment.

use crate::{
    chain::DelegationChain,
    link::{DelegationLink, LinkRef},
};
use std::{
    collections::HashMap,
    error::Error,
    sync::{Arc, Mutex},
};
use thiserror::Error;

/// Links addressable by their [`LinkRef`].
pub trait ProofStore {
    /// Error type for store operations.
    type Error: Error;

    /// Retrieves a link by reference.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the store cannot be read. A missing link
    /// is `Ok(None)`.
    fn get(&self, link_ref: &LinkRef) -> Result<Option<DelegationLink>, Self::Error>;

    /// Inserts a link and returns its reference.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the store cannot be written.
    fn insert(&self, link: DelegationLink) -> Result<LinkRef, Self::Error>;

    /// Inserts every link of `chain`.
    ///
    /// # Errors
    ///
    /// Returns the first insertion error.
    fn insert_chain(&self, chain: &DelegationChain) -> Result<(), Self::Error> {
        for link in chain.iter() {
            self.insert(link.clone())?;
        }
        Ok(())
    }
}

impl<P: ProofStore> ProofStore for &P {
    type Error = P::Error;

    fn get(&self, link_ref: &LinkRef) -> Result<Option<DelegationLink>, Self::Error> {
        (**self).get(link_ref)
    }

    fn insert(&self, link: DelegationLink) -> Result<LinkRef, Self::Error> {
        (**self).insert(link)
    }
}

/// The in-memory store's lock was poisoned by a panicking writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("proof store lock poisoned")]
pub struct Poisoned;

/// A thread-safe in-memory [`ProofStore`]. Clones share the same links.
#[derive(Debug, Clone, Default)]
pub struct MemoryProofStore {
    links: Arc<Mutex<HashMap<LinkRef, DelegationLink>>>,
}

impl MemoryProofStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored links.
    ///
    /// # Errors
    ///
    /// Returns [`Poisoned`] if a writer panicked.
    pub fn len(&self) -> Result<usize, Poisoned> {
        Ok(self.links.lock().map_err(|_| Poisoned)?.len())
    }

    /// Whether the store holds no links.
    ///
    /// # Errors
    ///
    /// Returns [`Poisoned`] if a writer panicked.
    pub fn is_empty(&self) -> Result<bool, Poisoned> {
        Ok(self.len()? == 0)
    }
}

impl ProofStore for MemoryProofStore {
    type Error = Poisoned;

    fn get(&self, link_ref: &LinkRef) -> Result<Option<DelegationLink>, Self::Error> {
        Ok(self
            .links
            .lock()
            .map_err(|_| Poisoned)?
            .get(link_ref)
            .cloned())
    }

    fn insert(&self, link: DelegationLink) -> Result<LinkRef, Self::Error> {
        let link_ref = link.link_ref();
        self.links
            .lock()
            .map_err(|_| Poisoned)?
            .insert(link_ref, link);
        Ok(link_ref)
    }
}
