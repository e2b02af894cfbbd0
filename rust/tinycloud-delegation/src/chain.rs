//! Ordered sequences of delegation links.

use crate::link::DelegationLink;
use nonempty::NonEmpty;
use serde::{Deserialize, Serialize};
use tinycloud_capability::CapabilityGrant;
use tinycloud_varsig::Did;

/// An immutable, non-empty sequence of links from the root (or from the
/// first link a holder was given) to the leaf.
///
/// A chain whose first link is a [`DelegationLink::Root`] is *anchored*.
/// A fragment, such as the single link carried by a share token, must be
/// anchored through a [`crate::ProofStore`] before it can be verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<DelegationLink>", into = "Vec<DelegationLink>")]
pub struct DelegationChain(NonEmpty<DelegationLink>);

/// Error for an attempt to build a chain with no links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("a delegation chain needs at least one link")]
pub struct EmptyChain;

impl DelegationChain {
    /// A chain of one link.
    #[must_use]
    pub fn new(link: DelegationLink) -> Self {
        Self(NonEmpty::new(link))
    }

    /// The first link.
    #[must_use]
    pub fn first(&self) -> &DelegationLink {
        self.0.first()
    }

    /// The leaf link.
    #[must_use]
    pub fn last(&self) -> &DelegationLink {
        self.0.last()
    }

    /// The identity currently holding the delegated capability.
    #[must_use]
    pub fn holder(&self) -> &Did {
        self.last().audience()
    }

    /// The capability the holder may exercise.
    #[must_use]
    pub fn grant(&self) -> &CapabilityGrant {
        self.last().grant()
    }

    /// Number of links.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; chains are never empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Whether the chain starts at a root link.
    #[must_use]
    pub const fn is_anchored(&self) -> bool {
        self.0.head.is_root()
    }

    /// Iterate from the first link to the leaf.
    pub fn iter(&self) -> impl Iterator<Item = &DelegationLink> {
        self.0.iter()
    }

    /// A new chain with `link` appended. `self` is left untouched.
    #[must_use]
    pub fn with_link(&self, link: DelegationLink) -> Self {
        let mut links = self.0.clone();
        links.push(link);
        Self(links)
    }

    /// The chain made of only the leaf link.
    #[must_use]
    pub fn leaf(&self) -> Self {
        Self::new(self.last().clone())
    }
}

impl TryFrom<Vec<DelegationLink>> for DelegationChain {
    type Error = EmptyChain;

    fn try_from(links: Vec<DelegationLink>) -> Result<Self, Self::Error> {
        NonEmpty::from_vec(links).map(Self).ok_or(EmptyChain)
    }
}

impl From<DelegationChain> for Vec<DelegationLink> {
    fn from(chain: DelegationChain) -> Self {
        chain.0.into()
    }
}
