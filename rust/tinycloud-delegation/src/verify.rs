//! Delegation chain verification.
//!
//! Verification walks a chain from the root to the leaf and stops at the
//! first violation:
//!
//! 1. The root link's wallet signature is valid, the signer owns the
//!    space, and the signed message encodes the root grant for the root
//!    audience. If an expected space is configured, the root names it.
//! 2. Every later link is issued by the previous link's audience, names
//!    the previous link as its parent, carries a valid Ed25519 signature
//!    from its issuer, and grants no more than the previous link.
//! 3. The requested time lies in every link's window. A link without a
//!    not-before inherits its parent's.
//!
//! Only the first failure is reported.

use crate::{
    chain::DelegationChain,
    error::{AuthorizationError, SiweError, VerificationError},
    link::DelegationLink,
    space::SpaceId,
    store::{MemoryProofStore, ProofStore},
};
use tinycloud_capability::{TimeRange, Timestamp};
use tinycloud_credentials::{
    Ed25519KeyResolver, Ed25519Signature,
    ethereum::{EthereumSignature, PkhResolver},
};
use tinycloud_varsig::{Did, Resolver};
use tracing::debug;

/// Default limit on the number of links in a chain.
pub const DEFAULT_MAX_DEPTH: usize = 16;

/// Verifies delegation chains and authorizes invocations with them.
///
/// Key resolution is injected: `K` resolves session key DIDs, `E` resolves
/// wallet DIDs and `P` supplies the parents of chain fragments.
#[derive(Debug, Clone)]
pub struct ChainVerifier<K = Ed25519KeyResolver, E = PkhResolver, P = MemoryProofStore> {
    keys: K,
    wallets: E,
    proofs: P,
    expected_space: Option<SpaceId>,
    max_depth: usize,
}

impl ChainVerifier {
    /// A verifier for `did:key` session keys and `did:pkh` wallets, with an
    /// empty proof store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for ChainVerifier {
    fn default() -> Self {
        Self {
            keys: Ed25519KeyResolver,
            wallets: PkhResolver,
            proofs: MemoryProofStore::new(),
            expected_space: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl<K, E, P> ChainVerifier<K, E, P> {
    /// Use `keys` to resolve session key DIDs.
    #[must_use]
    pub fn with_key_resolver<R>(self, keys: R) -> ChainVerifier<R, E, P> {
        ChainVerifier {
            keys,
            wallets: self.wallets,
            proofs: self.proofs,
            expected_space: self.expected_space,
            max_depth: self.max_depth,
        }
    }

    /// Use `wallets` to resolve root signers.
    #[must_use]
    pub fn with_wallet_resolver<R>(self, wallets: R) -> ChainVerifier<K, R, P> {
        ChainVerifier {
            keys: self.keys,
            wallets,
            proofs: self.proofs,
            expected_space: self.expected_space,
            max_depth: self.max_depth,
        }
    }

    /// Resolve the parents of chain fragments from `proofs`.
    #[must_use]
    pub fn with_proofs<Q>(self, proofs: Q) -> ChainVerifier<K, E, Q> {
        ChainVerifier {
            keys: self.keys,
            wallets: self.wallets,
            proofs,
            expected_space: self.expected_space,
            max_depth: self.max_depth,
        }
    }

    /// Only accept chains rooted in `space`.
    #[must_use]
    pub fn expecting_space(mut self, space: SpaceId) -> Self {
        self.expected_space = Some(space);
        self
    }

    /// Reject chains longer than `max_depth` links.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

impl<K, E, P> ChainVerifier<K, E, P>
where
    K: Resolver<Ed25519Signature>,
    E: Resolver<EthereumSignature>,
    P: ProofStore,
{
    /// Prepends parents from the proof store until the chain starts at a
    /// root link. Anchored chains are returned unchanged.
    ///
    /// # Errors
    ///
    /// - [`VerificationError::ProofNotFound`] if a parent is unknown
    /// - [`VerificationError::TooDeep`] if the chain grows past the limit
    /// - [`VerificationError::ProofStore`] if the store fails
    pub fn anchor(&self, chain: &DelegationChain) -> Result<DelegationChain, VerificationError> {
        let mut parents = Vec::new();
        let mut next = chain.first().parent().copied();
        while let Some(parent_ref) = next {
            let depth = chain.len() + parents.len() + 1;
            if depth > self.max_depth {
                return Err(VerificationError::TooDeep {
                    depth,
                    limit: self.max_depth,
                });
            }
            let parent = self
                .proofs
                .get(&parent_ref)
                .map_err(|e| VerificationError::ProofStore(e.to_string()))?
                .ok_or(VerificationError::ProofNotFound(parent_ref))?;
            next = parent.parent().copied();
            parents.push(parent);
        }

        if parents.is_empty() {
            return Ok(chain.clone());
        }
        parents.reverse();
        parents.extend(chain.iter().cloned());
        DelegationChain::try_from(parents)
            .map_err(|e| VerificationError::ProofStore(e.to_string()))
    }

    /// Verifies `chain` at time `at`.
    ///
    /// Fragments are anchored through the proof store first; link indices
    /// in errors count from the root of the anchored chain.
    ///
    /// # Errors
    ///
    /// Returns the first [`VerificationError`] encountered.
    #[tracing::instrument(skip_all, fields(holder = %chain.holder(), %at))]
    pub fn verify(&self, chain: &DelegationChain, at: Timestamp) -> Result<(), VerificationError> {
        self.verify_anchored(&self.anchor(chain)?, at)
            .inspect_err(|error| debug!(%error, index = ?error.index(), "chain rejected"))
    }

    fn verify_anchored(
        &self,
        chain: &DelegationChain,
        at: Timestamp,
    ) -> Result<(), VerificationError> {
        if chain.len() > self.max_depth {
            return Err(VerificationError::TooDeep {
                depth: chain.len(),
                limit: self.max_depth,
            });
        }

        let mut previous: Option<&DelegationLink> = None;
        for (index, link) in chain.iter().enumerate() {
            match (previous, link) {
                (None, DelegationLink::Root(root)) => {
                    root.verify(&self.wallets).map_err(|source| match source {
                        SiweError::Signature => VerificationError::SignatureInvalid {
                            index,
                            reason: SiweError::Signature.to_string(),
                        },
                        source => VerificationError::InvalidRoot { index, source },
                    })?;
                    if let Some(expected) = &self.expected_space {
                        if root.authority.space() != expected {
                            return Err(VerificationError::SpaceMismatch {
                                expected: expected.to_string(),
                                found: root.authority.space().to_string(),
                            });
                        }
                    }
                }
                (Some(_), DelegationLink::Root(_)) => {
                    return Err(VerificationError::MisplacedRoot { index });
                }
                (None, DelegationLink::Derived(derived)) => {
                    return Err(VerificationError::ProofNotFound(derived.parent));
                }
                (Some(parent), DelegationLink::Derived(derived)) => {
                    if &derived.issuer != parent.audience() {
                        return Err(VerificationError::IssuerContinuityBroken {
                            index,
                            expected: parent.audience().clone(),
                            issuer: derived.issuer.clone(),
                        });
                    }
                    if derived.parent != parent.link_ref() {
                        return Err(VerificationError::ParentMismatch { index });
                    }
                    derived.verify(&self.keys).map_err(|e| {
                        VerificationError::SignatureInvalid {
                            index,
                            reason: e.to_string(),
                        }
                    })?;
                    derived.grant.check_attenuates(parent.grant()).map_err(|violation| {
                        VerificationError::AttenuationViolated { index, violation }
                    })?;
                }
            }
            previous = Some(link);
        }

        let window = chain
            .iter()
            .map(|link| link.grant().window())
            .fold(chain.first().grant().window(), TimeRange::intersect);
        if !window.contains(at) {
            return Err(VerificationError::ExpiredOrNotYetValid {
                index: chain.len() - 1,
                at,
                window,
            });
        }
        Ok(())
    }

    /// Verifies `chain` and checks that its leaf grant allows `action` on
    /// `path` at `at`. Returns the authenticated invoker: the leaf audience.
    ///
    /// Nothing is cached between calls; each authorization verifies the
    /// chain afresh.
    ///
    /// # Errors
    ///
    /// - [`AuthorizationError::Verification`] if the chain is invalid
    /// - [`AuthorizationError::Unauthorized`] if the valid chain does not
    ///   cover the request
    #[tracing::instrument(skip_all, fields(%path, %action, %at))]
    pub fn authorize(
        &self,
        chain: &DelegationChain,
        path: &str,
        action: &str,
        at: Timestamp,
    ) -> Result<Did, AuthorizationError> {
        self.verify(chain, at)?;
        if !chain.grant().authorizes(path, action, at) {
            debug!(grant = ?chain.grant(), "request not covered by grant");
            return Err(AuthorizationError::Unauthorized {
                path: path.to_string(),
                action: action.to_string(),
            });
        }
        Ok(chain.holder().clone())
    }
}
