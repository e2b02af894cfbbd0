//! Building delegation chains.

use crate::{
    SiweConfig, SiweMessage,
    authority::SiweRootAuthority,
    chain::DelegationChain,
    error::{ChainError, SiweError},
    link::{DerivedLink, RootLink},
    space::SpaceId,
};
use tinycloud_capability::{CapabilityGrant, TimeRange, Timestamp};
use tinycloud_credentials::{Ed25519Signature, ethereum::EthereumSignature, ethereum::PkhResolver};
use tinycloud_varsig::{Did, Principal, Resolver, Signer};
use tracing::debug;

/// Builds delegation chains: the wallet-rooted session chain at sign in,
/// and attenuated extensions of it for sub-sessions and share links.
///
/// The builder is stateless apart from its wallet resolver and an optional
/// fixed clock. It never performs I/O.
///
/// ```text
/// wallet ──SIWE──▶ session key ──delegate──▶ share key
///        create_root            delegate
/// ```
#[derive(Debug, Clone, Default)]
pub struct ChainBuilder<E = PkhResolver> {
    wallets: E,
    now: Option<Timestamp>,
}

impl ChainBuilder {
    /// A builder resolving `did:pkh` wallets and reading the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<E> ChainBuilder<E> {
    /// Use `wallets` to resolve root signers.
    #[must_use]
    pub fn with_wallet_resolver<R>(self, wallets: R) -> ChainBuilder<R> {
        ChainBuilder {
            wallets,
            now: self.now,
        }
    }

    /// Fix the build time instead of reading the system clock.
    #[must_use]
    pub fn at(mut self, now: Timestamp) -> Self {
        self.now = Some(now);
        self
    }

    fn now(&self) -> Timestamp {
        self.now.unwrap_or_else(Timestamp::now)
    }

    fn ensure_open(&self, window: TimeRange) -> Result<(), ChainError> {
        let at = self.now();
        if window.expiration < at {
            debug!(%at, %window, "refusing to build an expired grant");
            return Err(ChainError::ExpiredOrNotYetValid { at, window });
        }
        Ok(())
    }
}

impl<E: Resolver<EthereumSignature>> ChainBuilder<E> {
    /// Prepares the SIWE message the space owner's wallet must sign to give
    /// `session_key` the capability `grant`.
    ///
    /// # Errors
    ///
    /// - [`ChainError::Root`] if `config` is invalid or not from the owner
    /// - [`ChainError::ExpiredOrNotYetValid`] if `grant` has already expired
    pub fn prepare_root<K: Principal>(
        &self,
        config: &SiweConfig,
        space: &SpaceId,
        session_key: &K,
        grant: &CapabilityGrant,
    ) -> Result<SiweMessage, ChainError> {
        self.ensure_open(grant.window())?;
        let message = SiweMessage::from_config(config, &session_key.did())?.with_grant(space, grant)?;
        if message.signer() != space.owner() {
            return Err(SiweError::NotSpaceOwner {
                owner: space.owner(),
                signer: message.signer(),
            }
            .into());
        }
        Ok(message)
    }

    /// Builds a one-link chain from the space owner to `session_key`.
    ///
    /// The root link's proof is the wallet signature itself: its issuer is
    /// the owner's `did:pkh`, and the signed message must name the session
    /// key as its URI and encode exactly `grant`.
    ///
    /// # Errors
    ///
    /// - [`ChainError::Root`] if the authority does not sign for this key
    ///   and grant
    /// - [`ChainError::ExpiredOrNotYetValid`] if `grant` has already expired
    #[tracing::instrument(skip_all, fields(space = %root.space()))]
    pub fn create_root<K: Principal>(
        &self,
        root: &SiweRootAuthority,
        session_key: &K,
        grant: CapabilityGrant,
    ) -> Result<DelegationChain, ChainError> {
        self.ensure_open(grant.window())?;
        let link = RootLink {
            issuer: root.issuer(),
            audience: session_key.did(),
            grant,
            authority: root.clone(),
        };
        link.verify(&self.wallets).inspect_err(|error| {
            debug!(%error, "rejecting root authority");
        })?;
        debug!(audience = %link.audience, "created root delegation");
        Ok(DelegationChain::new(link.into()))
    }

    /// Extends `chain` with a link from its holder to `audience`, carrying
    /// the attenuation of the chain's grant towards `requested`.
    ///
    /// A request that outlives the chain's grant is clamped to its expiry
    /// rather than rejected.
    ///
    /// # Errors
    ///
    /// - [`ChainError::NotChainHolder`] if `issuer_key` is not the audience
    ///   of the chain's last link
    /// - [`ChainError::Grant`] if `requested` cannot be derived
    /// - [`ChainError::ExpiredOrNotYetValid`] if the result has expired
    /// - [`ChainError::Signing`] if `issuer_key` cannot sign
    #[tracing::instrument(skip_all, fields(audience = %audience))]
    pub fn delegate<S: Signer<Ed25519Signature> + Principal>(
        &self,
        chain: &DelegationChain,
        issuer_key: &S,
        audience: &Did,
        requested: &CapabilityGrant,
    ) -> Result<DelegationChain, ChainError> {
        let issuer = issuer_key.did();
        if &issuer != chain.holder() {
            return Err(ChainError::NotChainHolder {
                expected: chain.holder().clone(),
                found: issuer,
            });
        }

        let grant = chain.grant().attenuate(requested)?;
        self.ensure_open(grant.window())?;

        let link = DerivedLink::sign(issuer_key, audience.clone(), grant, chain.last().link_ref())
            .map_err(|e| ChainError::Signing(e.to_string()))?;
        debug!(depth = chain.len() + 1, "delegated");
        Ok(chain.with_link(link.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use testresult::TestResult;
    use tinycloud_capability::GrantError;
    use tinycloud_credentials::{KeyMaterial, ethereum::EthereumSigner};

    const NOW: Timestamp = Timestamp::from_unix(1_704_067_200);

    fn grant(path: &str, actions: &[&str], ttl: u64) -> CapabilityGrant {
        CapabilityGrant::new(
            path.parse().unwrap(),
            actions.iter().map(|a| a.parse().unwrap()),
            NOW.saturating_add(Duration::from_secs(ttl)),
        )
        .unwrap()
    }

    fn signed_in(session: &KeyMaterial, grant: &CapabilityGrant) -> TestResult<DelegationChain> {
        let wallet = EthereumSigner::from_slice(&[9; 32])?;
        let space = SpaceId::new(1, wallet.address(), "default")?;
        let config = SiweConfig {
            address: wallet.address().to_string(),
            chain_id: 1,
            domain: "app.tinycloud.xyz".into(),
            issued_at: "2024-01-01T00:00:00Z".into(),
            ..SiweConfig::default()
        };
        let builder = ChainBuilder::new().at(NOW);
        let message = builder.prepare_root(&config, &space, session, grant)?;
        let authority = SiweRootAuthority::sign(space, &message, &wallet)?;
        Ok(builder.create_root(&authority, session, grant.clone())?)
    }

    #[test]
    fn it_roots_a_chain_in_the_wallet() -> TestResult {
        let session = KeyMaterial::from_seed(&[1; 32]);
        let chain = signed_in(&session, &grant("/", &["kv/get", "kv/put"], 3_600))?;

        assert!(chain.is_anchored());
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.holder(), &session.did());
        assert_eq!(chain.first().issuer().method(), "pkh");
        Ok(())
    }

    #[test]
    fn it_rejects_a_root_for_a_different_grant() -> TestResult {
        let session = KeyMaterial::from_seed(&[1; 32]);
        let signed = grant("/photos", &["kv/get"], 3_600);
        let chain = signed_in(&session, &signed)?;
        let authority = root_authority(&chain);

        let wider = grant("/", &["kv/get"], 3_600);
        let result = ChainBuilder::new()
            .at(NOW)
            .create_root(&authority, &session, wider);
        assert_eq!(result, Err(ChainError::Root(SiweError::GrantMismatch)));
        Ok(())
    }

    #[test]
    fn it_rejects_a_root_for_a_different_session_key() -> TestResult {
        let session = KeyMaterial::from_seed(&[1; 32]);
        let signed = grant("/", &["kv/get"], 3_600);
        let chain = signed_in(&session, &signed)?;
        let authority = root_authority(&chain);

        let thief = KeyMaterial::from_seed(&[66; 32]);
        let result = ChainBuilder::new().at(NOW).create_root(&authority, &thief, signed);
        assert!(matches!(
            result,
            Err(ChainError::Root(SiweError::UriMismatch { .. }))
        ));
        Ok(())
    }

    #[test]
    fn it_only_lets_the_holder_delegate() -> TestResult {
        let session = KeyMaterial::from_seed(&[1; 32]);
        let chain = signed_in(&session, &grant("/", &["kv/get"], 3_600))?;
        let stranger = KeyMaterial::from_seed(&[2; 32]);

        let result = ChainBuilder::new().at(NOW).delegate(
            &chain,
            &stranger,
            &stranger.did(),
            &grant("/", &["kv/get"], 60),
        );
        assert!(matches!(result, Err(ChainError::NotChainHolder { .. })));
        Ok(())
    }

    #[test]
    fn it_links_each_delegation_to_its_parent() -> TestResult {
        let session = KeyMaterial::from_seed(&[1; 32]);
        let share = KeyMaterial::from_seed(&[2; 32]);
        let chain = signed_in(&session, &grant("/", &["kv/get"], 3_600))?;

        let extended = ChainBuilder::new().at(NOW).delegate(
            &chain,
            &session,
            &share.did(),
            &grant("/photos", &["kv/get"], 60),
        )?;
        assert_eq!(extended.len(), 2);
        assert_eq!(extended.last().parent(), Some(&chain.last().link_ref()));
        assert_eq!(extended.last().issuer(), &session.did());
        assert_eq!(chain.len(), 1);
        Ok(())
    }

    #[test]
    fn it_propagates_attenuation_failures() -> TestResult {
        let session = KeyMaterial::from_seed(&[1; 32]);
        let share = KeyMaterial::from_seed(&[2; 32]);
        let chain = signed_in(&session, &grant("/photos", &["kv/get"], 3_600))?;

        let result = ChainBuilder::new().at(NOW).delegate(
            &chain,
            &session,
            &share.did(),
            &grant("/photos", &["kv/put"], 60),
        );
        assert_eq!(result, Err(ChainError::Grant(GrantError::EmptyActionSet)));
        Ok(())
    }

    #[test]
    fn it_refuses_to_build_after_expiry() -> TestResult {
        let session = KeyMaterial::from_seed(&[1; 32]);
        let share = KeyMaterial::from_seed(&[2; 32]);
        let chain = signed_in(&session, &grant("/", &["kv/get"], 60))?;

        let later = NOW.saturating_add(Duration::from_secs(61));
        let result = ChainBuilder::new().at(later).delegate(
            &chain,
            &session,
            &share.did(),
            &grant("/", &["kv/get"], 3_600),
        );
        assert!(matches!(
            result,
            Err(ChainError::ExpiredOrNotYetValid { .. })
        ));
        Ok(())
    }

    fn root_authority(chain: &DelegationChain) -> SiweRootAuthority {
        match chain.first() {
            crate::DelegationLink::Root(root) => root.authority.clone(),
            crate::DelegationLink::Derived(_) => panic!("chains built here are anchored"),
        }
    }
}
