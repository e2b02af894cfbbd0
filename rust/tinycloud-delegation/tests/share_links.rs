//! Sharing a single file: the session key delegates to a throwaway key,
//! packs both into a token, and the recipient redeems it at the node.

use pretty_assertions::assert_eq;
use std::time::Duration;
use testresult::TestResult;
use tinycloud_capability::{CapabilityGrant, Timestamp};
use tinycloud_credentials::{KeyMaterial, ethereum::EthereumSigner};
use tinycloud_delegation::{
    AuthorizationError, ChainBuilder, ChainVerifier, DelegationChain, ErrorCode, HostContext,
    MemoryProofStore, ProofStore, ServiceError, SessionManager, ShareTokenCodec, SiweConfig,
    SiweRootAuthority, SpaceId, TOKEN_PREFIX, TokenError,
};
use tinycloud_varsig::Principal;

const NOW: Timestamp = Timestamp::from_unix(1_704_067_200);

fn later(seconds: u64) -> Timestamp {
    NOW.saturating_add(Duration::from_secs(seconds))
}

fn grant(path: &str, actions: &[&str], expiry: Timestamp) -> TestResult<CapabilityGrant> {
    let actions = actions
        .iter()
        .map(|action| action.parse())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CapabilityGrant::new(path.parse()?, actions, expiry)?)
}

struct Shared {
    session_chain: DelegationChain,
    share_key: KeyMaterial,
    context: HostContext,
    token: String,
}

fn share_vacation_photo(sessions: &mut SessionManager) -> TestResult<Shared> {
    let wallet = EthereumSigner::from_slice(&[7; 32])?;
    let space = SpaceId::new(1, wallet.address(), SpaceId::DEFAULT_NAME)?;
    let session_key = sessions.key(None)?.clone();
    let builder = ChainBuilder::new().at(NOW);

    let session_grant = grant("/photos", &["kv/get", "kv/list"], later(3_600))?;
    let config = SiweConfig {
        address: wallet.address().to_string(),
        chain_id: 1,
        domain: "app.tinycloud.xyz".into(),
        issued_at: "2024-01-01T00:00:00Z".into(),
        statement: Some("Sign in to TinyCloud.".into()),
        ..SiweConfig::default()
    };
    let message = builder.prepare_root(&config, &space, &session_key, &session_grant)?;
    let authority = SiweRootAuthority::sign(space.clone(), &message, &wallet)?;
    let session_chain = builder.create_root(&authority, &session_key, session_grant)?;
    sessions.set_chain(None, session_chain.clone())?;

    let share_key = KeyMaterial::generate()?;
    let shared = builder.delegate(
        &session_chain,
        &session_key,
        &share_key.did(),
        &grant("/photos/vacation.jpg", &["kv/get"], later(600))?,
    )?;
    let context = HostContext {
        host: "https://node.tinycloud.xyz".parse()?,
        space_id: space,
    };
    let token = ShareTokenCodec::encode(&shared, &share_key, &context)?;
    Ok(Shared {
        session_chain,
        share_key,
        context,
        token,
    })
}

#[test]
fn it_redeems_a_share_token() -> TestResult {
    let mut sessions = SessionManager::new()?;
    let shared = share_vacation_photo(&mut sessions)?;
    assert!(shared.token.starts_with(TOKEN_PREFIX));

    let redeemed = ShareTokenCodec::decode(&shared.token)?;
    assert_eq!(redeemed.key.did(), shared.share_key.did());
    assert!(redeemed.key.has_private_key());
    assert_eq!(redeemed.context, shared.context);
    assert_eq!(redeemed.path.as_str(), "/photos/vacation.jpg");
    assert_eq!(redeemed.chain.len(), 1);

    let proofs = MemoryProofStore::new();
    proofs.insert_chain(&shared.session_chain)?;
    let verifier = ChainVerifier::new()
        .with_proofs(proofs)
        .expecting_space(shared.context.space_id.clone());

    let invoker = verifier.authorize(&redeemed.chain, "/photos/vacation.jpg", "kv/get", later(300))?;
    assert_eq!(invoker, shared.share_key.did());

    let listing = verifier.authorize(&redeemed.chain, "/photos/vacation.jpg", "kv/list", later(300));
    assert!(matches!(listing, Err(AuthorizationError::Unauthorized { .. })));
    assert_eq!(
        ServiceError::from(listing.unwrap_err()).code,
        ErrorCode::Unauthorized
    );
    Ok(())
}

#[test]
fn it_accepts_tokens_without_the_prefix() -> TestResult {
    let mut sessions = SessionManager::new()?;
    let shared = share_vacation_photo(&mut sessions)?;
    let bare = shared.token.trim_start_matches(TOKEN_PREFIX);

    let redeemed = ShareTokenCodec::decode(bare)?;
    assert_eq!(redeemed.key.did(), shared.share_key.did());
    Ok(())
}

#[test]
fn it_refuses_to_share_with_the_wrong_key() -> TestResult {
    let mut sessions = SessionManager::new()?;
    let shared = share_vacation_photo(&mut sessions)?;
    let redeemed = ShareTokenCodec::decode(&shared.token)?;
    let other = KeyMaterial::generate()?;

    assert!(matches!(
        ShareTokenCodec::encode(&redeemed.chain, &other, &shared.context),
        Err(TokenError::KeyMismatch { .. })
    ));
    assert!(matches!(
        ShareTokenCodec::encode(&redeemed.chain, &redeemed.key.to_public(), &shared.context),
        Err(TokenError::Key(_))
    ));
    Ok(())
}

#[test]
fn it_keeps_the_session_chain_with_its_key() -> TestResult {
    let mut sessions = SessionManager::new()?;
    let shared = share_vacation_photo(&mut sessions)?;

    assert_eq!(sessions.chain(None)?, Some(&shared.session_chain));
    sessions.create_session_key(Some("other"))?;
    assert!(
        sessions
            .set_chain(Some("other"), shared.session_chain.clone())
            .is_err()
    );
    Ok(())
}

#[test]
fn it_fails_without_the_session_proofs() -> TestResult {
    let mut sessions = SessionManager::new()?;
    let shared = share_vacation_photo(&mut sessions)?;
    let redeemed = ShareTokenCodec::decode(&shared.token)?;

    let result = ChainVerifier::new().authorize(&redeemed.chain, "/photos/vacation.jpg", "kv/get", later(60));
    let error = ServiceError::from(result.unwrap_err());
    assert_eq!(error.code, ErrorCode::ProofNotFound);
    assert_eq!(error.code.status_code(), 401);
    Ok(())
}
