//! SIWE-rooted delegation chains for tinycloud storage.
//!
//! A wallet owns a space. It signs one Sign-In with Ethereum message that
//! hands a [`CapabilityGrant`] to a session key; that signed message is the
//! root of every [`DelegationChain`]. From there, each holder can hand a
//! narrower grant to another `did:key` with a [`DerivedLink`] it signs
//! itself:
//!
//! ```text
//! did:pkh (wallet) ──SIWE + ReCap──▶ did:key (session)
//!                                        │ ed25519
//!                                        ▼
//!                                    did:key (share recipient)
//! ```
//!
//! - [`ChainBuilder`] prepares the root message and derives links,
//!   refusing anything that would widen the holder's grant
//! - [`ChainVerifier`] checks a chain end to end: the root signature,
//!   issuer continuity, every link signature, attenuation, the space and
//!   the validity window at a caller supplied instant
//! - [`ShareTokenCodec`] packs a delegation and the key that holds it into
//!   a single `tc1:` string for out-of-band sharing
//! - [`SessionManager`] keeps the session keys a client signs with
//!
//! [`CapabilityGrant`]: tinycloud_capability::CapabilityGrant

pub mod authority;
pub mod builder;
pub mod chain;
pub mod error;
pub mod link;
pub mod recap;
pub mod session;
pub mod share;
pub mod siwe;
pub mod space;
pub mod store;
pub mod verify;

pub use authority::SiweRootAuthority;
pub use builder::ChainBuilder;
pub use chain::{DelegationChain, EmptyChain};
pub use error::{
    AuthorizationError, ChainError, ErrorCode, LinkSignatureError, ServiceError, SessionError,
    SiweError, TokenError, VerificationError,
};
pub use link::{DelegationLink, DerivedLink, LinkRef, RootLink};
pub use recap::{RECAP_PREFIX, Recap};
pub use session::SessionManager;
pub use share::{ShareTokenCodec, SharedDelegation, TOKEN_PREFIX, TOKEN_VERSION};
pub use siwe::{SiweConfig, SiweMessage, generate_nonce};
pub use space::{HostContext, SpaceId, SpaceIdError};
pub use store::{MemoryProofStore, Poisoned, ProofStore};
pub use verify::{ChainVerifier, DEFAULT_MAX_DEPTH};
