//! DID identifiers and the signing seam shared by every tinycloud crate.
//!
//! Nothing in here knows about a concrete curve. Key types in
//! `tinycloud-credentials` implement [`Signer`], [`Verifier`] and
//! [`Resolver`]; the delegation engine is generic over them so callers can
//! inject deterministic fakes in tests.

pub mod did;
pub mod principal;
pub mod resolver;
pub mod signature;

pub use did::*;
pub use principal::*;
pub use resolver::*;
pub use signature::*;
