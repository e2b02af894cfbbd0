//! Capability grants for tinycloud storage.
//!
//! A [`CapabilityGrant`] is the atomic unit of permission: a resource path
//! scope, a set of actions and a validity window. Grants only ever get
//! narrower as they are delegated:
//!
//! ```text
//! /            kv/get kv/put kv/list     nbf ..= exp
//!   └── /photos          kv/get kv/list  nbf ..= exp - 1h
//!         └── /photos/a.jpg     kv/get   nbf ..= exp - 2h
//! ```
//!
//! [`CapabilityGrant::attenuate`] computes the narrowest grant satisfying
//! a request, and [`CapabilityGrant::check_attenuates`] decides whether an
//! already-built grant is a valid narrowing of its parent.

pub mod action;
pub mod error;
pub mod grant;
pub mod path;
pub mod time;

pub use action::Action;
pub use error::{AttenuationViolation, GrantError};
pub use grant::{CapabilityGrant, attenuate};
pub use path::ResourcePath;
pub use time::{TimeRange, Timestamp};
