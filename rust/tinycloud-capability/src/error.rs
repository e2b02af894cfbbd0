//! Errors for building and narrowing grants.

use crate::{Action, ResourcePath, Timestamp};
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors constructing or attenuating a [`crate::CapabilityGrant`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrantError {
    /// A grant must allow at least one action; for attenuation, the
    /// requested actions share nothing with the parent's.
    #[error("grant has no actions in common with its scope")]
    EmptyActionSet,

    /// The requested path is neither the parent's path nor below it.
    #[error("path {requested} escapes the delegated scope {scope}")]
    PathEscapesScope {
        /// The requested path.
        requested: ResourcePath,
        /// The scope it had to stay within.
        scope: ResourcePath,
    },

    /// The path is not a normalized absolute path.
    #[error("invalid resource path {path:?}: {reason}")]
    InvalidPath {
        /// The rejected input.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The action is not of the form `namespace/verb`.
    #[error("invalid action {0:?}: expected namespace/verb")]
    InvalidAction(String),

    /// `not_before` lies after `expiry`, so no instant is valid.
    #[error("grant window is empty: not before {not_before} but expires {expiry}")]
    EmptyWindow {
        /// Start of the window.
        not_before: Timestamp,
        /// End of the window.
        expiry: Timestamp,
    },
}

/// How a child grant exceeds its parent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttenuationViolation {
    /// The child's path is not within the parent's.
    #[error("path {child} is outside {parent}")]
    Path {
        /// Parent scope.
        parent: ResourcePath,
        /// Child scope.
        child: ResourcePath,
    },

    /// The child allows actions the parent does not.
    #[error("actions {escalated:?} were never granted")]
    Actions {
        /// Actions present in the child only.
        escalated: BTreeSet<Action>,
    },

    /// The child outlives the parent.
    #[error("expiry {child} is after the parent's {parent}")]
    Expiry {
        /// Parent expiry.
        parent: Timestamp,
        /// Child expiry.
        child: Timestamp,
    },

    /// The child becomes valid before the parent.
    #[error("not-before {child} precedes the parent's {parent}")]
    NotBefore {
        /// Parent not-before.
        parent: Timestamp,
        /// Child not-before.
        child: Timestamp,
    },
}
