//! The [`CapabilityGrant`] type and the attenuation rules between grants.

use crate::{
    Action, ResourcePath, TimeRange, Timestamp,
    error::{AttenuationViolation, GrantError},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A permission: the actions allowed on everything under a path, for a
/// bounded period of time.
///
/// A grant always carries at least one action, an expiry, and a window that
/// is not empty. These are checked on construction and on deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "GrantFields", rename_all = "camelCase")]
pub struct CapabilityGrant {
    path_prefix: ResourcePath,
    actions: BTreeSet<Action>,
    #[serde(skip_serializing_if = "Option::is_none")]
    not_before: Option<Timestamp>,
    expiry: Timestamp,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GrantFields {
    path_prefix: ResourcePath,
    actions: BTreeSet<Action>,
    #[serde(default)]
    not_before: Option<Timestamp>,
    expiry: Timestamp,
}

impl TryFrom<GrantFields> for CapabilityGrant {
    type Error = GrantError;

    fn try_from(fields: GrantFields) -> Result<Self, Self::Error> {
        Self::new(fields.path_prefix, fields.actions, fields.expiry)?
            .with_not_before(fields.not_before)
    }
}

impl CapabilityGrant {
    /// Creates a grant on `path_prefix` for `actions`, valid until `expiry`.
    ///
    /// # Errors
    ///
    /// Returns [`GrantError::EmptyActionSet`] if `actions` is empty.
    pub fn new(
        path_prefix: ResourcePath,
        actions: impl IntoIterator<Item = Action>,
        expiry: Timestamp,
    ) -> Result<Self, GrantError> {
        let actions: BTreeSet<Action> = actions.into_iter().collect();
        if actions.is_empty() {
            return Err(GrantError::EmptyActionSet);
        }
        Ok(Self {
            path_prefix,
            actions,
            not_before: None,
            expiry,
        })
    }

    /// Sets the instant before which the grant is not yet valid.
    ///
    /// # Errors
    ///
    /// Returns [`GrantError::EmptyWindow`] if `not_before` is after the expiry.
    pub fn with_not_before(mut self, not_before: Option<Timestamp>) -> Result<Self, GrantError> {
        if let Some(nbf) = not_before.filter(|nbf| *nbf > self.expiry) {
            return Err(GrantError::EmptyWindow {
                not_before: nbf,
                expiry: self.expiry,
            });
        }
        self.not_before = not_before;
        Ok(self)
    }

    /// The path this grant covers, including everything below it.
    #[must_use]
    pub fn path_prefix(&self) -> &ResourcePath {
        &self.path_prefix
    }

    /// The allowed actions, never empty.
    #[must_use]
    pub fn actions(&self) -> &BTreeSet<Action> {
        &self.actions
    }

    /// The instant before which the grant is not valid, if any.
    #[must_use]
    pub fn not_before(&self) -> Option<Timestamp> {
        self.not_before
    }

    /// The last instant the grant is valid.
    #[must_use]
    pub fn expiry(&self) -> Timestamp {
        self.expiry
    }

    /// The validity window of this grant.
    #[must_use]
    pub fn window(&self) -> TimeRange {
        TimeRange::new(self.not_before, self.expiry)
    }

    /// Narrows this grant towards `requested`.
    ///
    /// The result allows only the actions both grants share, on the
    /// requested path, within the intersection of both windows.
    ///
    /// A request that outlives this grant is not an error: its expiry is
    /// clamped to ours. Asking for too long a duration degrades to the
    /// longest duration available instead of failing.
    ///
    /// # Errors
    ///
    /// - [`GrantError::PathEscapesScope`] if the requested path is outside ours
    /// - [`GrantError::EmptyActionSet`] if no requested action is allowed here
    /// - [`GrantError::EmptyWindow`] if the narrowed window contains no instant
    pub fn attenuate(&self, requested: &CapabilityGrant) -> Result<CapabilityGrant, GrantError> {
        if !self.path_prefix.contains(&requested.path_prefix) {
            return Err(GrantError::PathEscapesScope {
                requested: requested.path_prefix.clone(),
                scope: self.path_prefix.clone(),
            });
        }

        let actions: BTreeSet<Action> = requested
            .actions
            .intersection(&self.actions)
            .cloned()
            .collect();

        if requested.expiry > self.expiry {
            tracing::debug!(
                requested = %requested.expiry,
                granted = %self.expiry,
                "clamping requested expiry to the delegator's"
            );
        }

        let window = self.window().intersect(requested.window());
        CapabilityGrant::new(requested.path_prefix.clone(), actions, window.expiration)?
            .with_not_before(window.not_before)
    }

    /// Checks that this grant is no wider than `parent`.
    ///
    /// This is the verifier's side of [`CapabilityGrant::attenuate`]: any
    /// grant produced by attenuating `parent` passes.
    ///
    /// # Errors
    ///
    /// Returns the first [`AttenuationViolation`] found, checking path,
    /// actions, expiry and not-before in that order.
    pub fn check_attenuates(&self, parent: &CapabilityGrant) -> Result<(), AttenuationViolation> {
        if !parent.path_prefix.contains(&self.path_prefix) {
            return Err(AttenuationViolation::Path {
                parent: parent.path_prefix.clone(),
                child: self.path_prefix.clone(),
            });
        }

        let escalated: BTreeSet<Action> =
            self.actions.difference(&parent.actions).cloned().collect();
        if !escalated.is_empty() {
            return Err(AttenuationViolation::Actions { escalated });
        }

        if self.expiry > parent.expiry {
            return Err(AttenuationViolation::Expiry {
                parent: parent.expiry,
                child: self.expiry,
            });
        }

        // An absent child not-before inherits the parent's.
        if let (Some(parent_nbf), Some(child_nbf)) = (parent.not_before, self.not_before) {
            if child_nbf < parent_nbf {
                return Err(AttenuationViolation::NotBefore {
                    parent: parent_nbf,
                    child: child_nbf,
                });
            }
        }

        Ok(())
    }

    /// Returns `true` if this grant allows `action` on `path` at `at`.
    ///
    /// Malformed paths or actions are never authorized.
    #[must_use]
    pub fn authorizes(&self, path: &str, action: &str, at: Timestamp) -> bool {
        let Ok(path) = path.parse::<ResourcePath>() else {
            return false;
        };
        let Ok(action) = action.parse::<Action>() else {
            return false;
        };
        self.path_prefix.contains(&path)
            && self.actions.contains(&action)
            && self.window().contains(at)
    }
}

/// Narrows `parent` towards `requested`. See [`CapabilityGrant::attenuate`].
///
/// # Errors
///
/// Same as [`CapabilityGrant::attenuate`].
pub fn attenuate(
    parent: &CapabilityGrant,
    requested: &CapabilityGrant,
) -> Result<CapabilityGrant, GrantError> {
    parent.attenuate(requested)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use testresult::TestResult;

    fn grant(path: &str, actions: &[&str], expiry: u64) -> CapabilityGrant {
        CapabilityGrant::new(
            path.parse().unwrap(),
            actions.iter().map(|a| a.parse().unwrap()),
            Timestamp::from_unix(expiry),
        )
        .unwrap()
    }

    #[test]
    fn it_rejects_an_empty_action_set() {
        let result = CapabilityGrant::new(ResourcePath::root(), [], Timestamp::from_unix(10));
        assert_eq!(result, Err(GrantError::EmptyActionSet));
    }

    #[test]
    fn it_rejects_an_empty_window() {
        let result = grant("/", &["kv/get"], 10).with_not_before(Some(Timestamp::from_unix(11)));
        assert!(matches!(result, Err(GrantError::EmptyWindow { .. })));
    }

    #[test]
    fn it_intersects_actions() -> TestResult {
        let parent = grant("/photos", &["kv/get", "kv/list"], 100);
        let requested = grant("/photos/a.jpg", &["kv/get", "kv/put"], 50);
        let result = parent.attenuate(&requested)?;

        assert_eq!(result, grant("/photos/a.jpg", &["kv/get"], 50));
        Ok(())
    }

    #[test]
    fn it_fails_when_no_action_survives() {
        let parent = grant("/photos", &["kv/get"], 100);
        let requested = grant("/photos", &["kv/put"], 50);
        assert_eq!(parent.attenuate(&requested), Err(GrantError::EmptyActionSet));
    }

    #[test]
    fn it_rejects_paths_outside_the_scope() {
        let parent = grant("/photos", &["kv/get"], 100);
        let requested = grant("/photosynthesis", &["kv/get"], 50);
        assert!(matches!(
            parent.attenuate(&requested),
            Err(GrantError::PathEscapesScope { .. })
        ));
    }

    #[test]
    fn it_clamps_an_over_long_expiry() -> TestResult {
        let parent = grant("/", &["kv/get"], 100);
        let requested = grant("/", &["kv/get"], 100 + 86_400);
        assert_eq!(parent.attenuate(&requested)?.expiry(), Timestamp::from_unix(100));
        Ok(())
    }

    #[test]
    fn it_takes_the_later_not_before() -> TestResult {
        let parent = grant("/", &["kv/get"], 100).with_not_before(Some(Timestamp::from_unix(20)))?;
        let requested = grant("/", &["kv/get"], 100).with_not_before(Some(Timestamp::from_unix(10)))?;
        assert_eq!(
            parent.attenuate(&requested)?.not_before(),
            Some(Timestamp::from_unix(20))
        );

        let unbounded = grant("/", &["kv/get"], 100);
        assert_eq!(
            parent.attenuate(&unbounded)?.not_before(),
            Some(Timestamp::from_unix(20))
        );
        Ok(())
    }

    #[test]
    fn it_reports_each_attenuation_violation() -> TestResult {
        let parent = grant("/photos", &["kv/get"], 100).with_not_before(Some(Timestamp::from_unix(10)))?;

        assert!(matches!(
            grant("/", &["kv/get"], 50).check_attenuates(&parent),
            Err(AttenuationViolation::Path { .. })
        ));
        assert!(matches!(
            grant("/photos", &["kv/get", "kv/put"], 50).check_attenuates(&parent),
            Err(AttenuationViolation::Actions { escalated }) if escalated.len() == 1
        ));
        assert!(matches!(
            grant("/photos", &["kv/get"], 101).check_attenuates(&parent),
            Err(AttenuationViolation::Expiry { .. })
        ));
        assert_eq!(
            grant("/photos", &["kv/get"], 50)
                .with_not_before(Some(Timestamp::from_unix(5)))?
                .check_attenuates(&parent),
            Err(AttenuationViolation::NotBefore {
                parent: Timestamp::from_unix(10),
                child: Timestamp::from_unix(5),
            })
        );
        Ok(())
    }

    #[test]
    fn it_lets_a_child_inherit_the_parent_not_before() -> TestResult {
        let parent = grant("/photos", &["kv/get"], 100).with_not_before(Some(Timestamp::from_unix(10)))?;
        grant("/photos", &["kv/get"], 50).check_attenuates(&parent)?;
        Ok(())
    }

    #[test]
    fn it_authorizes_within_scope_and_window() -> TestResult {
        let grant = grant("/photos", &["kv/get"], 100).with_not_before(Some(Timestamp::from_unix(10)))?;

        assert!(grant.authorizes("/photos/a.jpg", "kv/get", Timestamp::from_unix(50)));
        assert!(grant.authorizes("/photos", "kv/get", Timestamp::from_unix(100)));
        assert!(!grant.authorizes("/photos/a.jpg", "kv/list", Timestamp::from_unix(50)));
        assert!(!grant.authorizes("/photosynthesis", "kv/get", Timestamp::from_unix(50)));
        assert!(!grant.authorizes("/photos/a.jpg", "kv/get", Timestamp::from_unix(101)));
        assert!(!grant.authorizes("/photos/a.jpg", "kv/get", Timestamp::from_unix(9)));
        assert!(!grant.authorizes("photos", "kv/get", Timestamp::from_unix(50)));
        Ok(())
    }

    #[test]
    fn it_serializes_as_camel_case() -> TestResult {
        let grant = grant("/photos", &["kv/list", "kv/get"], 100);
        let json = serde_json::to_value(&grant)?;
        assert_eq!(
            json,
            serde_json::json!({
                "pathPrefix": "/photos",
                "actions": ["kv/get", "kv/list"],
                "expiry": 100
            })
        );
        assert_eq!(serde_json::from_value::<CapabilityGrant>(json)?, grant);
        Ok(())
    }

    #[test]
    fn it_validates_when_deserializing() {
        let empty = serde_json::json!({ "pathPrefix": "/", "actions": [], "expiry": 1 });
        assert!(serde_json::from_value::<CapabilityGrant>(empty).is_err());

        let inverted = serde_json::json!({
            "pathPrefix": "/", "actions": ["kv/get"], "notBefore": 5, "expiry": 1
        });
        assert!(serde_json::from_value::<CapabilityGrant>(inverted).is_err());
    }

    fn arb_path() -> impl Strategy<Value = ResourcePath> {
        prop::collection::vec(prop::sample::select(vec!["a", "b", "ab"]), 0..4)
            .prop_map(|segments| format!("/{}", segments.join("/")).parse().unwrap())
    }

    fn arb_grant() -> impl Strategy<Value = CapabilityGrant> {
        let actions = prop::collection::btree_set(
            prop::sample::select(vec!["kv/get", "kv/put", "kv/list", "kv/del"]),
            1..4,
        );
        (arb_path(), actions, prop::option::of(0u64..50), 50u64..200).prop_map(
            |(path, actions, nbf, exp)| {
                let actions = actions.into_iter().map(|a| a.parse().unwrap());
                CapabilityGrant::new(path, actions, Timestamp::from_unix(exp))
                    .unwrap()
                    .with_not_before(nbf.map(Timestamp::from_unix))
                    .unwrap()
            },
        )
    }

    proptest! {
        #[test]
        fn attenuation_never_widens(parent in arb_grant(), requested in arb_grant()) {
            if let Ok(result) = parent.attenuate(&requested) {
                prop_assert!(result.actions().is_subset(parent.actions()));
                prop_assert!(parent.path_prefix().contains(result.path_prefix()));
                prop_assert!(result.expiry() <= parent.expiry());
                prop_assert!(result.check_attenuates(&parent).is_ok());
            }
        }

        #[test]
        fn attenuating_by_itself_is_identity(grant in arb_grant()) {
            prop_assert_eq!(grant.attenuate(&grant), Ok(grant.clone()));
        }
    }
}
