//! Qualified action names.

use crate::error::GrantError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// A qualified operation name of the form `namespace/verb`, for example
/// `kv/get` or `tinycloud.kv/list`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Action(String);

impl Action {
    /// The namespace part (`kv` in `kv/get`).
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.0.split_once('/').map_or("", |(namespace, _)| namespace)
    }

    /// The verb part (`get` in `kv/get`).
    #[must_use]
    pub fn verb(&self) -> &str {
        self.0.split_once('/').map_or("", |(_, verb)| verb)
    }

    /// The full action string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Action {
    type Err = GrantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = s.split_once('/').is_some_and(|(namespace, verb)| {
            !namespace.is_empty() && !verb.is_empty() && !verb.contains('/')
        }) && !s.chars().any(char::is_whitespace);
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(GrantError::InvalidAction(s.to_string()))
        }
    }
}

impl TryFrom<String> for Action {
    type Error = GrantError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.0
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
