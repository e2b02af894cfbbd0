//! `/`-delimited resource paths with segment-aligned prefix matching.

use crate::error::GrantError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// A normalized absolute resource path such as `/photos/vacation.jpg`.
///
/// Paths always start with `/`, never end with one (except the root `/`),
/// and contain no empty, `.` or `..` segments. A path covers itself and every
/// path below it: `/a` covers `/a` and `/a/b` but not `/ab`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourcePath(String);

impl ResourcePath {
    /// The root path `/`, covering everything.
    #[must_use]
    pub fn root() -> Self {
        Self("/".into())
    }

    /// The normalized path string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if `other` equals this path or lies below it.
    #[must_use]
    pub fn contains(&self, other: &ResourcePath) -> bool {
        if self.0 == "/" || self.0 == other.0 {
            return true;
        }
        other
            .0
            .strip_prefix(self.0.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Iterate over the segments of this path.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|segment| !segment.is_empty())
    }
}

impl FromStr for ResourcePath {
    type Err = GrantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| GrantError::InvalidPath {
            path: s.to_string(),
            reason: reason.to_string(),
        };
        let rest = s.strip_prefix('/').ok_or_else(|| invalid("must start with '/'"))?;
        if rest.is_empty() {
            return Ok(Self::root());
        }
        let rest = rest.strip_suffix('/').unwrap_or(rest);
        for segment in rest.split('/') {
            match segment {
                "" => return Err(invalid("empty segment")),
                "." | ".." => return Err(invalid("relative segment")),
                _ if segment.chars().any(char::is_control) => {
                    return Err(invalid("control character"));
                }
                _ => {}
            }
        }
        Ok(Self(format!("/{rest}")))
    }
}

impl TryFrom<String> for ResourcePath {
    type Error = GrantError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ResourcePath> for String {
    fn from(path: ResourcePath) -> Self {
        path.0
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
