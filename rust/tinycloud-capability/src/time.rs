//! Timestamps and validity windows.
//!
//! Expiry is a property of the data, checked against a caller supplied
//! instant. Nothing in this crate reads the clock except [`Timestamp::now`].

use serde::{Deserialize, Serialize};
use std::{
    fmt,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// Seconds since the UNIX epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The UNIX epoch.
    pub const EPOCH: Self = Self(0);

    /// Creates a timestamp from seconds since the UNIX epoch.
    #[must_use]
    pub const fn from_unix(seconds: u64) -> Self {
        Self(seconds)
    }

    /// Seconds since the UNIX epoch.
    #[must_use]
    pub const fn to_unix(self) -> u64 {
        self.0
    }

    /// The current wall clock time, truncated to whole seconds.
    #[must_use]
    pub fn now() -> Self {
        let seconds = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs());
        Self(seconds)
    }

    /// `self + duration`, saturating at the maximum representable time.
    #[must_use]
    pub const fn saturating_add(self, duration: Duration) -> Self {
        Self(self.0.saturating_add(duration.as_secs()))
    }

    /// `self - duration`, saturating at the epoch.
    #[must_use]
    pub const fn saturating_sub(self, duration: Duration) -> Self {
        Self(self.0.saturating_sub(duration.as_secs()))
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        Self(
            time.duration_since(UNIX_EPOCH)
                .map_or(0, |elapsed| elapsed.as_secs()),
        )
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A closed validity window `not_before ..= expiration`.
///
/// An absent `not_before` means "valid from the epoch". The expiration is
/// always present: nothing in a delegation chain is valid forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    /// Earliest instant this range is valid.
    pub not_before: Option<Timestamp>,

    /// Latest instant this range is valid.
    pub expiration: Timestamp,
}

impl TimeRange {
    /// Creates a time range.
    #[must_use]
    pub const fn new(not_before: Option<Timestamp>, expiration: Timestamp) -> Self {
        Self {
            not_before,
            expiration,
        }
    }

    /// Returns `true` if some instant lies within this range.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.not_before.is_none_or(|nbf| nbf <= self.expiration)
    }

    /// Returns `true` if `at` lies within this range (both ends inclusive).
    #[must_use]
    pub fn contains(&self, at: Timestamp) -> bool {
        self.not_before.is_none_or(|nbf| nbf <= at) && at <= self.expiration
    }

    /// Intersection of two ranges: the later start and the earlier end.
    #[must_use]
    pub fn intersect(self, other: Self) -> Self {
        let not_before = match (self.not_before, other.not_before) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        Self {
            not_before,
            expiration: self.expiration.min(other.expiration),
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(nbf) = self.not_before {
            write!(f, "{nbf}")?;
        }
        write!(f, "..={}", self.expiration)
    }
}
