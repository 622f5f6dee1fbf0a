//! UTC timestamps for token validity windows.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds since the UNIX epoch.
///
/// UCAN expiration and not-before bounds are expressed in whole seconds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The current time.
    #[must_use]
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp().max(0) as u64)
    }

    /// Construct from UNIX seconds.
    #[must_use]
    pub const fn from_unix(seconds: u64) -> Self {
        Self(seconds)
    }

    /// The UNIX seconds value.
    #[must_use]
    pub const fn to_unix(self) -> u64 {
        self.0
    }

    /// This timestamp shifted `seconds` into the future.
    #[must_use]
    pub const fn plus_secs(self, seconds: u64) -> Self {
        Self(self.0.saturating_add(seconds))
    }
}

impl From<u64> for Timestamp {
    fn from(seconds: u64) -> Self {
        Self(seconds)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_orders_by_seconds() {
        assert!(Timestamp::from_unix(10) < Timestamp::from_unix(11));
    }

    #[test]
    fn it_saturates_on_overflow() {
        let far = Timestamp::from_unix(u64::MAX).plus_secs(10);
        assert_eq!(far.to_unix(), u64::MAX);
    }
}
