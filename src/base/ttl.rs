//! Record time-to-live values.

use core::fmt;
use core::time::Duration;

//------------ Ttl -----------------------------------------------------------

/// A time-to-live value in seconds.
///
/// A record’s TTL states for how long it may be cached. Record sets share a
/// single TTL for all their records, which is why merging two sets keeps
/// the smaller of the two values.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ttl(u32);

impl Ttl {
    /// A time-to-live of zero seconds.
    pub const ZERO: Ttl = Ttl::from_secs(0);

    /// A time-to-live of one hour.
    pub const HOUR: Ttl = Ttl::from_secs(3600);

    /// The largest time-to-live permitted by RFC 2181.
    pub const MAX: Ttl = Ttl::from_secs(0x7FFF_FFFF);

    /// Creates a new value from a number of seconds.
    #[must_use]
    pub const fn from_secs(secs: u32) -> Self {
        Ttl(secs)
    }

    /// Returns the number of seconds.
    #[must_use]
    pub const fn as_secs(&self) -> u32 {
        self.0
    }

    /// Returns the value as a [`Duration`].
    #[must_use]
    pub fn into_duration(self) -> Duration {
        Duration::from_secs(u64::from(self.0))
    }
}

impl From<u32> for Ttl {
    fn from(secs: u32) -> Self {
        Ttl::from_secs(secs)
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
