//! Pruning of old zone versions.

use core::fmt;
use std::sync::Arc;

use super::error::Error;
use super::versioned::Version;

//------------ PrunePolicy ---------------------------------------------------

/// Decides whether the oldest retained version of a zone may be dropped.
///
/// The policy is only ever asked about versions that no open reader uses
/// and that are older than the current version. It receives the oldest
/// version and the number of versions currently retained.
#[derive(Clone, Default)]
pub enum PrunePolicy {
    /// Only keep the most recent version.
    #[default]
    KeepLatest,

    /// Keep up to the given number of versions.
    ///
    /// Construct via [`PrunePolicy::max_versions`], which rejects zero.
    MaxVersions(usize),

    /// Never drop any version.
    KeepAll,

    /// Ask a closure.
    ///
    /// The closure is called while the zone’s internal lock is held. It
    /// must not access the zone it belongs to, e.g., start a transaction
    /// or query its versions, or it will deadlock.
    Custom(Arc<dyn Fn(&Version, usize) -> bool + Send + Sync>),
}

impl PrunePolicy {
    /// Creates a policy retaining at most `max` versions.
    ///
    /// A `max` of `None` means no limit, i.e., [`PrunePolicy::KeepAll`].
    /// Returns an error if `max` is zero.
    pub fn max_versions(max: Option<usize>) -> Result<Self, Error> {
        match max {
            None => Ok(PrunePolicy::KeepAll),
            Some(0) => Err(Error::InvalidPolicy("max versions must be at least 1")),
            Some(1) => Ok(PrunePolicy::KeepLatest),
            Some(max) => Ok(PrunePolicy::MaxVersions(max)),
        }
    }

    /// Creates a policy from a closure.
    ///
    /// See [`PrunePolicy::Custom`] for the restrictions on the closure.
    pub fn custom(
        op: impl Fn(&Version, usize) -> bool + Send + Sync + 'static,
    ) -> Self {
        PrunePolicy::Custom(Arc::new(op))
    }

    /// Checks that the policy can be applied.
    pub fn validate(&self) -> Result<(), Error> {
        match self {
            PrunePolicy::MaxVersions(0) => {
                Err(Error::InvalidPolicy("max versions must be at least 1"))
            }
            _ => Ok(()),
        }
    }

    /// Returns whether `oldest` may be dropped.
    pub fn should_prune(&self, oldest: &Version, retained: usize) -> bool {
        match self {
            PrunePolicy::KeepLatest => retained > 1,
            PrunePolicy::MaxVersions(max) => retained > *max,
            PrunePolicy::KeepAll => false,
            PrunePolicy::Custom(op) => op(oldest, retained),
        }
    }
}

impl fmt::Debug for PrunePolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PrunePolicy::KeepLatest => f.write_str("KeepLatest"),
            PrunePolicy::MaxVersions(max) => {
                f.debug_tuple("MaxVersions").field(max).finish()
            }
            PrunePolicy::KeepAll => f.write_str("KeepAll"),
            PrunePolicy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

//============ Tests =========================================================
