//! Building a new zone.

use crate::base::iana::Class;
use crate::base::name::Name;
use crate::zonetree::error::Error;
use crate::zonetree::policy::PrunePolicy;

use super::plain::PlainZone;
use super::zone::VersionedZone;

//------------ ZoneBuilder ---------------------------------------------------

/// Configures and creates an in-memory zone.
///
/// By default, a zone has no origin, is of class IN, stores names relative
/// to its origin, keeps only the latest version, and doesn’t check its apex
/// on commit.
#[derive(Clone, Debug)]
pub struct ZoneBuilder {
    origin: Option<Name>,
    class: Class,
    relativize: bool,
    policy: PrunePolicy,
    check_origin: bool,
}

impl ZoneBuilder {
    pub fn new() -> Self {
        ZoneBuilder {
            origin: None,
            class: Class::IN,
            relativize: true,
            policy: PrunePolicy::default(),
            check_origin: false,
        }
    }

    /// Sets the origin of the zone.
    ///
    /// The origin must be an absolute name.
    pub fn origin(mut self, origin: Name) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn class(mut self, class: Class) -> Self {
        self.class = class;
        self
    }

    /// Sets whether names are stored relative to the origin.
    pub fn relativize(mut self, relativize: bool) -> Self {
        self.relativize = relativize;
        self
    }

    /// Sets the pruning policy of a versioned zone.
    pub fn prune_policy(mut self, policy: PrunePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets whether commits must leave SOA and NS records at the apex.
    pub fn check_origin(mut self, check: bool) -> Self {
        self.check_origin = check;
        self
    }

    fn validate(&self) -> Result<(), Error> {
        if let Some(origin) = self.origin.as_ref() {
            if !origin.is_absolute() {
                return Err(Error::RelativeOrigin(origin.clone()));
            }
        }
        self.policy.validate()
    }

    /// Creates a zone that keeps versions.
    ///
    /// The zone starts out with a single, empty version.
    pub fn build_versioned(self) -> Result<VersionedZone, Error> {
        self.validate()?;
        Ok(VersionedZone::new(
            self.origin,
            self.class,
            self.relativize,
            self.check_origin,
            self.policy,
        ))
    }

    /// Creates a zone that only keeps its current content.
    ///
    /// The pruning policy is ignored.
    pub fn build_plain(self) -> Result<PlainZone, Error> {
        self.validate()?;
        Ok(PlainZone::new(
            self.origin,
            self.class,
            self.relativize,
            self.check_origin,
        ))
    }
}

impl Default for ZoneBuilder {
    fn default() -> Self {
        Self::new()
    }
}

//============ Tests =========================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zonetree::traits::TransactionManager;
    use crate::zonetree::versioned::VersionId;
    use core::str::FromStr;

    #[test]
    fn defaults() {
        let zone = ZoneBuilder::new().build_versioned().unwrap();
        assert_eq!(zone.class(), Class::IN);
        assert_eq!(zone.versions(), [VersionId::FIRST]);
        let info = zone.origin_information();
        assert_eq!(info.origin, None);
        assert!(info.relativize);
    }

    #[test]
    fn rejects_bad_config() {
        let err = ZoneBuilder::new()
            .origin(Name::from_str("example").unwrap())
            .build_plain()
            .unwrap_err();
        assert!(matches!(err, Error::RelativeOrigin(_)));

        let err = ZoneBuilder::new()
            .prune_policy(PrunePolicy::MaxVersions(0))
            .build_versioned()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPolicy(_)));
    }
}
