//! The traits connecting zone storage and transactions.
//!
//! A zone store implements [`TransactionManager`] to hand out
//! [`Transaction`]s. Each transaction wraps a store specific
//! [`TxnBackend`]. Producers of zone data such as zone file loaders or the
//! appliers of zone transfer diffs only ever talk to the transaction and
//! therefore work with any store.

use std::boxed::Box;
use std::sync::Arc;

use crate::base::iana::{Class, Rtype};
use crate::base::name::Name;
use crate::base::serial::Serial;

use super::error::Error;
use super::nodes::FrozenNode;
use super::transaction::Transaction;
use super::types::{OwnedRrset, SharedRrset};
use super::versioned::VersionId;

//------------ OriginInfo ----------------------------------------------------

/// Information about the origin of a zone.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OriginInfo {
    /// The absolute origin name, if it is known yet.
    pub origin: Option<Name>,

    /// Whether names are stored relative to the origin.
    pub relativize: bool,
}

impl OriginInfo {
    pub fn new(origin: Option<Name>, relativize: bool) -> Self {
        OriginInfo { origin, relativize }
    }

    /// Returns the name under which the apex is stored.
    ///
    /// This is the empty name for relativized zones and the origin itself
    /// otherwise.
    pub fn effective(&self) -> Option<Name> {
        if self.relativize {
            Some(Name::empty())
        } else {
            self.origin.clone()
        }
    }
}

//------------ ReadAt --------------------------------------------------------

/// Selects the version a read transaction is pinned to.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ReadAt {
    /// The most recently committed version.
    #[default]
    Latest,

    /// The version with the given id.
    Id(VersionId),

    /// The newest version whose SOA record has the given serial.
    Serial(Serial),
}

//------------ TxnBackend ----------------------------------------------------

/// The store specific part of a transaction.
///
/// All names passed to a backend have already been validated and converted
/// into the form in which the store keeps them. A backend doesn’t need to
/// track whether the transaction has ended, [`Transaction`] does that and
/// guarantees that [`end`][Self::end] is called exactly once.
pub trait TxnBackend {
    /// Returns the origin as seen by the transaction.
    ///
    /// For a write transaction this includes an origin set via
    /// [`set_origin`][Self::set_origin] but not yet committed.
    fn origin_information(&self) -> OriginInfo;

    /// Returns whether a commit must verify the SOA and NS records at the
    /// apex.
    fn checks_origin(&self) -> bool;

    fn is_read_only(&self) -> bool;

    fn get_rrset(
        &self,
        name: &Name,
        rtype: Rtype,
        covers: Rtype,
    ) -> Option<SharedRrset>;

    fn get_node(&self, name: &Name) -> Option<Arc<FrozenNode>>;

    fn name_exists(&self, name: &Name) -> bool;

    /// Stores a record set, replacing one of the same type.
    ///
    /// The set is never empty.
    fn put_rrset(&mut self, name: &Name, rrset: SharedRrset)
        -> Result<(), Error>;

    fn delete_name(&mut self, name: &Name) -> Result<(), Error>;

    fn delete_rrset(
        &mut self,
        name: &Name,
        rtype: Rtype,
        covers: Rtype,
    ) -> Result<(), Error>;

    fn set_origin(&mut self, origin: Name) -> Result<(), Error>;

    /// Drops all content and all changes made so far.
    ///
    /// The transaction continues as if it had been started as a
    /// replacement writer.
    fn clear(&mut self) -> Result<(), Error>;

    /// Returns whether committing would change the zone.
    fn changed(&self) -> bool;

    /// Returns all record sets visible to the transaction in name order.
    fn iter_rrsets(&self) -> Box<dyn Iterator<Item = OwnedRrset> + '_>;

    /// Ends the transaction, committing if `commit` is true.
    fn end(&mut self, commit: bool) -> Result<(), Error>;
}

//------------ TransactionManager --------------------------------------------

/// A zone store that hands out transactions.
pub trait TransactionManager {
    type Backend: TxnBackend;

    /// Starts a read transaction on the latest version.
    fn reader(&self) -> Transaction<Self::Backend>;

    /// Starts a read transaction on the selected version.
    fn reader_at(
        &self,
        at: ReadAt,
    ) -> Result<Transaction<Self::Backend>, Error>;

    /// Starts a write transaction.
    ///
    /// Blocks until write access is available. If `replacement` is true,
    /// the transaction starts out with an empty zone and its content
    /// replaces the entire zone on commit.
    fn writer(&self, replacement: bool) -> Transaction<Self::Backend>;

    fn origin_information(&self) -> OriginInfo;

    fn class(&self) -> Class;

    /// Runs `op` inside a write transaction.
    ///
    /// The transaction is committed if `op` succeeds. If it fails or
    /// panics, the transaction is rolled back.
    fn write_with<T, E, F>(&self, replacement: bool, op: F) -> Result<T, E>
    where
        F: FnOnce(&mut Transaction<Self::Backend>) -> Result<T, E>,
        E: From<Error>,
    {
        let mut txn = self.writer(replacement);
        let res = op(&mut txn)?;
        txn.commit()?;
        Ok(res)
    }

    /// Runs `op` inside a read transaction pinned to `at`.
    fn read_with<T, E, F>(&self, at: ReadAt, op: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction<Self::Backend>) -> Result<T, E>,
        E: From<Error>,
    {
        let txn = self.reader_at(at)?;
        op(&txn)
    }
}

//------------ ZoneStore -----------------------------------------------------

/// Direct access to the latest content of a zone.
///
/// Names are taken as stored, i.e., relative to the origin in a relativized
/// zone. Stores that keep versions refuse direct changes with
/// [`Error::UseTransaction`].
pub trait ZoneStore {
    fn find_rrset(
        &self,
        name: &Name,
        rtype: Rtype,
        covers: Rtype,
    ) -> Option<SharedRrset>;

    fn find_node(&self, name: &Name) -> Option<Arc<FrozenNode>>;

    fn replace_rrset(
        &self,
        name: &Name,
        rrset: SharedRrset,
    ) -> Result<(), Error>;

    fn delete_rrset(
        &self,
        name: &Name,
        rtype: Rtype,
        covers: Rtype,
    ) -> Result<(), Error>;

    fn delete_node(&self, name: &Name) -> Result<(), Error>;
}

//============ Tests =========================================================

#[cfg(test)]
mod tests {
    use super::*;
    use core::str::FromStr;

    #[test]
    fn effective_origin() {
        let origin = Name::from_str("example.").unwrap();
        let info = OriginInfo::new(Some(origin.clone()), true);
        assert_eq!(info.effective(), Some(Name::empty()));
        let info = OriginInfo::new(Some(origin.clone()), false);
        assert_eq!(info.effective(), Some(origin));
        assert_eq!(OriginInfo::new(None, false).effective(), None);
    }
}
