//! Transactions on zones.
//!
//! A [`Transaction`] is the only way to read or change a versioned zone. It
//! validates names against the zone’s origin, implements the merge and
//! delete semantics on top of the few primitive operations of a
//! [`TxnBackend`], and makes sure every transaction is ended exactly once,
//! either explicitly or by rolling back when it is dropped.

use core::fmt;
use std::boxed::Box;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::base::iana::Rtype;
use crate::base::name::Name;
use crate::base::record::Record;
use crate::base::serial::Serial;
use crate::base::ttl::Ttl;
use crate::rdata::Rdata;

use super::error::{DeleteNotExact, Error};
use super::nodes::FrozenNode;
use super::traits::{OriginInfo, TxnBackend};
use super::types::{OwnedRrset, Rrset, SharedRrset};

//------------ Check callbacks -----------------------------------------------

/// A callback vetting a record set before it is stored.
pub type CheckPutRrset =
    Box<dyn Fn(&Name, &Rrset) -> Result<(), String> + Send>;

/// A callback vetting the deletion of a record set.
pub type CheckDeleteRrset =
    Box<dyn Fn(&Name, Rtype, Rtype) -> Result<(), String> + Send>;

/// A callback vetting the deletion of a name.
pub type CheckDeleteName = Box<dyn Fn(&Name) -> Result<(), String> + Send>;

//------------ Transaction ---------------------------------------------------

/// A read or write transaction on a zone.
///
/// Read transactions see one committed version of the zone for their whole
/// life time. Write transactions see the version they started from plus
/// their own changes.
///
/// Names may be given absolute or relative to the origin. Absolute names
/// must be at or below the origin.
///
/// Once [`commit`][Self::commit] or [`rollback`][Self::rollback] has been
/// called, all methods fail with [`Error::AlreadyEnded`]. A transaction
/// dropped without being ended is rolled back.
pub struct Transaction<B: TxnBackend> {
    backend: B,
    ended: bool,
    check_put_rrset: Option<CheckPutRrset>,
    check_delete_rrset: Option<CheckDeleteRrset>,
    check_delete_name: Option<CheckDeleteName>,
}

impl<B: TxnBackend> Transaction<B> {
    pub(crate) fn new(backend: B) -> Self {
        Transaction {
            backend,
            ended: false,
            check_put_rrset: None,
            check_delete_rrset: None,
            check_delete_name: None,
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.backend.is_read_only()
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Returns the origin information as seen by this transaction.
    pub fn origin_information(&self) -> OriginInfo {
        self.backend.origin_information()
    }

    /// Returns the backend of the transaction.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub(crate) fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    fn check_ended(&self) -> Result<(), Error> {
        if self.ended {
            Err(Error::AlreadyEnded)
        } else {
            Ok(())
        }
    }

    fn check_writable(&self) -> Result<(), Error> {
        self.check_ended()?;
        if self.backend.is_read_only() {
            Err(Error::Immutable)
        } else {
            Ok(())
        }
    }

    fn validate_name(&self, name: &Name) -> Result<Name, Error> {
        validate_name(&self.backend.origin_information(), name)
    }
}

/// # Check callbacks
///
impl<B: TxnBackend> Transaction<B> {
    /// Sets a callback that can veto storing record sets.
    pub fn check_put_rrset(
        &mut self,
        check: impl Fn(&Name, &Rrset) -> Result<(), String> + Send + 'static,
    ) {
        self.check_put_rrset = Some(Box::new(check))
    }

    /// Sets a callback that can veto deleting record sets.
    pub fn check_delete_rrset(
        &mut self,
        check: impl Fn(&Name, Rtype, Rtype) -> Result<(), String>
            + Send
            + 'static,
    ) {
        self.check_delete_rrset = Some(Box::new(check))
    }

    /// Sets a callback that can veto deleting names.
    pub fn check_delete_name(
        &mut self,
        check: impl Fn(&Name) -> Result<(), String> + Send + 'static,
    ) {
        self.check_delete_name = Some(Box::new(check))
    }
}

/// # Reading
///
impl<B: TxnBackend> Transaction<B> {
    /// Returns the record set of the given type and covered type at `name`.
    pub fn get(
        &self,
        name: &Name,
        rtype: Rtype,
        covers: Rtype,
    ) -> Result<Option<SharedRrset>, Error> {
        self.check_ended()?;
        let name = self.validate_name(name)?;
        Ok(self.backend.get_rrset(&name, rtype, covers))
    }

    /// Returns the node with all record sets at `name`.
    pub fn get_node(
        &self,
        name: &Name,
    ) -> Result<Option<Arc<FrozenNode>>, Error> {
        self.check_ended()?;
        let name = self.validate_name(name)?;
        Ok(self.backend.get_node(&name))
    }

    /// Returns whether there are any record sets at `name`.
    pub fn name_exists(&self, name: &Name) -> Result<bool, Error> {
        self.check_ended()?;
        let name = self.validate_name(name)?;
        Ok(self.backend.name_exists(&name))
    }

    /// Returns whether the transaction has changed the zone.
    ///
    /// Always false for read transactions.
    pub fn changed(&self) -> Result<bool, Error> {
        self.check_ended()?;
        Ok(self.backend.changed())
    }

    /// Returns an iterator over all record sets visible to the transaction.
    ///
    /// The sets are returned in canonical name order.
    pub fn iter_rrsets(
        &self,
    ) -> Result<impl Iterator<Item = OwnedRrset> + '_, Error> {
        self.check_ended()?;
        Ok(self.backend.iter_rrsets())
    }

    /// Returns an iterator over all names visible to the transaction.
    pub fn iter_names(&self) -> Result<impl Iterator<Item = Name> + '_, Error> {
        self.check_ended()?;
        let mut last: Option<Name> = None;
        Ok(self.backend.iter_rrsets().filter_map(move |(name, _)| {
            if last.as_ref() == Some(&name) {
                None
            } else {
                last = Some(name.clone());
                Some(name)
            }
        }))
    }
}

/// # Adding and replacing
///
impl<B: TxnBackend> Transaction<B> {
    /// Adds a single record.
    ///
    /// The record is merged into an existing record set of the same type.
    pub fn add_rdata(
        &mut self,
        name: &Name,
        ttl: Ttl,
        data: Rdata,
    ) -> Result<(), Error> {
        self.add_rrset(name, Rrset::from_rdata(ttl, data))
    }

    /// Adds a record.
    pub fn add_record(&mut self, record: &Record) -> Result<(), Error> {
        self.add_rdata(record.owner(), record.ttl(), record.data().clone())
    }

    /// Merges a record set into the zone.
    ///
    /// If there already is a set of the same type, the records are added to
    /// it and its TTL is lowered to the TTL of `rrset` if that is smaller.
    /// Adding an empty set does nothing.
    pub fn add_rrset(&mut self, name: &Name, rrset: Rrset) -> Result<(), Error> {
        self.check_writable()?;
        let name = self.validate_name(name)?;
        if rrset.is_empty() {
            return Ok(());
        }
        let merged = match self.backend.get_rrset(
            &name,
            rrset.rtype(),
            rrset.covers(),
        ) {
            Some(existing) => {
                if existing.contains_all(&rrset) && existing.ttl() <= rrset.ttl()
                {
                    return Ok(());
                }
                let mut merged = existing.to_rrset();
                merged.union_update(&rrset);
                merged
            }
            None => rrset,
        };
        self.put(&name, merged)
    }

    /// Replaces the record set of the same type with `rrset`.
    ///
    /// Replacing with an empty set deletes the record set.
    pub fn replace(&mut self, name: &Name, rrset: Rrset) -> Result<(), Error> {
        self.check_writable()?;
        let name = self.validate_name(name)?;
        if rrset.is_empty() {
            self.delete_rrset_inner(&name, rrset.rtype(), rrset.covers(), false)
        } else {
            self.put(&name, rrset)
        }
    }

    fn put(&mut self, name: &Name, rrset: Rrset) -> Result<(), Error> {
        if let Some(check) = self.check_put_rrset.as_ref() {
            check(name, &rrset).map_err(Error::Rejected)?;
        }
        trace!("Put {} {} at {}", rrset.rtype(), rrset.len(), name);
        self.backend.put_rrset(name, rrset.into_shared())
    }
}

/// # Deleting
///
impl<B: TxnBackend> Transaction<B> {
    /// Deletes all record sets at `name`.
    pub fn delete_name(&mut self, name: &Name) -> Result<(), Error> {
        self.delete_name_inner(name, false)
    }

    /// Deletes all record sets at `name`, failing if there are none.
    pub fn delete_name_exact(&mut self, name: &Name) -> Result<(), Error> {
        self.delete_name_inner(name, true)
    }

    fn delete_name_inner(
        &mut self,
        name: &Name,
        exact: bool,
    ) -> Result<(), Error> {
        self.check_writable()?;
        let name = self.validate_name(name)?;
        if !self.backend.name_exists(&name) {
            if exact {
                return Err(DeleteNotExact::Name.into());
            }
            return Ok(());
        }
        if let Some(check) = self.check_delete_name.as_ref() {
            check(&name).map_err(Error::Rejected)?;
        }
        self.backend.delete_name(&name)
    }

    /// Deletes every name of the zone.
    ///
    /// The transaction keeps its write access. On commit, whatever has
    /// been added afterwards replaces the entire content of the zone.
    pub fn delete_all(&mut self) -> Result<(), Error> {
        self.check_writable()?;
        trace!("Delete all names");
        self.backend.clear()
    }

    /// Deletes the record set of the given type and covered type.
    pub fn delete_rrset(
        &mut self,
        name: &Name,
        rtype: Rtype,
        covers: Rtype,
    ) -> Result<(), Error> {
        self.check_writable()?;
        let name = self.validate_name(name)?;
        self.delete_rrset_inner(&name, rtype, covers, false)
    }

    /// Deletes a record set, failing if it doesn’t exist.
    pub fn delete_rrset_exact(
        &mut self,
        name: &Name,
        rtype: Rtype,
        covers: Rtype,
    ) -> Result<(), Error> {
        self.check_writable()?;
        let name = self.validate_name(name)?;
        self.delete_rrset_inner(&name, rtype, covers, true)
    }

    fn delete_rrset_inner(
        &mut self,
        name: &Name,
        rtype: Rtype,
        covers: Rtype,
        exact: bool,
    ) -> Result<(), Error> {
        if self.backend.get_rrset(name, rtype, covers).is_none() {
            if exact {
                return Err(DeleteNotExact::Rrset.into());
            }
            return Ok(());
        }
        if let Some(check) = self.check_delete_rrset.as_ref() {
            check(name, rtype, covers).map_err(Error::Rejected)?;
        }
        self.backend.delete_rrset(name, rtype, covers)
    }

    /// Removes the records of `rrset` from the set of the same type.
    ///
    /// Records that aren’t present are ignored. If the set ends up empty,
    /// it is deleted.
    pub fn delete_records(
        &mut self,
        name: &Name,
        rrset: &Rrset,
    ) -> Result<(), Error> {
        self.delete_records_inner(name, rrset, false)
    }

    /// Removes the records of `rrset`, failing if any of them is missing.
    pub fn delete_records_exact(
        &mut self,
        name: &Name,
        rrset: &Rrset,
    ) -> Result<(), Error> {
        self.delete_records_inner(name, rrset, true)
    }

    /// Removes a single record.
    pub fn delete_rdata(
        &mut self,
        name: &Name,
        data: Rdata,
    ) -> Result<(), Error> {
        self.delete_records(name, &Rrset::from_rdata(Ttl::ZERO, data))
    }

    /// Removes a single record, failing if it is missing.
    pub fn delete_rdata_exact(
        &mut self,
        name: &Name,
        data: Rdata,
    ) -> Result<(), Error> {
        self.delete_records_exact(name, &Rrset::from_rdata(Ttl::ZERO, data))
    }

    fn delete_records_inner(
        &mut self,
        name: &Name,
        rrset: &Rrset,
        exact: bool,
    ) -> Result<(), Error> {
        self.check_writable()?;
        let name = self.validate_name(name)?;
        let existing =
            match self.backend.get_rrset(&name, rrset.rtype(), rrset.covers())
            {
                Some(existing) => existing,
                None if exact => return Err(DeleteNotExact::Records.into()),
                None => return Ok(()),
            };
        if exact && !existing.contains_all(rrset) {
            return Err(DeleteNotExact::Records.into());
        }
        let mut remaining = existing.to_rrset();
        remaining.difference_update(rrset);
        if remaining.is_empty() {
            self.delete_rrset_inner(&name, rrset.rtype(), rrset.covers(), false)
        } else if remaining.len() == existing.len() {
            Ok(())
        } else {
            self.put(&name, remaining)
        }
    }
}

/// # Zone maintenance
///
impl<B: TxnBackend> Transaction<B> {
    /// Updates the serial of the SOA record at `name`.
    ///
    /// If `relative` is true, `value` is added to the current serial,
    /// otherwise the serial is set to `value`. A serial of zero is
    /// skipped. If `name` is `None`, the SOA at the zone apex is used.
    ///
    /// Returns the new serial.
    pub fn update_serial(
        &mut self,
        value: u32,
        relative: bool,
        name: Option<&Name>,
    ) -> Result<Serial, Error> {
        self.check_writable()?;
        let name = match name {
            Some(name) => self.validate_name(name)?,
            None => self
                .backend
                .origin_information()
                .effective()
                .ok_or(Error::NoOrigin)?,
        };
        let rrset = self
            .backend
            .get_rrset(&name, Rtype::SOA, Rtype::NONE)
            .ok_or(Error::NoSoa)?;
        let soa = rrset
            .first()
            .and_then(Rdata::as_soa)
            .ok_or(Error::NoSoa)?;
        let mut serial = if relative {
            soa.serial()
                .checked_add(value)
                .ok_or(Error::InvalidSerial(value))?
        } else {
            Serial(value)
        };
        if serial.into_int() == 0 {
            serial = Serial(1);
        }
        let updated =
            Rrset::from_rdata(rrset.ttl(), soa.with_serial(serial).into());
        self.put(&name, updated)?;
        Ok(serial)
    }

    /// Sets the origin of a zone that doesn’t have one yet.
    ///
    /// The origin becomes the zone’s origin when the transaction is
    /// committed. It must be an absolute name.
    pub fn set_origin(&mut self, origin: Name) -> Result<(), Error> {
        self.check_writable()?;
        if !origin.is_absolute() {
            return Err(Error::RelativeOrigin(origin));
        }
        self.backend.set_origin(origin)
    }
}

/// # Ending
///
impl<B: TxnBackend> Transaction<B> {
    /// Commits the transaction.
    ///
    /// If the transaction hasn’t changed anything, it is ended without
    /// creating a new version. If the zone checks its origin and the apex
    /// lacks an SOA or NS record set, the transaction is rolled back and an
    /// error returned.
    pub fn commit(&mut self) -> Result<(), Error> {
        self.check_ended()?;
        if let Err(err) = self.check_origin() {
            debug!("Commit refused: {}", err);
            self.rollback()?;
            return Err(err);
        }
        self.ended = true;
        self.backend.end(true)
    }

    /// Rolls back the transaction.
    pub fn rollback(&mut self) -> Result<(), Error> {
        self.check_ended()?;
        self.ended = true;
        self.backend.end(false)
    }

    fn check_origin(&self) -> Result<(), Error> {
        if self.backend.is_read_only()
            || !self.backend.checks_origin()
            || !self.backend.changed()
        {
            return Ok(());
        }
        let apex = self
            .backend
            .origin_information()
            .effective()
            .ok_or(Error::NoOrigin)?;
        if self.backend.get_rrset(&apex, Rtype::SOA, Rtype::NONE).is_none() {
            return Err(Error::NoSoa);
        }
        if self.backend.get_rrset(&apex, Rtype::NS, Rtype::NONE).is_none() {
            return Err(Error::NoNs);
        }
        Ok(())
    }
}

impl<B: TxnBackend> Drop for Transaction<B> {
    fn drop(&mut self) {
        if !self.ended {
            self.ended = true;
            if let Err(err) = self.backend.end(false) {
                debug!("Rollback of dropped transaction failed: {}", err);
            }
        }
    }
}

impl<B: TxnBackend> fmt::Debug for Transaction<B> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("read_only", &self.backend.is_read_only())
            .field("ended", &self.ended)
            .finish()
    }
}

//------------ validate_name -------------------------------------------------

/// Converts `name` into the form in which the zone stores names.
///
/// Absolute names must be at or below the origin and are made relative if
/// the zone relativizes. Relative names are made absolute if it doesn’t.
pub(crate) fn validate_name(
    info: &OriginInfo,
    name: &Name,
) -> Result<Name, Error> {
    if name.is_absolute() {
        let origin = info.origin.as_ref().ok_or(Error::NoOrigin)?;
        if !name.is_subdomain(origin) {
            return Err(Error::OutOfZone(name.clone()));
        }
        if info.relativize {
            Ok(name.relativize(origin))
        } else {
            Ok(name.clone())
        }
    } else if info.relativize {
        Ok(name.clone())
    } else {
        let origin = info.origin.as_ref().ok_or(Error::NoOrigin)?;
        Ok(name.derelativize(origin)?)
    }
}

//============ Tests =========================================================
