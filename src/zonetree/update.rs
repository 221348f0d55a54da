//! High-level support for applying changes to a zone.
//!
//! This module provides the glue between producers of zone data and the
//! transactions of a zone. [`ZoneUpdater`] applies the stream of
//! [`ZoneUpdate`]s produced when interpreting a zone transfer while
//! [`load_records`] feeds the records read from a zone file into a write
//! transaction. Both work with any [`TransactionManager`].

use core::fmt;

use tracing::{debug, trace};

use crate::base::iana::{Class, Rtype};
use crate::base::record::Record;
use crate::rdata::Rdata;

use super::error::Error;
use super::traits::{TransactionManager, TxnBackend};
use super::transaction::Transaction;
use super::types::Rrset;

//------------ ZoneUpdate ----------------------------------------------------

/// A change to be applied to a zone.
///
/// A full transfer of a zone is expressed as [`DeleteAllRecords`] followed
/// by any number of [`AddRecord`]s and a final [`Finished`]. An incremental
/// transfer consists of one batch per intermediate version, each starting
/// with [`BeginBatchDelete`] carrying the SOA of the old version and
/// switching to additions with [`BeginBatchAdd`] carrying the SOA of the
/// new version.
///
/// [`DeleteAllRecords`]: ZoneUpdate::DeleteAllRecords
/// [`AddRecord`]: ZoneUpdate::AddRecord
/// [`Finished`]: ZoneUpdate::Finished
/// [`BeginBatchDelete`]: ZoneUpdate::BeginBatchDelete
/// [`BeginBatchAdd`]: ZoneUpdate::BeginBatchAdd
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ZoneUpdate {
    /// Remove the entire content of the zone.
    DeleteAllRecords,

    /// Remove a single record.
    DeleteRecord(Record),

    /// Add a single record.
    AddRecord(Record),

    /// Start a batch of deletions for the version with the given SOA.
    BeginBatchDelete(Record),

    /// Start a batch of additions for the version with the given SOA.
    BeginBatchAdd(Record),

    /// All updates have been provided and the zone has the given SOA.
    Finished(Record),
}

impl fmt::Display for ZoneUpdate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ZoneUpdate::DeleteAllRecords => f.write_str("DeleteAllRecords"),
            ZoneUpdate::DeleteRecord(_) => f.write_str("DeleteRecord"),
            ZoneUpdate::AddRecord(_) => f.write_str("AddRecord"),
            ZoneUpdate::BeginBatchDelete(_) => {
                f.write_str("BeginBatchDelete")
            }
            ZoneUpdate::BeginBatchAdd(_) => f.write_str("BeginBatchAdd"),
            ZoneUpdate::Finished(_) => f.write_str("Finished"),
        }
    }
}

//------------ ZoneUpdater ---------------------------------------------------

/// Applies a sequence of [`ZoneUpdate`]s to a zone.
///
/// The updater opens a write transaction when it is created. Changes become
/// visible to readers when [`ZoneUpdate::Finished`] is applied. Each
/// [`ZoneUpdate::BeginBatchDelete`] after the first commits the previous
/// batch and starts a new transaction, so every batch of an incremental
/// transfer results in its own version of the zone.
///
/// If the updater is dropped before receiving [`ZoneUpdate::Finished`],
/// the transaction in progress is rolled back.
pub struct ZoneUpdater<M: TransactionManager> {
    zone: M,

    /// The transaction in progress. `None` once finished.
    write: Option<Transaction<M::Backend>>,

    /// Whether we are in incremental batching mode.
    batching: bool,
}

impl<M: TransactionManager> ZoneUpdater<M> {
    /// Creates a new updater for `zone`.
    ///
    /// This blocks until write access to the zone is available.
    pub fn new(zone: M) -> Self {
        let write = zone.writer(false);
        ZoneUpdater {
            zone,
            write: Some(write),
            batching: false,
        }
    }

    /// Returns whether [`ZoneUpdate::Finished`] has been applied.
    pub fn is_finished(&self) -> bool {
        self.write.is_none()
    }

    /// Applies a single update.
    ///
    /// If applying fails, the transaction in progress is rolled back and
    /// the updater can’t be used any further.
    pub fn apply(&mut self, update: ZoneUpdate) -> Result<(), Error> {
        trace!("Event: {update}");
        let res = self.apply_inner(update);
        if res.is_err() {
            if let Some(mut write) = self.write.take() {
                if let Err(err) = write.rollback() {
                    debug!("Rollback of failed update failed: {}", err);
                }
            }
        }
        res
    }

    fn apply_inner(&mut self, update: ZoneUpdate) -> Result<(), Error> {
        match update {
            ZoneUpdate::DeleteAllRecords => {
                // Readers keep seeing the old content until we commit.
                self.write()?.delete_all()?;
            }

            ZoneUpdate::DeleteRecord(record) => {
                self.check_class(&record)?;
                self.write()?
                    .delete_rdata(record.owner(), record.data().clone())?;
            }

            ZoneUpdate::AddRecord(record) => {
                self.check_class(&record)?;
                self.write()?.add_record(&record)?;
            }

            ZoneUpdate::BeginBatchDelete(_old_soa) => {
                if self.batching {
                    self.write()?.commit()?;
                    debug!("Committed incremental batch");
                    self.write = Some(self.zone.writer(false));
                }
                self.batching = true;
            }

            ZoneUpdate::BeginBatchAdd(new_soa) => {
                self.update_soa(new_soa)?;
                self.batching = true;
            }

            ZoneUpdate::Finished(zone_soa) => {
                self.update_soa(zone_soa)?;
                let mut write = self.write.take().ok_or(Error::AlreadyEnded)?;
                write.commit()?;
                debug!("Zone update finished");
            }
        }
        Ok(())
    }

    fn write(&mut self) -> Result<&mut Transaction<M::Backend>, Error> {
        self.write.as_mut().ok_or(Error::AlreadyEnded)
    }

    fn check_class(&self, record: &Record) -> Result<(), Error> {
        let zone = self.zone.class();
        if record.class() != zone {
            return Err(Error::ClassMismatch {
                zone,
                record: record.class(),
            });
        }
        Ok(())
    }

    /// Replaces the SOA record set with the given record.
    fn update_soa(&mut self, soa: Record) -> Result<(), Error> {
        if soa.rtype() != Rtype::SOA {
            return Err(Error::NoSoa);
        }
        self.check_class(&soa)?;
        let owner = soa.owner().clone();
        let rrset = Rrset::from_rdata(soa.ttl(), soa.into_data());
        self.write()?.replace(&owner, rrset)
    }
}

//------------ load_records --------------------------------------------------

/// Adds records to a write transaction.
///
/// All records must be of class `class`. If the transaction doesn’t know
/// the zone’s origin yet, the owner of the first SOA record becomes the
/// origin.
///
/// Returns the number of records added.
pub fn load_records<B, I>(
    txn: &mut Transaction<B>,
    class: Class,
    records: I,
) -> Result<usize, Error>
where
    B: TxnBackend,
    I: IntoIterator<Item = Record>,
{
    let mut count = 0;
    for record in records {
        if record.class() != class {
            return Err(Error::ClassMismatch {
                zone: class,
                record: record.class(),
            });
        }
        if txn.origin_information().origin.is_none()
            && matches!(record.data(), Rdata::Soa(_))
            && record.owner().is_absolute()
        {
            debug!("Zone origin set to {}", record.owner());
            txn.set_origin(record.owner().clone())?;
        }
        txn.add_record(&record)?;
        count += 1;
    }
    trace!("Loaded {} records", count);
    Ok(count)
}

//============ Tests =========================================================
