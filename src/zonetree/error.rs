//! Zone related errors.

use core::fmt;

use crate::base::iana::Class;
use crate::base::name::{Name, NameError};

use super::versioned::VersionId;

//------------ Error ---------------------------------------------------------

/// An operation on a zone or one of its transactions failed.
///
/// None of these errors leave a zone in an inconsistent state. A failing
/// mutation inside a write transaction is not applied, and a failing commit
/// rolls the transaction back before the error is returned.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Error {
    /// A versioned zone was mutated directly instead of through a
    /// transaction.
    UseTransaction,

    /// A mutation was attempted through a frozen version, i.e., through a
    /// read transaction.
    Immutable,

    /// The transaction has already been committed or rolled back.
    AlreadyEnded,

    /// An exact delete did not find what it was asked to delete.
    DeleteNotExact(DeleteNotExact),

    /// No committed version matches the requested id or serial.
    NotFound(Lookup),

    /// A pruning policy was configured with an invalid value.
    InvalidPolicy(&'static str),

    /// A serial number increment was out of range.
    InvalidSerial(u32),

    /// A name is not at or below the zone’s origin.
    OutOfZone(Name),

    /// A name had to be converted relative to the origin but the zone
    /// doesn’t have an origin yet.
    NoOrigin,

    /// An origin was given as a relative name.
    RelativeOrigin(Name),

    /// A name could not be constructed.
    Name(NameError),

    /// A check callback refused a mutation.
    Rejected(String),

    /// The class of a record does not match the class of the zone.
    ClassMismatch { zone: Class, record: Class },

    /// Waiting for write access to the zone timed out.
    Timeout,

    /// The zone has no SOA record set at its origin.
    NoSoa,

    /// The zone has no NS record set at its origin.
    NoNs,

    /// The zone a transaction belongs to no longer exists.
    ZoneDropped,
}

impl From<NameError> for Error {
    fn from(err: NameError) -> Self {
        Error::Name(err)
    }
}

impl From<DeleteNotExact> for Error {
    fn from(err: DeleteNotExact) -> Self {
        Error::DeleteNotExact(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::UseTransaction => {
                f.write_str("versioned zones must be modified via transactions")
            }
            Error::Immutable => f.write_str("zone version is immutable"),
            Error::AlreadyEnded => f.write_str("transaction already ended"),
            Error::DeleteNotExact(err) => write!(f, "{err}"),
            Error::NotFound(lookup) => write!(f, "{lookup} not found"),
            Error::InvalidPolicy(reason) => {
                write!(f, "invalid pruning policy: {reason}")
            }
            Error::InvalidSerial(value) => {
                write!(f, "serial increment {value} out of range")
            }
            Error::OutOfZone(name) => {
                write!(f, "{name} is not a subdomain of the zone origin")
            }
            Error::NoOrigin => f.write_str("no zone origin is defined"),
            Error::RelativeOrigin(name) => {
                write!(f, "zone origin {name} is not absolute")
            }
            Error::Name(err) => write!(f, "invalid name: {err}"),
            Error::Rejected(reason) => write!(f, "rejected: {reason}"),
            Error::ClassMismatch { zone, record } => {
                write!(f, "record class {record} differs from zone class {zone}")
            }
            Error::Timeout => f.write_str("timed out waiting for write access"),
            Error::NoSoa => f.write_str("no SOA record at the zone origin"),
            Error::NoNs => f.write_str("no NS record set at the zone origin"),
            Error::ZoneDropped => f.write_str("the zone no longer exists"),
        }
    }
}

impl std::error::Error for Error {}

//------------ DeleteNotExact ------------------------------------------------

/// What an exact delete failed to find.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeleteNotExact {
    /// The name did not exist.
    Name,

    /// The record set did not exist.
    Rrset,

    /// Not all of the records to delete existed.
    Records,
}

impl fmt::Display for DeleteNotExact {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DeleteNotExact::Name => {
                f.write_str("delete_name_exact: name does not exist")
            }
            DeleteNotExact::Rrset => {
                f.write_str("delete_rrset_exact: record set does not exist")
            }
            DeleteNotExact::Records => {
                f.write_str("delete_records_exact: records do not exist")
            }
        }
    }
}

//------------ Lookup --------------------------------------------------------

/// The version a reader asked for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Lookup {
    /// A version with the given id.
    Id(VersionId),

    /// A version whose SOA carries the given serial.
    Serial(crate::base::Serial),
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Lookup::Id(id) => write!(f, "version {id}"),
            Lookup::Serial(serial) => write!(f, "version with serial {serial}"),
        }
    }
}
