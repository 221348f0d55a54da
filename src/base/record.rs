//! Resource records.

use core::fmt;

use super::iana::{Class, Rtype};
use super::name::Name;
use super::ttl::Ttl;
use crate::rdata::Rdata;

//------------ Record --------------------------------------------------------

/// A single DNS resource record.
///
/// This is the unit handed over by producers of zone data, such as a
/// master file reader or a zone transfer client, before it is folded into
/// the record sets of a zone.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Record {
    owner: Name,
    class: Class,
    ttl: Ttl,
    data: Rdata,
}

impl Record {
    /// Creates a new record from its parts.
    pub fn new(owner: Name, class: Class, ttl: Ttl, data: Rdata) -> Self {
        Record {
            owner,
            class,
            ttl,
            data,
        }
    }

    pub fn owner(&self) -> &Name {
        &self.owner
    }

    pub fn class(&self) -> Class {
        self.class
    }

    pub fn ttl(&self) -> Ttl {
        self.ttl
    }

    pub fn rtype(&self) -> Rtype {
        self.data.rtype()
    }

    pub fn data(&self) -> &Rdata {
        &self.data
    }

    pub fn into_data(self) -> Rdata {
        self.data
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.owner,
            self.ttl,
            self.class,
            self.rtype(),
            self.data
        )
    }
}
