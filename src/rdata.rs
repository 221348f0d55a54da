//! Record data.
//!
//! The zone store treats record data as mostly opaque: it needs to know a
//! record’s type, the type covered by signature records, and for the SOA
//! record the serial number. Everything else only has to be comparable so
//! that record sets can keep set semantics.
//!
//! [`Rdata`] therefore has variants for the common record types plus an
//! [`Unknown`] variant that keeps the raw data of any other type as
//! defined in [RFC 3597].
//!
//! [RFC 3597]: https://tools.ietf.org/html/rfc3597

use core::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::vec::Vec;

use bytes::Bytes;

use crate::base::iana::Rtype;
use crate::base::name::Name;
use crate::base::serial::Serial;
use crate::base::ttl::Ttl;

//------------ Rdata ---------------------------------------------------------

/// The data of a single resource record.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Rdata {
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    Ns(Name),
    Cname(Name),
    Mx(Mx),
    Txt(Vec<Bytes>),
    Soa(Soa),
    Rrsig(Rrsig),
    Unknown(UnknownRecordData),
}

impl Rdata {
    /// Returns the record type of the data.
    pub fn rtype(&self) -> Rtype {
        match self {
            Rdata::A(_) => Rtype::A,
            Rdata::Aaaa(_) => Rtype::AAAA,
            Rdata::Ns(_) => Rtype::NS,
            Rdata::Cname(_) => Rtype::CNAME,
            Rdata::Mx(_) => Rtype::MX,
            Rdata::Txt(_) => Rtype::TXT,
            Rdata::Soa(_) => Rtype::SOA,
            Rdata::Rrsig(_) => Rtype::RRSIG,
            Rdata::Unknown(data) => data.rtype(),
        }
    }

    /// Returns the type covered by the data.
    ///
    /// This is the covered type for RRSIG data and [`Rtype::NONE`] for all
    /// other types.
    pub fn covers(&self) -> Rtype {
        match self {
            Rdata::Rrsig(rrsig) => rrsig.type_covered(),
            _ => Rtype::NONE,
        }
    }

    /// Returns the SOA data if this is an SOA record.
    pub fn as_soa(&self) -> Option<&Soa> {
        match self {
            Rdata::Soa(soa) => Some(soa),
            _ => None,
        }
    }
}

//--- From

impl From<Ipv4Addr> for Rdata {
    fn from(addr: Ipv4Addr) -> Self {
        Rdata::A(addr)
    }
}

impl From<Ipv6Addr> for Rdata {
    fn from(addr: Ipv6Addr) -> Self {
        Rdata::Aaaa(addr)
    }
}

impl From<Mx> for Rdata {
    fn from(mx: Mx) -> Self {
        Rdata::Mx(mx)
    }
}

impl From<Soa> for Rdata {
    fn from(soa: Soa) -> Self {
        Rdata::Soa(soa)
    }
}

impl From<Rrsig> for Rdata {
    fn from(rrsig: Rrsig) -> Self {
        Rdata::Rrsig(rrsig)
    }
}

//--- Display

impl fmt::Display for Rdata {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Rdata::A(addr) => fmt::Display::fmt(addr, f),
            Rdata::Aaaa(addr) => fmt::Display::fmt(addr, f),
            Rdata::Ns(name) | Rdata::Cname(name) => fmt::Display::fmt(name, f),
            Rdata::Mx(mx) => fmt::Display::fmt(mx, f),
            Rdata::Txt(strings) => {
                let mut first = true;
                for s in strings {
                    if !first {
                        f.write_str(" ")?;
                    }
                    first = false;
                    write!(f, "\"{}\"", s.escape_ascii())?;
                }
                Ok(())
            }
            Rdata::Soa(soa) => fmt::Display::fmt(soa, f),
            Rdata::Rrsig(rrsig) => fmt::Display::fmt(rrsig, f),
            Rdata::Unknown(data) => fmt::Display::fmt(data, f),
        }
    }
}

//------------ Mx ------------------------------------------------------------

/// Mx record data.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Mx {
    preference: u16,
    exchange: Name,
}

impl Mx {
    pub fn new(preference: u16, exchange: Name) -> Self {
        Mx {
            preference,
            exchange,
        }
    }

    pub fn preference(&self) -> u16 {
        self.preference
    }

    pub fn exchange(&self) -> &Name {
        &self.exchange
    }
}

impl fmt::Display for Mx {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.preference, self.exchange)
    }
}

//------------ Soa -----------------------------------------------------------

/// Soa record data.
///
/// Soa records mark the top of a zone and contain information pertinent to
/// name server maintenance operations. Most importantly for us, they carry
/// the zone’s serial number.
///
/// The Soa record type is defined in RFC 1035, section 3.3.13.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Soa {
    mname: Name,
    rname: Name,
    serial: Serial,
    refresh: Ttl,
    retry: Ttl,
    expire: Ttl,
    minimum: Ttl,
}

impl Soa {
    /// Creates new Soa record data from content.
    pub fn new(
        mname: Name,
        rname: Name,
        serial: Serial,
        refresh: Ttl,
        retry: Ttl,
        expire: Ttl,
        minimum: Ttl,
    ) -> Self {
        Soa {
            mname,
            rname,
            serial,
            refresh,
            retry,
            expire,
            minimum,
        }
    }

    /// The primary name server for the zone.
    pub fn mname(&self) -> &Name {
        &self.mname
    }

    /// The mailbox for the person responsible for this zone.
    pub fn rname(&self) -> &Name {
        &self.rname
    }

    /// The serial number of the original copy of the zone.
    pub fn serial(&self) -> Serial {
        self.serial
    }

    pub fn refresh(&self) -> Ttl {
        self.refresh
    }

    pub fn retry(&self) -> Ttl {
        self.retry
    }

    pub fn expire(&self) -> Ttl {
        self.expire
    }

    pub fn minimum(&self) -> Ttl {
        self.minimum
    }

    /// Returns a copy of the data with the serial number replaced.
    #[must_use]
    pub fn with_serial(&self, serial: Serial) -> Self {
        Soa {
            serial,
            ..self.clone()
        }
    }
}

impl fmt::Display for Soa {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {} {}",
            self.mname,
            self.rname,
            self.serial,
            self.refresh,
            self.retry,
            self.expire,
            self.minimum
        )
    }
}

//------------ Rrsig ---------------------------------------------------------

/// Rrsig record data.
///
/// Only the covered type is interpreted. The remainder of the record data
/// is kept in wire format.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rrsig {
    type_covered: Rtype,
    data: Bytes,
}

impl Rrsig {
    pub fn new(type_covered: Rtype, data: Bytes) -> Self {
        Rrsig { type_covered, data }
    }

    pub fn type_covered(&self) -> Rtype {
        self.type_covered
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

impl fmt::Display for Rrsig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} \\# {}", self.type_covered, self.data.len())
    }
}

//------------ UnknownRecordData ---------------------------------------------

/// Record data of a type without dedicated support.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UnknownRecordData {
    rtype: Rtype,
    data: Bytes,
}

impl UnknownRecordData {
    pub fn new(rtype: Rtype, data: Bytes) -> Self {
        UnknownRecordData { rtype, data }
    }

    pub fn rtype(&self) -> Rtype {
        self.rtype
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

impl fmt::Display for UnknownRecordData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\\# {}", self.data.len())?;
        for ch in self.data.iter() {
            write!(f, " {:02x}", ch)?;
        }
        Ok(())
    }
}

//============ Tests =========================================================
