//! Basics.
//!
//! This module provides the fundamental types for working with DNS data
//! held in a zone: domain [names][name::Name], record
//! [classes][iana::Class] and [types][iana::Rtype], [TTLs][ttl::Ttl],
//! SOA [serial numbers][serial::Serial], and complete
//! [records][record::Record].
//!
//! The types only implement what is needed to keep zone data in memory.
//! Neither wire format nor master file format are handled here; producers
//! of zone data in those formats are expected to convert into these types
//! before handing records over to a zone transaction.

pub use self::iana::{Class, Rtype};
pub use self::name::{Name, NameError};
pub use self::record::Record;
pub use self::serial::Serial;
pub use self::ttl::Ttl;

pub mod iana;
pub mod name;
pub mod record;
pub mod serial;
pub mod ttl;
