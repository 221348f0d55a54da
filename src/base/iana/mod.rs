//! IANA Definitions for DNS.
//!
//! This module contains the types for parameters defined in IANA registries
//! that the zone store needs to know about: record classes and record
//! types.
//!
//! Both types are thin wrappers around their raw integer value with
//! associated constants for the well-known values. `FromStr` and `Display`
//! convert from the mnemonics and back, falling back to the generic
//! `CLASS123` and `TYPE123` forms of [RFC 3597] for values without a
//! mnemonic.
//!
//! [RFC 3597]: https://tools.ietf.org/html/rfc3597

use core::fmt;

pub use self::class::Class;
pub use self::rtype::Rtype;

#[macro_use]
mod macros;

pub mod class;
pub mod rtype;

//------------ FromStrError --------------------------------------------------

/// A string could not be converted into an IANA value.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FromStrError(());

impl fmt::Display for FromStrError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("unknown mnemonic")
    }
}

impl std::error::Error for FromStrError {}
