//! Versioned, transactional in-memory storage for DNS zones.
//!
//! This crate keeps the content of DNS zones in memory and makes it
//! available through transactions. Any number of readers can access a zone
//! at the same time as a single writer changes it. Each reader sees a
//! consistent snapshot of the zone that doesn’t change under its feet, and
//! a writer’s changes only become visible as a whole when it commits.
//!
//! # Modules
//!
//! * [base] contains the fundamental types for DNS data held in a zone:
//!   domain names, record types and classes, TTLs, SOA serial numbers, and
//!   records,
//! * [rdata] contains the record data kept in a zone, and
//! * [zonetree] contains the zone stores and their transactions.
//!
//! Reading and writing of zone files and the wire format are not part of
//! this crate. Producers of zone data in those formats convert their
//! records into the types of [base] and [rdata] and hand them to a zone
//! transaction, for instance via
//! [`load_records`][zonetree::update::load_records] or a
//! [`ZoneUpdater`][zonetree::update::ZoneUpdater].
//!
//! # Reference of Feature Flags
//!
//! * `serde`: Enables serde serialization for a number of basic types.

#![allow(renamed_and_removed_lints)]
#![allow(clippy::unknown_clippy_lints)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod base;
pub mod rdata;
pub mod zonetree;
