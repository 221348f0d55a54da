//! In-memory backing stores for zones.
mod builder;
mod plain;
mod zone;

pub use builder::ZoneBuilder;
pub use plain::{PlainTxn, PlainZone};
pub use zone::{VersionedTxn, VersionedZone};
