//! Versioned, transactional storage of zone data.
//!
//! A zone is stored as a mapping from owner names to nodes, each node
//! holding the [record sets][Rrset] for its name. All access to a zone goes
//! through [`Transaction`]s handed out by a [`TransactionManager`].
//!
//! Two in-memory stores are available, both created via
//! [`ZoneBuilder`]:
//!
//! * [`VersionedZone`] keeps a chain of committed versions. Readers are
//!   pinned to one version and never see changes made after they started.
//!   A single writer at a time prepares the next version by copying only
//!   the nodes it changes. Old versions are dropped according to a
//!   [`PrunePolicy`] once no reader needs them anymore.
//! * [`PlainZone`] only keeps the current content. Writers stage their
//!   changes and apply them on commit; readers always see the current
//!   content.
//!
//! Code that produces zone data, such as a zone file reader or a zone
//! transfer client, only needs a [`TransactionManager`] and works with
//! either store. The [`update`] module provides helpers for these.
//!
//! # Example
//!
//! ```
//! use std::net::Ipv4Addr;
//! use std::str::FromStr;
//! use zonetxn::base::{Name, Rtype, Ttl};
//! use zonetxn::rdata::Rdata;
//! use zonetxn::zonetree::{TransactionManager, ZoneBuilder};
//!
//! let zone = ZoneBuilder::new()
//!     .origin(Name::from_str("example.com.").unwrap())
//!     .build_versioned()
//!     .unwrap();
//! let www = Name::from_str("www").unwrap();
//!
//! let before = zone.reader();
//!
//! let mut txn = zone.writer(false);
//! txn.add_rdata(&www, Ttl::HOUR, Rdata::A(Ipv4Addr::LOCALHOST)).unwrap();
//! txn.commit().unwrap();
//!
//! let after = zone.reader();
//! assert!(before.get(&www, Rtype::A, Rtype::NONE).unwrap().is_none());
//! assert!(after.get(&www, Rtype::A, Rtype::NONE).unwrap().is_some());
//! ```

mod error;
mod in_memory;
mod nodes;
mod policy;
mod traits;
mod transaction;
mod types;
mod versioned;

pub mod update;

pub use self::error::{DeleteNotExact, Error, Lookup};
pub use self::in_memory::{
    PlainTxn, PlainZone, VersionedTxn, VersionedZone, ZoneBuilder,
};
pub use self::nodes::{FrozenNode, Node, NodeRead};
pub use self::policy::PrunePolicy;
pub use self::traits::{
    OriginInfo, ReadAt, TransactionManager, TxnBackend, ZoneStore,
};
pub use self::transaction::{
    CheckDeleteName, CheckDeleteRrset, CheckPutRrset, Transaction,
};
pub use self::types::{OwnedRrset, Rrset, SharedRrset};
pub use self::versioned::{
    NodeSlot, Version, VersionId, WritableVersion,
};
