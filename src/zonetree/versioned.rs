//! Zone versions and the copy-on-write layer.
//!
//! A committed [`Version`] maps owner names to frozen nodes kept behind an
//! arc. A [`WritableVersion`] starts out holding the very same arcs as the
//! version it is based on and only copies a node into an owned, mutable
//! [`Node`] the first time that name is changed. When the writable version
//! is frozen, the owned nodes become frozen nodes while all untouched names
//! keep pointing to the nodes of the parent version.

use core::fmt;
use std::collections::{btree_map, BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::base::iana::Rtype;
use crate::base::name::Name;
use crate::base::serial::Serial;

use super::nodes::{FrozenNode, Node, NodeRead};
use super::types::SharedRrset;

//------------ VersionId -----------------------------------------------------

/// The identifier of a zone version.
///
/// Ids are allocated in strictly increasing order over the lifetime of a
/// zone. The first version of a zone has id 1.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VersionId(u64);

impl VersionId {
    /// The id of the initial version of a zone.
    pub const FIRST: Self = VersionId(1);

    #[must_use]
    pub fn next(self) -> Self {
        VersionId(self.0 + 1)
    }

    pub fn into_int(self) -> u64 {
        self.0
    }
}

impl From<u64> for VersionId {
    fn from(value: u64) -> Self {
        VersionId(value)
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

//------------ Version -------------------------------------------------------

/// A committed version of a zone.
///
/// Versions are never changed after they have been created. Any number of
/// readers may share one through an arc.
#[derive(Clone, Debug)]
pub struct Version {
    id: VersionId,
    nodes: BTreeMap<Name, Arc<FrozenNode>>,
}

impl Version {
    /// Creates a new version without any nodes.
    pub fn empty(id: VersionId) -> Self {
        Version {
            id,
            nodes: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> VersionId {
        self.id
    }

    pub fn get_node(&self, name: &Name) -> Option<&Arc<FrozenNode>> {
        self.nodes.get(name)
    }

    pub fn get_rrset(
        &self,
        name: &Name,
        rtype: Rtype,
        covers: Rtype,
    ) -> Option<&SharedRrset> {
        self.nodes.get(name)?.get_rrset(rtype, covers)
    }

    /// Returns an iterator over all nodes in canonical name order.
    pub fn iter(&self) -> btree_map::Iter<'_, Name, Arc<FrozenNode>> {
        self.nodes.iter()
    }

    /// Returns the number of names in the version.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the serial of the SOA record at `apex`, if there is one.
    pub fn soa_serial(&self, apex: &Name) -> Option<Serial> {
        self.get_rrset(apex, Rtype::SOA, Rtype::NONE)?
            .first()?
            .as_soa()
            .map(|soa| soa.serial())
    }
}

//------------ NodeSlot ------------------------------------------------------

/// A node of a writable version.
///
/// The slot either still shares the frozen node of the base version or
/// holds a node owned by the writable version.
#[derive(Clone, Debug)]
pub enum NodeSlot {
    Shared(Arc<FrozenNode>),
    Owned(Node),
}

impl NodeSlot {
    /// Returns a frozen snapshot of the node.
    ///
    /// For a shared slot this is the shared node itself.
    pub fn snapshot(&self) -> Arc<FrozenNode> {
        match self {
            NodeSlot::Shared(node) => node.clone(),
            NodeSlot::Owned(node) => Arc::new(node.clone().freeze()),
        }
    }

    /// Makes sure the slot holds a node owned by version `id`.
    fn make_owned(&mut self, id: VersionId) -> &mut Node {
        let copy = match self {
            NodeSlot::Shared(frozen) => {
                debug_assert_ne!(frozen.version_id(), id);
                Some(Node::copy_of(id, &**frozen))
            }
            NodeSlot::Owned(_) => None,
        };
        if let Some(node) = copy {
            *self = NodeSlot::Owned(node);
        }
        match self {
            NodeSlot::Owned(node) => node,
            NodeSlot::Shared(_) => unreachable!("slot was just made owned"),
        }
    }

    fn into_frozen(self) -> Arc<FrozenNode> {
        match self {
            NodeSlot::Shared(node) => node,
            NodeSlot::Owned(node) => Arc::new(node.freeze()),
        }
    }
}

impl NodeRead for NodeSlot {
    fn version_id(&self) -> VersionId {
        match self {
            NodeSlot::Shared(node) => node.version_id(),
            NodeSlot::Owned(node) => node.version_id(),
        }
    }

    fn rrsets(&self) -> &[SharedRrset] {
        match self {
            NodeSlot::Shared(node) => node.rrsets(),
            NodeSlot::Owned(node) => node.rrsets(),
        }
    }
}

//------------ WritableVersion -----------------------------------------------

/// The working copy of a write transaction.
///
/// Only ever owned by a single write transaction and never shown to
/// readers. It remembers the names it has touched so that a commit without
/// any changes can be detected.
#[derive(Debug)]
pub struct WritableVersion {
    id: VersionId,
    nodes: BTreeMap<Name, NodeSlot>,
    changed: BTreeSet<Name>,

    /// Whether this version replaces a non-empty base with its content.
    replaces_content: bool,
}

impl WritableVersion {
    /// Creates a new version with id `id` on top of `base`.
    ///
    /// The new version initially shares all nodes of `base`.
    pub fn new(id: VersionId, base: &Version) -> Self {
        WritableVersion {
            id,
            nodes: base
                .nodes
                .iter()
                .map(|(name, node)| {
                    (name.clone(), NodeSlot::Shared(node.clone()))
                })
                .collect(),
            changed: BTreeSet::new(),
            replaces_content: false,
        }
    }

    /// Creates a new, empty version with id `id` replacing `base`.
    pub fn replacement(id: VersionId, base: &Version) -> Self {
        WritableVersion {
            id,
            nodes: BTreeMap::new(),
            changed: BTreeSet::new(),
            replaces_content: !base.is_empty(),
        }
    }

    pub fn id(&self) -> VersionId {
        self.id
    }

    pub fn get_node(&self, name: &Name) -> Option<&NodeSlot> {
        self.nodes.get(name)
    }

    pub fn get_rrset(
        &self,
        name: &Name,
        rtype: Rtype,
        covers: Rtype,
    ) -> Option<&SharedRrset> {
        self.nodes.get(name)?.get_rrset(rtype, covers)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, Name, NodeSlot> {
        self.nodes.iter()
    }

    /// Returns the names changed so far.
    pub fn changed(&self) -> &BTreeSet<Name> {
        &self.changed
    }

    /// Returns whether committing this version would change the zone.
    pub fn has_changes(&self) -> bool {
        self.replaces_content || !self.changed.is_empty()
    }

    /// Stores `rrset` at `name`, replacing a set of the same type.
    pub fn put_rrset(&mut self, name: &Name, rrset: SharedRrset) {
        self.maybe_cow(name).replace_rrset(rrset)
    }

    /// Removes the node for `name` with all its record sets.
    pub fn delete_node(&mut self, name: &Name) {
        if self.nodes.remove(name).is_some() {
            self.changed.insert(name.clone());
        }
    }

    /// Removes a record set from the node for `name`.
    ///
    /// If the node ends up empty, it is removed, too.
    pub fn delete_rrset(&mut self, name: &Name, rtype: Rtype, covers: Rtype) {
        if self.get_rrset(name, rtype, covers).is_none() {
            return;
        }
        if self.maybe_cow(name).delete_rrset(rtype, covers)
            && self.nodes.get(name).map(NodeRead::is_empty) == Some(true)
        {
            self.nodes.remove(name);
        }
    }

    /// Returns the owned node for `name`, copying or creating it.
    ///
    /// Marks the name as changed.
    fn maybe_cow(&mut self, name: &Name) -> &mut Node {
        let id = self.id;
        if !self.changed.contains(name) {
            self.changed.insert(name.clone());
        }
        self.nodes
            .entry(name.clone())
            .or_insert_with(|| NodeSlot::Owned(Node::new(id)))
            .make_owned(id)
    }

    /// Converts the working copy into a committed version.
    pub fn freeze(self) -> Version {
        Version {
            id: self.id,
            nodes: self
                .nodes
                .into_iter()
                .map(|(name, slot)| (name, slot.into_frozen()))
                .collect(),
        }
    }
}

//============ Tests =========================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::Ttl;
    use crate::rdata::Rdata;
    use crate::zonetree::types::Rrset;
    use core::str::FromStr;
    use std::net::Ipv4Addr;

    fn name(s: &str) -> Name {
        Name::from_str(s).unwrap()
    }

    fn a_rrset(last: u8) -> SharedRrset {
        Rrset::from_rdata(Ttl::HOUR, Rdata::A(Ipv4Addr::new(192, 0, 2, last)))
            .into_shared()
    }

    fn base() -> Version {
        let mut first = WritableVersion::new(
            VersionId::FIRST.next(),
            &Version::empty(VersionId::FIRST),
        );
        first.put_rrset(&name("a"), a_rrset(1));
        first.put_rrset(&name("b"), a_rrset(2));
        first.freeze()
    }

    #[test]
    fn untouched_nodes_are_shared() {
        let base = base();
        let mut version = WritableVersion::new(base.id().next(), &base);
        version.put_rrset(&name("a"), a_rrset(3));
        let next = version.freeze();

        assert!(Arc::ptr_eq(
            base.get_node(&name("b")).unwrap(),
            next.get_node(&name("b")).unwrap()
        ));
        assert!(!Arc::ptr_eq(
            base.get_node(&name("a")).unwrap(),
            next.get_node(&name("a")).unwrap()
        ));
        assert_eq!(next.get_node(&name("a")).unwrap().version_id(), next.id());
        assert_eq!(
            base.get_rrset(&name("a"), Rtype::A, Rtype::NONE),
            Some(&a_rrset(1))
        );
    }

    #[test]
    fn node_is_copied_once() {
        let base = base();
        let mut version = WritableVersion::new(base.id().next(), &base);
        version.put_rrset(&name("a"), a_rrset(3));
        let first = version.get_node(&name("a")).unwrap().snapshot();
        version.put_rrset(&name("a"), a_rrset(4));
        assert_eq!(version.changed().len(), 1);
        assert_eq!(first.version_id(), version.id());
        assert_eq!(
            version.get_rrset(&name("a"), Rtype::A, Rtype::NONE),
            Some(&a_rrset(4))
        );
    }

    #[test]
    fn empty_nodes_are_removed() {
        let base = base();
        let mut version = WritableVersion::new(base.id().next(), &base);
        version.delete_rrset(&name("a"), Rtype::A, Rtype::NONE);
        assert!(version.get_node(&name("a")).is_none());
        assert!(version.has_changes());
    }

    #[test]
    fn deleting_missing_data_changes_nothing() {
        let base = base();
        let mut version = WritableVersion::new(base.id().next(), &base);
        version.delete_rrset(&name("a"), Rtype::MX, Rtype::NONE);
        version.delete_rrset(&name("zz"), Rtype::A, Rtype::NONE);
        version.delete_node(&name("zz"));
        assert!(!version.has_changes());
    }

    #[test]
    fn replacement_starts_empty() {
        let base = base();
        let version = WritableVersion::replacement(base.id().next(), &base);
        assert!(version.get_node(&name("a")).is_none());
        assert!(version.changed().is_empty());
        assert!(version.has_changes());

        let empty = Version::empty(VersionId::FIRST);
        let version = WritableVersion::replacement(VersionId::from(2), &empty);
        assert!(!version.has_changes());
    }
}
