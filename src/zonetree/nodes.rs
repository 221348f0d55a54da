//! The nodes of a zone.
//!
//! A node holds all record sets of one owner name. It exists in two forms:
//! a [`Node`] is owned by the writable version of a zone and can be changed,
//! a [`FrozenNode`] is part of a committed version and can only be read.
//! Freezing consumes the node, so there is no way back from a frozen node
//! to a mutable one other than copying its record sets into a new
//! [`Node`]. Both forms implement [`NodeRead`].

use std::vec::Vec;

use crate::base::iana::Rtype;

use super::types::SharedRrset;
use super::versioned::VersionId;

//------------ NodeRead ------------------------------------------------------

/// Read access to the record sets of a node.
pub trait NodeRead {
    /// Returns the id of the version the node was created for.
    fn version_id(&self) -> VersionId;

    /// Returns all record sets of the node.
    fn rrsets(&self) -> &[SharedRrset];

    /// Returns the record set for the given type and covered type.
    fn get_rrset(&self, rtype: Rtype, covers: Rtype) -> Option<&SharedRrset> {
        self.rrsets()
            .iter()
            .find(|rrset| rrset.matches(rtype, covers))
    }

    /// Returns whether the node has no record sets.
    fn is_empty(&self) -> bool {
        self.rrsets().is_empty()
    }
}

//------------ Node ----------------------------------------------------------

/// A node that can be modified.
///
/// Each node is tagged with the id of the version that created it. A
/// writable version only ever modifies nodes carrying its own id and copies
/// any other node before touching it.
#[derive(Clone, Debug)]
pub struct Node {
    id: VersionId,
    rrsets: Vec<SharedRrset>,
}

impl Node {
    /// Creates an empty node for the given version.
    pub fn new(id: VersionId) -> Self {
        Node {
            id,
            rrsets: Vec::new(),
        }
    }

    /// Creates a node for the given version sharing the record sets of
    /// another node.
    ///
    /// Only the references to the record sets are copied, not the sets
    /// themselves.
    pub fn copy_of(id: VersionId, other: &impl NodeRead) -> Self {
        Node {
            id,
            rrsets: other.rrsets().to_vec(),
        }
    }

    /// Replaces the record set with the same type and covered type.
    pub fn replace_rrset(&mut self, rrset: SharedRrset) {
        match self
            .rrsets
            .iter_mut()
            .find(|item| item.matches(rrset.rtype(), rrset.covers()))
        {
            Some(item) => *item = rrset,
            None => self.rrsets.push(rrset),
        }
    }

    /// Removes the record set for the given type and covered type.
    ///
    /// Returns whether there was such a set.
    pub fn delete_rrset(&mut self, rtype: Rtype, covers: Rtype) -> bool {
        let len = self.rrsets.len();
        self.rrsets.retain(|item| !item.matches(rtype, covers));
        self.rrsets.len() != len
    }

    /// Converts the node into its frozen form.
    pub fn freeze(self) -> FrozenNode {
        FrozenNode {
            id: self.id,
            rrsets: self.rrsets,
        }
    }
}

impl NodeRead for Node {
    fn version_id(&self) -> VersionId {
        self.id
    }

    fn rrsets(&self) -> &[SharedRrset] {
        &self.rrsets
    }
}

//------------ FrozenNode ----------------------------------------------------

/// A node of a committed version.
///
/// Frozen nodes are kept behind an arc and shared by all versions that
/// contain them unchanged.
#[derive(Clone, Debug)]
pub struct FrozenNode {
    id: VersionId,
    rrsets: Vec<SharedRrset>,
}

impl NodeRead for FrozenNode {
    fn version_id(&self) -> VersionId {
        self.id
    }

    fn rrsets(&self) -> &[SharedRrset] {
        &self.rrsets
    }
}

//============ Tests =========================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::Ttl;
    use crate::rdata::{Rdata, Rrsig};
    use crate::zonetree::types::Rrset;
    use bytes::Bytes;
    use std::net::Ipv4Addr;

    fn a_rrset(last: u8) -> SharedRrset {
        Rrset::from_rdata(Ttl::HOUR, Rdata::A(Ipv4Addr::new(192, 0, 2, last)))
            .into_shared()
    }

    #[test]
    fn replace_and_delete() {
        let mut node = Node::new(VersionId::from(1));
        node.replace_rrset(a_rrset(1));
        node.replace_rrset(a_rrset(2));
        assert_eq!(node.rrsets().len(), 1);
        assert_eq!(node.get_rrset(Rtype::A, Rtype::NONE), Some(&a_rrset(2)));

        assert!(!node.delete_rrset(Rtype::AAAA, Rtype::NONE));
        assert!(node.delete_rrset(Rtype::A, Rtype::NONE));
        assert!(node.is_empty());
    }

    #[test]
    fn signatures_are_keyed_by_covered_type() {
        let sig = |covers| {
            Rrset::from_rdata(
                Ttl::HOUR,
                Rdata::Rrsig(Rrsig::new(covers, Bytes::new())),
            )
            .into_shared()
        };
        let mut node = Node::new(VersionId::from(1));
        node.replace_rrset(sig(Rtype::A));
        node.replace_rrset(sig(Rtype::NS));
        assert_eq!(node.rrsets().len(), 2);
        assert!(node.get_rrset(Rtype::RRSIG, Rtype::A).is_some());
        assert!(node.get_rrset(Rtype::RRSIG, Rtype::NONE).is_none());
    }

    #[test]
    fn copies_share_record_sets() {
        let mut node = Node::new(VersionId::from(1));
        node.replace_rrset(a_rrset(1));
        let frozen = node.freeze();

        let mut copy = Node::copy_of(VersionId::from(2), &frozen);
        assert_eq!(copy.version_id(), VersionId::from(2));
        assert!(copy.rrsets()[0].ptr_eq(&frozen.rrsets()[0]));

        copy.replace_rrset(a_rrset(9));
        assert_eq!(frozen.get_rrset(Rtype::A, Rtype::NONE), Some(&a_rrset(1)));
    }
}
