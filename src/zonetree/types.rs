use core::{fmt, ops};
use std::sync::Arc;
use std::vec::Vec;

use crate::base::iana::Rtype;
use crate::base::name::Name;
use crate::base::ttl::Ttl;
use crate::rdata::Rdata;

//------------ Rrset ---------------------------------------------------------

/// A set of records of the same type for one owner name.
///
/// Record sets are keyed by their type and, for signature records, by the
/// type they cover. The data has set semantics: a record that is already
/// present is not added a second time. All records share one TTL.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rrset {
    rtype: Rtype,
    covers: Rtype,
    ttl: Ttl,
    data: Vec<Rdata>,
}

impl Rrset {
    /// Creates a new, empty record set of the given type.
    pub fn new(rtype: Rtype, ttl: Ttl) -> Self {
        Self::new_covering(rtype, Rtype::NONE, ttl)
    }

    /// Creates a new, empty record set for a type covering another type.
    pub fn new_covering(rtype: Rtype, covers: Rtype, ttl: Ttl) -> Self {
        Rrset {
            rtype,
            covers,
            ttl,
            data: Vec::new(),
        }
    }

    /// Creates a record set holding a single record.
    pub fn from_rdata(ttl: Ttl, data: Rdata) -> Self {
        Rrset {
            rtype: data.rtype(),
            covers: data.covers(),
            ttl,
            data: vec![data],
        }
    }

    pub fn rtype(&self) -> Rtype {
        self.rtype
    }

    pub fn covers(&self) -> Rtype {
        self.covers
    }

    pub fn ttl(&self) -> Ttl {
        self.ttl
    }

    pub fn data(&self) -> &[Rdata] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn first(&self) -> Option<&Rdata> {
        self.data.first()
    }

    /// Returns whether the set is keyed by the given type and covered type.
    pub fn matches(&self, rtype: Rtype, covers: Rtype) -> bool {
        self.rtype == rtype && self.covers == covers
    }

    /// Returns whether every record of `other` is part of this set.
    pub fn contains_all(&self, other: &Rrset) -> bool {
        other.data.iter().all(|data| self.data.contains(data))
    }

    /// Lowers the TTL to `ttl` if it is currently larger.
    pub fn limit_ttl(&mut self, ttl: Ttl) {
        if self.ttl > ttl {
            self.ttl = ttl
        }
    }

    /// Adds a record to the set.
    ///
    /// Returns whether the record was added, i.e., wasn’t present yet.
    pub fn push_data(&mut self, data: Rdata) -> bool {
        debug_assert_eq!(data.rtype(), self.rtype);
        if self.data.contains(&data) {
            false
        } else {
            self.data.push(data);
            true
        }
    }

    /// Merges the records of `other` into this set.
    ///
    /// An empty set takes over the TTL of `other`, otherwise the smaller of
    /// the two TTLs is kept.
    pub fn union_update(&mut self, other: &Rrset) {
        if self.data.is_empty() {
            self.ttl = other.ttl;
        } else {
            self.limit_ttl(other.ttl);
        }
        for data in &other.data {
            self.push_data(data.clone());
        }
    }

    /// Removes all records of `other` from this set.
    pub fn difference_update(&mut self, other: &Rrset) {
        self.data.retain(|data| !other.data.contains(data));
    }

    pub fn into_shared(self) -> SharedRrset {
        SharedRrset::new(self)
    }
}

impl fmt::Display for Rrset {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for data in &self.data {
            if !first {
                f.write_str("\n")?;
            }
            first = false;
            write!(f, "{} {} {}", self.ttl, self.rtype, data)?;
        }
        Ok(())
    }
}

//------------ SharedRrset ---------------------------------------------------

/// A frozen record set behind an arc.
///
/// This is the form in which record sets are kept inside zone versions.
/// It deliberately offers no way to change the set: a writer that wants to
/// alter it has to take a copy via [`SharedRrset::to_rrset`] and store a
/// new shared set in its place.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SharedRrset(Arc<Rrset>);

impl SharedRrset {
    pub fn new(rrset: Rrset) -> Self {
        SharedRrset(Arc::new(rrset))
    }

    pub fn as_rrset(&self) -> &Rrset {
        self.0.as_ref()
    }

    /// Returns an owned, mutable copy of the record set.
    pub fn to_rrset(&self) -> Rrset {
        self.0.as_ref().clone()
    }

    /// Returns whether both values refer to the same allocation.
    pub fn ptr_eq(&self, other: &SharedRrset) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

//--- Deref, AsRef, From

impl ops::Deref for SharedRrset {
    type Target = Rrset;

    fn deref(&self) -> &Self::Target {
        self.as_rrset()
    }
}

impl AsRef<Rrset> for SharedRrset {
    fn as_ref(&self) -> &Rrset {
        self.as_rrset()
    }
}

impl From<Rrset> for SharedRrset {
    fn from(rrset: Rrset) -> Self {
        SharedRrset::new(rrset)
    }
}

//--- Deserialize and Serialize

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for SharedRrset {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Self, D::Error> {
        <Rrset as serde::Deserialize>::deserialize(deserializer)
            .map(SharedRrset::new)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for SharedRrset {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serde::Serialize::serialize(self.as_rrset(), serializer)
    }
}

//------------ OwnedRrset ----------------------------------------------------

/// A record set together with its owner name.
pub type OwnedRrset = (Name, SharedRrset);

//============ Tests =========================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn a(last: u8) -> Rdata {
        Rdata::A(Ipv4Addr::new(192, 0, 2, last))
    }

    #[test]
    fn set_semantics() {
        let mut rrset = Rrset::new(Rtype::A, Ttl::HOUR);
        assert!(rrset.push_data(a(1)));
        assert!(!rrset.push_data(a(1)));
        assert!(rrset.push_data(a(2)));
        assert_eq!(rrset.len(), 2);
    }

    #[test]
    fn union_keeps_smaller_ttl() {
        let mut rrset = Rrset::from_rdata(Ttl::HOUR, a(1));
        rrset.union_update(&Rrset::from_rdata(Ttl::from_secs(60), a(2)));
        assert_eq!(rrset.ttl(), Ttl::from_secs(60));
        assert_eq!(rrset.data(), &[a(1), a(2)]);

        rrset.union_update(&Rrset::from_rdata(Ttl::HOUR, a(3)));
        assert_eq!(rrset.ttl(), Ttl::from_secs(60));
    }

    #[test]
    fn union_into_empty_takes_ttl() {
        let mut rrset = Rrset::new(Rtype::A, Ttl::ZERO);
        rrset.union_update(&Rrset::from_rdata(Ttl::HOUR, a(1)));
        assert_eq!(rrset.ttl(), Ttl::HOUR);
    }

    #[test]
    fn difference_and_contains() {
        let mut rrset = Rrset::from_rdata(Ttl::HOUR, a(1));
        rrset.push_data(a(2));
        let one = Rrset::from_rdata(Ttl::HOUR, a(1));
        assert!(rrset.contains_all(&one));
        rrset.difference_update(&one);
        assert!(!rrset.contains_all(&one));
        assert_eq!(rrset.data(), &[a(2)]);
    }

    #[test]
    fn shared_copies_are_independent() {
        let shared = Rrset::from_rdata(Ttl::HOUR, a(1)).into_shared();
        let mut copy = shared.to_rrset();
        copy.push_data(a(2));
        assert_eq!(shared.len(), 1);
        assert!(shared.ptr_eq(&shared.clone()));
    }
}
