//! In-memory zones without version history.

use core::fmt;
use std::boxed::Box;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::vec::Vec;

use arc_swap::ArcSwap;
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};
use tracing::{debug, trace};

use crate::base::iana::{Class, Rtype};
use crate::base::name::Name;
use crate::zonetree::error::{Error, Lookup};
use crate::zonetree::nodes::{FrozenNode, Node, NodeRead};
use crate::zonetree::traits::{
    OriginInfo, ReadAt, TransactionManager, TxnBackend, ZoneStore,
};
use crate::zonetree::transaction::Transaction;
use crate::zonetree::types::{OwnedRrset, SharedRrset};
use crate::zonetree::versioned::VersionId;

type NodeMap = BTreeMap<Name, Arc<FrozenNode>>;

//------------ PlainZone -----------------------------------------------------

/// An in-memory zone that only keeps its current content.
///
/// Write transactions stage their changes and apply them all at once when
/// they are committed. Read transactions always see the current content of
/// the zone, so a reader may see different data before and after a writer
/// commits. Only one writer can be active at a time.
///
/// Values of this type are cheap to clone. All clones refer to the same
/// zone.
#[derive(Clone, Debug)]
pub struct PlainZone {
    inner: Arc<PlainInner>,
}

#[derive(Debug)]
struct PlainInner {
    class: Class,
    relativize: bool,
    check_origin: bool,

    /// The current content of the zone.
    nodes: ArcSwap<NodeMap>,

    /// Held by the active writer.
    write_lock: Arc<Mutex<()>>,

    meta: Mutex<PlainMeta>,
}

#[derive(Debug)]
struct PlainMeta {
    origin: Option<Name>,

    /// The id of the last commit.
    ///
    /// Nodes created by a commit are tagged with it.
    generation: VersionId,
}

impl PlainZone {
    pub(super) fn new(
        origin: Option<Name>,
        class: Class,
        relativize: bool,
        check_origin: bool,
    ) -> Self {
        PlainZone {
            inner: Arc::new(PlainInner {
                class,
                relativize,
                check_origin,
                nodes: ArcSwap::from_pointee(NodeMap::new()),
                write_lock: Arc::new(Mutex::new(())),
                meta: Mutex::new(PlainMeta {
                    origin,
                    generation: VersionId::FIRST,
                }),
            }),
        }
    }

    /// Returns the id of the last commit.
    pub fn generation(&self) -> VersionId {
        self.inner.meta.lock().generation
    }

    fn start_reader(&self) -> Transaction<PlainTxn> {
        Transaction::new(PlainTxn {
            zone: self.inner.clone(),
            info: self.origin_information(),
            check_origin: false,
            state: PlainState::Read,
        })
    }

    /// Runs `op` in a write transaction, committing on success.
    fn write_direct(
        &self,
        op: impl FnOnce(&mut PlainTxn) -> Result<(), Error>,
    ) -> Result<(), Error> {
        let mut txn = self.writer(false);
        op(txn.backend_mut())?;
        txn.commit()
    }
}

impl TransactionManager for PlainZone {
    type Backend = PlainTxn;

    fn reader(&self) -> Transaction<PlainTxn> {
        self.start_reader()
    }

    fn reader_at(&self, at: ReadAt) -> Result<Transaction<PlainTxn>, Error> {
        match at {
            ReadAt::Latest => {}
            ReadAt::Id(id) => {
                if self.generation() != id {
                    return Err(Error::NotFound(Lookup::Id(id)));
                }
            }
            ReadAt::Serial(serial) => {
                let current = self.origin_information().effective().and_then(
                    |apex| {
                        self.find_rrset(&apex, Rtype::SOA, Rtype::NONE)?
                            .first()?
                            .as_soa()
                            .map(|soa| soa.serial())
                    },
                );
                if current != Some(serial) {
                    return Err(Error::NotFound(Lookup::Serial(serial)));
                }
            }
        }
        Ok(self.start_reader())
    }

    fn writer(&self, replacement: bool) -> Transaction<PlainTxn> {
        let lock = self.inner.write_lock.lock_arc();
        trace!("Plain writer admitted");
        Transaction::new(PlainTxn {
            zone: self.inner.clone(),
            info: self.origin_information(),
            check_origin: self.inner.check_origin,
            state: PlainState::Write(Box::new(Staging {
                _lock: lock,
                replacement,
                overlay: BTreeMap::new(),
                wiped: BTreeSet::new(),
                origin_changed: false,
            })),
        })
    }

    fn origin_information(&self) -> OriginInfo {
        OriginInfo::new(
            self.inner.meta.lock().origin.clone(),
            self.inner.relativize,
        )
    }

    fn class(&self) -> Class {
        self.inner.class
    }
}

//--- ZoneStore

impl ZoneStore for PlainZone {
    fn find_rrset(
        &self,
        name: &Name,
        rtype: Rtype,
        covers: Rtype,
    ) -> Option<SharedRrset> {
        self.inner.nodes.load().get(name)?.get_rrset(rtype, covers).cloned()
    }

    fn find_node(&self, name: &Name) -> Option<Arc<FrozenNode>> {
        self.inner.nodes.load().get(name).cloned()
    }

    fn replace_rrset(
        &self,
        name: &Name,
        rrset: SharedRrset,
    ) -> Result<(), Error> {
        if rrset.is_empty() {
            return self.delete_rrset(name, rrset.rtype(), rrset.covers());
        }
        self.write_direct(|txn| txn.put_rrset(name, rrset))
    }

    fn delete_rrset(
        &self,
        name: &Name,
        rtype: Rtype,
        covers: Rtype,
    ) -> Result<(), Error> {
        self.write_direct(|txn| txn.delete_rrset(name, rtype, covers))
    }

    fn delete_node(&self, name: &Name) -> Result<(), Error> {
        self.write_direct(|txn| txn.delete_name(name))
    }
}

//------------ PlainTxn ------------------------------------------------------

/// The backend of a transaction on a [`PlainZone`].
#[derive(Debug)]
pub struct PlainTxn {
    zone: Arc<PlainInner>,
    info: OriginInfo,
    check_origin: bool,
    state: PlainState,
}

#[derive(Debug)]
enum PlainState {
    Read,
    Write(Box<Staging>),
    Ended,
}

/// The changes staged by a write transaction.
struct Staging {
    _lock: ArcMutexGuard<RawMutex, ()>,

    /// Whether the zone’s content is dropped on commit.
    replacement: bool,

    /// Changed record sets by name, type and covered type.
    overlay: BTreeMap<(Name, Rtype, Rtype), Staged>,

    /// Names whose record sets are dropped before applying the overlay.
    wiped: BTreeSet<Name>,

    origin_changed: bool,
}

impl fmt::Debug for Staging {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Staging")
            .field("replacement", &self.replacement)
            .field("overlay", &self.overlay)
            .field("wiped", &self.wiped)
            .field("origin_changed", &self.origin_changed)
            .finish()
    }
}

#[derive(Clone, Debug)]
enum Staged {
    Put(SharedRrset),
    Tombstone,
}

impl Staging {
    /// Returns whether applying the staged changes changes the zone.
    fn has_changes(&self, live_is_empty: bool) -> bool {
        !self.overlay.is_empty()
            || !self.wiped.is_empty()
            || (self.replacement && !live_is_empty)
    }

    /// Returns whether the live content for `name` is hidden.
    fn hides(&self, name: &Name) -> bool {
        self.replacement || self.wiped.contains(name)
    }

    fn staged_for<'a>(
        &'a self,
        name: &'a Name,
    ) -> impl Iterator<Item = (Rtype, Rtype, &'a Staged)> + 'a {
        self.overlay
            .range((name.clone(), Rtype::from_int(0), Rtype::from_int(0))..)
            .take_while(move |((key, _, _), _)| key == name)
            .map(|((_, rtype, covers), staged)| (*rtype, *covers, staged))
    }
}

impl PlainTxn {
    fn live(&self) -> arc_swap::Guard<Arc<NodeMap>> {
        self.zone.nodes.load()
    }

    fn staging(&self) -> Option<&Staging> {
        match &self.state {
            PlainState::Write(staging) => Some(staging),
            _ => None,
        }
    }

    fn staging_mut(&mut self) -> Result<&mut Staging, Error> {
        match &mut self.state {
            PlainState::Write(staging) => Ok(staging),
            PlainState::Read => Err(Error::Immutable),
            PlainState::Ended => Err(Error::AlreadyEnded),
        }
    }

    /// Returns the node for `name` with the staged changes applied.
    fn merged_node(
        &self,
        live: &NodeMap,
        name: &Name,
        id: VersionId,
    ) -> Option<Arc<FrozenNode>> {
        let current = match self.staging() {
            Some(staging) if staging.hides(name) => None,
            _ => live.get(name),
        };
        let staging = match self.staging() {
            Some(staging) => staging,
            None => return current.cloned(),
        };
        let mut staged = staging.staged_for(name).peekable();
        if staged.peek().is_none() {
            return current.cloned();
        }
        let mut node = match current {
            Some(current) => Node::copy_of(id, &**current),
            None => Node::new(id),
        };
        for (rtype, covers, item) in staged {
            match item {
                Staged::Put(rrset) => node.replace_rrset(rrset.clone()),
                Staged::Tombstone => {
                    node.delete_rrset(rtype, covers);
                }
            }
        }
        if node.is_empty() {
            None
        } else {
            Some(Arc::new(node.freeze()))
        }
    }

    /// Returns all names visible to the transaction.
    fn names(&self, live: &NodeMap) -> BTreeSet<Name> {
        let mut names = BTreeSet::new();
        match self.staging() {
            Some(staging) => {
                if !staging.replacement {
                    names.extend(
                        live.keys()
                            .filter(|name| !staging.wiped.contains(*name))
                            .cloned(),
                    );
                }
                names.extend(
                    staging.overlay.keys().map(|(name, _, _)| name.clone()),
                );
            }
            None => names.extend(live.keys().cloned()),
        }
        names
    }

    fn commit(&self, staging: Staging) {
        let mut meta = self.zone.meta.lock();
        if staging.origin_changed && meta.origin.is_none() {
            meta.origin = self.info.origin.clone();
        }
        if !staging.has_changes(self.live().is_empty()) {
            trace!("Nothing to commit");
            return;
        }

        let generation = meta.generation.next();
        let mut nodes = if staging.replacement {
            NodeMap::new()
        } else {
            NodeMap::clone(&self.zone.nodes.load())
        };
        for name in &staging.wiped {
            nodes.remove(name);
        }

        // The overlay is sorted by name, so all entries of a node are
        // adjacent.
        let mut pending: Option<(Name, Node)> = None;
        for ((name, rtype, covers), staged) in staging.overlay {
            if pending.as_ref().map_or(true, |(cur, _)| *cur != name) {
                if let Some((done, node)) = pending.take() {
                    store_node(&mut nodes, done, node);
                }
                let node = match nodes.get(&name) {
                    Some(existing) => Node::copy_of(generation, &**existing),
                    None => Node::new(generation),
                };
                pending = Some((name, node));
            }
            if let Some((_, node)) = pending.as_mut() {
                match staged {
                    Staged::Put(rrset) => node.replace_rrset(rrset),
                    Staged::Tombstone => {
                        node.delete_rrset(rtype, covers);
                    }
                }
            }
        }
        if let Some((name, node)) = pending {
            store_node(&mut nodes, name, node);
        }

        debug!(
            "Committed generation {} with {} names",
            generation,
            nodes.len()
        );
        self.zone.nodes.store(Arc::new(nodes));
        meta.generation = generation;
    }
}

fn store_node(nodes: &mut NodeMap, name: Name, node: Node) {
    if node.is_empty() {
        nodes.remove(&name);
    } else {
        nodes.insert(name, Arc::new(node.freeze()));
    }
}

impl TxnBackend for PlainTxn {
    fn origin_information(&self) -> OriginInfo {
        self.info.clone()
    }

    fn checks_origin(&self) -> bool {
        self.check_origin
    }

    fn is_read_only(&self) -> bool {
        matches!(self.state, PlainState::Read)
    }

    fn get_rrset(
        &self,
        name: &Name,
        rtype: Rtype,
        covers: Rtype,
    ) -> Option<SharedRrset> {
        if let Some(staging) = self.staging() {
            let key = (name.clone(), rtype, covers);
            match staging.overlay.get(&key) {
                Some(Staged::Put(rrset)) => return Some(rrset.clone()),
                Some(Staged::Tombstone) => return None,
                None if staging.hides(name) => return None,
                None => {}
            }
        }
        self.live().get(name)?.get_rrset(rtype, covers).cloned()
    }

    fn get_node(&self, name: &Name) -> Option<Arc<FrozenNode>> {
        let live = self.live();
        let id = self.zone.meta.lock().generation.next();
        self.merged_node(&live, name, id)
    }

    fn name_exists(&self, name: &Name) -> bool {
        self.get_node(name).is_some()
    }

    fn put_rrset(
        &mut self,
        name: &Name,
        rrset: SharedRrset,
    ) -> Result<(), Error> {
        let key = (name.clone(), rrset.rtype(), rrset.covers());
        self.staging_mut()?.overlay.insert(key, Staged::Put(rrset));
        Ok(())
    }

    fn delete_name(&mut self, name: &Name) -> Result<(), Error> {
        let staging = self.staging_mut()?;
        let keys: Vec<_> = staging
            .staged_for(name)
            .map(|(rtype, covers, _)| (name.clone(), rtype, covers))
            .collect();
        for key in keys {
            staging.overlay.remove(&key);
        }
        staging.wiped.insert(name.clone());
        Ok(())
    }

    fn delete_rrset(
        &mut self,
        name: &Name,
        rtype: Rtype,
        covers: Rtype,
    ) -> Result<(), Error> {
        let key = (name.clone(), rtype, covers);
        self.staging_mut()?.overlay.insert(key, Staged::Tombstone);
        Ok(())
    }

    fn set_origin(&mut self, origin: Name) -> Result<(), Error> {
        self.staging_mut()?.origin_changed = true;
        self.info.origin = Some(origin);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), Error> {
        let staging = self.staging_mut()?;
        staging.replacement = true;
        staging.overlay.clear();
        staging.wiped.clear();
        Ok(())
    }

    fn changed(&self) -> bool {
        match self.staging() {
            Some(staging) => staging.has_changes(self.live().is_empty()),
            None => false,
        }
    }

    fn iter_rrsets(&self) -> Box<dyn Iterator<Item = OwnedRrset> + '_> {
        let live = self.zone.nodes.load_full();
        let id = self.zone.meta.lock().generation.next();
        let names = self.names(&live);
        Box::new(names.into_iter().flat_map(move |name| {
            let rrsets = match self.merged_node(&live, &name, id) {
                Some(node) => node.rrsets().to_vec(),
                None => Vec::new(),
            };
            rrsets.into_iter().map(move |rrset| (name.clone(), rrset))
        }))
    }

    fn end(&mut self, commit: bool) -> Result<(), Error> {
        match std::mem::replace(&mut self.state, PlainState::Ended) {
            PlainState::Read => Ok(()),
            PlainState::Write(staging) => {
                if commit {
                    self.commit(*staging);
                } else {
                    trace!("Plain writer rolled back");
                }
                Ok(())
            }
            PlainState::Ended => Err(Error::AlreadyEnded),
        }
    }
}
