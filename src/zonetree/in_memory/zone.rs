//! Versioned in-memory zones.

use std::boxed::Box;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use std::vec::Vec;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use crate::base::iana::{Class, Rtype};
use crate::base::name::Name;
use crate::zonetree::error::{Error, Lookup};
use crate::zonetree::nodes::{FrozenNode, NodeRead};
use crate::zonetree::policy::PrunePolicy;
use crate::zonetree::traits::{
    OriginInfo, ReadAt, TransactionManager, TxnBackend, ZoneStore,
};
use crate::zonetree::transaction::Transaction;
use crate::zonetree::types::{OwnedRrset, SharedRrset};
use crate::zonetree::versioned::{Version, VersionId, WritableVersion};

//------------ VersionedZone -------------------------------------------------

/// An in-memory zone keeping a chain of committed versions.
///
/// Any number of readers can access the zone concurrently, each seeing the
/// version it was started on until it ends. At most one writer is active at
/// a time. Writers waiting for access are admitted strictly in the order in
/// which they asked for it.
///
/// Old versions are dropped according to the zone’s [`PrunePolicy`] once
/// no reader uses them anymore.
///
/// Values of this type are cheap to clone. All clones refer to the same
/// zone.
#[derive(Clone, Debug)]
pub struct VersionedZone {
    inner: Arc<ZoneInner>,
}

#[derive(Debug)]
struct ZoneInner {
    class: Class,
    relativize: bool,
    check_origin: bool,
    state: Mutex<ZoneState>,
}

/// Everything protected by the zone lock.
#[derive(Debug)]
struct ZoneState {
    origin: Option<Name>,

    /// The committed versions, oldest first. Never empty.
    versions: VecDeque<Arc<Version>>,

    writer_active: bool,

    /// The waiter that has been handed write access but hasn’t taken it
    /// yet.
    admitted: Option<u64>,

    waiters: VecDeque<Waiter>,
    next_waiter: u64,

    /// The number of open readers per version.
    readers: BTreeMap<VersionId, usize>,

    policy: PrunePolicy,
}

#[derive(Debug)]
struct Waiter {
    id: u64,
    wakeup: Arc<Condvar>,
}

impl VersionedZone {
    pub(super) fn new(
        origin: Option<Name>,
        class: Class,
        relativize: bool,
        check_origin: bool,
        policy: PrunePolicy,
    ) -> Self {
        let mut versions = VecDeque::new();
        versions.push_back(Arc::new(Version::empty(VersionId::FIRST)));
        VersionedZone {
            inner: Arc::new(ZoneInner {
                class,
                relativize,
                check_origin,
                state: Mutex::new(ZoneState {
                    origin,
                    versions,
                    writer_active: false,
                    admitted: None,
                    waiters: VecDeque::new(),
                    next_waiter: 0,
                    readers: BTreeMap::new(),
                    policy,
                }),
            }),
        }
    }

    /// Starts a write transaction if write access is available right away.
    ///
    /// Returns `None` if another writer is active or waiting.
    pub fn try_writer(
        &self,
        replacement: bool,
    ) -> Option<Transaction<VersionedTxn>> {
        let mut state = self.inner.state.lock();
        if !state.is_free() {
            return None;
        }
        state.writer_active = true;
        drop(state);
        Some(self.start_writer(replacement))
    }

    /// Starts a write transaction, waiting at most `timeout` for access.
    ///
    /// Returns [`Error::Timeout`] if access wasn’t granted in time.
    pub fn writer_timeout(
        &self,
        replacement: bool,
        timeout: Duration,
    ) -> Result<Transaction<VersionedTxn>, Error> {
        self.admit_until(Instant::now() + timeout)?;
        Ok(self.start_writer(replacement))
    }

    /// Waits until the caller may write.
    fn admit(&self) {
        let mut state = self.inner.state.lock();
        let Some((id, wakeup)) = state.enqueue() else {
            return;
        };
        // A wakeup doesn’t necessarily mean we are next.
        while !state.take_admission(id) {
            wakeup.wait(&mut state);
        }
    }

    /// Waits until the caller may write or `deadline` passes.
    fn admit_until(&self, deadline: Instant) -> Result<(), Error> {
        let mut state = self.inner.state.lock();
        let Some((id, wakeup)) = state.enqueue() else {
            return Ok(());
        };
        while !state.take_admission(id) {
            if wakeup.wait_until(&mut state, deadline).timed_out() {
                // Access may have been handed to us while we timed out.
                if state.take_admission(id) {
                    return Ok(());
                }
                state.waiters.retain(|waiter| waiter.id != id);
                debug!("Writer {} timed out", id);
                return Err(Error::Timeout);
            }
        }
        Ok(())
    }

    /// Creates the transaction for an admitted writer.
    ///
    /// The zone lock is only held to pick up the current version. The
    /// working copy itself is created later by the transaction.
    fn start_writer(&self, replacement: bool) -> Transaction<VersionedTxn> {
        let state = self.inner.state.lock();
        let base = state.head().clone();
        let origin = state.origin.clone();
        drop(state);
        debug!("Write transaction on version {} started", base.id());
        Transaction::new(VersionedTxn {
            zone: Arc::downgrade(&self.inner),
            info: OriginInfo::new(origin, self.inner.relativize),
            check_origin: self.inner.check_origin,
            kind: TxnKind::Write(WriteState {
                base,
                replacement,
                version: None,
                origin_changed: false,
            }),
        })
    }

    /// Replaces the pruning policy.
    ///
    /// The new policy is applied at the next commit or when the next reader
    /// ends.
    pub fn set_pruning_policy(&self, policy: PrunePolicy) -> Result<(), Error> {
        policy.validate()?;
        self.inner.state.lock().policy = policy;
        Ok(())
    }

    /// Sets the maximum number of retained versions.
    ///
    /// A value of `None` retains all versions.
    pub fn set_max_versions(&self, max: Option<usize>) -> Result<(), Error> {
        self.set_pruning_policy(PrunePolicy::max_versions(max)?)
    }

    /// Returns the ids of all retained versions, oldest first.
    pub fn versions(&self) -> Vec<VersionId> {
        self.inner
            .state
            .lock()
            .versions
            .iter()
            .map(|version| version.id())
            .collect()
    }

    /// Returns the ids of the versions open readers are pinned to.
    ///
    /// Each id appears once for every reader using it.
    pub fn open_readers(&self) -> Vec<VersionId> {
        self.inner
            .state
            .lock()
            .readers
            .iter()
            .flat_map(|(id, count)| std::iter::repeat(*id).take(*count))
            .collect()
    }

    /// Returns the number of writers waiting for access.
    pub fn queued_writers(&self) -> usize {
        self.inner.state.lock().waiters.len()
    }

    /// Returns the id of the most recent version.
    pub fn head_id(&self) -> VersionId {
        self.inner.state.lock().head().id()
    }

    /// Returns the most recent version.
    pub fn latest(&self) -> Arc<Version> {
        self.inner.state.lock().head().clone()
    }
}

impl ZoneState {
    fn head(&self) -> &Arc<Version> {
        // `versions` always holds at least one version.
        &self.versions[self.versions.len() - 1]
    }

    /// Returns whether a new writer may go ahead without queueing.
    fn is_free(&self) -> bool {
        !self.writer_active
            && self.admitted.is_none()
            && self.waiters.is_empty()
    }

    /// Admits a new writer right away or puts it into the queue.
    ///
    /// Returns the waiter id and its wakeup if the writer has to wait.
    fn enqueue(&mut self) -> Option<(u64, Arc<Condvar>)> {
        if self.is_free() {
            self.writer_active = true;
            trace!("Writer admitted immediately");
            return None;
        }
        let id = self.next_waiter;
        self.next_waiter += 1;
        let wakeup = Arc::new(Condvar::new());
        self.waiters.push_back(Waiter {
            id,
            wakeup: wakeup.clone(),
        });
        trace!("Writer {} queued behind {} others", id, self.waiters.len() - 1);
        Some((id, wakeup))
    }

    /// Takes write access if it has been handed to waiter `id`.
    fn take_admission(&mut self, id: u64) -> bool {
        if self.admitted != Some(id) {
            return false;
        }
        self.admitted = None;
        self.writer_active = true;
        trace!("Writer {} admitted", id);
        true
    }

    fn origin_info(&self, relativize: bool) -> OriginInfo {
        OriginInfo::new(self.origin.clone(), relativize)
    }

    /// Ends the active writer and hands access to the next waiter.
    fn release_writer(&mut self) {
        self.writer_active = false;
        if let Some(waiter) = self.waiters.pop_front() {
            trace!("Handing write access to writer {}", waiter.id);
            self.admitted = Some(waiter.id);
            waiter.wakeup.notify_one();
        }
    }

    fn register_reader(&mut self, id: VersionId) {
        *self.readers.entry(id).or_default() += 1;
    }

    fn unregister_reader(&mut self, id: VersionId) {
        if let Some(count) = self.readers.get_mut(&id) {
            *count -= 1;
            if *count == 0 {
                self.readers.remove(&id);
            }
        }
    }

    /// Drops old versions no reader needs and the policy lets go of.
    ///
    /// Versions are only ever dropped from the front so the retained
    /// versions stay contiguous.
    fn prune(&mut self) {
        let head = self.head().id();
        let least_kept = match self.readers.keys().next() {
            Some(id) => head.min(*id),
            None => head,
        };
        while let Some(oldest) = self.versions.front() {
            if oldest.id() >= least_kept
                || !self.policy.should_prune(oldest, self.versions.len())
            {
                break;
            }
            if let Some(version) = self.versions.pop_front() {
                debug!("Pruned version {}", version.id());
            }
        }
    }
}

//--- TransactionManager

impl TransactionManager for VersionedZone {
    type Backend = VersionedTxn;

    fn reader(&self) -> Transaction<VersionedTxn> {
        let mut state = self.inner.state.lock();
        let version = state.head().clone();
        state.register_reader(version.id());
        let info = state.origin_info(self.inner.relativize);
        drop(state);
        self.start_reader(version, info)
    }

    fn reader_at(&self, at: ReadAt) -> Result<Transaction<VersionedTxn>, Error> {
        let mut state = self.inner.state.lock();
        let version = match at {
            ReadAt::Latest => state.head().clone(),
            ReadAt::Id(id) => state
                .versions
                .iter()
                .find(|version| version.id() == id)
                .cloned()
                .ok_or(Error::NotFound(Lookup::Id(id)))?,
            ReadAt::Serial(serial) => state
                .origin_info(self.inner.relativize)
                .effective()
                .and_then(|apex| {
                    state
                        .versions
                        .iter()
                        .rev()
                        .find(|version| {
                            version.soa_serial(&apex) == Some(serial)
                        })
                        .cloned()
                })
                .ok_or(Error::NotFound(Lookup::Serial(serial)))?,
        };
        state.register_reader(version.id());
        let info = state.origin_info(self.inner.relativize);
        drop(state);
        Ok(self.start_reader(version, info))
    }

    fn writer(&self, replacement: bool) -> Transaction<VersionedTxn> {
        self.admit();
        self.start_writer(replacement)
    }

    fn origin_information(&self) -> OriginInfo {
        self.inner.state.lock().origin_info(self.inner.relativize)
    }

    fn class(&self) -> Class {
        self.inner.class
    }
}

impl VersionedZone {
    fn start_reader(
        &self,
        version: Arc<Version>,
        info: OriginInfo,
    ) -> Transaction<VersionedTxn> {
        trace!("Reader on version {} started", version.id());
        Transaction::new(VersionedTxn {
            zone: Arc::downgrade(&self.inner),
            info,
            check_origin: false,
            kind: TxnKind::Read(version),
        })
    }
}

//--- ZoneStore

impl ZoneStore for VersionedZone {
    fn find_rrset(
        &self,
        name: &Name,
        rtype: Rtype,
        covers: Rtype,
    ) -> Option<SharedRrset> {
        self.latest().get_rrset(name, rtype, covers).cloned()
    }

    fn find_node(&self, name: &Name) -> Option<Arc<FrozenNode>> {
        self.latest().get_node(name).cloned()
    }

    fn replace_rrset(&self, _: &Name, _: SharedRrset) -> Result<(), Error> {
        Err(Error::UseTransaction)
    }

    fn delete_rrset(&self, _: &Name, _: Rtype, _: Rtype) -> Result<(), Error> {
        Err(Error::UseTransaction)
    }

    fn delete_node(&self, _: &Name) -> Result<(), Error> {
        Err(Error::UseTransaction)
    }
}

//------------ VersionedTxn --------------------------------------------------

/// The backend of a transaction on a [`VersionedZone`].
///
/// The transaction only holds a weak reference to its zone.
#[derive(Debug)]
pub struct VersionedTxn {
    zone: Weak<ZoneInner>,
    info: OriginInfo,
    check_origin: bool,
    kind: TxnKind,
}

#[derive(Debug)]
enum TxnKind {
    Read(Arc<Version>),
    Write(WriteState),
    Ended,
}

#[derive(Debug)]
struct WriteState {
    /// The version the transaction started from.
    base: Arc<Version>,

    replacement: bool,

    /// The working copy, created on the first change.
    version: Option<WritableVersion>,

    origin_changed: bool,
}

impl WriteState {
    fn writable(&mut self) -> &mut WritableVersion {
        let base = &self.base;
        let replacement = self.replacement;
        self.version.get_or_insert_with(|| {
            if replacement {
                WritableVersion::replacement(base.id().next(), base)
            } else {
                WritableVersion::new(base.id().next(), base)
            }
        })
    }
}

/// The current view of a transaction.
enum View<'a> {
    Committed(&'a Version),
    Writable(&'a WritableVersion),
    Empty,
}

impl VersionedTxn {
    /// Returns the id of the version the transaction reads from.
    pub fn version_id(&self) -> Option<VersionId> {
        match &self.kind {
            TxnKind::Read(version) => Some(version.id()),
            TxnKind::Write(write) => Some(
                write
                    .version
                    .as_ref()
                    .map(WritableVersion::id)
                    .unwrap_or_else(|| write.base.id()),
            ),
            TxnKind::Ended => None,
        }
    }

    fn view(&self) -> View<'_> {
        match &self.kind {
            TxnKind::Read(version) => View::Committed(version.as_ref()),
            TxnKind::Write(WriteState {
                version: Some(version),
                ..
            }) => View::Writable(version),
            TxnKind::Write(WriteState {
                base,
                replacement: false,
                ..
            }) => View::Committed(base.as_ref()),
            TxnKind::Write(_) | TxnKind::Ended => View::Empty,
        }
    }

    fn write_state(&mut self) -> Result<&mut WriteState, Error> {
        match &mut self.kind {
            TxnKind::Write(write) => Ok(write),
            TxnKind::Read(_) => Err(Error::Immutable),
            TxnKind::Ended => Err(Error::AlreadyEnded),
        }
    }

    fn commit(&self, zone: &ZoneInner, write: WriteState) {
        let WriteState {
            base,
            replacement,
            version,
            origin_changed,
        } = write;
        let version = match version {
            Some(version) => version.has_changes().then_some(version),
            None if replacement && !base.is_empty() => Some(
                WritableVersion::replacement(base.id().next(), &base),
            ),
            None => None,
        };
        let version = version.map(|version| Arc::new(version.freeze()));

        let mut state = zone.state.lock();
        match version {
            Some(version) => {
                debug!(
                    "Committed version {} with {} names",
                    version.id(),
                    version.len()
                );
                state.versions.push_back(version);
            }
            None => trace!("Nothing to commit"),
        }
        if origin_changed && state.origin.is_none() {
            state.origin = self.info.origin.clone();
        }
        state.release_writer();
        state.prune();
    }
}

impl TxnBackend for VersionedTxn {
    fn origin_information(&self) -> OriginInfo {
        self.info.clone()
    }

    fn checks_origin(&self) -> bool {
        self.check_origin
    }

    fn is_read_only(&self) -> bool {
        matches!(self.kind, TxnKind::Read(_))
    }

    fn get_rrset(
        &self,
        name: &Name,
        rtype: Rtype,
        covers: Rtype,
    ) -> Option<SharedRrset> {
        match self.view() {
            View::Committed(version) => {
                version.get_rrset(name, rtype, covers).cloned()
            }
            View::Writable(version) => {
                version.get_rrset(name, rtype, covers).cloned()
            }
            View::Empty => None,
        }
    }

    fn get_node(&self, name: &Name) -> Option<Arc<FrozenNode>> {
        match self.view() {
            View::Committed(version) => version.get_node(name).cloned(),
            View::Writable(version) => {
                version.get_node(name).map(|slot| slot.snapshot())
            }
            View::Empty => None,
        }
    }

    fn name_exists(&self, name: &Name) -> bool {
        match self.view() {
            View::Committed(version) => version.get_node(name).is_some(),
            View::Writable(version) => version.get_node(name).is_some(),
            View::Empty => false,
        }
    }

    fn put_rrset(
        &mut self,
        name: &Name,
        rrset: SharedRrset,
    ) -> Result<(), Error> {
        self.write_state()?.writable().put_rrset(name, rrset);
        Ok(())
    }

    fn delete_name(&mut self, name: &Name) -> Result<(), Error> {
        self.write_state()?.writable().delete_node(name);
        Ok(())
    }

    fn delete_rrset(
        &mut self,
        name: &Name,
        rtype: Rtype,
        covers: Rtype,
    ) -> Result<(), Error> {
        self.write_state()?
            .writable()
            .delete_rrset(name, rtype, covers);
        Ok(())
    }

    fn set_origin(&mut self, origin: Name) -> Result<(), Error> {
        let write = self.write_state()?;
        write.origin_changed = true;
        self.info.origin = Some(origin);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), Error> {
        let write = self.write_state()?;
        write.replacement = true;
        write.version = None;
        Ok(())
    }

    fn changed(&self) -> bool {
        match &self.kind {
            TxnKind::Write(write) => match write.version.as_ref() {
                Some(version) => version.has_changes(),
                None => write.replacement && !write.base.is_empty(),
            },
            _ => false,
        }
    }

    fn iter_rrsets(&self) -> Box<dyn Iterator<Item = OwnedRrset> + '_> {
        fn flatten<'a, N: NodeRead + 'a>(
            iter: impl Iterator<Item = (&'a Name, &'a N)> + 'a,
        ) -> Box<dyn Iterator<Item = OwnedRrset> + 'a> {
            Box::new(iter.flat_map(|(name, node)| {
                node.rrsets()
                    .iter()
                    .map(move |rrset| (name.clone(), rrset.clone()))
            }))
        }

        match self.view() {
            View::Committed(version) => flatten(
                version.iter().map(|(name, node)| (name, &**node)),
            ),
            View::Writable(version) => flatten(version.iter()),
            View::Empty => Box::new(std::iter::empty()),
        }
    }

    fn end(&mut self, commit: bool) -> Result<(), Error> {
        let kind = std::mem::replace(&mut self.kind, TxnKind::Ended);
        let zone = self.zone.upgrade();
        match kind {
            TxnKind::Read(version) => {
                let zone = zone.ok_or(Error::ZoneDropped)?;
                let mut state = zone.state.lock();
                state.unregister_reader(version.id());
                trace!("Reader on version {} ended", version.id());
                state.prune();
                Ok(())
            }
            TxnKind::Write(write) => {
                let zone = zone.ok_or(Error::ZoneDropped)?;
                if commit {
                    self.commit(&zone, write);
                } else {
                    debug!(
                        "Write transaction on version {} rolled back",
                        write.base.id()
                    );
                    zone.state.lock().release_writer();
                }
                Ok(())
            }
            TxnKind::Ended => Err(Error::AlreadyEnded),
        }
    }
}

//============ Tests =========================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::ttl::Ttl;
    use crate::rdata::Rdata;
    use core::str::FromStr;
    use std::net::Ipv4Addr;
    use std::thread;

    fn zone() -> VersionedZone {
        VersionedZone::new(
            Some(Name::from_str("example.").unwrap()),
            Class::IN,
            true,
            false,
            PrunePolicy::default(),
        )
    }

    #[test]
    fn access_handed_over_at_expiry_is_taken() {
        let zone = zone();
        zone.inner.state.lock().writer_active = true;

        thread::scope(|scope| {
            let waiting = scope.spawn(|| {
                let mut txn = zone
                    .writer_timeout(false, Duration::from_millis(20))
                    .unwrap();
                txn.add_rdata(
                    &Name::from_str("www").unwrap(),
                    Ttl::HOUR,
                    Rdata::A(Ipv4Addr::LOCALHOST),
                )
                .unwrap();
                txn.commit().unwrap();
            });
            while zone.queued_writers() != 1 {
                thread::sleep(Duration::from_millis(1));
            }

            // Let the deadline pass while the waiter can’t get the lock,
            // then hand it access before it can leave the queue.
            let mut state = zone.inner.state.lock();
            thread::sleep(Duration::from_millis(100));
            state.release_writer();
            drop(state);

            waiting.join().unwrap();
        });

        assert_eq!(zone.head_id(), VersionId::from(2));
        assert_eq!(zone.queued_writers(), 0);
        assert!(zone.try_writer(false).is_some());
    }

    #[test]
    fn take_admission_only_for_the_admitted_waiter() {
        let zone = zone();
        let mut state = zone.inner.state.lock();
        assert!(state.enqueue().is_none());
        let (first, _) = state.enqueue().unwrap();
        let (second, _) = state.enqueue().unwrap();

        state.release_writer();
        assert!(!state.take_admission(second));
        assert!(state.take_admission(first));
        assert!(!state.is_free());
        assert_eq!(state.waiters.len(), 1);
    }
}
