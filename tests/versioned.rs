//! Tests for versioned zones.

mod common;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use rstest::rstest;

use common::{a, a_rrset, init_logging, name, soa_data};
use zonetxn::base::{Name, Rtype, Serial, Ttl};
use zonetxn::rdata::{Mx, Rdata};
use zonetxn::zonetree::{
    DeleteNotExact, Error, Lookup, NodeRead, PrunePolicy, ReadAt, Rrset,
    TransactionManager, VersionId, VersionedZone, ZoneBuilder, ZoneStore,
};

fn ids(ids: &[u64]) -> Vec<VersionId> {
    ids.iter().copied().map(VersionId::from).collect()
}

fn zone() -> VersionedZone {
    ZoneBuilder::new()
        .origin(name("example."))
        .build_versioned()
        .unwrap()
}

fn zone_with_policy(policy: PrunePolicy) -> VersionedZone {
    ZoneBuilder::new()
        .origin(name("example."))
        .prune_policy(policy)
        .build_versioned()
        .unwrap()
}

//------------ Snapshots -----------------------------------------------------

#[test]
fn readers_and_writers_walkthrough() {
    init_logging();
    let zone = zone();
    assert_eq!(zone.versions(), ids(&[1]));

    let r1 = zone.reader();

    let x = a_rrset(300, &[1]);
    let mut w1 = zone.writer(false);
    w1.add_rrset(&name("a"), x.clone()).unwrap();
    w1.commit().unwrap();
    assert_eq!(zone.head_id(), VersionId::from(2));

    let r2 = zone.reader();
    assert_eq!(r1.get(&name("a"), Rtype::A, Rtype::NONE).unwrap(), None);
    assert_eq!(
        r2.get(&name("a"), Rtype::A, Rtype::NONE)
            .unwrap()
            .as_deref(),
        Some(&x)
    );

    let mut w2 = zone.writer(false);
    w2.delete_name(&name("a")).unwrap();
    w2.commit().unwrap();
    assert_eq!(zone.versions(), ids(&[1, 2, 3]));
    assert_eq!(zone.open_readers(), ids(&[1, 2]));

    // Version 1 is still in use so nothing after it can go either.
    drop(r2);
    assert_eq!(zone.versions(), ids(&[1, 2, 3]));

    drop(r1);
    assert_eq!(zone.versions(), ids(&[3]));
    assert!(zone.open_readers().is_empty());
}

#[test]
fn readers_keep_their_snapshot() {
    let zone = zone_with_policy(PrunePolicy::KeepLatest);
    let mut readers = Vec::new();
    for i in 0..5u8 {
        readers.push((zone.reader(), i));
        zone.write_with(false, |txn| {
            txn.replace(&name("www"), a_rrset(60, &[i]))
        })
        .unwrap();
    }
    for (reader, i) in &readers {
        let rrset = reader.get(&name("www"), Rtype::A, Rtype::NONE).unwrap();
        match i {
            0 => assert!(rrset.is_none()),
            _ => assert_eq!(rrset.unwrap().data(), &[a(i - 1)]),
        }
    }
}

#[test]
fn untouched_nodes_are_shared_between_versions() {
    let zone = zone();
    zone.write_with(false, |txn| {
        txn.add_rdata(&name("a"), Ttl::HOUR, a(1))?;
        txn.add_rdata(&name("b"), Ttl::HOUR, a(2))
    })
    .unwrap();
    let old = zone.latest();

    zone.write_with(false, |txn| txn.add_rdata(&name("a"), Ttl::HOUR, a(3)))
        .unwrap();
    let new = zone.latest();
    assert_eq!(new.id(), old.id().next());

    assert!(Arc::ptr_eq(
        old.get_node(&name("b")).unwrap(),
        new.get_node(&name("b")).unwrap()
    ));
    assert!(!Arc::ptr_eq(
        old.get_node(&name("a")).unwrap(),
        new.get_node(&name("a")).unwrap()
    ));
    assert_eq!(new.get_node(&name("a")).unwrap().version_id(), new.id());
    assert_eq!(old.get_node(&name("b")).unwrap().version_id(), old.id());
}

#[test]
fn writer_sees_own_changes() {
    let zone = zone();
    let reader = zone.reader();
    let mut txn = zone.writer(false);
    txn.add_rdata(&name("www"), Ttl::HOUR, a(1)).unwrap();
    assert!(txn.name_exists(&name("www")).unwrap());
    assert!(txn.name_exists(&name("www.example.")).unwrap());
    assert!(!reader.name_exists(&name("www")).unwrap());
    assert!(!zone.reader().name_exists(&name("www")).unwrap());
    txn.commit().unwrap();
    assert!(zone.reader().name_exists(&name("www")).unwrap());
}

//------------ Atomicity -----------------------------------------------------

#[test]
fn failed_write_leaves_no_trace() {
    let zone = zone();
    let res: Result<(), Error> = zone.write_with(false, |txn| {
        txn.add_rdata(&name("www"), Ttl::HOUR, a(1))?;
        txn.delete_name_exact(&name("missing"))
    });
    assert_eq!(res, Err(Error::DeleteNotExact(DeleteNotExact::Name)));
    assert_eq!(zone.versions(), ids(&[1]));
    assert!(!zone.reader().name_exists(&name("www")).unwrap());
    assert!(zone.try_writer(false).is_some());
}

#[test]
fn panicking_write_is_rolled_back() {
    let zone = zone();
    let res = catch_unwind(AssertUnwindSafe(|| {
        let _: Result<(), Error> = zone.write_with(false, |txn| {
            txn.add_rdata(&name("www"), Ttl::HOUR, a(1))?;
            panic!("writer failed");
        });
    }));
    assert!(res.is_err());
    assert_eq!(zone.versions(), ids(&[1]));
    assert!(zone.try_writer(false).is_some());
}

#[test]
fn dropped_writer_is_rolled_back() {
    let zone = zone();
    {
        let mut txn = zone.writer(false);
        txn.add_rdata(&name("www"), Ttl::HOUR, a(1)).unwrap();
    }
    assert_eq!(zone.versions(), ids(&[1]));
    assert!(zone.try_writer(false).is_some());
}

#[test]
fn commit_without_changes_creates_no_version() {
    let zone = zone();
    let mut txn = zone.writer(false);
    assert_eq!(txn.get(&name("www"), Rtype::A, Rtype::NONE).unwrap(), None);
    txn.delete_name(&name("www")).unwrap();
    txn.delete_rrset(&name("www"), Rtype::A, Rtype::NONE).unwrap();
    txn.delete_rdata(&name("www"), a(1)).unwrap();
    assert!(!txn.changed().unwrap());
    txn.commit().unwrap();
    assert_eq!(zone.versions(), ids(&[1]));

    zone.write_with(false, |txn| txn.add_rdata(&name("www"), Ttl::HOUR, a(1)))
        .unwrap();
    assert_eq!(zone.head_id(), VersionId::from(2));

    // Adding what is already there doesn’t change anything either.
    zone.write_with(false, |txn| {
        txn.add_rdata(&name("www"), Ttl::HOUR, a(1))?;
        assert!(!txn.changed()?);
        Ok::<_, Error>(())
    })
    .unwrap();
    assert_eq!(zone.head_id(), VersionId::from(2));
}

//------------ Transaction lifecycle -----------------------------------------

#[test]
fn ended_transactions_refuse_everything() {
    let zone = zone();
    let mut txn = zone.writer(false);
    txn.add_rdata(&name("www"), Ttl::HOUR, a(1)).unwrap();
    txn.commit().unwrap();
    assert!(txn.is_ended());
    assert_eq!(
        txn.get(&name("www"), Rtype::A, Rtype::NONE),
        Err(Error::AlreadyEnded)
    );
    assert_eq!(
        txn.add_rdata(&name("www"), Ttl::HOUR, a(2)),
        Err(Error::AlreadyEnded)
    );
    assert_eq!(txn.changed(), Err(Error::AlreadyEnded));
    assert_eq!(txn.commit(), Err(Error::AlreadyEnded));
    assert_eq!(txn.rollback(), Err(Error::AlreadyEnded));

    let mut reader = zone.reader();
    reader.rollback().unwrap();
    assert_eq!(reader.commit(), Err(Error::AlreadyEnded));
    assert!(zone.open_readers().is_empty());
}

#[test]
fn readers_are_immutable() {
    let zone = zone();
    let mut reader = zone.reader();
    assert!(reader.is_read_only());
    assert_eq!(
        reader.add_rdata(&name("www"), Ttl::HOUR, a(1)),
        Err(Error::Immutable)
    );
    assert_eq!(reader.delete_name(&name("www")), Err(Error::Immutable));
    assert_eq!(
        reader.update_serial(1, true, None),
        Err(Error::Immutable)
    );
    assert_eq!(reader.changed(), Ok(false));
}

#[test]
fn direct_changes_are_refused() {
    let zone = zone();
    assert_eq!(
        zone.replace_rrset(&name("www"), a_rrset(60, &[1]).into_shared()),
        Err(Error::UseTransaction)
    );
    assert_eq!(zone.delete_node(&name("www")), Err(Error::UseTransaction));
    assert_eq!(
        zone.delete_rrset(&name("www"), Rtype::A, Rtype::NONE),
        Err(Error::UseTransaction)
    );
    assert!(zone.find_node(&name("www")).is_none());
}

//------------ Readers -------------------------------------------------------

#[test]
fn readers_by_id_and_serial() {
    let zone = zone_with_policy(PrunePolicy::KeepAll);
    for serial in [10, 20, 30] {
        zone.write_with(false, |txn| {
            txn.replace(
                &name("example."),
                Rrset::from_rdata(Ttl::HOUR, soa_data(serial)),
            )
        })
        .unwrap();
    }
    assert_eq!(zone.versions(), ids(&[1, 2, 3, 4]));

    let txn = zone.reader_at(ReadAt::Serial(Serial(20))).unwrap();
    assert_eq!(txn.backend().version_id(), Some(VersionId::from(3)));
    let txn = zone.reader_at(ReadAt::Id(VersionId::from(2))).unwrap();
    let soa = txn.get(&name("example."), Rtype::SOA, Rtype::NONE).unwrap();
    assert_eq!(
        soa.unwrap().first().and_then(Rdata::as_soa).unwrap().serial(),
        Serial(10)
    );

    assert_eq!(
        zone.reader_at(ReadAt::Serial(Serial(40))).unwrap_err(),
        Error::NotFound(Lookup::Serial(Serial(40)))
    );
    assert_eq!(
        zone.reader_at(ReadAt::Id(VersionId::from(9))).unwrap_err(),
        Error::NotFound(Lookup::Id(VersionId::from(9)))
    );
}

//------------ Pruning -------------------------------------------------------

#[rstest]
#[case::keep_latest(PrunePolicy::KeepLatest)]
#[case::max_three(PrunePolicy::MaxVersions(3))]
#[case::keep_all(PrunePolicy::KeepAll)]
#[case::always(PrunePolicy::custom(|_, _| true))]
fn pruning_never_drops_pinned_versions(#[case] policy: PrunePolicy) {
    init_logging();
    let zone = zone_with_policy(policy);
    let mut readers = Vec::new();
    for i in 0..12u8 {
        zone.write_with(false, |txn| {
            txn.add_rdata(&name("www"), Ttl::HOUR, a(i))
        })
        .unwrap();
        if i % 4 == 0 {
            readers.push((zone.reader(), i));
        }
        if i == 6 {
            // Drop the oldest reader while others are still around.
            readers.remove(0);
        }

        let versions = zone.versions();
        assert_eq!(versions.last(), Some(&zone.head_id()));
        for pair in versions.windows(2) {
            assert_eq!(pair[1], pair[0].next());
        }
        for id in zone.open_readers() {
            assert!(versions.contains(&id));
        }
        for (reader, added) in &readers {
            let rrset = reader
                .get(&name("www"), Rtype::A, Rtype::NONE)
                .unwrap()
                .unwrap();
            assert_eq!(rrset.len(), usize::from(*added) + 1);
        }
    }
    drop(readers);
    let versions = zone.versions();
    assert_eq!(versions.last(), Some(&VersionId::from(13)));
}

#[test]
fn max_versions_limits_history() {
    let zone = zone_with_policy(PrunePolicy::MaxVersions(3));
    for i in 0..5u8 {
        zone.write_with(false, |txn| {
            txn.add_rdata(&name("www"), Ttl::HOUR, a(i))
        })
        .unwrap();
    }
    assert_eq!(zone.versions(), ids(&[4, 5, 6]));

    zone.set_max_versions(None).unwrap();
    zone.write_with(false, |txn| txn.delete_name(&name("www")))
        .unwrap();
    assert_eq!(zone.versions(), ids(&[4, 5, 6, 7]));

    assert!(matches!(
        zone.set_max_versions(Some(0)),
        Err(Error::InvalidPolicy(_))
    ));
    zone.set_max_versions(Some(1)).unwrap();
    let reader = zone.reader();
    drop(reader);
    assert_eq!(zone.versions(), ids(&[7]));
}

//------------ Record set semantics ------------------------------------------

#[test]
fn add_merges_and_minimizes_ttl() {
    let zone = zone();
    let mut txn = zone.writer(false);
    txn.add_rrset(&name("www"), a_rrset(300, &[1, 2])).unwrap();
    txn.add_rrset(&name("www"), a_rrset(60, &[2, 3])).unwrap();
    let rrset = txn.get(&name("www"), Rtype::A, Rtype::NONE).unwrap().unwrap();
    assert_eq!(rrset.ttl(), Ttl::from_secs(60));
    assert_eq!(rrset.data(), &[a(1), a(2), a(3)]);

    txn.replace(&name("www"), a_rrset(10, &[9])).unwrap();
    let rrset = txn.get(&name("www"), Rtype::A, Rtype::NONE).unwrap().unwrap();
    assert_eq!(rrset.ttl(), Ttl::from_secs(10));
    assert_eq!(rrset.data(), &[a(9)]);

    txn.replace(&name("www"), a_rrset(10, &[])).unwrap();
    assert!(!txn.name_exists(&name("www")).unwrap());
}

#[test]
fn exact_deletes() {
    let zone = zone();
    zone.write_with(false, |txn| {
        txn.add_rrset(&name("www"), a_rrset(300, &[1, 2]))
    })
    .unwrap();

    let mut txn = zone.writer(false);
    assert_eq!(
        txn.delete_rrset_exact(&name("www"), Rtype::AAAA, Rtype::NONE),
        Err(Error::DeleteNotExact(DeleteNotExact::Rrset))
    );
    assert_eq!(
        txn.delete_records_exact(&name("www"), &a_rrset(0, &[1, 3])),
        Err(Error::DeleteNotExact(DeleteNotExact::Records))
    );
    assert_eq!(
        txn.delete_rdata_exact(&name("mail"), a(1)),
        Err(Error::DeleteNotExact(DeleteNotExact::Records))
    );
    assert!(!txn.changed().unwrap());

    txn.delete_rdata_exact(&name("www"), a(1)).unwrap();
    let rrset = txn.get(&name("www"), Rtype::A, Rtype::NONE).unwrap().unwrap();
    assert_eq!(rrset.data(), &[a(2)]);

    txn.delete_records(&name("www"), &a_rrset(0, &[2, 3])).unwrap();
    assert!(!txn.name_exists(&name("www")).unwrap());
    assert_eq!(
        txn.delete_name_exact(&name("www")),
        Err(Error::DeleteNotExact(DeleteNotExact::Name))
    );
    txn.commit().unwrap();
    assert!(zone.find_node(&name("www")).is_none());
}

#[test]
fn names_outside_the_zone_are_refused() {
    let zone = zone();
    let mut txn = zone.writer(false);
    assert_eq!(
        txn.add_rdata(&name("www.example.org."), Ttl::HOUR, a(1)),
        Err(Error::OutOfZone(name("www.example.org.")))
    );
    assert_eq!(
        txn.get(&name("example.org."), Rtype::A, Rtype::NONE),
        Err(Error::OutOfZone(name("example.org.")))
    );
}

#[test]
fn iteration_reflects_staged_changes() {
    let zone = zone();
    zone.write_with(false, |txn| {
        txn.add_rdata(&name("b"), Ttl::HOUR, a(2))?;
        txn.add_rdata(&name("a"), Ttl::HOUR, a(1))?;
        txn.add_rdata(
            &name("a"),
            Ttl::HOUR,
            Rdata::Mx(Mx::new(10, name("mail.example."))),
        )
    })
    .unwrap();

    let mut txn = zone.writer(false);
    txn.delete_name(&name("b")).unwrap();
    txn.add_rdata(&name("c"), Ttl::HOUR, a(3)).unwrap();
    let names: Vec<_> = txn.iter_names().unwrap().collect();
    assert_eq!(names, [name("a"), name("c")]);
    assert_eq!(txn.iter_rrsets().unwrap().count(), 3);

    let reader = zone.reader();
    let names: Vec<_> = reader.iter_names().unwrap().collect();
    assert_eq!(names, [name("a"), name("b")]);
    let node = reader.get_node(&name("a")).unwrap().unwrap();
    assert_eq!(node.rrsets().len(), 2);
}

//------------ Zone maintenance ----------------------------------------------

#[test]
fn update_serial() {
    let zone = zone();
    zone.write_with(false, |txn| {
        txn.add_rdata(&name("example."), Ttl::HOUR, soa_data(5))
    })
    .unwrap();

    let mut txn = zone.writer(false);
    assert_eq!(txn.update_serial(1, true, None), Ok(Serial(6)));
    assert_eq!(
        txn.update_serial(u32::MAX, true, None),
        Err(Error::InvalidSerial(u32::MAX))
    );
    assert_eq!(
        txn.update_serial(u32::MAX, false, Some(&name("example."))),
        Ok(Serial(u32::MAX))
    );
    assert_eq!(txn.update_serial(1, true, None), Ok(Serial(1)));
    assert_eq!(
        txn.update_serial(1, true, Some(&name("www"))),
        Err(Error::NoSoa)
    );
    txn.commit().unwrap();
    assert_eq!(zone.latest().soa_serial(&Name::empty()), Some(Serial(1)));
}

#[test]
fn check_callbacks_veto_changes() {
    let zone = zone();
    zone.write_with(false, |txn| txn.add_rdata(&name("www"), Ttl::HOUR, a(1)))
        .unwrap();

    let mut txn = zone.writer(false);
    txn.check_put_rrset(|_, rrset| {
        if rrset.rtype() == Rtype::MX {
            Err("no mail".into())
        } else {
            Ok(())
        }
    });
    txn.check_delete_name(|name| Err(format!("keep {}", name)));
    txn.check_delete_rrset(|_, rtype, _| {
        if rtype == Rtype::A {
            Err("keep addresses".into())
        } else {
            Ok(())
        }
    });

    assert_eq!(
        txn.add_rdata(
            &name("www"),
            Ttl::HOUR,
            Rdata::Mx(Mx::new(10, name("mail.example.")))
        ),
        Err(Error::Rejected("no mail".into()))
    );
    assert_eq!(
        txn.delete_name(&name("www")),
        Err(Error::Rejected("keep www".into()))
    );
    assert_eq!(
        txn.delete_rrset(&name("www"), Rtype::A, Rtype::NONE),
        Err(Error::Rejected("keep addresses".into()))
    );
    txn.add_rdata(&name("www"), Ttl::HOUR, a(2)).unwrap();
    assert!(txn.changed().unwrap());
}

#[test]
fn origin_check_on_commit() {
    let zone = ZoneBuilder::new()
        .origin(name("example."))
        .check_origin(true)
        .build_versioned()
        .unwrap();

    let mut txn = zone.writer(false);
    txn.add_rdata(&name("www"), Ttl::HOUR, a(1)).unwrap();
    assert_eq!(txn.commit(), Err(Error::NoSoa));
    assert!(txn.is_ended());
    assert_eq!(zone.versions(), ids(&[1]));

    let mut txn = zone.writer(false);
    txn.add_rdata(&name("example."), Ttl::HOUR, soa_data(1))
        .unwrap();
    assert_eq!(txn.commit(), Err(Error::NoNs));

    zone.write_with(false, |txn| {
        txn.add_rdata(&name("example."), Ttl::HOUR, soa_data(1))?;
        txn.add_rdata(
            &Name::empty(),
            Ttl::HOUR,
            Rdata::Ns(name("ns1.example.")),
        )
    })
    .unwrap();
    assert_eq!(zone.head_id(), VersionId::from(2));
}

#[test]
fn replacement_writer_starts_empty() {
    let zone = zone_with_policy(PrunePolicy::KeepAll);
    zone.write_with(false, |txn| {
        txn.add_rdata(&name("a"), Ttl::HOUR, a(1))?;
        txn.add_rdata(&name("b"), Ttl::HOUR, a(2))
    })
    .unwrap();
    let before = zone.reader();

    let mut txn = zone.writer(true);
    assert!(!txn.name_exists(&name("a")).unwrap());
    assert!(txn.changed().unwrap());
    txn.add_rdata(&name("c"), Ttl::HOUR, a(3)).unwrap();
    txn.commit().unwrap();

    let names: Vec<_> = zone.reader().iter_names().unwrap().collect();
    assert_eq!(names, [name("c")]);
    let names: Vec<_> = before.iter_names().unwrap().collect();
    assert_eq!(names, [name("a"), name("b")]);

    // An empty replacement empties the zone.
    zone.write_with(true, |_| Ok::<_, Error>(())).unwrap();
    assert_eq!(zone.reader().iter_rrsets().unwrap().count(), 0);
    assert_eq!(zone.head_id(), VersionId::from(4));
}

#[test]
fn origin_is_learned_on_commit() {
    let zone = ZoneBuilder::new()
        .relativize(false)
        .build_versioned()
        .unwrap();
    let mut txn = zone.writer(false);
    assert_eq!(
        txn.add_rdata(&name("www"), Ttl::HOUR, a(1)),
        Err(Error::NoOrigin)
    );
    assert_eq!(
        txn.set_origin(name("example")),
        Err(Error::RelativeOrigin(name("example")))
    );
    txn.set_origin(name("example.")).unwrap();
    txn.add_rdata(&name("www"), Ttl::HOUR, a(1)).unwrap();
    assert_eq!(zone.origin_information().origin, None);
    txn.commit().unwrap();

    assert_eq!(zone.origin_information().origin, Some(name("example.")));
    assert!(zone.find_node(&name("www.example.")).is_some());
}
