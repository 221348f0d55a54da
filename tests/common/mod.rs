//! Helpers shared by the integration tests.
#![allow(dead_code)]

use std::net::Ipv4Addr;
use std::str::FromStr;

use zonetxn::base::{Class, Name, Record, Serial, Ttl};
use zonetxn::rdata::{Rdata, Soa};
use zonetxn::zonetree::Rrset;

/// Initializes tracing based logging.
///
/// Override the level with the RUST_LOG environment variable, e.g.,
/// RUST_LOG=trace.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_thread_ids(true)
        .without_time()
        .try_init()
        .ok();
}

pub fn name(s: &str) -> Name {
    Name::from_str(s).unwrap()
}

pub fn a(last: u8) -> Rdata {
    Rdata::A(Ipv4Addr::new(192, 0, 2, last))
}

pub fn a_rrset(ttl: u32, addrs: &[u8]) -> Rrset {
    let mut rrset = Rrset::new(zonetxn::base::Rtype::A, Ttl::from_secs(ttl));
    for last in addrs {
        rrset.push_data(a(*last));
    }
    rrset
}

pub fn soa_data(serial: u32) -> Rdata {
    Soa::new(
        name("ns1.example."),
        name("hostmaster.example."),
        Serial(serial),
        Ttl::HOUR,
        Ttl::HOUR,
        Ttl::HOUR,
        Ttl::HOUR,
    )
    .into()
}

pub fn soa_record(owner: &str, serial: u32) -> Record {
    Record::new(name(owner), Class::IN, Ttl::HOUR, soa_data(serial))
}

pub fn a_record(owner: &str, last: u8) -> Record {
    Record::new(name(owner), Class::IN, Ttl::HOUR, a(last))
}

pub fn ns_record(owner: &str, target: &str) -> Record {
    Record::new(name(owner), Class::IN, Ttl::HOUR, Rdata::Ns(name(target)))
}
