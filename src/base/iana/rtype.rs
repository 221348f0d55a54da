//! Resource Record (RR) TYPEs

use super::FromStrError;

//------------ Rtype ---------------------------------------------------------

int_enum! {
    /// Resource Record Types.
    ///
    /// Each resource record has a 16 bit type value indicating what kind of
    /// information is represented by the record.
    ///
    /// Only the types the zone store treats specially, plus the common
    /// ones, have constants. All other values are still representable.
    ///
    /// The value zero is reserved and never appears in a record. It is used
    /// as [`Rtype::NONE`] for the "covered type" of record sets that don't
    /// cover anything, i.e., everything but RRSIG sets.
    ///
    /// [IANA registry]: http://www.iana.org/assignments/dns-parameters/dns-parameters.xhtml#dns-parameters-4
    =>
    Rtype, u16;

    /// The reserved type, used as "covers nothing".
    (NONE => 0, "NONE")

    /// A host address.
    (A => 1, "A")

    /// An authoritative name server.
    (NS => 2, "NS")

    /// The canonical name for an alias
    (CNAME => 5, "CNAME")

    /// Marks the start of a zone of authority.
    (SOA => 6, "SOA")

    /// A domain name pointer.
    (PTR => 12, "PTR")

    /// Mail exchange.
    (MX => 15, "MX")

    /// Text strings.
    (TXT => 16, "TXT")

    /// IPv6 address.
    (AAAA => 28, "AAAA")

    /// Server selection.
    (SRV => 33, "SRV")

    /// Delegation signer.
    (DS => 43, "DS")

    /// RRSIG.
    (RRSIG => 46, "RRSIG")

    /// NSEC.
    (NSEC => 47, "NSEC")

    /// DNSKEY.
    (DNSKEY => 48, "DNSKEY")

    /// A request for all records the server/cache has available.
    (ANY => 255, "ANY")
}

int_enum_str_with_prefix!(Rtype, "TYPE", u16);

impl Rtype {
    /// Returns whether this type may cover another type.
    ///
    /// Only signature record sets are keyed by the type they cover.
    #[must_use]
    pub fn is_covering(self) -> bool {
        self == Rtype::RRSIG
    }
}

//============ Tests =========================================================
