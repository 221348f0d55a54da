//! Domain names.
//!
//! Domain names are a sequence of *labels* which are in turn a sequence of
//! up to 63 octets. While they are limited to a subset of ASCII by
//! convention, all octet values are allowed. The labels in a domain name are
//! nominally arranged backwards. That is, the ‘most significant’ label is
//! the last one. In an *absolute* domain name, this last label is the empty
//! root label. A *relative* domain name lacks it and only makes sense with
//! respect to some origin.
//!
//! Zones can store their owner names either absolute or relative to the
//! zone’s origin, so the [`Name`] type represents both and keeps a flag
//! telling them apart. The labels are kept in wire format, i.e., each label
//! is preceded by its length octet, inside a [`Bytes`] so that cloning a
//! name is cheap. The root label itself is never stored.
//!
//! Names compare and hash case-insensitively and are ordered in canonical
//! DNS order as defined in [RFC 4034, section 6.1].
//!
//! [RFC 4034, section 6.1]: https://tools.ietf.org/html/rfc4034#section-6.1

use core::cmp::Ordering;
use core::hash::{Hash, Hasher};
use core::str::FromStr;
use core::{fmt, iter};

use bytes::{BufMut, Bytes, BytesMut};

//------------ Constants -----------------------------------------------------

/// The maximum length of a label in octets.
pub const MAX_LABEL_LEN: usize = 63;

/// The maximum length of an absolute name in wire format.
pub const MAX_NAME_LEN: usize = 255;

//------------ Name ----------------------------------------------------------

/// An owned domain name, either absolute or relative.
#[derive(Clone)]
pub struct Name {
    /// The labels in wire format, without the root label.
    octets: Bytes,

    /// Whether the name ends in the root label.
    absolute: bool,
}

/// # Creation
///
impl Name {
    /// Returns the root name, i.e., the absolute name without labels.
    #[must_use]
    pub fn root() -> Self {
        Name {
            octets: Bytes::new(),
            absolute: true,
        }
    }

    /// Returns the empty relative name.
    ///
    /// In a zone that relativizes its names, this is the owner name of the
    /// zone’s apex.
    #[must_use]
    pub fn empty() -> Self {
        Name {
            octets: Bytes::new(),
            absolute: false,
        }
    }

    /// Creates a name from an iterator over label contents.
    pub fn from_labels<I, L>(labels: I, absolute: bool) -> Result<Self, NameError>
    where
        I: IntoIterator<Item = L>,
        L: AsRef<[u8]>,
    {
        let mut octets = BytesMut::new();
        for label in labels {
            push_label(&mut octets, label.as_ref())?;
        }
        Self::from_octets(octets.freeze(), absolute)
    }

    fn from_octets(octets: Bytes, absolute: bool) -> Result<Self, NameError> {
        if octets.len() + 1 > MAX_NAME_LEN {
            return Err(NameError::LongName);
        }
        Ok(Name { octets, absolute })
    }
}

/// # Properties
///
impl Name {
    /// Returns whether the name is absolute.
    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    /// Returns whether this is the root name.
    pub fn is_root(&self) -> bool {
        self.absolute && self.octets.is_empty()
    }

    /// Returns whether this is the empty relative name.
    pub fn is_empty(&self) -> bool {
        !self.absolute && self.octets.is_empty()
    }

    /// Returns the number of labels, not counting the root label.
    pub fn label_count(&self) -> usize {
        self.iter_labels().count()
    }

    /// Returns an iterator over the labels of the name.
    ///
    /// The root label of an absolute name is not included.
    pub fn iter_labels(&self) -> LabelIter<'_> {
        LabelIter {
            octets: self.octets.as_ref(),
        }
    }

    /// Returns whether `self` is at or below `other`.
    ///
    /// A relative name is never a subdomain of an absolute name and vice
    /// versa.
    pub fn is_subdomain(&self, other: &Name) -> bool {
        if self.absolute != other.absolute {
            return false;
        }
        let mine: Vec<_> = self.iter_labels().collect();
        let theirs: Vec<_> = other.iter_labels().collect();
        if theirs.len() > mine.len() {
            return false;
        }
        mine.iter()
            .rev()
            .zip(theirs.iter().rev())
            .all(|(left, right)| left.eq_ignore_ascii_case(right))
    }
}

/// # Conversions relative to an origin
///
impl Name {
    /// Returns the name relative to `origin`.
    ///
    /// If `self` isn’t at or below `origin`, it is returned unchanged. The
    /// origin itself becomes the empty name.
    #[must_use]
    pub fn relativize(&self, origin: &Name) -> Name {
        if !self.is_subdomain(origin) {
            return self.clone();
        }
        let keep = self.label_count() - origin.label_count();
        let mut len = 0;
        for label in self.iter_labels().take(keep) {
            len += label.len() + 1;
        }
        Name {
            octets: self.octets.slice(..len),
            absolute: false,
        }
    }

    /// Returns the name with `origin` appended if it is relative.
    ///
    /// An absolute name is returned unchanged.
    pub fn derelativize(&self, origin: &Name) -> Result<Name, NameError> {
        if self.absolute {
            return Ok(self.clone());
        }
        let mut octets =
            BytesMut::with_capacity(self.octets.len() + origin.octets.len());
        octets.extend_from_slice(&self.octets);
        octets.extend_from_slice(&origin.octets);
        Self::from_octets(octets.freeze(), origin.absolute)
    }
}

//--- FromStr

impl FromStr for Name {
    type Err = NameError;

    /// Parses a name from its presentation format.
    ///
    /// A trailing dot makes the name absolute. A single dot is the root
    /// name, while `@` and the empty string are the empty relative name.
    /// Labels may contain `\X` escapes for a literal `X` and `\DDD` escapes
    /// for an octet given in decimal.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "@" => return Ok(Name::empty()),
            "." => return Ok(Name::root()),
            _ => {}
        }

        let mut octets = BytesMut::new();
        let mut label = Vec::new();
        let mut chars = s.bytes();
        let mut absolute = false;
        while let Some(ch) = chars.next() {
            match ch {
                b'.' => {
                    if label.is_empty() {
                        return Err(NameError::EmptyLabel);
                    }
                    push_label(&mut octets, &label)?;
                    label.clear();
                    if chars.len() == 0 {
                        absolute = true;
                    }
                }
                b'\\' => label.push(parse_escape(&mut chars)?),
                _ => label.push(ch),
            }
        }
        if !absolute {
            push_label(&mut octets, &label)?;
        }
        Self::from_octets(octets.freeze(), absolute)
    }
}

fn push_label(octets: &mut BytesMut, label: &[u8]) -> Result<(), NameError> {
    if label.is_empty() {
        return Err(NameError::EmptyLabel);
    }
    if label.len() > MAX_LABEL_LEN {
        return Err(NameError::LongLabel);
    }
    octets.put_u8(label.len() as u8);
    octets.extend_from_slice(label);
    Ok(())
}

fn parse_escape(chars: &mut impl Iterator<Item = u8>) -> Result<u8, NameError> {
    let first = chars.next().ok_or(NameError::BadEscape)?;
    if !first.is_ascii_digit() {
        return Ok(first);
    }
    let mut value = u32::from(first - b'0');
    for _ in 0..2 {
        match chars.next() {
            Some(ch) if ch.is_ascii_digit() => {
                value = value * 10 + u32::from(ch - b'0');
            }
            _ => return Err(NameError::BadEscape),
        }
    }
    u8::try_from(value).map_err(|_| NameError::BadEscape)
}

//--- PartialEq, Eq, and Hash

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        // Length octets are below 64 and never ASCII letters, so comparing
        // the whole wire format ignoring case is a label-wise comparison.
        self.absolute == other.absolute
            && self.octets.eq_ignore_ascii_case(&other.octets)
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.absolute.hash(state);
        for ch in self.octets.iter() {
            state.write_u8(ch.to_ascii_lowercase())
        }
    }
}

//--- PartialOrd and Ord

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    /// Canonical ordering.
    ///
    /// Relative names sort before absolute ones. Within each kind, labels
    /// are compared from the most significant one on, ignoring ASCII case.
    fn cmp(&self, other: &Self) -> Ordering {
        match self.absolute.cmp(&other.absolute) {
            Ordering::Equal => {}
            res => return res,
        }
        let mine: Vec<_> = self.iter_labels().collect();
        let theirs: Vec<_> = other.iter_labels().collect();
        for (left, right) in mine.iter().rev().zip(theirs.iter().rev()) {
            let left = left.iter().map(u8::to_ascii_lowercase);
            let right = right.iter().map(u8::to_ascii_lowercase);
            match left.cmp(right) {
                Ordering::Equal => {}
                res => return res,
            }
        }
        mine.len().cmp(&theirs.len())
    }
}

//--- Display and Debug

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_root() {
            return f.write_str(".");
        }
        if self.is_empty() {
            return f.write_str("@");
        }
        let mut first = true;
        for label in self.iter_labels() {
            if !first {
                f.write_str(".")?;
            }
            first = false;
            for &ch in label {
                if ch == b'.' || ch == b'\\' {
                    write!(f, "\\{}", ch as char)?;
                } else if ch.is_ascii_graphic() {
                    write!(f, "{}", ch as char)?;
                } else {
                    write!(f, "\\{:03}", ch)?;
                }
            }
        }
        if self.absolute {
            f.write_str(".")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Name({})", self)
    }
}

//--- Deserialize and Serialize

#[cfg(feature = "serde")]
impl serde::Serialize for Name {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Name {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Self, D::Error> {
        let s = <std::string::String as serde::Deserialize>::deserialize(
            deserializer,
        )?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

//------------ LabelIter -----------------------------------------------------

/// An iterator over the labels of a [`Name`].
#[derive(Clone, Debug)]
pub struct LabelIter<'a> {
    octets: &'a [u8],
}

impl<'a> Iterator for LabelIter<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let (&len, rest) = self.octets.split_first()?;
        let (label, rest) = rest.split_at(usize::from(len));
        self.octets = rest;
        Some(label)
    }
}

impl iter::FusedIterator for LabelIter<'_> {}

//------------ NameError -----------------------------------------------------

/// A domain name could not be created.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NameError {
    /// A label other than the root label was empty.
    EmptyLabel,

    /// A label was longer than 63 octets.
    LongLabel,

    /// The name was longer than 255 octets.
    LongName,

    /// An escape sequence was malformed.
    BadEscape,
}

impl fmt::Display for NameError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NameError::EmptyLabel => f.write_str("empty label"),
            NameError::LongLabel => f.write_str("label exceeds 63 octets"),
            NameError::LongName => f.write_str("name exceeds 255 octets"),
            NameError::BadEscape => f.write_str("illegal escape sequence"),
        }
    }
}

impl std::error::Error for NameError {}

//============ Tests =========================================================
