//! Canonical DNS names.
//!
//! A [`Name`] is an owned, wire-format-encoded DNS name: a sequence of
//! length-prefixed labels terminated by the root label. Storage is a cheaply
//! cloneable [`Bytes`] buffer, so passing names between domains, denial
//! nodes and signatures is O(1).
//!
//! Comparisons follow RFC 4034 §6.1 canonical DNS name ordering: labels are
//! compared right-to-left (root first), case-insensitively, as unsigned
//! octet strings. This ordering is what makes a `BTreeMap<Name, _>` iterate
//! in the canonical order the rest of the engine (and its testable
//! properties) relies on.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use bytes::{Bytes, BytesMut};

/// The maximum length of a single DNS label.
const MAX_LABEL_LEN: usize = 63;

/// The maximum length of a complete name in wire format.
const MAX_NAME_LEN: usize = 255;

//----------- Name ------------------------------------------------------------

/// An owned, wire-format DNS name.
///
/// The wire encoding is a sequence of `(length, octets)` labels followed by
/// the zero-length root label. `Name` never stores compressed pointers.
#[derive(Clone)]
pub struct Name(Bytes);

impl Name {
    /// The root name (`.`).
    pub fn root() -> Name {
        Name(Bytes::from_static(&[0]))
    }

    /// Parse a name from its textual (master-file) presentation form.
    ///
    /// Supports the usual `\DDD` and `\.` escapes. A trailing dot is
    /// optional; `example.com` and `example.com.` parse identically.
    pub fn parse(text: &str) -> Result<Name, NameParseError> {
        if text == "." {
            return Ok(Name::root());
        }

        let mut out = BytesMut::new();
        let mut label = Vec::new();
        let mut chars = text.chars().peekable();
        let mut saw_any = false;

        while let Some(c) = chars.next() {
            match c {
                '.' => {
                    push_label(&mut out, &label)?;
                    label.clear();
                    saw_any = true;
                }
                '\\' => {
                    let Some(next) = chars.next() else {
                        return Err(NameParseError::TrailingEscape);
                    };
                    if next.is_ascii_digit() {
                        let mut code = next.to_digit(10).unwrap();
                        for _ in 0..2 {
                            let Some(d) = chars.next().and_then(|c| c.to_digit(10)) else {
                                return Err(NameParseError::BadEscape);
                            };
                            code = code * 10 + d;
                        }
                        if code > 255 {
                            return Err(NameParseError::BadEscape);
                        }
                        label.push(code as u8);
                    } else {
                        let mut buf = [0u8; 4];
                        label.extend_from_slice(next.encode_utf8(&mut buf).as_bytes());
                    }
                }
                c => {
                    let mut buf = [0u8; 4];
                    label.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                }
            }
        }

        // A name not ending in '.' has a trailing label still pending.
        if !label.is_empty() || !saw_any {
            push_label(&mut out, &label)?;
        }

        out.extend_from_slice(&[0]);
        if out.len() > MAX_NAME_LEN {
            return Err(NameParseError::TooLong);
        }

        Ok(Name(out.freeze()))
    }

    /// Build a name from an already-validated wire-format buffer.
    ///
    /// This does not re-validate label lengths; it is meant for internal
    /// use (e.g. reconstructing a name from `chop`/concatenation).
    fn from_wire(buf: Bytes) -> Name {
        Name(buf)
    }

    /// The name's wire-format bytes, including the terminating root label.
    pub fn as_wire_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Iterate over this name's labels, left to right (most specific
    /// first), excluding the terminating root label.
    pub fn labels(&self) -> LabelIter<'_> {
        LabelIter { rest: &self.0 }
    }

    /// The number of labels in this name, not counting the root label.
    pub fn label_count(&self) -> usize {
        self.labels().count()
    }

    /// Whether this name is the root name.
    pub fn is_root(&self) -> bool {
        self.0.as_ref() == [0]
    }

    /// Whether this name is a wildcard owner, i.e. its first label is `*`.
    pub fn is_wildcard(&self) -> bool {
        self.labels().next() == Some(b"*")
    }

    /// The parent of this name, or `None` if this is the root.
    pub fn chop(&self) -> Option<Name> {
        let first_len = self.0.first().copied()? as usize;
        if first_len == 0 {
            return None;
        }
        Some(Name::from_wire(self.0.slice(first_len + 1..)))
    }

    /// Whether `self` is equal to, or a descendant of, `other`.
    pub fn is_subdomain_of(&self, other: &Name) -> bool {
        if self.label_count() < other.label_count() {
            return false;
        }
        let mut skip = self.label_count() - other.label_count();
        let mut mine = self.labels();
        while skip > 0 {
            mine.next();
            skip -= 1;
        }
        mine.eq_by(other.labels(), |a, b| label_eq_ci(a, b))
    }

    /// Append `suffix` below `self`, i.e. build `<self's leading labels>` +
    /// `suffix`, used to compose an NSEC3 hashed owner from its hash label.
    pub fn prepend_label(label: &[u8], suffix: &Name) -> Result<Name, NameParseError> {
        if label.is_empty() || label.len() > MAX_LABEL_LEN {
            return Err(NameParseError::LabelTooLong);
        }
        let mut out = BytesMut::with_capacity(label.len() + 1 + suffix.0.len());
        out.extend_from_slice(&[label.len() as u8]);
        out.extend_from_slice(label);
        out.extend_from_slice(&suffix.0);
        if out.len() > MAX_NAME_LEN {
            return Err(NameParseError::TooLong);
        }
        Ok(Name(out.freeze()))
    }

    /// RFC 4034 §6.1 canonical ordering: labels compared right-to-left,
    /// case-insensitively, as unsigned octet strings.
    pub fn canonical_cmp(&self, other: &Name) -> Ordering {
        let a: Vec<&[u8]> = self.labels().collect();
        let b: Vec<&[u8]> = other.labels().collect();
        for (la, lb) in a.iter().rev().zip(b.iter().rev()) {
            match cmp_label_ci(la, lb) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        a.len().cmp(&b.len())
    }

    /// The number of labels used for the RRSIG `labels` field: the owner's
    /// label count, minus one if the owner is a wildcard (RFC 4034
    /// §3.1.3).
    pub fn signing_label_count(&self) -> u8 {
        let n = self.label_count();
        let n = if self.is_wildcard() { n.saturating_sub(1) } else { n };
        n as u8
    }

    /// The name's wire-format bytes with every label lowercased, as
    /// required when a name appears inside canonicalized RDATA or as an
    /// RR's canonical owner (RFC 4034 §6.2).
    pub fn to_canonical_wire(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(self.0.len());
        let mut rest = &self.0[..];
        loop {
            let len = rest[0] as usize;
            out.extend_from_slice(&[rest[0]]);
            if len == 0 {
                break;
            }
            for &b in &rest[1..1 + len] {
                out.extend_from_slice(&[b.to_ascii_lowercase()]);
            }
            rest = &rest[1 + len..];
        }
        out.freeze()
    }
}

fn push_label(out: &mut BytesMut, label: &[u8]) -> Result<(), NameParseError> {
    if label.len() > MAX_LABEL_LEN {
        return Err(NameParseError::LabelTooLong);
    }
    out.extend_from_slice(&[label.len() as u8]);
    out.extend_from_slice(label);
    Ok(())
}

fn label_eq_ci(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_ascii_lowercase() == y.to_ascii_lowercase())
}

fn cmp_label_ci(a: &[u8], b: &[u8]) -> Ordering {
    let n = a.len().min(b.len());
    for i in 0..n {
        let ord = a[i].to_ascii_lowercase().cmp(&b[i].to_ascii_lowercase());
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

//----------- LabelIter ---------------------------------------------------------

/// Iterator over a [`Name`]'s labels, left to right.
#[derive(Clone)]
pub struct LabelIter<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for LabelIter<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let len = *self.rest.first()? as usize;
        if len == 0 {
            return None;
        }
        let label = &self.rest[1..1 + len];
        self.rest = &self.rest[1 + len..];
        Some(label)
    }
}

//--- Comparisons and formatting

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_cmp(other) == Ordering::Equal
    }
}

impl Eq for Name {}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.canonical_cmp(other))
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical_cmp(other)
    }
}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for label in self.labels() {
            for b in label {
                b.to_ascii_lowercase().hash(state);
            }
            0xffu8.hash(state); // label separator, distinguishes "ab.c" from "a.bc"
        }
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({self})")
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str(".");
        }
        for label in self.labels() {
            for &b in label {
                match b {
                    b'.' | b'\\' => write!(f, "\\{}", b as char)?,
                    0x21..=0x7e => write!(f, "{}", b as char)?,
                    _ => write!(f, "\\{b:03}")?,
                }
            }
            f.write_str(".")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for Name {
    type Err = NameParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Name::parse(s)
    }
}

//----------- NameParseError ----------------------------------------------------

/// An error parsing a [`Name`] from presentation format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NameParseError {
    LabelTooLong,
    TooLong,
    BadEscape,
    TrailingEscape,
}

impl std::error::Error for NameParseError {}

impl fmt::Display for NameParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameParseError::LabelTooLong => f.write_str("a label exceeds 63 octets"),
            NameParseError::TooLong => f.write_str("the name exceeds 255 octets in wire format"),
            NameParseError::BadEscape => f.write_str("invalid \\DDD escape sequence"),
            NameParseError::TrailingEscape => f.write_str("name ends with an incomplete escape sequence"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_roundtrip() {
        let n = Name::parse("www.Example.com.").unwrap();
        assert_eq!(n.to_string(), "www.Example.com.");
        assert_eq!(n.label_count(), 3);
    }

    #[test]
    fn parse_without_trailing_dot() {
        let a = Name::parse("example.com").unwrap();
        let b = Name::parse("example.com.").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn root_name() {
        let root = Name::root();
        assert!(root.is_root());
        assert_eq!(root.label_count(), 0);
        assert_eq!(root.to_string(), ".");
    }

    #[test]
    fn equality_is_case_insensitive() {
        let a = Name::parse("Example.COM.").unwrap();
        let b = Name::parse("example.com.").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn chop_walks_to_parent() {
        let n = Name::parse("a.b.example.com.").unwrap();
        let parent = n.chop().unwrap();
        assert_eq!(parent, Name::parse("b.example.com.").unwrap());
        assert!(parent.is_subdomain_of(&Name::parse("example.com.").unwrap()));
    }

    #[test]
    fn is_subdomain_of_self() {
        let n = Name::parse("example.com.").unwrap();
        assert!(n.is_subdomain_of(&n));
    }

    #[test]
    fn canonical_ordering_matches_rfc4034_example() {
        // RFC 4034 section 6.1's example ordering.
        let names = [
            "example.",
            "a.example.",
            "yljkjljk.a.example.",
            "Z.a.example.",
            "zABC.a.EXAMPLE.",
            "z.example.",
            "\\001.z.example.",
            "*.z.example.",
            "\\200.z.example.",
        ];
        let parsed: Vec<Name> = names.iter().map(|s| Name::parse(s).unwrap()).collect();
        for window in parsed.windows(2) {
            assert_eq!(
                window[0].canonical_cmp(&window[1]),
                Ordering::Less,
                "{} should sort before {}",
                window[0],
                window[1]
            );
        }
    }

    #[test]
    fn wildcard_label_count_excludes_asterisk() {
        let n = Name::parse("*.example.com.").unwrap();
        assert_eq!(n.signing_label_count(), 2);
        let n = Name::parse("www.example.com.").unwrap();
        assert_eq!(n.signing_label_count(), 3);
    }

    #[test]
    fn prepend_label_builds_hashed_owner() {
        let apex = Name::parse("example.").unwrap();
        let hashed = Name::prepend_label(b"2vptu5timamqttgl4luu9kg21e0aor3s", &apex).unwrap();
        assert_eq!(hashed.label_count(), 2);
        assert!(hashed.is_subdomain_of(&apex));
    }
}
