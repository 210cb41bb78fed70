//! Resource record data: types, canonical RDATA encoding, RRs and RRsets.

use std::cmp::Ordering;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use bytes::{BufMut, Bytes, BytesMut};

use crate::name::Name;

//----------- Rtype / Class ------------------------------------------------------

/// A DNS RR type code.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rtype(pub u16);

impl Rtype {
    pub const A: Rtype = Rtype(1);
    pub const NS: Rtype = Rtype(2);
    pub const CNAME: Rtype = Rtype(5);
    pub const SOA: Rtype = Rtype(6);
    pub const MX: Rtype = Rtype(15);
    pub const TXT: Rtype = Rtype(16);
    pub const AAAA: Rtype = Rtype(28);
    pub const RRSIG: Rtype = Rtype(46);
    pub const NSEC: Rtype = Rtype(47);
    pub const DNSKEY: Rtype = Rtype(48);
    pub const DS: Rtype = Rtype(43);
    pub const NSEC3: Rtype = Rtype(50);
    pub const NSEC3PARAM: Rtype = Rtype(51);

    pub fn value(self) -> u16 {
        self.0
    }
}

impl fmt::Debug for Rtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Rtype::A => "A",
            Rtype::NS => "NS",
            Rtype::CNAME => "CNAME",
            Rtype::SOA => "SOA",
            Rtype::MX => "MX",
            Rtype::TXT => "TXT",
            Rtype::AAAA => "AAAA",
            Rtype::RRSIG => "RRSIG",
            Rtype::NSEC => "NSEC",
            Rtype::DNSKEY => "DNSKEY",
            Rtype::DS => "DS",
            Rtype::NSEC3 => "NSEC3",
            Rtype::NSEC3PARAM => "NSEC3PARAM",
            _ => return write!(f, "TYPE{}", self.0),
        };
        f.write_str(name)
    }
}

/// A DNS RR class. Only IN is meaningful for this engine.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Class(pub u16);

impl Class {
    pub const IN: Class = Class(1);
}

//----------- TypeBitmap ----------------------------------------------------------

/// An RFC 4034 §4.1.2 / RFC 3845 type bitmap, as carried by NSEC and NSEC3
/// records.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct TypeBitmap {
    types: Vec<Rtype>,
}

impl TypeBitmap {
    pub fn new() -> TypeBitmap {
        TypeBitmap { types: Vec::new() }
    }

    pub fn from_types(mut types: Vec<Rtype>) -> TypeBitmap {
        types.sort_unstable();
        types.dedup();
        TypeBitmap { types }
    }

    pub fn insert(&mut self, rtype: Rtype) {
        if !self.types.contains(&rtype) {
            self.types.push(rtype);
            self.types.sort_unstable();
        }
    }

    pub fn contains(&self, rtype: Rtype) -> bool {
        self.types.contains(&rtype)
    }

    pub fn types(&self) -> &[Rtype] {
        &self.types
    }

    /// Encode into the windowed bitmap wire format: a sequence of
    /// `(window, bitmap_len, bitmap)` blocks, one per nonempty window of
    /// 256 type codes.
    pub fn encode(&self) -> Bytes {
        let mut out = BytesMut::new();
        let mut window = None;
        let mut bits = [0u8; 32];
        let mut highest = 0usize;

        let flush = |out: &mut BytesMut, window: u8, bits: &[u8; 32], highest: usize| {
            let len = highest + 1;
            out.put_u8(window);
            out.put_u8(len as u8);
            out.extend_from_slice(&bits[..len]);
        };

        for rtype in &self.types {
            let w = (rtype.0 >> 8) as u8;
            let bit = (rtype.0 & 0xff) as usize;
            if window != Some(w) {
                if let Some(prev) = window {
                    flush(&mut out, prev, &bits, highest);
                }
                window = Some(w);
                bits = [0u8; 32];
                highest = 0;
            }
            bits[bit / 8] |= 0x80 >> (bit % 8);
            highest = highest.max(bit / 8);
        }
        if let Some(w) = window {
            flush(&mut out, w, &bits, highest);
        }
        out.freeze()
    }
}

//----------- Rdata -----------------------------------------------------------------

/// Resource record data.
///
/// Only the types whose canonical form requires embedded-name lowercasing
/// (RFC 4034 §6.2) or that the signing pipeline synthesizes itself are
/// represented structurally; everything else passes through as opaque wire
/// bytes under [`Rdata::Other`], which is a faithful canonical form for any
/// type with no embedded, compressible name.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Rdata {
    Soa {
        mname: Name,
        rname: Name,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    },
    Ns(Name),
    Cname(Name),
    Mx {
        preference: u16,
        exchange: Name,
    },
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    Dnskey {
        flags: u16,
        protocol: u8,
        algorithm: u8,
        public_key: Bytes,
    },
    Ds {
        key_tag: u16,
        algorithm: u8,
        digest_type: u8,
        digest: Bytes,
    },
    Nsec {
        next_owner: Name,
        types: TypeBitmap,
    },
    Nsec3 {
        hash_algorithm: u8,
        flags: u8,
        iterations: u16,
        salt: Bytes,
        next_hashed_owner: Bytes,
        types: TypeBitmap,
    },
    Nsec3Param {
        hash_algorithm: u8,
        flags: u8,
        iterations: u16,
        salt: Bytes,
    },
    Rrsig {
        type_covered: Rtype,
        algorithm: u8,
        labels: u8,
        original_ttl: u32,
        expiration: u32,
        inception: u32,
        key_tag: u16,
        signer_name: Name,
        signature: Bytes,
    },
    /// Opaque wire-format rdata for any type this engine does not need to
    /// interpret structurally (TXT, SRV, AAAA-adjacent future types, etc).
    Other {
        rtype: Rtype,
        wire: Bytes,
    },
}

impl Rdata {
    pub fn rtype(&self) -> Rtype {
        match self {
            Rdata::Soa { .. } => Rtype::SOA,
            Rdata::Ns(_) => Rtype::NS,
            Rdata::Cname(_) => Rtype::CNAME,
            Rdata::Mx { .. } => Rtype::MX,
            Rdata::A(_) => Rtype::A,
            Rdata::Aaaa(_) => Rtype::AAAA,
            Rdata::Dnskey { .. } => Rtype::DNSKEY,
            Rdata::Ds { .. } => Rtype::DS,
            Rdata::Nsec { .. } => Rtype::NSEC,
            Rdata::Nsec3 { .. } => Rtype::NSEC3,
            Rdata::Nsec3Param { .. } => Rtype::NSEC3PARAM,
            Rdata::Rrsig { .. } => Rtype::RRSIG,
            Rdata::Other { rtype, .. } => *rtype,
        }
    }

    /// The canonical wire-format encoding of this RDATA (RFC 4034 §6.2):
    /// embedded names lowercased and uncompressed, everything else as-is.
    pub fn canonical_bytes(&self) -> Bytes {
        let mut out = BytesMut::new();
        match self {
            Rdata::Soa { mname, rname, serial, refresh, retry, expire, minimum } => {
                out.extend_from_slice(&mname.to_canonical_wire());
                out.extend_from_slice(&rname.to_canonical_wire());
                out.put_u32(*serial);
                out.put_u32(*refresh);
                out.put_u32(*retry);
                out.put_u32(*expire);
                out.put_u32(*minimum);
            }
            Rdata::Ns(name) | Rdata::Cname(name) => {
                out.extend_from_slice(&name.to_canonical_wire());
            }
            Rdata::Mx { preference, exchange } => {
                out.put_u16(*preference);
                out.extend_from_slice(&exchange.to_canonical_wire());
            }
            Rdata::A(addr) => out.extend_from_slice(&addr.octets()),
            Rdata::Aaaa(addr) => out.extend_from_slice(&addr.octets()),
            Rdata::Dnskey { flags, protocol, algorithm, public_key } => {
                out.put_u16(*flags);
                out.put_u8(*protocol);
                out.put_u8(*algorithm);
                out.extend_from_slice(public_key);
            }
            Rdata::Ds { key_tag, algorithm, digest_type, digest } => {
                out.put_u16(*key_tag);
                out.put_u8(*algorithm);
                out.put_u8(*digest_type);
                out.extend_from_slice(digest);
            }
            Rdata::Nsec { next_owner, types } => {
                out.extend_from_slice(&next_owner.to_canonical_wire());
                out.extend_from_slice(&types.encode());
            }
            Rdata::Nsec3 { hash_algorithm, flags, iterations, salt, next_hashed_owner, types } => {
                out.put_u8(*hash_algorithm);
                out.put_u8(*flags);
                out.put_u16(*iterations);
                out.put_u8(salt.len() as u8);
                out.extend_from_slice(salt);
                out.put_u8(next_hashed_owner.len() as u8);
                out.extend_from_slice(next_hashed_owner);
                out.extend_from_slice(&types.encode());
            }
            Rdata::Nsec3Param { hash_algorithm, flags, iterations, salt } => {
                out.put_u8(*hash_algorithm);
                out.put_u8(*flags);
                out.put_u16(*iterations);
                out.put_u8(salt.len() as u8);
                out.extend_from_slice(salt);
            }
            Rdata::Rrsig {
                type_covered,
                algorithm,
                labels,
                original_ttl,
                expiration,
                inception,
                key_tag,
                signer_name,
                signature,
            } => {
                out.put_u16(type_covered.0);
                out.put_u8(*algorithm);
                out.put_u8(*labels);
                out.put_u32(*original_ttl);
                out.put_u32(*expiration);
                out.put_u32(*inception);
                out.put_u16(*key_tag);
                out.extend_from_slice(&signer_name.to_canonical_wire());
                out.extend_from_slice(signature);
            }
            Rdata::Other { wire, .. } => out.extend_from_slice(wire),
        }
        out.freeze()
    }
}

impl PartialOrd for Rdata {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rdata {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical_bytes().cmp(&other.canonical_bytes())
    }
}

//----------- Rr -------------------------------------------------------------------

/// A single resource record.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Rr {
    pub owner: Name,
    pub class: Class,
    pub ttl: u32,
    pub rdata: Rdata,
}

impl Rr {
    pub fn new(owner: Name, class: Class, ttl: u32, rdata: Rdata) -> Rr {
        Rr { owner, class, ttl, rdata }
    }

    pub fn rtype(&self) -> Rtype {
        self.rdata.rtype()
    }

    /// Canonical ordering per RFC 4034 §6.3: owner, then type, then class,
    /// then canonical RDATA (TTL is excluded from the comparison).
    pub fn canonical_cmp(&self, other: &Rr) -> Ordering {
        self.owner
            .canonical_cmp(&other.owner)
            .then_with(|| self.rtype().cmp(&other.rtype()))
            .then_with(|| self.class.cmp(&other.class))
            .then_with(|| self.rdata.cmp(&other.rdata))
    }
}

//----------- Rrset -----------------------------------------------------------------

/// The set of RRs sharing one `(owner, type, class)`, plus the RRSIGs
/// covering them.
#[derive(Clone, Debug)]
pub struct Rrset {
    pub rtype: Rtype,
    pub class: Class,
    pub ttl: u32,
    rrs: Vec<Rdata>,
    pub rrsigs: Vec<crate::rrsig::Signature>,
}

impl Rrset {
    pub fn new(rtype: Rtype, class: Class, ttl: u32) -> Rrset {
        Rrset { rtype, class, ttl, rrs: Vec::new(), rrsigs: Vec::new() }
    }

    /// Insert `rdata`, keeping the set in canonical order and deduplicated.
    /// Returns `false` if the value was already present (a duplicate).
    pub fn insert(&mut self, rdata: Rdata) -> bool {
        debug_assert_eq!(rdata.rtype(), self.rtype);
        match self.rrs.binary_search(&rdata) {
            Ok(_) => false,
            Err(pos) => {
                self.rrs.insert(pos, rdata);
                true
            }
        }
    }

    /// Remove `rdata`. Returns `true` if it was present.
    pub fn remove(&mut self, rdata: &Rdata) -> bool {
        match self.rrs.binary_search(rdata) {
            Ok(pos) => {
                self.rrs.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rrs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rrs.len()
    }

    /// Iterate the member RDATA in canonical order.
    pub fn rrs(&self) -> impl Iterator<Item = &Rdata> {
        self.rrs.iter()
    }

    /// Materialize the full RRs in this set, owned by `owner`.
    pub fn rrs_for(&self, owner: &Name) -> impl Iterator<Item = Rr> + '_ {
        let owner = owner.clone();
        self.rrs.iter().map(move |rdata| {
            Rr::new(owner.clone(), self.class, self.ttl, rdata.clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rrset_insert_dedups_and_stays_sorted() {
        let mut set = Rrset::new(Rtype::A, Class::IN, 300);
        assert!(set.insert(Rdata::A(Ipv4Addr::new(10, 0, 0, 2))));
        assert!(set.insert(Rdata::A(Ipv4Addr::new(10, 0, 0, 1))));
        assert!(!set.insert(Rdata::A(Ipv4Addr::new(10, 0, 0, 1))));
        let addrs: Vec<_> = set.rrs().cloned().collect();
        assert_eq!(
            addrs,
            vec![
                Rdata::A(Ipv4Addr::new(10, 0, 0, 1)),
                Rdata::A(Ipv4Addr::new(10, 0, 0, 2)),
            ]
        );
    }

    #[test]
    fn type_bitmap_round_trips_membership() {
        let bm = TypeBitmap::from_types(vec![Rtype::A, Rtype::RRSIG, Rtype::NSEC, Rtype::DNSKEY]);
        assert!(bm.contains(Rtype::A));
        assert!(bm.contains(Rtype::DNSKEY));
        assert!(!bm.contains(Rtype::AAAA));
        let encoded = bm.encode();
        assert!(!encoded.is_empty());
    }

    #[test]
    fn soa_canonical_bytes_lowercase_names() {
        let a = Rdata::Soa {
            mname: Name::parse("NS1.Example.").unwrap(),
            rname: Name::parse("hostmaster.example.").unwrap(),
            serial: 1,
            refresh: 2,
            retry: 3,
            expire: 4,
            minimum: 5,
        };
        let b = Rdata::Soa {
            mname: Name::parse("ns1.example.").unwrap(),
            rname: Name::parse("hostmaster.example.").unwrap(),
            serial: 1,
            refresh: 2,
            retry: 3,
            expire: 4,
            minimum: 5,
        };
        assert_eq!(a.canonical_bytes(), b.canonical_bytes());
    }
}
