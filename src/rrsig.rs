//! The RRSIG generator (component F): signer selection, inception/
//! expiration windowing with jitter, signature reuse, and the canonical
//! signing input of RFC 4034 §3.1.8.1.

use std::hash::{Hash, Hasher};

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::OracleError;
use crate::keys::{Key, KeyList};
use crate::name::Name;
use crate::oracle::SigningOracle;
use crate::rdata::{Rdata, Rr, Rtype};

/// A signature over one RRset by one key.
///
/// `key_locator`/`key_flags` are core-private provenance (not carried on
/// the wire RRSIG RDATA): they let the reuse check in [`refresh_rrset`]
/// identify which key produced a given signature without re-deriving its
/// key tag against every key in the set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    pub covered_type: Rtype,
    pub algorithm: u8,
    pub labels: u8,
    pub original_ttl: u32,
    pub inception: u32,
    pub expiration: u32,
    pub key_tag: u16,
    pub signer_name: Name,
    pub signature: Bytes,
    pub key_locator: String,
    pub key_flags: u16,
}

impl Signature {
    /// The wire RDATA this signature would serialize as.
    pub fn to_rdata(&self) -> Rdata {
        Rdata::Rrsig {
            type_covered: self.covered_type,
            algorithm: self.algorithm,
            labels: self.labels,
            original_ttl: self.original_ttl,
            expiration: self.expiration,
            inception: self.inception,
            key_tag: self.key_tag,
            signer_name: self.signer_name.clone(),
            signature: self.signature.clone(),
        }
    }
}

/// RFC 4034 Appendix B key tag algorithm (for algorithms other than the
/// long-deprecated RSA/MD5).
pub fn key_tag(dnskey_rdata: &[u8]) -> u16 {
    let mut ac: u32 = 0;
    for (i, &b) in dnskey_rdata.iter().enumerate() {
        if i % 2 == 0 {
            ac += (b as u32) << 8;
        } else {
            ac += b as u32;
        }
    }
    ac += (ac >> 16) & 0xffff;
    (ac & 0xffff) as u16
}

//----------- Jitter --------------------------------------------------------------

/// A source of signature-expiration jitter, injected so production can draw
/// from a real CSPRNG while tests use a fixed, reproducible seed.
///
/// `Send + Sync` so a single jitter source can be shared across the
/// signing workers spec.md §5 fans RRSIG generation out to.
pub trait JitterSource: Send + Sync {
    /// Draw a jitter offset in `[-max, max]` seconds for one RRset+signer
    /// pair.
    fn jitter(&self, zone: &Name, rrset_owner: &Name, rrset_type: Rtype, key_tag: u16, max: i64) -> i64;
}

/// The default jitter source: deterministically seeded from
/// `(zone, rrset_owner, rrset_type, key_tag)` so repeated runs over
/// unchanged input produce byte-identical signatures (the "signature
/// reuse" testable property only holds if jitter is stable between runs
/// when nothing regenerates; full determinism here also makes the
/// regenerate-on-expiry case reproducible in tests).
#[derive(Clone, Copy, Debug, Default)]
pub struct DeterministicJitter;

impl JitterSource for DeterministicJitter {
    fn jitter(&self, zone: &Name, rrset_owner: &Name, rrset_type: Rtype, key_tag: u16, max: i64) -> i64 {
        if max == 0 {
            return 0;
        }
        let mut hasher = FnvHasher::new();
        zone.hash(&mut hasher);
        rrset_owner.hash(&mut hasher);
        rrset_type.hash(&mut hasher);
        key_tag.hash(&mut hasher);
        let seed = hasher.finish();
        // Map into [-max, max] via modulo over the unsigned range 2*max+1.
        let span = (2 * max + 1) as u64;
        (seed % span) as i64 - max
    }
}

/// A tiny FNV-1a hasher, used only to derive deterministic jitter seeds.
/// Not intended for anything security-sensitive.
struct FnvHasher(u64);

impl FnvHasher {
    fn new() -> FnvHasher {
        FnvHasher(0xcbf29ce484222325)
    }
}

impl Hasher for FnvHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(0x100000001b3);
        }
    }
}

//----------- Signing input --------------------------------------------------------

/// Parameters identifying which RRset is being signed, independent of
/// storage: used both to build the signing input and to key the reuse
/// lookup.
pub struct SignableRrset<'a> {
    pub owner: &'a Name,
    pub rtype: Rtype,
    pub class: crate::rdata::Class,
    pub ttl: u32,
    pub rrs: &'a [Rdata],
}

/// Build the RFC 4034 §3.1.8.1 canonical signing input for `rrset` signed
/// by `signer_name` with the given RRSIG metadata (signature field not yet
/// known).
pub fn canonical_signing_input(
    rrset: &SignableRrset<'_>,
    algorithm: u8,
    original_ttl: u32,
    expiration: u32,
    inception: u32,
    key_tag: u16,
    signer_name: &Name,
) -> Bytes {
    let labels = rrset.owner.signing_label_count();

    let mut out = BytesMut::new();
    out.put_u16(rrset.rtype.value());
    out.put_u8(algorithm);
    out.put_u8(labels);
    out.put_u32(original_ttl);
    out.put_u32(expiration);
    out.put_u32(inception);
    out.put_u16(key_tag);
    out.extend_from_slice(&signer_name.to_canonical_wire());

    let owner_wire = rrset.owner.to_canonical_wire();
    let mut canonical_rrs: Vec<Bytes> = rrset.rrs.iter().map(Rdata::canonical_bytes).collect();
    canonical_rrs.sort();

    for rdata in canonical_rrs {
        out.extend_from_slice(&owner_wire);
        out.put_u16(rrset.rtype.value());
        out.put_u16(rrset.class.0);
        out.put_u32(original_ttl);
        out.put_u16(rdata.len() as u16);
        out.extend_from_slice(&rdata);
    }

    out.freeze()
}

//----------- Generation -------------------------------------------------------

/// Which validity window applies to a given covered type, per spec.md
/// §4.F step 3.
pub fn validity_for(
    rtype: Rtype,
    sig_validity_default: u32,
    sig_validity_denial: u32,
    sig_validity_keyset: Option<u32>,
) -> u32 {
    match rtype {
        Rtype::NSEC | Rtype::NSEC3 => sig_validity_denial,
        Rtype::DNSKEY => sig_validity_keyset.unwrap_or(sig_validity_default),
        _ => sig_validity_default,
    }
}

/// Parameters controlling RRSIG generation/reuse for one rrset.
pub struct RrsigPolicy<'a> {
    pub now: u32,
    pub sig_refresh_interval: u32,
    pub sig_inception_offset: u32,
    pub sig_jitter: i64,
    pub sig_validity_default: u32,
    pub sig_validity_denial: u32,
    pub sig_validity_keyset: Option<u32>,
    pub jitter_source: &'a dyn JitterSource,
}

/// Refresh the signatures over `rrset`, reusing valid ones and
/// (re)generating the rest. `signers` is the key set that must cover this
/// rrset (KSKs for DNSKEY, ZSKs for everything else).
///
/// Returns the new signature list; existing signatures that are still
/// valid and whose signer is still in `signers` are carried over
/// byte-for-byte (the "signature reuse" testable property).
pub fn refresh_rrset(
    zone: &Name,
    rrset: &SignableRrset<'_>,
    existing: &[Signature],
    signers: &[&Key],
    policy: &RrsigPolicy<'_>,
    oracle: &dyn SigningOracle,
) -> Result<Vec<Signature>, OracleError> {
    let mut out = Vec::with_capacity(signers.len());

    for key in signers {
        let reused = existing.iter().find(|sig| {
            sig.key_locator == key.locator
                && sig.key_flags == key.flags
                && sig.covered_type == rrset.rtype
                && (sig.expiration as i64 - policy.now as i64) > policy.sig_refresh_interval as i64
        });

        if let Some(sig) = reused {
            out.push(sig.clone());
            continue;
        }

        let validity = validity_for(
            rrset.rtype,
            policy.sig_validity_default,
            policy.sig_validity_denial,
            policy.sig_validity_keyset,
        );
        let jitter = policy
            .jitter_source
            .jitter(zone, rrset.owner, rrset.rtype, key_tag_for(key, oracle)?, policy.sig_jitter);

        let inception = policy.now.saturating_sub(policy.sig_inception_offset);
        let expiration = (policy.now as i64 + validity as i64 + jitter) as u32;
        let tag = key_tag_for(key, oracle)?;
        let signer_name = zone.clone();

        let input = canonical_signing_input(
            rrset,
            key.algorithm,
            rrset.ttl,
            expiration,
            inception,
            tag,
            &signer_name,
        );
        let signature = key.sign(oracle, &input)?;

        out.push(Signature {
            covered_type: rrset.rtype,
            algorithm: key.algorithm,
            labels: rrset.owner.signing_label_count(),
            original_ttl: rrset.ttl,
            inception,
            expiration,
            key_tag: tag,
            signer_name,
            signature,
            key_locator: key.locator.clone(),
            key_flags: key.flags,
        });
    }

    Ok(out)
}

fn key_tag_for(key: &Key, oracle: &dyn SigningOracle) -> Result<u16, OracleError> {
    let rdata = key.dnskey_rdata(oracle)?;
    Ok(key_tag(&rdata.canonical_bytes()))
}

/// Select the signer set for `rtype` from `keys`, per spec.md §4.F step 1.
pub fn signers_for<'a>(rtype: Rtype, keys: &'a KeyList) -> Vec<&'a Key> {
    if rtype == Rtype::DNSKEY {
        keys.ksks().collect()
    } else {
        keys.zsks().collect()
    }
}

/// Materialize the RRs a list of [`Signature`]s would serialize as, owned
/// by `owner` with the covered rrset's `class`.
pub fn signatures_as_rrs(owner: &Name, class: crate::rdata::Class, ttl: u32, sigs: &[Signature]) -> Vec<Rr> {
    sigs.iter()
        .map(|sig| Rr::new(owner.clone(), class, ttl, sig.to_rdata()))
        .collect()
}
