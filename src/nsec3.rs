//! RFC 5155 NSEC3 name hashing and base32hex encoding.

use bytes::Bytes;
use ring::digest::{digest, SHA1_FOR_LEGACY_USE_ONLY};

use crate::name::Name;

/// Hash `owner` per RFC 5155 §5: `IH(salt, owner, 0) = H(owner | salt)`,
/// `IH(salt, owner, k) = H(IH(salt, owner, k-1) | salt)`, iterated
/// `iterations` times starting from the canonical wire form of `owner`.
pub fn hash_owner(owner: &Name, salt: &[u8], iterations: u16) -> Bytes {
    let mut input = owner.to_canonical_wire().to_vec();
    input.extend_from_slice(salt);
    let mut h = digest(&SHA1_FOR_LEGACY_USE_ONLY, &input).as_ref().to_vec();

    for _ in 0..iterations {
        let mut next_input = h;
        next_input.extend_from_slice(salt);
        h = digest(&SHA1_FOR_LEGACY_USE_ONLY, &next_input).as_ref().to_vec();
    }

    Bytes::from(h)
}

const BASE32HEX_ALPHABET: &[u8; 32] = b"0123456789abcdefghijklmnopqrstuv";

/// Encode `bytes` as lowercase base32hex (RFC 4648 §7), the alphabet NSEC3
/// hashed owner labels use.
pub fn base32hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity((bytes.len() * 8).div_ceil(5));
    let mut buffer: u64 = 0;
    let mut bits = 0u32;

    for &b in bytes {
        buffer = (buffer << 8) | b as u64;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            let idx = ((buffer >> bits) & 0x1f) as usize;
            out.push(BASE32HEX_ALPHABET[idx] as char);
        }
    }
    if bits > 0 {
        let idx = ((buffer << (5 - bits)) & 0x1f) as usize;
        out.push(BASE32HEX_ALPHABET[idx] as char);
    }
    out
}

/// Decode a lowercase (or uppercase) base32hex string back to bytes.
/// Used only by tests to cross-check [`base32hex_encode`].
#[cfg(test)]
fn base32hex_decode(text: &str) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buffer: u64 = 0;
    let mut bits = 0u32;
    for c in text.chars() {
        let v = BASE32HEX_ALPHABET
            .iter()
            .position(|&a| a.to_ascii_lowercase() == c.to_ascii_lowercase() as u8)
            .expect("valid base32hex digit") as u64;
        buffer = (buffer << 5) | v;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
        }
    }
    out
}

/// Build the hashed owner name for `owner` under `apex`: the base32hex
/// encoding of the iterated hash, prepended as a single label to `apex`.
pub fn hashed_owner_name(owner: &Name, apex: &Name, salt: &[u8], iterations: u16) -> Name {
    let digest = hash_owner(owner, salt, iterations);
    let label = base32hex_encode(&digest);
    Name::prepend_label(label.as_bytes(), apex).expect("32-octet hash fits in one label")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base32hex_round_trips() {
        let data = b"hello dnssec";
        let encoded = base32hex_encode(data);
        let decoded = base32hex_decode(&encoded);
        assert_eq!(&decoded[..data.len()], data);
    }

    #[test]
    fn hash_is_deterministic_and_salt_sensitive() {
        let name = Name::parse("www.example.").unwrap();
        let a = hash_owner(&name, b"\xaa\xbb", 3);
        let b = hash_owner(&name, b"\xaa\xbb", 3);
        assert_eq!(a, b);
        let c = hash_owner(&name, b"\xcc\xdd", 3);
        assert_ne!(a, c);
    }

    #[test]
    fn zero_iterations_hashes_once() {
        let name = Name::parse("example.").unwrap();
        let h0 = hash_owner(&name, &[], 0);
        assert_eq!(h0.len(), 20);
    }

    #[test]
    fn hashed_owner_name_is_subdomain_of_apex() {
        let apex = Name::parse("example.").unwrap();
        let owner = Name::parse("www.example.").unwrap();
        let hashed = hashed_owner_name(&owner, &apex, &[], 1);
        assert!(hashed.is_subdomain_of(&apex));
        assert_eq!(hashed.label_count(), apex.label_count() + 1);
    }
}
