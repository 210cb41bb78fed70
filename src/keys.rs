//! The key set: opaque handles into the signing oracle (component D).

use bytes::Bytes;

use crate::error::OracleError;
use crate::oracle::SigningOracle;
use crate::rdata::Rdata;

/// One key known to the signing configuration.
///
/// A key never carries private material; it is a `locator` the
/// [`SigningOracle`] resolves, plus the role flags that decide what it
/// signs and whether it is published.
#[derive(Clone, Debug)]
pub struct Key {
    pub locator: String,
    pub algorithm: u8,
    pub flags: u16,
    /// Include this key's DNSKEY RR in the apex DNSKEY rrset.
    pub publish: bool,
    /// This key signs the DNSKEY rrset.
    pub ksk: bool,
    /// This key signs every authoritative rrset other than DNSKEY.
    pub zsk: bool,
    /// A literal RR overriding the oracle-synthesized DNSKEY, if any. Wins
    /// over the oracle when both are available.
    pub resource_record_override: Option<Rdata>,
}

impl Key {
    /// The DNSKEY RDATA to publish for this key: the literal override if
    /// present, otherwise the oracle's public component.
    pub fn dnskey_rdata(&self, oracle: &dyn SigningOracle) -> Result<Rdata, OracleError> {
        if let Some(rdata) = &self.resource_record_override {
            return Ok(rdata.clone());
        }
        oracle.get_public_key(&self.locator)
    }

    pub fn sign(&self, oracle: &dyn SigningOracle, signing_input: &[u8]) -> Result<Bytes, OracleError> {
        oracle.sign(&self.locator, self.algorithm, signing_input)
    }
}

/// An ordered set of [`Key`]s, unique by `locator`.
#[derive(Clone, Debug, Default)]
pub struct KeyList {
    keys: Vec<Key>,
}

impl KeyList {
    pub fn new() -> KeyList {
        KeyList { keys: Vec::new() }
    }

    /// Insert `key`. Returns `false`, leaving the list unchanged, if its
    /// locator is already present.
    pub fn insert(&mut self, key: Key) -> bool {
        if self.keys.iter().any(|k| k.locator == key.locator) {
            return false;
        }
        self.keys.push(key);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Key> {
        self.keys.iter()
    }

    pub fn ksks(&self) -> impl Iterator<Item = &Key> {
        self.keys.iter().filter(|k| k.ksk)
    }

    pub fn zsks(&self) -> impl Iterator<Item = &Key> {
        self.keys.iter().filter(|k| k.zsk)
    }

    pub fn published(&self) -> impl Iterator<Item = &Key> {
        self.keys.iter().filter(|k| k.publish)
    }

    pub fn has_ksk(&self) -> bool {
        self.keys.iter().any(|k| k.ksk)
    }

    pub fn find(&self, locator: &str) -> Option<&Key> {
        self.keys.iter().find(|k| k.locator == locator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(locator: &str, ksk: bool, zsk: bool) -> Key {
        Key {
            locator: locator.to_string(),
            algorithm: 13,
            flags: if ksk { 257 } else { 256 },
            publish: true,
            ksk,
            zsk,
            resource_record_override: None,
        }
    }

    #[test]
    fn insert_rejects_duplicate_locator() {
        let mut list = KeyList::new();
        assert!(list.insert(key("ksk1", true, false)));
        assert!(!list.insert(key("ksk1", true, false)));
    }

    #[test]
    fn ksks_and_zsks_filter_by_role() {
        let mut list = KeyList::new();
        list.insert(key("ksk1", true, false));
        list.insert(key("zsk1", false, true));
        list.insert(key("csk1", true, true));
        assert_eq!(list.ksks().count(), 2);
        assert_eq!(list.zsks().count(), 2);
        assert!(list.has_ksk());
    }
}
