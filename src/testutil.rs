//! Test-only doubles for the two collaborators spec.md requires this crate
//! to treat as injectable so regression tests can run deterministically:
//! the signing oracle (§6) and the SOA clock (§6, "`now_seconds()` and
//! `today_yyyymmdd()` are injected so tests can pin time").
//!
//! Gated behind the `test-util` feature (always on for this crate's own
//! `#[cfg(test)]` modules) rather than hidden entirely, so a caller
//! exercising its own [`crate::zone::ZoneRunner`] driver can reuse these
//! fakes instead of writing its own.

use std::collections::HashMap;
use std::sync::Mutex;

use bytes::Bytes;

use crate::adapters::SoaClock;
use crate::error::OracleError;
use crate::oracle::SigningOracle;
use crate::rdata::Rdata;

//----------- FakeOracle --------------------------------------------------------------

/// An in-memory [`SigningOracle`] that never touches real key material: it
/// synthesizes a deterministic DNSKEY per locator and "signs" by returning
/// the signing input unchanged, tagged with the locator so distinct keys
/// never collide on signature bytes.
///
/// Flags are inferred from the locator's name (`"ksk"`/`"zsk"` substring,
/// case-insensitively) since nothing about the oracle boundary itself
/// carries a key's role — that lives in [`crate::keys::Key`].
pub struct FakeOracle {
    registered: Mutex<HashMap<String, Rdata>>,
}

impl FakeOracle {
    pub fn new() -> FakeOracle {
        FakeOracle { registered: Mutex::new(HashMap::new()) }
    }

    /// Register an explicit DNSKEY RDATA for `locator`, overriding the
    /// default flags-from-name inference. Useful for tests that need a
    /// specific key tag.
    pub fn register(&self, locator: &str, rdata: Rdata) {
        self.registered.lock().unwrap().insert(locator.to_string(), rdata);
    }

    fn default_dnskey(locator: &str) -> Rdata {
        let lower = locator.to_ascii_lowercase();
        let flags = if lower.contains("ksk") { 257 } else { 256 };
        Rdata::Dnskey {
            flags,
            protocol: 3,
            algorithm: 13,
            public_key: Bytes::from(locator.as_bytes().to_vec()),
        }
    }
}

impl Default for FakeOracle {
    fn default() -> FakeOracle {
        FakeOracle::new()
    }
}

impl SigningOracle for FakeOracle {
    fn get_public_key(&self, locator: &str) -> Result<Rdata, OracleError> {
        if let Some(rdata) = self.registered.lock().unwrap().get(locator) {
            return Ok(rdata.clone());
        }
        Ok(FakeOracle::default_dnskey(locator))
    }

    fn sign(&self, locator: &str, _algorithm: u8, signing_input: &[u8]) -> Result<Bytes, OracleError> {
        let mut out = Vec::with_capacity(signing_input.len() + locator.len() + 1);
        out.extend_from_slice(signing_input);
        out.push(0);
        out.extend_from_slice(locator.as_bytes());
        Ok(Bytes::from(out))
    }
}

//----------- FixedClock --------------------------------------------------------------

/// A [`SoaClock`] pinned to a fixed instant, for reproducible
/// inception/expiration windowing and `unixtime`/`datecounter` serial
/// computation in tests.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock {
    now_seconds: u64,
    today_yyyymmdd: u32,
}

impl FixedClock {
    pub fn new(now_seconds: u64, today_yyyymmdd: u32) -> FixedClock {
        FixedClock { now_seconds, today_yyyymmdd }
    }
}

impl SoaClock for FixedClock {
    fn now_seconds(&self) -> u64 {
        self.now_seconds
    }

    fn today_yyyymmdd(&self) -> u32 {
        self.today_yyyymmdd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_oracle_infers_ksk_flags_from_locator() {
        let oracle = FakeOracle::new();
        let Rdata::Dnskey { flags, .. } = oracle.get_public_key("ksk1").unwrap() else { panic!() };
        assert_eq!(flags, 257);
        let Rdata::Dnskey { flags, .. } = oracle.get_public_key("zsk1").unwrap() else { panic!() };
        assert_eq!(flags, 256);
    }

    #[test]
    fn fake_oracle_sign_is_deterministic_and_locator_sensitive() {
        let oracle = FakeOracle::new();
        let a = oracle.sign("zsk1", 13, b"input").unwrap();
        let b = oracle.sign("zsk1", 13, b"input").unwrap();
        assert_eq!(a, b);
        let c = oracle.sign("zsk2", 13, b"input").unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn fixed_clock_reports_pinned_instant() {
        let clock = FixedClock::new(2024010100, 20240101);
        assert_eq!(clock.now_seconds(), 2024010100);
        assert_eq!(clock.today_yyyymmdd(), 20240101);
    }
}
