//! Signing configuration (component C): a validated, immutable parameter
//! bundle plus the change classifier that decides how much of the denial
//! chain a configuration change invalidates.
//!
//! The on-disk (XML/RNG-validated) configuration format is out of scope
//! for this crate; callers hand in an already-parsed [`SignConf`] or use
//! [`SignConfFile`] to deserialize one from a TOML document, mirroring how
//! Cascade's own policy files lean on `serde` + `toml`.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::duration::DurationSpec;
use crate::keys::KeyList;
use crate::rdata::Rdata;

//----------- NsecType / SoaSerialPolicy -------------------------------------------

/// Which denial-of-existence mechanism the zone uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NsecType {
    Nsec,
    Nsec3,
}

/// The SOA serial maintenance strategy (spec.md §4.G step 5).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoaSerialPolicy {
    /// Pass the inbound serial through unchanged; fail if it didn't advance.
    Keep,
    /// `max(inbound, previous_outbound) + 1`.
    Counter,
    /// `max(now_seconds, previous_outbound + 1)`.
    Unixtime,
    /// `max(YYYYMMDD * 100, previous_outbound + 1)`.
    Datecounter,
}

//----------- DenialConfig ----------------------------------------------------------

/// Denial-of-existence policy (§4.C).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DenialConfig {
    pub nsec_type: NsecType,
    #[serde(default)]
    pub nsec3_optout: bool,
    /// RFC 5155 hash algorithm. Only `1` (SHA-1) is accepted today; see
    /// spec.md §9's open question on re-parameterizing the hash primitive.
    #[serde(default = "default_nsec3_algo")]
    pub nsec3_algo: u8,
    #[serde(default)]
    pub nsec3_iterations: u16,
    #[serde(default, with = "salt_hex")]
    pub nsec3_salt: Bytes,
    pub nsec3param_ttl: Option<u32>,
}

fn default_nsec3_algo() -> u8 {
    1
}

mod salt_hex {
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(salt: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        let mut hex = String::with_capacity(salt.len() * 2);
        for b in salt.iter() {
            hex.push_str(&format!("{b:02x}"));
        }
        hex.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let hex = String::deserialize(deserializer)?;
        if hex.len() % 2 != 0 {
            return Err(serde::de::Error::custom("salt hex string has odd length"));
        }
        let mut out = Vec::with_capacity(hex.len() / 2);
        let bytes = hex.as_bytes();
        for chunk in bytes.chunks(2) {
            let s = std::str::from_utf8(chunk).map_err(serde::de::Error::custom)?;
            let byte = u8::from_str_radix(s, 16).map_err(serde::de::Error::custom)?;
            out.push(byte);
        }
        Ok(Bytes::from(out))
    }
}

//----------- DnskeyConfig ------------------------------------------------------------

/// DNSKEY publication policy (§4.C / §4.D).
#[derive(Clone, Debug)]
pub struct DnskeyConfig {
    pub dnskey_ttl: u32,
    /// Literal RRSIG RDATAs to publish over the apex DNSKEY rrset instead
    /// of generating them, when present. An OpenDNSSEC-derived escape
    /// hatch for externally pre-signed key sets.
    pub dnskey_signature_rrs: Option<Vec<Rdata>>,
    pub keys: KeyList,
}

//----------- SoaConfig ---------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SoaConfig {
    pub soa_ttl: u32,
    pub soa_min: u32,
    pub soa_serial: SoaSerialPolicy,
}

//----------- SignConf -----------------------------------------------------------------

/// The validated, immutable signing configuration for one zone.
///
/// Construct through [`SignConf::build`], which runs the validation rules
/// of spec.md §4.C; there is no public constructor that bypasses it.
#[derive(Clone, Debug)]
pub struct SignConf {
    pub sig_resign_interval: DurationSpec,
    pub sig_refresh_interval: DurationSpec,
    pub sig_validity_default: DurationSpec,
    pub sig_validity_denial: DurationSpec,
    pub sig_validity_keyset: Option<DurationSpec>,
    pub sig_jitter: DurationSpec,
    pub sig_inception_offset: DurationSpec,
    pub denial: DenialConfig,
    pub dnskey: DnskeyConfig,
    pub soa: SoaConfig,
    pub max_zone_ttl: Option<u32>,
    pub passthrough: bool,
    /// External override for the outbound SOA serial, bypassing
    /// `soa.soa_serial` entirely for this run.
    pub force_serial: Option<u32>,
}

/// The unvalidated fields a [`SignConf`] is built from.
///
/// Kept as a separate, non-exhaustive-in-spirit builder type so
/// `SignConf` itself stays a plain immutable value once constructed.
pub struct SignConfBuilder {
    pub sig_resign_interval: Option<DurationSpec>,
    pub sig_refresh_interval: Option<DurationSpec>,
    pub sig_validity_default: Option<DurationSpec>,
    pub sig_validity_denial: Option<DurationSpec>,
    pub sig_validity_keyset: Option<DurationSpec>,
    pub sig_jitter: Option<DurationSpec>,
    pub sig_inception_offset: Option<DurationSpec>,
    pub denial: Option<DenialConfig>,
    pub dnskey: Option<DnskeyConfig>,
    pub soa: Option<SoaConfig>,
    pub max_zone_ttl: Option<u32>,
    pub passthrough: bool,
    pub force_serial: Option<u32>,
}

impl Default for SignConfBuilder {
    fn default() -> Self {
        SignConfBuilder {
            sig_resign_interval: None,
            sig_refresh_interval: None,
            sig_validity_default: None,
            sig_validity_denial: None,
            sig_validity_keyset: None,
            sig_jitter: None,
            sig_inception_offset: None,
            denial: None,
            dnskey: None,
            soa: None,
            max_zone_ttl: None,
            passthrough: false,
            force_serial: None,
        }
    }
}

impl SignConfBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the builder's fields and produce an immutable [`SignConf`].
    ///
    /// Validation rules (spec.md §4.C):
    /// - every required duration is present;
    /// - `nsec_type` is one of NSEC/NSEC3 with its subfields present (NSEC3
    ///   additionally requires `nsec3_algo == 1`, i.e. SHA-1);
    /// - `keys` is non-empty unless `passthrough` is set.
    pub fn build(self) -> Result<SignConf, String> {
        macro_rules! require {
            ($field:expr, $name:literal) => {
                $field.ok_or_else(|| format!("missing required duration '{}'", $name))?
            };
        }

        let sig_resign_interval = require!(self.sig_resign_interval, "sig_resign_interval");
        let sig_refresh_interval = require!(self.sig_refresh_interval, "sig_refresh_interval");
        let sig_validity_default = require!(self.sig_validity_default, "sig_validity_default");
        let sig_validity_denial = require!(self.sig_validity_denial, "sig_validity_denial");
        let sig_jitter = require!(self.sig_jitter, "sig_jitter");
        let sig_inception_offset = require!(self.sig_inception_offset, "sig_inception_offset");

        let denial = self.denial.ok_or_else(|| "missing denial-of-existence configuration".to_string())?;
        if denial.nsec_type == NsecType::Nsec3 && denial.nsec3_algo != 1 {
            return Err(format!(
                "nsec3_algo {} is not supported; only algorithm 1 (SHA-1) is implemented",
                denial.nsec3_algo
            ));
        }

        let dnskey = self.dnskey.ok_or_else(|| "missing DNSKEY configuration".to_string())?;
        if !self.passthrough && dnskey.keys.is_empty() {
            return Err("keys must be non-empty unless passthrough is enabled".to_string());
        }
        if !self.passthrough && !dnskey.keys.has_ksk() {
            return Err("at least one KSK is required unless passthrough is enabled".to_string());
        }

        let soa = self.soa.ok_or_else(|| "missing SOA configuration".to_string())?;

        Ok(SignConf {
            sig_resign_interval,
            sig_refresh_interval,
            sig_validity_default,
            sig_validity_denial,
            sig_validity_keyset: self.sig_validity_keyset,
            sig_jitter,
            sig_inception_offset,
            denial,
            dnskey,
            soa,
            max_zone_ttl: self.max_zone_ttl,
            passthrough: self.passthrough,
            force_serial: self.force_serial,
        })
    }
}

//----------- Change classification ---------------------------------------------------

/// The result of comparing two [`DenialConfig`]s across a reconfiguration,
/// per spec.md §4.C.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DenialChange {
    /// Nothing the denial chain or its signatures depend on changed.
    NoChange,
    /// Every denial node must be recomputed from scratch.
    RebuildNsecChain,
    /// Only the NSEC3PARAM TTL changed; existing nodes are still valid,
    /// only their signatures (and the NSEC3PARAM rrset) need re-signing.
    ResignOnly,
}

/// Classify the impact of moving from `old` to `new` denial configuration,
/// given the zone's current `soa_min` (a `compare_denial` input per
/// spec.md §4.C, since `soa_min` changes invalidate NSEC TTLs and the
/// bitmap-adjacent SOA MINIMUM field).
pub fn compare_denial(old: &DenialConfig, new: &DenialConfig, old_soa_min: u32, new_soa_min: u32) -> DenialChange {
    let structural_changed = old.nsec_type != new.nsec_type
        || old.nsec3_salt != new.nsec3_salt
        || old.nsec3_algo != new.nsec3_algo
        || old.nsec3_iterations != new.nsec3_iterations
        || old.nsec3_optout != new.nsec3_optout
        || old_soa_min != new_soa_min;

    if structural_changed {
        return DenialChange::RebuildNsecChain;
    }

    if old.nsec3param_ttl != new.nsec3param_ttl {
        return DenialChange::ResignOnly;
    }

    DenialChange::NoChange
}

//----------- SignConfFile (AMBIENT-C) -------------------------------------------------

/// A `serde`-deserializable intermediate representation of the fields a
/// [`SignConf`] needs, for callers who want to load signing policy from a
/// TOML document rather than constructing a [`SignConfBuilder`] in code.
/// This does not replace the out-of-scope XML/RNG configuration format;
/// it is a convenience layer sitting entirely on this crate's side of the
/// already-parsed-configuration boundary.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignConfFile {
    pub sig_resign_interval: DurationSpec,
    pub sig_refresh_interval: DurationSpec,
    pub sig_validity_default: DurationSpec,
    pub sig_validity_denial: DurationSpec,
    pub sig_validity_keyset: Option<DurationSpec>,
    pub sig_jitter: DurationSpec,
    pub sig_inception_offset: DurationSpec,
    pub denial: DenialConfig,
    pub dnskey_ttl: u32,
    pub soa: SoaConfig,
    pub max_zone_ttl: Option<u32>,
    #[serde(default)]
    pub passthrough: bool,
}

impl SignConfFile {
    /// Parse a `SignConfFile` from a TOML document. The `keys` and any
    /// literal DNSKEY-signature overrides still come from the caller's key
    /// manager, not from this file, since key material provenance is out
    /// of this crate's scope.
    pub fn parse(text: &str) -> Result<SignConfFile, String> {
        toml::from_str(text).map_err(|e| e.to_string())
    }

    /// Combine this file with externally supplied key material into a
    /// validated [`SignConf`].
    pub fn into_sign_conf(self, keys: KeyList, dnskey_signature_rrs: Option<Vec<Rdata>>) -> Result<SignConf, String> {
        SignConfBuilder {
            sig_resign_interval: Some(self.sig_resign_interval),
            sig_refresh_interval: Some(self.sig_refresh_interval),
            sig_validity_default: Some(self.sig_validity_default),
            sig_validity_denial: Some(self.sig_validity_denial),
            sig_validity_keyset: self.sig_validity_keyset,
            sig_jitter: Some(self.sig_jitter),
            sig_inception_offset: Some(self.sig_inception_offset),
            denial: Some(self.denial),
            dnskey: Some(DnskeyConfig { dnskey_ttl: self.dnskey_ttl, dnskey_signature_rrs, keys }),
            soa: Some(self.soa),
            max_zone_ttl: self.max_zone_ttl,
            passthrough: self.passthrough,
            force_serial: None,
        }
        .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::Key;

    fn denial_nsec() -> DenialConfig {
        DenialConfig {
            nsec_type: NsecType::Nsec,
            nsec3_optout: false,
            nsec3_algo: 1,
            nsec3_iterations: 0,
            nsec3_salt: Bytes::new(),
            nsec3param_ttl: None,
        }
    }

    fn a_key() -> Key {
        Key {
            locator: "ksk1".to_string(),
            algorithm: 13,
            flags: 257,
            publish: true,
            ksk: true,
            zsk: false,
            resource_record_override: None,
        }
    }

    #[test]
    fn build_fails_without_keys_unless_passthrough() {
        let mut keys = KeyList::new();
        let err = SignConfBuilder {
            sig_resign_interval: Some(DurationSpec::from_secs(3600)),
            sig_refresh_interval: Some(DurationSpec::from_secs(3600)),
            sig_validity_default: Some(DurationSpec::from_secs(86400)),
            sig_validity_denial: Some(DurationSpec::from_secs(86400)),
            sig_jitter: Some(DurationSpec::from_secs(0)),
            sig_inception_offset: Some(DurationSpec::from_secs(3600)),
            denial: Some(denial_nsec()),
            dnskey: Some(DnskeyConfig { dnskey_ttl: 3600, dnskey_signature_rrs: None, keys: keys.clone() }),
            soa: Some(SoaConfig { soa_ttl: 3600, soa_min: 300, soa_serial: SoaSerialPolicy::Counter }),
            ..SignConfBuilder::new()
        }
        .build()
        .unwrap_err();
        assert!(err.contains("keys"));

        keys.insert(a_key());
        let conf = SignConfBuilder {
            sig_resign_interval: Some(DurationSpec::from_secs(3600)),
            sig_refresh_interval: Some(DurationSpec::from_secs(3600)),
            sig_validity_default: Some(DurationSpec::from_secs(86400)),
            sig_validity_denial: Some(DurationSpec::from_secs(86400)),
            sig_jitter: Some(DurationSpec::from_secs(0)),
            sig_inception_offset: Some(DurationSpec::from_secs(3600)),
            denial: Some(denial_nsec()),
            dnskey: Some(DnskeyConfig { dnskey_ttl: 3600, dnskey_signature_rrs: None, keys }),
            soa: Some(SoaConfig { soa_ttl: 3600, soa_min: 300, soa_serial: SoaSerialPolicy::Counter }),
            ..SignConfBuilder::new()
        }
        .build();
        assert!(conf.is_ok());
    }

    #[test]
    fn nsec3_rejects_non_sha1_algorithm() {
        let mut denial = denial_nsec();
        denial.nsec_type = NsecType::Nsec3;
        denial.nsec3_algo = 2;
        let mut keys = KeyList::new();
        keys.insert(a_key());
        let err = SignConfBuilder {
            sig_resign_interval: Some(DurationSpec::from_secs(3600)),
            sig_refresh_interval: Some(DurationSpec::from_secs(3600)),
            sig_validity_default: Some(DurationSpec::from_secs(86400)),
            sig_validity_denial: Some(DurationSpec::from_secs(86400)),
            sig_jitter: Some(DurationSpec::from_secs(0)),
            sig_inception_offset: Some(DurationSpec::from_secs(3600)),
            denial: Some(denial),
            dnskey: Some(DnskeyConfig { dnskey_ttl: 3600, dnskey_signature_rrs: None, keys }),
            soa: Some(SoaConfig { soa_ttl: 3600, soa_min: 300, soa_serial: SoaSerialPolicy::Counter }),
            ..SignConfBuilder::new()
        }
        .build()
        .unwrap_err();
        assert!(err.contains("nsec3_algo"));
    }

    #[test]
    fn compare_denial_classifies_changes() {
        let a = denial_nsec();
        let mut b = a.clone();
        assert_eq!(compare_denial(&a, &b, 300, 300), DenialChange::NoChange);

        b.nsec3param_ttl = Some(60);
        assert_eq!(compare_denial(&a, &b, 300, 300), DenialChange::ResignOnly);

        let mut c = a.clone();
        c.nsec_type = NsecType::Nsec3;
        assert_eq!(compare_denial(&a, &c, 300, 300), DenialChange::RebuildNsecChain);

        assert_eq!(compare_denial(&a, &a, 300, 600), DenialChange::RebuildNsecChain);
    }
}
