//! The optional "backup snapshot" accessor (spec.md §6): enough state for
//! outer code to persist and later restore a zone's signing state across
//! restarts, without this crate prescribing an on-disk format.
//!
//! The core persists nothing itself; [`BackupSnapshot`] is a plain,
//! serializable value built from primitive fields (not the crate's
//! internal `Name`/`Bytes`-backed types) so the caller is free to write it
//! out however it likes — text, binary, whatever fits its own storage
//! layer — without this crate prescribing the format, per spec.md §6's
//! "the core defines only the field list".

use serde::{Deserialize, Serialize};

use crate::name::Name;
use crate::namedb::NameDb;
use crate::rdata::Rdata;

/// The provenance of one signature, enough to decide reuse on the next
/// run without re-deriving it from the key set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignatureRecord {
    pub owner: String,
    pub covered_type: u16,
    pub algorithm: u8,
    pub key_tag: u16,
    pub key_locator: String,
    pub key_flags: u16,
    pub inception: u32,
    pub expiration: u32,
}

/// Echo of the last published NSEC3PARAM, if any. `None` in NSEC mode.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Nsec3ParamEcho {
    pub hash_algorithm: u8,
    pub iterations: u16,
    pub salt: Vec<u8>,
}

/// A point-in-time snapshot of everything a restarted process needs to
/// resume signing a zone without regenerating valid signatures or losing
/// the NSEC3 parameters it last published.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackupSnapshot {
    pub apex: String,
    pub inbound_serial: Option<u32>,
    pub internal_serial: Option<u32>,
    pub outbound_serial: Option<u32>,
    pub nsec3param: Option<Nsec3ParamEcho>,
    pub signatures: Vec<SignatureRecord>,
}

impl BackupSnapshot {
    pub fn apex_name(&self) -> Result<Name, crate::name::NameParseError> {
        Name::parse(&self.apex)
    }
}

/// Build a [`BackupSnapshot`] from the currently committed state of `db`.
pub fn snapshot(db: &NameDb) -> BackupSnapshot {
    let mut signatures = Vec::new();
    for (name, domain) in db.all_domains() {
        for rrset in domain.rrsets() {
            for sig in &rrset.rrsigs {
                signatures.push(SignatureRecord {
                    owner: name.to_string(),
                    covered_type: rrset.rtype.value(),
                    algorithm: sig.algorithm,
                    key_tag: sig.key_tag,
                    key_locator: sig.key_locator.clone(),
                    key_flags: sig.key_flags,
                    inception: sig.inception,
                    expiration: sig.expiration,
                });
            }
        }
    }
    for (hash_name, denial) in db.all_denials() {
        for sig in &denial.rrset.rrsigs {
            signatures.push(SignatureRecord {
                owner: hash_name.to_string(),
                covered_type: denial.rrset.rtype.value(),
                algorithm: sig.algorithm,
                key_tag: sig.key_tag,
                key_locator: sig.key_locator.clone(),
                key_flags: sig.key_flags,
                inception: sig.inception,
                expiration: sig.expiration,
            });
        }
    }

    let nsec3param = db.lookup_apex().rrset(crate::rdata::Rtype::NSEC3PARAM).and_then(|rrset| rrset.rrs().next()).and_then(
        |rdata| match rdata {
            Rdata::Nsec3Param { hash_algorithm, iterations, salt, .. } => {
                Some(Nsec3ParamEcho { hash_algorithm: *hash_algorithm, iterations: *iterations, salt: salt.to_vec() })
            }
            _ => None,
        },
    );

    BackupSnapshot {
        apex: db.apex.to_string(),
        inbound_serial: db.serial.inbound,
        internal_serial: db.serial.internal,
        outbound_serial: db.serial.outbound,
        nsec3param,
        signatures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdata::Class;
    use std::net::Ipv4Addr;

    #[test]
    fn snapshot_captures_serial_and_apex() {
        let mut db = NameDb::new(Name::parse("example.").unwrap());
        let mut view = db.open_view();
        view.lookup_apex_mut().insert_rr(Class::IN, 300, Rdata::A(Ipv4Addr::new(10, 0, 0, 1)));
        view.serial.inbound = Some(2024010100);
        view.serial.outbound = Some(2024010101);
        view.commit(&mut db);

        let snap = snapshot(&db);
        assert_eq!(snap.apex, "example.");
        assert_eq!(snap.outbound_serial, Some(2024010101));
        assert!(snap.apex_name().is_ok());
    }
}
