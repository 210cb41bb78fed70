//! The denial-of-existence chain builder (component E): NSEC and NSEC3
//! chain construction, opt-out handling, and type-bitmap assembly.

use bytes::Bytes;

use crate::error::ZoneError;
use crate::name::Name;
use crate::namedb::{Denial, View};
use crate::nsec3;
use crate::rdata::{Class, Rdata, Rrset, Rtype, TypeBitmap};
use crate::signconf::{DenialConfig, NsecType};

/// The type bitmap for one denial node: the owner's own rrset types,
/// union `{RRSIG, NSEC|NSEC3}` (spec.md §4.E "Common"). ENTs contribute no
/// owner-types, but still publish the NSEC/NSEC3 bit, since their denial
/// rrset is itself signed.
fn bitmap_for(domain_types: impl Iterator<Item = Rtype>, denial_type: Rtype) -> TypeBitmap {
    let mut types: Vec<Rtype> = domain_types.collect();
    types.push(Rtype::RRSIG);
    types.push(denial_type);
    TypeBitmap::from_types(types)
}

/// Whether `name` is an "unsigned delegation": has NS but no DS, and is
/// not the apex. The third NSEC3-opt-out condition in spec.md §4.E
/// ("are not ancestors of any signed name") is folded into
/// [`compute_inclusion`]'s bottom-up pass.
fn is_unsigned_delegation(view: &View, name: &Name) -> bool {
    let Some(domain) = view.lookup_name(name) else { return false };
    !domain.is_apex && domain.rrset(Rtype::NS).is_some() && domain.rrset(Rtype::DS).is_none()
}

/// Decide, for every name currently in `view`'s authoritative map, whether
/// it participates in the denial chain.
///
/// Relies on the canonical-order property that a name's full descendant
/// set forms a contiguous range immediately following it: processing in
/// reverse canonical order guarantees every descendant's inclusion is
/// already decided by the time its ancestor is examined.
fn compute_inclusion(view: &View, optout: bool) -> Vec<(Name, bool)> {
    let mut decided: Vec<(Name, bool)> = Vec::with_capacity(view.domain_count());

    for (name, domain) in view.all_domains().rev() {
        let included = if domain.is_apex {
            true
        } else if !domain.is_ent() {
            if optout && is_unsigned_delegation(view, name) {
                has_included_descendant(name, &decided)
            } else {
                true
            }
        } else if optout {
            has_included_descendant(name, &decided)
        } else {
            true
        };
        decided.push((name.clone(), included));
    }

    decided
}

fn has_included_descendant(owner: &Name, decided_so_far: &[(Name, bool)]) -> bool {
    decided_so_far.iter().any(|(name, included)| *included && name != owner && name.is_subdomain_of(owner))
}

/// Rebuild the entire NSEC chain from scratch (spec.md §4.E "NSEC mode").
/// Opt-out never applies to plain NSEC.
pub fn rebuild_nsec(view: &mut View, soa_min: u32) -> Result<(), ZoneError> {
    view.clear_denials();

    let inclusion = compute_inclusion(view, false);
    let owners: Vec<Name> = inclusion.into_iter().filter(|(_, inc)| *inc).map(|(name, _)| name).collect();
    let n = owners.len();

    for (i, owner) in owners.iter().enumerate() {
        let next = &owners[(i + 1) % n.max(1)];
        let domain = view.lookup_name(owner).expect("owner came from this view's domain map");
        let types = bitmap_for(domain.types(), Rtype::NSEC);
        let mut rrset = Rrset::new(Rtype::NSEC, Class::IN, soa_min);
        rrset.insert(Rdata::Nsec { next_owner: next.clone(), types });
        view.insert_denial(Denial { hash_name: owner.clone(), origin: owner.clone(), rrset, changed: true });
    }

    for owner in &owners {
        if let Some(domain) = view.lookup_name_mut(owner) {
            domain.denial_ref = Some(owner.clone());
        }
    }
    Ok(())
}

/// Rebuild the entire NSEC3 chain from scratch, including the apex
/// NSEC3PARAM rrset (spec.md §4.E "NSEC3 mode").
pub fn rebuild_nsec3(view: &mut View, apex: &Name, denial: &DenialConfig, soa_min: u32) -> Result<(), ZoneError> {
    debug_assert_eq!(denial.nsec_type, NsecType::Nsec3);
    view.clear_denials();

    let inclusion = compute_inclusion(view, denial.nsec3_optout);
    let owners: Vec<Name> = inclusion.into_iter().filter(|(_, inc)| *inc).map(|(name, _)| name).collect();

    // Hash every included owner, keeping the raw digest alongside the
    // encoded hashed-owner name so the chain's next-pointers can be built
    // from the digest bytes directly (no base32hex decoding needed).
    let mut hashed: Vec<(Bytes, Name, Name)> = Vec::with_capacity(owners.len());
    for owner in &owners {
        let digest = nsec3::hash_owner(owner, &denial.nsec3_salt, denial.nsec3_iterations);
        let label = nsec3::base32hex_encode(&digest);
        let hash_name = Name::prepend_label(label.as_bytes(), apex).expect("a SHA-1 digest fits in one label");
        if let Some((_, existing, _)) = hashed.iter().find(|(d, _, _)| *d == digest) {
            return Err(ZoneError::HashCollision { hash_name, first: existing.clone(), second: owner.clone() });
        }
        hashed.push((digest, hash_name, owner.clone()));
    }
    hashed.sort_by(|a, b| a.0.cmp(&b.0));

    let n = hashed.len();
    for (i, (_, hash_name, owner)) in hashed.iter().enumerate() {
        let (next_digest, _, _) = &hashed[(i + 1) % n.max(1)];
        let domain = view.lookup_name(owner).expect("owner came from this view's domain map");
        let optout_flag = denial.nsec3_optout && is_unsigned_delegation(view, owner);
        let types = bitmap_for(domain.types(), Rtype::NSEC3);
        let mut rrset = Rrset::new(Rtype::NSEC3, Class::IN, soa_min);
        rrset.insert(Rdata::Nsec3 {
            hash_algorithm: denial.nsec3_algo,
            flags: if optout_flag { 1 } else { 0 },
            iterations: denial.nsec3_iterations,
            salt: denial.nsec3_salt.clone(),
            next_hashed_owner: next_digest.clone(),
            types,
        });
        view.insert_denial(Denial { hash_name: hash_name.clone(), origin: owner.clone(), rrset, changed: true });
    }

    for (_, hash_name, owner) in &hashed {
        if let Some(domain) = view.lookup_name_mut(owner) {
            domain.denial_ref = Some(hash_name.clone());
        }
    }

    // NSEC3PARAM at the apex. The wire flags field is always zero; opt-out
    // is carried only on individual NSEC3 RRs (spec.md §4.E note).
    let ttl = denial.nsec3param_ttl.unwrap_or(soa_min);
    let mut param_rrset = Rrset::new(Rtype::NSEC3PARAM, Class::IN, ttl);
    param_rrset.insert(Rdata::Nsec3Param {
        hash_algorithm: denial.nsec3_algo,
        flags: 0,
        iterations: denial.nsec3_iterations,
        salt: denial.nsec3_salt.clone(),
    });
    let apex_domain = view.lookup_apex_mut();
    if let Some(old) = apex_domain.rrset(Rtype::NSEC3PARAM).cloned() {
        for rdata in old.rrs() {
            apex_domain.remove_rr(rdata);
        }
    }
    for rdata in param_rrset.rrs() {
        apex_domain.insert_rr(Class::IN, ttl, rdata.clone());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namedb::NameDb;
    use bytes::Bytes;

    fn apex() -> Name {
        Name::parse("example.").unwrap()
    }

    fn setup_three_names() -> NameDb {
        let mut db = NameDb::new(apex());
        let mut view = db.open_view();
        view.lookup_apex_mut().insert_rr(Class::IN, 300, Rdata::Ns(Name::parse("ns1.example.").unwrap()));
        for label in ["a", "b", "c"] {
            let name = Name::parse(&format!("{label}.example.")).unwrap();
            view.add_name(name.clone(), false, Some(apex())).insert_rr(
                Class::IN,
                300,
                Rdata::A(std::net::Ipv4Addr::new(10, 0, 0, 1)),
            );
        }
        view.commit(&mut db);
        db
    }

    #[test]
    fn nsec_chain_wraps_and_covers_every_owner() {
        let db = setup_three_names();
        let mut view = db.open_view();
        rebuild_nsec(&mut view, 300).unwrap();
        assert_eq!(view.denial_count(), 4); // apex + a, b, c

        let mut current = apex();
        for _ in 0..4 {
            let node = view.denial(&current).unwrap();
            let Rdata::Nsec { next_owner, .. } = node.rrset.rrs().next().unwrap() else { panic!() };
            current = next_owner.clone();
        }
        assert_eq!(current, apex());
    }

    #[test]
    fn nsec3_chain_has_one_node_per_owner_and_wraps() {
        let db = setup_three_names();
        let mut view = db.open_view();
        let denial = DenialConfig {
            nsec_type: NsecType::Nsec3,
            nsec3_optout: false,
            nsec3_algo: 1,
            nsec3_iterations: 1,
            nsec3_salt: Bytes::new(),
            nsec3param_ttl: None,
        };
        rebuild_nsec3(&mut view, &apex(), &denial, 300).unwrap();
        assert_eq!(view.denial_count(), 4);
        assert!(view.lookup_apex().rrset(Rtype::NSEC3PARAM).is_some());

        let start = view.first_denials().next().unwrap().0.clone();
        let mut current = start.clone();
        for _ in 0..4 {
            let node = view.denial(&current).unwrap();
            let Rdata::Nsec3 { next_hashed_owner, .. } = node.rrset.rrs().next().unwrap() else { panic!() };
            assert_eq!(next_hashed_owner.len(), 20);
            current = view
                .first_denials()
                .find(|(_, d)| {
                    let Rdata::Nsec3 { hash_algorithm, iterations, salt, .. } = d.rrset.rrs().next().unwrap() else {
                        return false;
                    };
                    nsec3::hash_owner(&d.origin, salt, *iterations) == *next_hashed_owner
                        && *hash_algorithm == denial.nsec3_algo
                })
                .map(|(h, _)| h.clone())
                .unwrap();
        }
        assert_eq!(current, start);
    }

    #[test]
    fn optout_excludes_unsigned_delegation() {
        let mut db = NameDb::new(apex());
        let mut view = db.open_view();
        view.lookup_apex_mut().insert_rr(Class::IN, 300, Rdata::Ns(Name::parse("ns1.example.").unwrap()));
        let signed = Name::parse("a.example.").unwrap();
        view.add_name(signed.clone(), false, Some(apex())).insert_rr(
            Class::IN,
            300,
            Rdata::A(std::net::Ipv4Addr::new(10, 0, 0, 1)),
        );
        let unsigned = Name::parse("b.example.").unwrap();
        view.add_name(unsigned.clone(), false, Some(apex()))
            .insert_rr(Class::IN, 300, Rdata::Ns(Name::parse("ns1.b.example.").unwrap()));
        view.commit(&mut db);

        let mut view = db.open_view();
        let denial = DenialConfig {
            nsec_type: NsecType::Nsec3,
            nsec3_optout: true,
            nsec3_algo: 1,
            nsec3_iterations: 0,
            nsec3_salt: Bytes::new(),
            nsec3param_ttl: None,
        };
        rebuild_nsec3(&mut view, &apex(), &denial, 300).unwrap();
        // apex + a only; b is an unsigned delegation and is excluded.
        assert_eq!(view.denial_count(), 2);
    }
}
