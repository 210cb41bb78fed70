//! The zone orchestrator (component G): the one entry point that takes a
//! diff, a validated [`SignConf`] and a committed [`NameDb`], and produces
//! a newly signed, committed database plus the RRs an [`OutputAdapter`]
//! should write out.
//!
//! Pipeline, per spec.md §4.G:
//! 1. apply the diff (soft errors counted, hard errors abort)
//! 2. entize (synthesize missing ancestor domains) and prune dead ENTs
//! 3. rebuild or leave the denial chain, depending on what changed
//! 4. compute the outbound SOA serial
//! 5. refresh RRSIGs over every authoritative and denial rrset
//! 6. commit the view and hand the result to the output adapter

use rayon::prelude::*;
use tracing::{debug, info, trace, warn};

use crate::adapters::{CancelSignal, DiffOp, InputAdapter, OutputAdapter, SoaClock};
use crate::denial;
use crate::error::ZoneError;
use crate::name::Name;
use crate::namedb::{NameDb, View};
use crate::oracle::SigningOracle;
use crate::rdata::{Class, Rdata, Rtype};
use crate::rrsig::{self, JitterSource, RrsigPolicy, Signature, SignableRrset};
use crate::signconf::{DenialConfig, NsecType, SignConf};

//----------- DiffStats ---------------------------------------------------------------

/// Counters for the soft conditions [`apply_diff`] encounters, returned to
/// the caller alongside the (possibly failed) run result.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DiffStats {
    pub added: u64,
    pub removed: u64,
    pub out_of_zone: u64,
    pub duplicate: u64,
}

//----------- apply_diff --------------------------------------------------------------

/// Apply `input`'s operations to `view`, in place.
///
/// NSEC/NSEC3/NSEC3PARAM/RRSIG RRs are core-owned output and are dropped
/// silently without affecting `stats` (spec.md §4.G step 1); everything
/// else out of zone is a counted, skipped [`crate::error::SoftError`], and
/// a CNAME-coexistence violation aborts the whole run.
fn apply_diff(view: &mut View, apex: &Name, input: &mut dyn InputAdapter, stats: &mut DiffStats) -> Result<(), ZoneError> {
    while let Some(op) = input.next_op() {
        let rr = match &op {
            DiffOp::Add(rr) | DiffOp::Remove(rr) => rr,
        };

        if matches!(rr.rtype(), Rtype::NSEC | Rtype::NSEC3 | Rtype::NSEC3PARAM | Rtype::RRSIG) {
            trace!(owner = %rr.owner, rtype = ?rr.rtype(), "dropping core-owned input record");
            continue;
        }

        if !rr.owner.is_subdomain_of(apex) {
            stats.out_of_zone += 1;
            warn!(owner = %rr.owner, "rejecting out-of-zone record");
            continue;
        }

        match op {
            DiffOp::Add(rr) => {
                let is_apex = rr.owner == *apex;
                let parent = if is_apex { None } else { Some(rr.owner.chop().unwrap_or_else(|| apex.clone())) };
                if let Rdata::Soa { serial, .. } = &rr.rdata {
                    // A zone carries exactly one SOA; an Add replaces it
                    // outright instead of accumulating alongside whatever
                    // serial this run's own SOA-bump previously published,
                    // so `compute_and_store_serial`'s reading of "the
                    // inbound SOA" stays unambiguous from run to run.
                    let unchanged = view.serial.inbound == Some(*serial);
                    let domain = view.add_name(rr.owner.clone(), is_apex, parent);
                    if let Some(old) = domain.rrset(Rtype::SOA).cloned() {
                        for rdata in old.rrs() {
                            domain.remove_rr(rdata);
                        }
                    }
                    domain.insert_rr(rr.class, rr.ttl, rr.rdata.clone());
                    if unchanged {
                        stats.duplicate += 1;
                    } else {
                        stats.added += 1;
                    }
                } else {
                    let domain = view.add_name(rr.owner.clone(), is_apex, parent);
                    check_cname_coexistence(domain, rr.rtype(), &rr.owner)?;
                    if domain.insert_rr(rr.class, rr.ttl, rr.rdata.clone()) {
                        stats.added += 1;
                    } else {
                        stats.duplicate += 1;
                    }
                }
            }
            DiffOp::Remove(rr) => {
                let removed = view.lookup_name_mut(&rr.owner).map(|d| d.remove_rr(&rr.rdata)).unwrap_or(false);
                if removed {
                    stats.removed += 1;
                } else {
                    stats.duplicate += 1;
                }
            }
        }
    }
    Ok(())
}

/// CNAME coexistence (spec.md §3): at most one CNAME rrset per owner, and
/// if present, no other authoritative type may share that owner.
fn check_cname_coexistence(domain: &crate::namedb::Domain, new_rtype: Rtype, owner: &Name) -> Result<(), ZoneError> {
    if new_rtype == Rtype::CNAME {
        if let Some(other) = domain.rrsets().map(|r| r.rtype).find(|t| *t != Rtype::CNAME) {
            return Err(ZoneError::CnameCoexistence { owner: owner.clone(), other });
        }
    } else if domain.rrset(Rtype::CNAME).is_some() {
        return Err(ZoneError::CnameCoexistence { owner: owner.clone(), other: new_rtype });
    }
    Ok(())
}

//----------- Entization ----------------------------------------------------------------

/// Synthesize any missing ancestor domains between every current owner and
/// the apex (spec.md §4.G step 2).
fn entize(view: &mut View, apex: &Name) {
    let owners: Vec<Name> = view.all_domains().map(|(n, _)| n.clone()).collect();
    for owner in owners {
        if owner == *apex {
            continue;
        }
        let mut current = owner.chop().unwrap_or_else(|| apex.clone());
        while view.lookup_name(&current).is_none() {
            let at_apex = current == *apex;
            let parent = if at_apex { None } else { Some(current.chop().unwrap_or_else(|| apex.clone())) };
            view.add_name(current.clone(), at_apex, parent.clone());
            match parent {
                Some(p) => current = p,
                None => break,
            }
        }
    }
}

/// Remove empty non-terminals that have no remaining descendant, repeating
/// until nothing more can be dropped (a diff can orphan a whole chain of
/// ENTs at once).
fn prune_empty_nonterminals(view: &mut View, apex: &Name) {
    loop {
        let owners: Vec<Name> = view.all_domains().map(|(n, _)| n.clone()).collect();
        let to_remove: Vec<Name> = owners
            .iter()
            .filter(|name| *name != apex)
            .filter(|name| view.lookup_name(name).is_some_and(|d| d.is_ent()))
            .filter(|name| !owners.iter().any(|other| other != *name && other.is_subdomain_of(name)))
            .cloned()
            .collect();
        if to_remove.is_empty() {
            break;
        }
        for name in &to_remove {
            view.remove_name(name);
        }
    }
}

//----------- SOA serial ----------------------------------------------------------------

fn compute_and_store_serial(view: &mut View, apex: &Name, conf: &SignConf, clock: &dyn SoaClock) -> Result<(), ZoneError> {
    let Some(Rdata::Soa { mname, rname, serial: inbound, refresh, retry, expire, .. }) =
        view.lookup_apex().rrset(Rtype::SOA).and_then(|r| r.rrs().next()).cloned()
    else {
        return Ok(());
    };

    view.serial.inbound = Some(inbound);
    let outbound = match conf.force_serial {
        Some(forced) => forced,
        None => crate::serial::compute_serial(
            apex,
            conf.soa.soa_serial,
            inbound,
            view.serial.outbound,
            clock.now_seconds(),
            clock.today_yyyymmdd(),
        )?,
    };
    view.serial.outbound = Some(outbound);
    view.serial.internal = Some(outbound);

    let apex_domain = view.lookup_apex_mut();
    if let Some(old) = apex_domain.rrset(Rtype::SOA).cloned() {
        for rdata in old.rrs() {
            apex_domain.remove_rr(rdata);
        }
    }
    apex_domain.insert_rr(
        Class::IN,
        conf.soa.soa_ttl,
        Rdata::Soa { mname, rname, serial: outbound, refresh, retry, expire, minimum: conf.soa.soa_min },
    );
    Ok(())
}

//----------- RRSIG generation -----------------------------------------------------------

/// One rrset's worth of work for the signing fan-out: enough to rebuild its
/// canonical signing input and to look up carried-over signatures.
struct SignJob {
    owner: Name,
    rtype: Rtype,
    class: Class,
    ttl: u32,
    rrs: Vec<Rdata>,
    existing: Vec<Signature>,
    is_denial: bool,
}

fn sync_dnskey_rrset(view: &mut View, conf: &SignConf, oracle: &dyn SigningOracle) -> Result<(), ZoneError> {
    let mut rdatas = Vec::new();
    for key in conf.dnskey.keys.published() {
        let rdata =
            key.dnskey_rdata(oracle).map_err(|e| oracle_err_to_zone_err(&key.locator, e))?;
        rdatas.push(rdata);
    }
    let apex_domain = view.lookup_apex_mut();
    if let Some(old) = apex_domain.rrset(Rtype::DNSKEY).cloned() {
        for rdata in old.rrs() {
            apex_domain.remove_rr(rdata);
        }
    }
    for rdata in rdatas {
        apex_domain.insert_rr(Class::IN, conf.dnskey.dnskey_ttl, rdata);
    }
    Ok(())
}

/// Build a [`Signature`] from a literal override RDATA (the
/// `dnskey_signature_rrs` escape hatch), carrying no oracle-derived
/// provenance of its own.
fn signature_from_literal(rdata: &Rdata) -> Option<Signature> {
    match rdata {
        Rdata::Rrsig { type_covered, algorithm, labels, original_ttl, expiration, inception, key_tag, signer_name, signature } => {
            Some(Signature {
                covered_type: *type_covered,
                algorithm: *algorithm,
                labels: *labels,
                original_ttl: *original_ttl,
                inception: *inception,
                expiration: *expiration,
                key_tag: *key_tag,
                signer_name: signer_name.clone(),
                signature: signature.clone(),
                key_locator: "literal".to_string(),
                key_flags: 0,
            })
        }
        _ => None,
    }
}

fn oracle_err_to_zone_err(context: &str, e: crate::error::OracleError) -> ZoneError {
    match e {
        crate::error::OracleError::NoSuchKey => ZoneError::NoSuchKey { locator: context.to_string() },
        crate::error::OracleError::OracleUnavailable(reason) => {
            ZoneError::OracleUnavailable { locator: context.to_string(), reason }
        }
        crate::error::OracleError::SignatureRejected(reason) => {
            ZoneError::SignatureRejected { locator: context.to_string(), reason }
        }
    }
}

/// Refresh every authoritative and denial rrset's RRSIGs. Existing
/// signatures are looked up from `old` (the database as it stood before
/// this run began) so reuse works even across a full denial-chain rebuild:
/// the rebuilt NSEC/NSEC3 content is deterministic, so an unchanged zone
/// produces byte-identical denial RRs and the signatures over them are
/// found and reused exactly as for any other rrset.
fn sign_all(
    view: &mut View,
    old: &NameDb,
    apex: &Name,
    conf: &SignConf,
    oracle: &dyn SigningOracle,
    clock: &dyn SoaClock,
    jitter: &dyn JitterSource,
) -> Result<(), ZoneError> {
    sync_dnskey_rrset(view, conf, oracle)?;

    let mut jobs = Vec::new();
    let owners: Vec<Name> = view.all_domains().map(|(n, _)| n.clone()).collect();
    for owner in &owners {
        let domain = view.lookup_name(owner).expect("owner came from this view");
        for rrset in domain.rrsets() {
            if rrset.rtype == Rtype::DNSKEY && conf.dnskey.dnskey_signature_rrs.is_some() {
                continue;
            }
            let old_rrset = old.lookup_name(owner).and_then(|d| d.rrset(rrset.rtype));
            let unchanged = old_rrset.is_some_and(|r| r.class == rrset.class && r.ttl == rrset.ttl && r.rrs().eq(rrset.rrs()));
            let existing = if unchanged { old_rrset.map(|r| r.rrsigs.clone()).unwrap_or_default() } else { Vec::new() };
            jobs.push(SignJob {
                owner: owner.clone(),
                rtype: rrset.rtype,
                class: rrset.class,
                ttl: rrset.ttl,
                rrs: rrset.rrs().cloned().collect(),
                existing,
                is_denial: false,
            });
        }
    }

    let hash_names: Vec<Name> = view.first_denials().map(|(h, _)| h.clone()).collect();
    for hash_name in &hash_names {
        let node = view.denial(hash_name).expect("hash_name came from this view");
        let old_node = old.all_denials().find(|(h, _)| *h == hash_name).map(|(_, d)| d);
        let unchanged = old_node.is_some_and(|d| {
            d.rrset.class == node.rrset.class && d.rrset.ttl == node.rrset.ttl && d.rrset.rrs().eq(node.rrset.rrs())
        });
        let existing = if unchanged { old_node.map(|d| d.rrset.rrsigs.clone()).unwrap_or_default() } else { Vec::new() };
        jobs.push(SignJob {
            owner: hash_name.clone(),
            rtype: node.rrset.rtype,
            class: node.rrset.class,
            ttl: node.rrset.ttl,
            rrs: node.rrset.rrs().cloned().collect(),
            existing,
            is_denial: true,
        });
    }

    debug!(job_count = jobs.len(), "refreshing signatures");

    let now = clock.now_seconds() as u32;
    let policy = RrsigPolicy {
        now,
        sig_refresh_interval: conf.sig_refresh_interval.0,
        sig_inception_offset: conf.sig_inception_offset.0,
        sig_jitter: conf.sig_jitter.0 as i64,
        sig_validity_default: conf.sig_validity_default.0,
        sig_validity_denial: conf.sig_validity_denial.0,
        sig_validity_keyset: conf.sig_validity_keyset.map(|d| d.0),
        jitter_source: jitter,
    };

    let results: Vec<Result<(Name, Rtype, bool, Vec<Signature>), ZoneError>> = jobs
        .par_iter()
        .map(|job| {
            let signable = SignableRrset { owner: &job.owner, rtype: job.rtype, class: job.class, ttl: job.ttl, rrs: &job.rrs };
            let signers = rrsig::signers_for(job.rtype, &conf.dnskey.keys);
            let sigs = rrsig::refresh_rrset(apex, &signable, &job.existing, &signers, &policy, oracle)
                .map_err(|e| oracle_err_to_zone_err(&job.owner.to_string(), e))?;
            Ok((job.owner.clone(), job.rtype, job.is_denial, sigs))
        })
        .collect();

    for result in results {
        let (owner, rtype, is_denial, sigs) = result?;
        if is_denial {
            if let Some(node) = view.denial_mut(&owner) {
                node.rrset.rrsigs = sigs;
            }
        } else if let Some(domain) = view.lookup_name_mut(&owner) {
            domain.set_rrsigs(rtype, sigs);
        }
    }

    if let Some(literal) = &conf.dnskey.dnskey_signature_rrs {
        let sigs: Vec<Signature> = literal.iter().filter_map(signature_from_literal).collect();
        view.lookup_apex_mut().set_rrsigs(Rtype::DNSKEY, sigs);
    }

    Ok(())
}

//----------- Output --------------------------------------------------------------------

/// Emit `view`'s authoritative and denial rrsets to `output`, in the
/// canonical order of spec.md §6: apex first (SOA, then the rest), then
/// every other authoritative owner in ascending canonical order
/// (CNAME-exclusive where present), and each owner's denial rrset
/// immediately following its authoritative data.
fn emit_zone(view: &View, output: &mut dyn OutputAdapter) {
    for (owner, domain) in view.all_domains() {
        if domain.is_ent() && domain.denial_ref.is_none() {
            continue;
        }
        if let Some(soa) = domain.rrset(Rtype::SOA) {
            output.emit(owner, soa);
        }
        if let Some(cname) = domain.rrset(Rtype::CNAME) {
            output.emit(owner, cname);
        } else {
            for rrset in domain.rrsets() {
                if rrset.rtype == Rtype::SOA {
                    continue;
                }
                output.emit(owner, rrset);
            }
        }
        if let Some(hash_name) = &domain.denial_ref {
            if let Some(node) = view.denial(hash_name) {
                output.emit(hash_name, &node.rrset);
            }
        }
    }
    output.finish();
}

//----------- ZoneRunner -----------------------------------------------------------------

/// Orchestrates one zone's diff-apply-and-sign cycle, remembering just
/// enough state between runs (the previous denial configuration) to
/// classify what a reconfiguration invalidates.
pub struct ZoneRunner {
    pub apex: Name,
    last_denial: Option<(DenialConfig, u32)>,
}

impl ZoneRunner {
    pub fn new(apex: Name) -> ZoneRunner {
        ZoneRunner { apex, last_denial: None }
    }

    /// Run one full diff-apply-and-sign cycle against `db`, committing the
    /// result in place on success. On error, `db` is left untouched.
    #[allow(clippy::too_many_arguments)]
    pub fn run(
        &mut self,
        db: &mut NameDb,
        conf: &SignConf,
        input: &mut dyn InputAdapter,
        oracle: &dyn SigningOracle,
        clock: &dyn SoaClock,
        jitter: &dyn JitterSource,
        cancel: &dyn CancelSignal,
        output: &mut dyn OutputAdapter,
    ) -> Result<DiffStats, ZoneError> {
        info!(apex = %self.apex, passthrough = conf.passthrough, "starting zone run");
        let old = db.clone();
        let mut view = db.open_view();
        let mut stats = DiffStats::default();

        apply_diff(&mut view, &self.apex, input, &mut stats)?;
        debug!(added = stats.added, removed = stats.removed, out_of_zone = stats.out_of_zone, duplicate = stats.duplicate, "diff applied");
        if cancel.is_cancelled() {
            return Err(ZoneError::Cancelled);
        }

        if conf.passthrough {
            compute_and_store_serial(&mut view, &self.apex, conf, clock)?;
            emit_zone(&view, output);
            view.commit(db);
            info!(apex = %self.apex, "zone run complete (passthrough)");
            return Ok(stats);
        }

        entize(&mut view, &self.apex);
        prune_empty_nonterminals(&mut view, &self.apex);
        if cancel.is_cancelled() {
            return Err(ZoneError::Cancelled);
        }

        // The full-rebuild-every-run simplification documented in DESIGN.md:
        // rebuild_nsec{,3} is deterministic in its inputs, so an unchanged
        // zone reproduces byte-identical denial RRs regardless of whether
        // compare_denial would have called for NoChange or ResignOnly.
        let _change = match &self.last_denial {
            Some((old_denial, old_soa_min)) => {
                crate::signconf::compare_denial(old_denial, &conf.denial, *old_soa_min, conf.soa.soa_min)
            }
            None => crate::signconf::DenialChange::RebuildNsecChain,
        };
        match conf.denial.nsec_type {
            NsecType::Nsec => denial::rebuild_nsec(&mut view, conf.soa.soa_min)?,
            NsecType::Nsec3 => denial::rebuild_nsec3(&mut view, &self.apex, &conf.denial, conf.soa.soa_min)?,
        }
        debug!(denial_nodes = view.denial_count(), "denial chain rebuilt");

        compute_and_store_serial(&mut view, &self.apex, conf, clock)?;
        if cancel.is_cancelled() {
            return Err(ZoneError::Cancelled);
        }

        sign_all(&mut view, &old, &self.apex, conf, oracle, clock, jitter)?;

        emit_zone(&view, output);
        let outbound_serial = view.serial.outbound;
        view.commit(db);
        self.last_denial = Some((conf.denial.clone(), conf.soa.soa_min));

        info!(apex = %self.apex, outbound_serial = ?outbound_serial, "zone run complete");
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::NeverCancel;
    use crate::keys::{Key, KeyList};
    use crate::rdata::{Rr, Rrset};
    use crate::signconf::{DnskeyConfig, SignConfBuilder, SoaConfig, SoaSerialPolicy};
    use crate::testutil::{FakeOracle, FixedClock};
    use std::net::Ipv4Addr;

    struct VecInput(std::vec::IntoIter<DiffOp>);

    impl VecInput {
        fn new(ops: Vec<DiffOp>) -> VecInput {
            VecInput(ops.into_iter())
        }
    }

    impl InputAdapter for VecInput {
        fn next_op(&mut self) -> Option<DiffOp> {
            self.0.next()
        }
    }

    #[derive(Default)]
    struct VecOutput {
        owners: Vec<Name>,
    }

    impl OutputAdapter for VecOutput {
        fn emit(&mut self, owner: &Name, _rrset: &Rrset) {
            self.owners.push(owner.clone());
        }
    }

    fn apex() -> Name {
        Name::parse("example.").unwrap()
    }

    fn test_conf() -> SignConf {
        let mut keys = KeyList::new();
        keys.insert(Key {
            locator: "ksk1".to_string(),
            algorithm: 13,
            flags: 257,
            publish: true,
            ksk: true,
            zsk: false,
            resource_record_override: None,
        });
        keys.insert(Key {
            locator: "zsk1".to_string(),
            algorithm: 13,
            flags: 256,
            publish: true,
            ksk: false,
            zsk: true,
            resource_record_override: None,
        });

        SignConfBuilder {
            sig_resign_interval: Some(crate::duration::DurationSpec(3600)),
            sig_refresh_interval: Some(crate::duration::DurationSpec(3600)),
            sig_validity_default: Some(crate::duration::DurationSpec(86400)),
            sig_validity_denial: Some(crate::duration::DurationSpec(86400)),
            sig_jitter: Some(crate::duration::DurationSpec(0)),
            sig_inception_offset: Some(crate::duration::DurationSpec(3600)),
            denial: Some(DenialConfig {
                nsec_type: NsecType::Nsec,
                nsec3_optout: false,
                nsec3_algo: 1,
                nsec3_iterations: 0,
                nsec3_salt: bytes::Bytes::new(),
                nsec3param_ttl: None,
            }),
            dnskey: Some(DnskeyConfig { dnskey_ttl: 3600, dnskey_signature_rrs: None, keys }),
            soa: Some(SoaConfig { soa_ttl: 3600, soa_min: 300, soa_serial: SoaSerialPolicy::Counter }),
            ..SignConfBuilder::new()
        }
        .build()
        .unwrap()
    }

    fn soa_add() -> DiffOp {
        DiffOp::Add(Rr::new(
            apex(),
            Class::IN,
            3600,
            Rdata::Soa {
                mname: Name::parse("ns1.example.").unwrap(),
                rname: Name::parse("hostmaster.example.").unwrap(),
                serial: 2024010100,
                refresh: 3600,
                retry: 600,
                expire: 1209600,
                minimum: 300,
            },
        ))
    }

    #[test]
    fn empty_zone_run_signs_soa_ns_and_dnskey() {
        let mut db = NameDb::new(apex());
        let mut runner = ZoneRunner::new(apex());
        let conf = test_conf();
        let ops = vec![soa_add(), DiffOp::Add(Rr::new(apex(), Class::IN, 3600, Rdata::Ns(Name::parse("ns1.example.").unwrap())))];
        let mut input = VecInput::new(ops);
        let oracle = FakeOracle::new();
        let clock = FixedClock::new(2024010100, 20240101);
        let mut output = VecOutput::default();

        let stats =
            runner.run(&mut db, &conf, &mut input, &oracle, &clock, &rrsig::DeterministicJitter, &NeverCancel, &mut output).unwrap();
        assert_eq!(stats.added, 2);
        // spec.md §8 scenario 1: counter policy increments even on the
        // zone's first signed run.
        assert_eq!(db.serial.outbound, Some(2024010101));
        assert_eq!(db.denial_count(), 1);

        let apex_domain = db.lookup_apex();
        assert!(apex_domain.rrset(Rtype::DNSKEY).unwrap().rrsigs.len() == 1); // KSK only
        assert!(apex_domain.rrset(Rtype::SOA).unwrap().rrsigs.len() == 1); // ZSK only
        assert!(apex_domain.rrset(Rtype::NS).unwrap().rrsigs.len() == 1);
        assert_eq!(output.owners.len() > 0, true);
    }

    #[test]
    fn second_run_with_no_changes_reuses_signatures() {
        let mut db = NameDb::new(apex());
        let mut runner = ZoneRunner::new(apex());
        let conf = test_conf();
        let oracle = FakeOracle::new();
        let clock = FixedClock::new(2024010100, 20240101);
        let mut output = VecOutput::default();

        let mut input = VecInput::new(vec![
            soa_add(),
            DiffOp::Add(Rr::new(apex(), Class::IN, 3600, Rdata::Ns(Name::parse("ns1.example.").unwrap()))),
        ]);
        runner.run(&mut db, &conf, &mut input, &oracle, &clock, &rrsig::DeterministicJitter, &NeverCancel, &mut output).unwrap();
        let first_soa_sig = db.lookup_apex().rrset(Rtype::SOA).unwrap().rrsigs[0].clone();
        let first_ns_sig = db.lookup_apex().rrset(Rtype::NS).unwrap().rrsigs[0].clone();

        // Second run, 30 minutes later, with the identical diff reapplied
        // (so every op dedups): the counter serial policy still advances
        // the SOA's own serial on every run, so its RRSIG is expected to
        // differ, but the NS rrset's content is unchanged and its RRSIG
        // must be reused byte-for-byte.
        let later_clock = FixedClock::new(2024010100 + 1800, 20240101);
        let mut input2 = VecInput::new(vec![
            soa_add(),
            DiffOp::Add(Rr::new(apex(), Class::IN, 3600, Rdata::Ns(Name::parse("ns1.example.").unwrap()))),
        ]);
        let stats2 = runner
            .run(&mut db, &conf, &mut input2, &oracle, &later_clock, &rrsig::DeterministicJitter, &NeverCancel, &mut output)
            .unwrap();
        assert_eq!(stats2.duplicate, 2);

        let second_soa_sig = db.lookup_apex().rrset(Rtype::SOA).unwrap().rrsigs[0].clone();
        assert_ne!(first_soa_sig.expiration, second_soa_sig.expiration);
        let second_ns_sig = db.lookup_apex().rrset(Rtype::NS).unwrap().rrsigs[0].clone();
        assert_eq!(first_ns_sig, second_ns_sig);
    }

    #[test]
    fn cname_coexistence_is_rejected() {
        let mut db = NameDb::new(apex());
        let mut runner = ZoneRunner::new(apex());
        let conf = test_conf();
        let oracle = FakeOracle::new();
        let clock = FixedClock::new(2024010100, 20240101);
        let mut output = VecOutput::default();

        let www = Name::parse("www.example.").unwrap();
        let mut input = VecInput::new(vec![
            soa_add(),
            DiffOp::Add(Rr::new(apex(), Class::IN, 3600, Rdata::Ns(Name::parse("ns1.example.").unwrap()))),
            DiffOp::Add(Rr::new(www.clone(), Class::IN, 300, Rdata::Cname(Name::parse("target.example.").unwrap()))),
            DiffOp::Add(Rr::new(www, Class::IN, 300, Rdata::A(Ipv4Addr::new(10, 0, 0, 1)))),
        ]);
        let err = runner
            .run(&mut db, &conf, &mut input, &oracle, &clock, &rrsig::DeterministicJitter, &NeverCancel, &mut output)
            .unwrap_err();
        assert!(matches!(err, ZoneError::CnameCoexistence { .. }));
        assert_eq!(db.domain_count(), 1, "failed run must not commit anything");
    }
}
