//! The name database (component B): an ordered map of authoritative owner
//! names to [`Domain`]s, a separate ordered map of denial names to
//! [`Denial`] nodes, and the SOA serial bookkeeping triple, all reachable
//! through copy-on-write [`View`]s.
//!
//! Back-pointers (domain → parent, domain → denial node) are stored as
//! [`Name`] keys rather than raw references or `Weak` pointers, per
//! spec.md §9's design note: they are resolved back through the owning
//! [`View`] rather than traversed directly, which keeps every node plain
//! data and trivially `Clone`.

use std::collections::BTreeMap;

use crate::name::Name;
use crate::rdata::{Rdata, Rr, Rrset, Rtype};
use crate::rrsig::Signature;

//----------- Domain -----------------------------------------------------------------

/// One authoritative owner name: either a domain with at least one rrset,
/// or an empty non-terminal (ENT) kept alive only because it has
/// descendants.
#[derive(Clone, Debug)]
pub struct Domain {
    pub name: Name,
    pub is_apex: bool,
    /// The immediate parent's name, or `None` for the apex. Resolved
    /// through the owning [`View`]/[`NameDb`], never stored as a direct
    /// reference.
    pub parent: Option<Name>,
    /// The hash_name of this domain's denial node, once one exists.
    pub denial_ref: Option<Name>,
    /// Set whenever a diff-apply touches an rrset at this owner; cleared
    /// on commit. Reserved bookkeeping for the "needs_signing" selection
    /// of spec.md §4.G step 6's incremental path: `sign_all` (zone.rs)
    /// does not currently read this field, since it walks every owner's
    /// every rrset each run (see DESIGN.md's "Design simplification
    /// recorded here" note on `zone.rs`). A future incremental pass can
    /// consult it, alongside a denial node's `changed` bit, to skip
    /// unaffected owners without changing any externally observable
    /// behavior.
    pub dirty: bool,
    rrsets: BTreeMap<u16, Rrset>,
}

impl Domain {
    pub fn new(name: Name, is_apex: bool, parent: Option<Name>) -> Domain {
        Domain { name, is_apex, parent, denial_ref: None, dirty: false, rrsets: BTreeMap::new() }
    }

    /// Whether this domain carries no rrsets of its own (an ENT).
    pub fn is_ent(&self) -> bool {
        self.rrsets.is_empty()
    }

    pub fn rrset(&self, rtype: Rtype) -> Option<&Rrset> {
        self.rrsets.get(&rtype.value())
    }

    pub fn rrset_mut(&mut self, rtype: Rtype) -> Option<&mut Rrset> {
        self.rrsets.get_mut(&rtype.value())
    }

    /// Iterate this domain's rrsets in ascending type order.
    pub fn rrsets(&self) -> impl Iterator<Item = &Rrset> {
        self.rrsets.values()
    }

    pub fn rrsets_mut(&mut self) -> impl Iterator<Item = &mut Rrset> {
        self.rrsets.values_mut()
    }

    pub fn types(&self) -> impl Iterator<Item = Rtype> + '_ {
        self.rrsets.values().map(|r| r.rtype)
    }

    /// Insert `rdata` into this domain's rrset of its type, creating the
    /// rrset if needed. Returns `false` if `rdata` was already present.
    pub fn insert_rr(&mut self, class: crate::rdata::Class, ttl: u32, rdata: Rdata) -> bool {
        let rtype = rdata.rtype();
        let rrset = self.rrsets.entry(rtype.value()).or_insert_with(|| Rrset::new(rtype, class, ttl));
        let added = rrset.insert(rdata);
        if added {
            self.dirty = true;
        }
        added
    }

    /// Remove `rdata` from this domain. Drops the rrset entirely (and its
    /// signatures) once it becomes empty. Returns `false` if it was not
    /// present.
    pub fn remove_rr(&mut self, rdata: &Rdata) -> bool {
        let rtype = rdata.rtype();
        let Some(rrset) = self.rrsets.get_mut(&rtype.value()) else {
            return false;
        };
        let removed = rrset.remove(rdata);
        if removed {
            self.dirty = true;
            if rrset.is_empty() {
                self.rrsets.remove(&rtype.value());
            }
        }
        removed
    }

    /// Replace the RRSIG list over `rtype`'s rrset, a no-op if the rrset
    /// does not exist (e.g. the covering RR disappeared in this diff).
    pub fn set_rrsigs(&mut self, rtype: Rtype, rrsigs: Vec<Signature>) {
        if let Some(rrset) = self.rrset_mut(rtype) {
            rrset.rrsigs = rrsigs;
        }
    }

    /// All RRs at this owner, in ascending-type order, RRSIGs included
    /// (the shape the output adapter consumes).
    pub fn all_rrs(&self) -> Vec<Rr> {
        let mut out = Vec::new();
        for rrset in self.rrsets.values() {
            out.extend(rrset.rrs_for(&self.name));
            for sig in &rrset.rrsigs {
                out.push(Rr::new(self.name.clone(), rrset.class, rrset.ttl, sig.to_rdata()));
            }
        }
        out
    }
}

//----------- Denial -----------------------------------------------------------------

/// One NSEC or NSEC3 chain node (component E's unit of work).
#[derive(Clone, Debug)]
pub struct Denial {
    /// The name this denial RR is published under: the owner itself for
    /// NSEC, or the base32hex-encoded hash label under the apex for
    /// NSEC3.
    pub hash_name: Name,
    /// The authoritative owner this node denies the non-existence of data
    /// for.
    pub origin: Name,
    pub rrset: Rrset,
    /// Set when this node (or a neighbor whose `next`/`next_hashed` field
    /// had to move) was touched by the most recent chain rebuild pass.
    pub changed: bool,
}

//----------- SerialState -------------------------------------------------------------

/// The SOA serial bookkeeping triple (spec.md §3's `NameDb.serial`).
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialState {
    pub inbound: Option<u32>,
    pub internal: Option<u32>,
    pub outbound: Option<u32>,
    /// An external override (`SignConf.force_serial` at the orchestrator
    /// level is threaded through here once applied).
    pub forced: Option<u32>,
}

impl SerialState {
    pub fn have_serial(&self) -> bool {
        self.inbound.is_some()
    }
}

//----------- NameDb -----------------------------------------------------------------

/// The committed name database for one zone.
#[derive(Clone, Debug)]
pub struct NameDb {
    pub apex: Name,
    auth: BTreeMap<Name, Domain>,
    denials: BTreeMap<Name, Denial>,
    pub serial: SerialState,
}

impl NameDb {
    /// A fresh, empty database for `apex`, with the apex domain already
    /// present (every zone has at least its apex).
    pub fn new(apex: Name) -> NameDb {
        let mut auth = BTreeMap::new();
        auth.insert(apex.clone(), Domain::new(apex.clone(), true, None));
        NameDb { apex, auth, denials: BTreeMap::new(), serial: SerialState::default() }
    }

    /// Open a view over the current committed state. The view is a
    /// cheap (`BTreeMap` clone of reference-counted `Bytes`-backed data)
    /// working copy; mutating it has no effect on `self` until
    /// [`View::commit`] is called.
    pub fn open_view(&self) -> View {
        View { apex: self.apex.clone(), auth: self.auth.clone(), denials: self.denials.clone(), serial: self.serial }
    }

    pub fn lookup_name(&self, name: &Name) -> Option<&Domain> {
        self.auth.get(name)
    }

    pub fn lookup_apex(&self) -> &Domain {
        self.auth.get(&self.apex).expect("the apex domain always exists")
    }

    pub fn all_domains(&self) -> impl DoubleEndedIterator<Item = (&Name, &Domain)> {
        self.auth.iter()
    }

    pub fn all_denials(&self) -> impl DoubleEndedIterator<Item = (&Name, &Denial)> {
        self.denials.iter()
    }

    pub fn domain_count(&self) -> usize {
        self.auth.len()
    }

    pub fn denial_count(&self) -> usize {
        self.denials.len()
    }
}

//----------- View -------------------------------------------------------------------

/// An independent, mutable cursor over a [`NameDb`]'s data.
///
/// Concurrency contract (spec.md §4.B): the core is single-threaded per
/// zone, so a `View` is not `Sync`-guarded internally; the zone worker
/// that owns it is trusted to be the only mutator. A view opened before
/// [`View::commit`] sees the pre-commit state; one opened after sees the
/// post-commit state, because each open takes its own clone.
#[derive(Clone, Debug)]
pub struct View {
    apex: Name,
    auth: BTreeMap<Name, Domain>,
    denials: BTreeMap<Name, Denial>,
    pub serial: SerialState,
}

impl View {
    pub fn apex(&self) -> &Name {
        &self.apex
    }

    pub fn lookup_name(&self, name: &Name) -> Option<&Domain> {
        self.auth.get(name)
    }

    pub fn lookup_name_mut(&mut self, name: &Name) -> Option<&mut Domain> {
        self.auth.get_mut(name)
    }

    pub fn lookup_apex(&self) -> &Domain {
        self.auth.get(&self.apex).expect("the apex domain always exists")
    }

    pub fn lookup_apex_mut(&mut self) -> &mut Domain {
        self.auth.get_mut(&self.apex).expect("the apex domain always exists")
    }

    /// Insert a domain for `name` if one does not already exist, per the
    /// entization rule of §4.G step 2. Returns the (possibly
    /// newly-created) domain.
    pub fn add_name(&mut self, name: Name, is_apex: bool, parent: Option<Name>) -> &mut Domain {
        self.auth.entry(name.clone()).or_insert_with(|| Domain::new(name, is_apex, parent))
    }

    /// Remove `name`'s domain outright (e.g. it became an ENT with no
    /// descendants). Returns the removed domain, if any.
    pub fn remove_name(&mut self, name: &Name) -> Option<Domain> {
        self.auth.remove(name)
    }

    /// Iterate every authoritative owner in canonical order, stable under
    /// insertion: entries already in the map keep their relative order as
    /// new ones are added elsewhere; a `BTreeMap`'s iterator never
    /// revisits a key once yielded.
    pub fn all_domains(&self) -> impl DoubleEndedIterator<Item = (&Name, &Domain)> {
        self.auth.iter()
    }

    pub fn all_domains_mut(&mut self) -> impl Iterator<Item = (&Name, &mut Domain)> {
        self.auth.iter_mut()
    }

    pub fn domain_count(&self) -> usize {
        self.auth.len()
    }

    /// Walk from `name` up to (and including) the apex, yielding each
    /// ancestor's current domain, were it present. Does not yield `name`
    /// itself.
    pub fn parent_chain<'a>(&'a self, name: &Name) -> ParentChain<'a> {
        let start = self.lookup_name(name).and_then(|d| d.parent.clone());
        ParentChain { view: self, next: start }
    }

    pub fn denial(&self, hash_name: &Name) -> Option<&Denial> {
        self.denials.get(hash_name)
    }

    pub fn denial_mut(&mut self, hash_name: &Name) -> Option<&mut Denial> {
        self.denials.get_mut(hash_name)
    }

    pub fn insert_denial(&mut self, denial: Denial) {
        self.denials.insert(denial.hash_name.clone(), denial);
    }

    pub fn remove_denial(&mut self, hash_name: &Name) -> Option<Denial> {
        self.denials.remove(hash_name)
    }

    pub fn clear_denials(&mut self) {
        self.denials.clear();
    }

    /// Iterate denial nodes from the lowest hash_name up.
    pub fn first_denials(&self) -> impl DoubleEndedIterator<Item = (&Name, &Denial)> {
        self.denials.iter()
    }

    /// Iterate denial nodes from the highest hash_name down.
    pub fn reverse_denials(&self) -> impl Iterator<Item = (&Name, &Denial)> {
        self.denials.iter().rev()
    }

    pub fn denial_count(&self) -> usize {
        self.denials.len()
    }

    pub fn all_denials_mut(&mut self) -> impl Iterator<Item = (&Name, &mut Denial)> {
        self.denials.iter_mut()
    }

    /// Commit this view's state into `db`, replacing its previous
    /// contents. Once called, a fresh [`NameDb::open_view`] observes
    /// exactly this state.
    pub fn commit(mut self, db: &mut NameDb) {
        for domain in self.auth.values_mut() {
            domain.dirty = false;
        }
        db.apex = self.apex;
        db.auth = self.auth;
        db.denials = self.denials;
        db.serial = self.serial;
    }

    /// Abandon this view without affecting `db`. Provided for symmetry
    /// with [`View::commit`] and so callers can log the abandonment
    /// explicitly; dropping the view has the identical effect.
    pub fn rollback(self) {}
}

/// Iterator produced by [`View::parent_chain`].
pub struct ParentChain<'a> {
    view: &'a View,
    next: Option<Name>,
}

impl<'a> Iterator for ParentChain<'a> {
    type Item = &'a Domain;

    fn next(&mut self) -> Option<Self::Item> {
        let name = self.next.take()?;
        let domain = self.view.lookup_name(&name)?;
        self.next = domain.parent.clone();
        Some(domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdata::Class;
    use std::net::Ipv4Addr;

    fn apex() -> Name {
        Name::parse("example.").unwrap()
    }

    #[test]
    fn new_db_has_apex_domain() {
        let db = NameDb::new(apex());
        assert_eq!(db.domain_count(), 1);
        assert!(db.lookup_name(&apex()).unwrap().is_apex);
    }

    #[test]
    fn view_mutations_are_invisible_until_commit() {
        let mut db = NameDb::new(apex());
        let mut view = db.open_view();
        let www = Name::parse("www.example.").unwrap();
        view.add_name(www.clone(), false, Some(apex())).insert_rr(Class::IN, 300, Rdata::A(Ipv4Addr::new(10, 0, 0, 1)));

        assert_eq!(db.domain_count(), 1, "pre-commit view opened before is unaffected");
        view.commit(&mut db);
        assert_eq!(db.domain_count(), 2);
        assert!(db.lookup_name(&www).unwrap().rrset(Rtype::A).is_some());
    }

    #[test]
    fn parent_chain_walks_to_apex() {
        let mut db = NameDb::new(apex());
        let mut view = db.open_view();
        let a = Name::parse("a.example.").unwrap();
        let b = Name::parse("b.a.example.").unwrap();
        view.add_name(a.clone(), false, Some(apex()));
        view.add_name(b.clone(), false, Some(a.clone()));
        view.commit(&mut db);

        let view = db.open_view();
        let chain: Vec<Name> = view.parent_chain(&b).map(|d| d.name.clone()).collect();
        assert_eq!(chain, vec![a, apex()]);
    }

    #[test]
    fn dirty_flag_set_on_insert_and_cleared_on_commit() {
        let mut db = NameDb::new(apex());
        let mut view = db.open_view();
        view.lookup_apex_mut().insert_rr(Class::IN, 300, Rdata::Ns(Name::parse("ns1.example.").unwrap()));
        assert!(view.lookup_apex().dirty);
        view.commit(&mut db);
        assert!(!db.lookup_apex().dirty);
    }
}
