//! External-interface collaborators (component H): the input/output RR
//! streams and the SOA clock. Concrete implementations (zone-file parsing,
//! IXFR framing, a wall-clock `SoaClock`) are out of scope for this crate
//! per spec.md §1; only the interfaces the orchestrator drives are defined
//! here.

use crate::name::Name;
use crate::rdata::{Rr, Rrset};

/// One change an [`InputAdapter`] yields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiffOp {
    Add(Rr),
    Remove(Rr),
}

/// A source of `(Add|Remove, Rr)` operations describing the change between
/// the zone's previously committed state and its new desired state.
///
/// Implementations own whatever produced the diff (a parsed zone file
/// compared against the database, an IXFR stream, a full-zone AXFR treated
/// as "remove everything, add everything") — zone-file parsing itself is
/// out of scope here (spec.md §1).
pub trait InputAdapter {
    /// Yield the next operation, or `None` once the diff is exhausted.
    fn next_op(&mut self) -> Option<DiffOp>;
}

/// A sink for the signed zone's RRs, presented owner by owner in the
/// canonical order of spec.md §6: apex first, then ascending canonical
/// owner order; within an owner, SOA first (apex only), CNAME exclusive
/// where present, otherwise ascending type with each type's RRSIGs
/// directly following it, and NSEC/NSEC3/NSEC3PARAM last.
pub trait OutputAdapter {
    /// Emit every RR at `owner` from `rrset`'s member data and RRSIGs, in
    /// the order described above within the set.
    fn emit(&mut self, owner: &Name, rrset: &Rrset);

    /// Called once after the last `emit`, for adapters that need to flush
    /// buffered output or close a stream. The default is a no-op.
    fn finish(&mut self) {}
}

/// The SOA clock (spec.md §6): supplies "now" for inception/expiration
/// windowing and the YYYYMMDD value the `datecounter` serial policy needs.
/// Implementations let tests pin a fixed instant.
pub trait SoaClock: Send + Sync {
    fn now_seconds(&self) -> u64;
    fn today_yyyymmdd(&self) -> u32;
}

/// Cooperative cancellation, checked at the orchestrator's suspension
/// points between pipeline stages (spec.md §5). A run that observes
/// cancellation aborts with [`crate::error::ZoneError::Cancelled`] without
/// committing.
pub trait CancelSignal: Send + Sync {
    fn is_cancelled(&self) -> bool;
}

/// A [`CancelSignal`] that never cancels, for callers with no cancellation
/// need of their own.
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverCancel;

impl CancelSignal for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}
