//! Error kinds produced by the signing pipeline.
//!
//! Hand-written with manual `Display`/`Error` impls rather than a derive
//! macro, matching `ReplaceError`/`PatchError` in the teacher's
//! `zonedata::writer` and `SignerError` in its `zone_signer` unit.

use std::fmt;

use crate::name::Name;
use crate::rdata::Rtype;

/// A hard failure that aborts the current zone run. The previously
/// committed state is left untouched; the caller gets a single typed
/// reason.
#[derive(Debug)]
pub enum ZoneError {
    /// `SignConf` failed validation.
    ConfigInvalid(String),
    /// A CNAME rrset coexists with a disallowed type at the same owner.
    CnameCoexistence { owner: Name, other: Rtype },
    /// The `keep` serial policy found the inbound serial did not advance.
    SerialRegress { owner: Name, inbound: u32, previous_outbound: u32 },
    /// Two distinct owners hashed to the same NSEC3 name.
    HashCollision { hash_name: Name, first: Name, second: Name },
    /// The signing oracle has no key under this locator.
    NoSuchKey { locator: String },
    /// The signing oracle could not be reached or timed out.
    OracleUnavailable { locator: String, reason: String },
    /// The signing oracle rejected a signing request.
    SignatureRejected { locator: String, reason: String },
    /// The run was cooperatively cancelled before it committed.
    Cancelled,
}

impl fmt::Display for ZoneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneError::ConfigInvalid(reason) => write!(f, "invalid signing configuration: {reason}"),
            ZoneError::CnameCoexistence { owner, other } => {
                write!(f, "{owner} has a CNAME rrset coexisting with {other:?}")
            }
            ZoneError::SerialRegress { owner, inbound, previous_outbound } => write!(
                f,
                "{owner}: inbound serial {inbound} did not advance past previous outbound serial {previous_outbound}"
            ),
            ZoneError::HashCollision { hash_name, first, second } => write!(
                f,
                "NSEC3 hash collision at {hash_name}: both {first} and {second} hash to it"
            ),
            ZoneError::NoSuchKey { locator } => write!(f, "signing oracle has no key {locator}"),
            ZoneError::OracleUnavailable { locator, reason } => {
                write!(f, "signing oracle unavailable for key {locator}: {reason}")
            }
            ZoneError::SignatureRejected { locator, reason } => {
                write!(f, "signing oracle rejected a request for key {locator}: {reason}")
            }
            ZoneError::Cancelled => f.write_str("zone run was cancelled"),
        }
    }
}

impl std::error::Error for ZoneError {}

/// A soft condition encountered while applying a diff: the offending RR is
/// skipped rather than aborting the run. Counted in [`DiffStats`], not
/// returned as an error.
///
/// [`DiffStats`]: crate::zone::DiffStats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoftError {
    /// The RR's owner is not at or below the zone apex.
    OutOfZone,
    /// The same RR was already present (add) or already absent (remove).
    Duplicate,
}

impl fmt::Display for SoftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoftError::OutOfZone => f.write_str("record owner is out of zone"),
            SoftError::Duplicate => f.write_str("duplicate record"),
        }
    }
}

/// Errors returned by a [`SigningOracle`](crate::oracle::SigningOracle).
#[derive(Debug, Clone)]
pub enum OracleError {
    NoSuchKey,
    OracleUnavailable(String),
    SignatureRejected(String),
}

impl fmt::Display for OracleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OracleError::NoSuchKey => f.write_str("no such key"),
            OracleError::OracleUnavailable(reason) => write!(f, "oracle unavailable: {reason}"),
            OracleError::SignatureRejected(reason) => write!(f, "signature rejected: {reason}"),
        }
    }
}

impl std::error::Error for OracleError {}
