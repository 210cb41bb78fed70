//! An authoritative DNSSEC zone-signing engine.
//!
//! This crate is the in-memory name database and signing/denial pipeline
//! described by the Cascade project's core signing engine: given a set of
//! zone RRs and a [`signconf::SignConf`], it produces a fully signed zone
//! (DNSKEY, NSEC or NSEC3, and RRSIG records forming a valid RFC 4033/4034/
//! 4035/5155 DNSSEC zone). Private key material never enters this crate;
//! all cryptographic signing happens behind the opaque
//! [`oracle::SigningOracle`] trait.
//!
//! Zone-file parsing, wire-format AXFR/IXFR adapters, HSM connection
//! management, and daemon lifecycle concerns are all collaborators outside
//! this crate's scope; see [`zone`] for the traits this engine expects
//! those collaborators to implement.

pub mod backup;
pub mod denial;
pub mod duration;
pub mod error;
pub mod keys;
pub mod name;
pub mod namedb;
pub mod nsec3;
pub mod oracle;
pub mod rdata;
pub mod rrsig;
pub mod serial;
pub mod signconf;
#[cfg(any(test, feature = "test-util"))]
pub mod testutil;
pub mod zone;

pub use crate::error::ZoneError;
pub use crate::name::Name;
pub use crate::namedb::NameDb;
pub use crate::signconf::SignConf;
pub use crate::zone::ZoneRunner;
