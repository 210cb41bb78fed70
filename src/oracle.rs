//! The signing oracle interface: the engine's only path to private key
//! material, which never leaves the oracle's side of this boundary.

use bytes::Bytes;

use crate::error::OracleError;
use crate::rdata::Rdata;

/// An opaque, HSM-backed signer, addressed by a key's `locator`.
///
/// Implementations are assumed to be internally concurrency-safe (or
/// externally gated by the caller): the engine may call `sign` from
/// several signing workers within one zone run. The `Send + Sync`
/// supertraits reflect that: the oracle is shared across the bounded pool
/// of signing workers spec.md §5 fans RRSIG generation out to.
pub trait SigningOracle: Send + Sync {
    /// Fetch the public component of `locator` as a DNSKEY RDATA.
    fn get_public_key(&self, locator: &str) -> Result<Rdata, OracleError>;

    /// Sign `signing_input` with `locator` using `algorithm`, returning the
    /// raw signature bytes to embed in an RRSIG's final field.
    fn sign(&self, locator: &str, algorithm: u8, signing_input: &[u8]) -> Result<Bytes, OracleError>;
}
