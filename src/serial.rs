//! The SOA serial policy engine (component, spec.md §4.G step 5): RFC 1982
//! 32-bit serial arithmetic plus the four serial maintenance strategies.

use crate::error::ZoneError;
use crate::name::Name;
use crate::signconf::SoaSerialPolicy;

/// RFC 1982 §3.2: whether `a` is strictly greater than `b` under 32-bit
/// serial wraparound arithmetic.
pub fn serial_gt(a: u32, b: u32) -> bool {
    if a == b {
        return false;
    }
    let (a, b) = (a as i64, b as i64);
    (a < b && (b - a) > (1i64 << 31)) || (a > b && (a - b) < (1i64 << 31))
}

/// Whether `a` is less than or equal to `b` under serial arithmetic; the
/// complement `serial_gt` needs for the `keep` policy's regress check.
fn serial_le(a: u32, b: u32) -> bool {
    a == b || serial_gt(b, a)
}

/// The larger of two serials under serial arithmetic. Ties favor `a`.
fn serial_max(a: u32, b: u32) -> u32 {
    if serial_gt(b, a) { b } else { a }
}

/// Compute the outbound SOA serial for this run.
///
/// `previous_outbound` is `None` on a zone's very first signed run.
/// `owner` is the apex, used only to build a [`ZoneError::SerialRegress`].
pub fn compute_serial(
    owner: &Name,
    policy: SoaSerialPolicy,
    inbound: u32,
    previous_outbound: Option<u32>,
    now_seconds: u64,
    today_yyyymmdd: u32,
) -> Result<u32, ZoneError> {
    Ok(match policy {
        SoaSerialPolicy::Keep => {
            if let Some(prev) = previous_outbound {
                if serial_le(inbound, prev) {
                    return Err(ZoneError::SerialRegress { owner: owner.clone(), inbound, previous_outbound: prev });
                }
            }
            inbound
        }
        SoaSerialPolicy::Counter => {
            serial_max(inbound, previous_outbound.unwrap_or(0)).wrapping_add(1)
        }
        SoaSerialPolicy::Unixtime => {
            let now = now_seconds as u32;
            serial_max(now, previous_outbound.unwrap_or(0).wrapping_add(1))
        }
        SoaSerialPolicy::Datecounter => {
            let counter = today_yyyymmdd.wrapping_mul(100);
            serial_max(counter, previous_outbound.unwrap_or(0).wrapping_add(1))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apex() -> Name {
        Name::parse("example.").unwrap()
    }

    #[test]
    fn serial_gt_handles_wraparound() {
        assert!(serial_gt(1, 0));
        assert!(serial_gt(0, u32::MAX));
        assert!(!serial_gt(u32::MAX, 0));
    }

    #[test]
    fn keep_fails_on_non_advancing_serial() {
        let err = compute_serial(&apex(), SoaSerialPolicy::Keep, 100, Some(100), 0, 0).unwrap_err();
        assert!(matches!(err, ZoneError::SerialRegress { .. }));
        let err = compute_serial(&apex(), SoaSerialPolicy::Keep, 99, Some(100), 0, 0).unwrap_err();
        assert!(matches!(err, ZoneError::SerialRegress { .. }));
    }

    #[test]
    fn keep_passes_through_when_advanced() {
        let serial = compute_serial(&apex(), SoaSerialPolicy::Keep, 101, Some(100), 0, 0).unwrap();
        assert_eq!(serial, 101);
    }

    #[test]
    fn counter_increments_past_previous() {
        let serial = compute_serial(&apex(), SoaSerialPolicy::Counter, 5, Some(10), 0, 0).unwrap();
        assert_eq!(serial, 11);
    }

    #[test]
    fn counter_first_run_increments_inbound() {
        // spec.md §8 scenario 1: an empty zone signed for the first time
        // with serial 2024010100 and the `counter` policy comes out as
        // 2024010101 — the formula always adds one, first run included.
        let serial = compute_serial(&apex(), SoaSerialPolicy::Counter, 2024010100, None, 0, 0).unwrap();
        assert_eq!(serial, 2024010101);
    }

    #[test]
    fn unixtime_uses_clock_unless_behind_previous() {
        let serial = compute_serial(&apex(), SoaSerialPolicy::Unixtime, 0, Some(1_700_000_000), 1_600_000_000, 0).unwrap();
        assert_eq!(serial, 1_700_000_001);
        let serial = compute_serial(&apex(), SoaSerialPolicy::Unixtime, 0, Some(1_000), 1_700_000_000, 0).unwrap();
        assert_eq!(serial, 1_700_000_000);
    }

    #[test]
    fn datecounter_uses_yyyymmdd_times_100() {
        let serial = compute_serial(&apex(), SoaSerialPolicy::Datecounter, 0, None, 0, 20260728).unwrap();
        assert_eq!(serial, 2026072800);
        let serial = compute_serial(&apex(), SoaSerialPolicy::Datecounter, 0, Some(2026072899), 0, 20260728).unwrap();
        assert_eq!(serial, 2026072900);
    }
}
