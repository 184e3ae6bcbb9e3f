//! Daily claim eligibility and streak reconciliation.
//!
//! All timestamps are Unix milliseconds. A claim cycle runs from one reset
//! boundary to the next; a user may claim once per cycle, and the streak
//! survives one missed cycle before it is broken.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Milliseconds in one day.
pub const ONE_DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Outcome of [`check_claim_eligibility`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimEligibility {
    /// The user has not claimed since the last reset boundary.
    pub eligible: bool,
    /// The user has never claimed at all.
    pub is_first_ever_claim: bool,
}

/// Decide whether a user may claim, given their last claim and the most
/// recent reset boundary.
pub fn check_claim_eligibility(last_claim: Option<i64>, boundary: i64) -> ClaimEligibility {
    ClaimEligibility {
        eligible: last_claim.map_or(true, |at| at < boundary),
        is_first_ever_claim: last_claim.is_none(),
    }
}

/// Returns true when the streak must be reset: the last claim lies strictly
/// before the cycle preceding the current one.
pub fn reconcile_streak(last_claim: Option<i64>, boundary: i64, one_day_ms: i64) -> bool {
    last_claim.is_some_and(|at| at < boundary - one_day_ms)
}

/// When the daily cycle rolls over.
///
/// Boundaries fall `offset_ms` after every UTC midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetSchedule {
    #[serde(default)]
    pub offset_ms: i64,
}

impl ResetSchedule {
    pub fn new(offset_ms: i64) -> Self {
        Self { offset_ms }
    }

    /// The most recent boundary at or before `now`.
    pub fn last_boundary(&self, now: i64) -> i64 {
        let shifted = now - self.offset_ms;
        let midnight = match DateTime::<Utc>::from_timestamp_millis(shifted) {
            Some(at) => at
                .date_naive()
                .and_time(NaiveTime::MIN)
                .and_utc()
                .timestamp_millis(),
            // Out of chrono's range; fall back to plain arithmetic.
            None => shifted - shifted.rem_euclid(ONE_DAY_MS),
        };
        midnight + self.offset_ms
    }

    /// The first boundary strictly after `now`.
    pub fn next_boundary(&self, now: i64) -> i64 {
        self.last_boundary(now) + Duration::days(1).num_milliseconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-03-10T00:00:00Z
    const MIDNIGHT: i64 = 1_710_028_800_000;

    #[test]
    fn test_never_claimed_is_eligible_first_claim() {
        let e = check_claim_eligibility(None, MIDNIGHT);
        assert!(e.eligible);
        assert!(e.is_first_ever_claim);
    }

    #[test]
    fn test_claim_before_boundary_is_eligible() {
        let e = check_claim_eligibility(Some(MIDNIGHT - 1), MIDNIGHT);
        assert!(e.eligible);
        assert!(!e.is_first_ever_claim);
    }

    #[test]
    fn test_claim_at_or_after_boundary_is_not_eligible() {
        assert!(!check_claim_eligibility(Some(MIDNIGHT), MIDNIGHT).eligible);
        assert!(!check_claim_eligibility(Some(MIDNIGHT + 5_000), MIDNIGHT).eligible);
    }

    #[test]
    fn test_streak_grace_period() {
        let cutoff = MIDNIGHT - ONE_DAY_MS;

        // Claimed during the previous cycle: streak survives.
        assert!(!reconcile_streak(Some(cutoff + 1), MIDNIGHT, ONE_DAY_MS));
        // Exactly on the previous boundary still counts as that cycle.
        assert!(!reconcile_streak(Some(cutoff), MIDNIGHT, ONE_DAY_MS));
        // Missed the whole previous cycle.
        assert!(reconcile_streak(Some(cutoff - 1), MIDNIGHT, ONE_DAY_MS));
        assert!(reconcile_streak(Some(0), MIDNIGHT, ONE_DAY_MS));
    }

    #[test]
    fn test_streak_never_reset_without_claim() {
        assert!(!reconcile_streak(None, MIDNIGHT, ONE_DAY_MS));
    }

    #[test]
    fn test_last_boundary_is_utc_midnight() {
        let schedule = ResetSchedule::default();
        assert_eq!(schedule.last_boundary(MIDNIGHT), MIDNIGHT);
        assert_eq!(schedule.last_boundary(MIDNIGHT + 1), MIDNIGHT);
        assert_eq!(schedule.last_boundary(MIDNIGHT - 1), MIDNIGHT - ONE_DAY_MS);
        assert_eq!(schedule.next_boundary(MIDNIGHT + 1), MIDNIGHT + ONE_DAY_MS);
    }

    #[test]
    fn test_last_boundary_with_offset() {
        // Resets at 05:00 UTC.
        let schedule = ResetSchedule::new(5 * 60 * 60 * 1000);
        let five_am = MIDNIGHT + schedule.offset_ms;

        assert_eq!(schedule.last_boundary(five_am + 10), five_am);
        assert_eq!(schedule.last_boundary(five_am - 10), five_am - ONE_DAY_MS);
    }
}
