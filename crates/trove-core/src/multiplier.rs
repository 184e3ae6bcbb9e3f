//! The reward multiplier curve.
//!
//! Each active boost grows the multiplier by 10% of its current value,
//! rounded up, but never by more than a fixed cap. Once the 10% step reaches
//! the cap every remaining boost adds exactly the cap, so the curve has two
//! regimes: compounding growth while small, then linear growth.

/// Compute the effective multiplier for `base` with `boosts` active boosts.
///
/// `cap` is the maximum any single boost may add. The result is
/// non-decreasing in `boosts`.
///
/// ```
/// use trove_core::compute_multiplier;
///
/// assert_eq!(compute_multiplier(100, 0, 50), 100);
/// assert_eq!(compute_multiplier(100, 3, 50), 134);
/// ```
pub fn compute_multiplier(base: u64, boosts: u32, cap: u64) -> u64 {
    let mut multiplier = base;
    let mut remaining = boosts;

    while remaining > 0 {
        let increment = multiplier.div_ceil(10).min(cap);

        if increment == cap {
            break;
        }
        // Stuck at zero or saturated: no later boost can change anything.
        if increment == 0 || multiplier == u64::MAX {
            return multiplier;
        }

        multiplier = multiplier.saturating_add(increment);
        remaining -= 1;
    }

    multiplier.saturating_add(u64::from(remaining).saturating_mul(cap))
}
