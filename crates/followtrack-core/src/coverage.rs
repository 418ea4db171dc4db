//! Decides whether the absences in a snapshot can be trusted as departures.
//!
//! A scrape that stopped early looks exactly like a mass unfollow. The guard
//! compares the snapshot size with the larger of the platform's claimed total
//! and the number of currently active records, and only lets lost-marking
//! through when the snapshot is substantially complete.

pub const DEFAULT_MIN_COVERAGE: f64 = 0.9;
pub const DEFAULT_MIN_REFERENCE_COUNT: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoveragePolicy {
    pub min_coverage: f64,
    pub min_reference_count: i64,
}

impl Default for CoveragePolicy {
    fn default() -> Self {
        Self {
            min_coverage: DEFAULT_MIN_COVERAGE,
            min_reference_count: DEFAULT_MIN_REFERENCE_COUNT,
        }
    }
}

impl CoveragePolicy {
    /// Returns `true` when absent members may be marked lost for this run.
    ///
    /// Sets smaller than `min_reference_count` are always trusted. Above that
    /// an empty snapshot is never trusted, and anything else must reach
    /// `min_coverage` of the reference size.
    #[must_use]
    pub fn should_apply_lost_marking(
        &self,
        observed_count: usize,
        active_existing_count: usize,
        expected_total: Option<i64>,
    ) -> bool {
        let active = i64::try_from(active_existing_count).unwrap_or(i64::MAX);
        let reference = expected_total.unwrap_or(0).max(active);

        if reference < self.min_reference_count {
            return true;
        }
        if observed_count == 0 {
            return false;
        }

        #[allow(clippy::cast_precision_loss)]
        let coverage = observed_count as f64 / reference as f64;
        coverage >= self.min_coverage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_coverage_suppresses_lost_marking() {
        let policy = CoveragePolicy::default();
        assert!(!policy.should_apply_lost_marking(50, 150, None));
    }

    #[test]
    fn high_coverage_allows_lost_marking() {
        let policy = CoveragePolicy::default();
        assert!(policy.should_apply_lost_marking(140, 150, None));
    }

    #[test]
    fn exact_threshold_is_accepted() {
        let policy = CoveragePolicy::default();
        assert!(policy.should_apply_lost_marking(90, 100, None));
        assert!(!policy.should_apply_lost_marking(89, 100, None));
    }

    #[test]
    fn empty_snapshot_of_large_set_is_never_trusted() {
        let policy = CoveragePolicy::default();
        assert!(!policy.should_apply_lost_marking(0, 500, None));
        assert!(!policy.should_apply_lost_marking(0, 500, Some(0)));
        assert!(!policy.should_apply_lost_marking(0, 500, Some(10_000)));
    }

    #[test]
    fn small_sets_bypass_the_guard() {
        let policy = CoveragePolicy::default();
        assert!(policy.should_apply_lost_marking(0, 10, None));
        assert!(policy.should_apply_lost_marking(0, 99, Some(42)));
    }

    #[test]
    fn claimed_total_raises_the_reference() {
        // 150 active, but the platform claims 1000: 160 observed is 16% coverage.
        let policy = CoveragePolicy::default();
        assert!(!policy.should_apply_lost_marking(160, 150, Some(1000)));
    }

    #[test]
    fn claimed_total_alone_can_engage_the_guard() {
        let policy = CoveragePolicy::default();
        assert!(!policy.should_apply_lost_marking(0, 5, Some(250)));
    }

    #[test]
    fn custom_thresholds_are_honoured() {
        let policy = CoveragePolicy {
            min_coverage: 0.5,
            min_reference_count: 10,
        };
        assert!(policy.should_apply_lost_marking(6, 12, None));
        assert!(!policy.should_apply_lost_marking(5, 12, Some(11)));
    }
}
