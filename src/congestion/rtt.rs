//! Base RTT tracking and RTT-inflation congestion detection.
//! 基础RTT跟踪与基于RTT膨胀的拥塞检测。

use crate::config::MAX_MARK;
use std::time::Duration;
use tracing::trace;

/// Tracks the smallest RTT of a path and the threshold above which a sample
/// counts as a congestion mark.
///
/// 跟踪路径的最小RTT，以及样本被视为拥塞标记的阈值。
#[derive(Debug, Clone)]
pub struct RttTracker {
    /// The smallest valid sample so far, `Duration::MAX` before the first.
    /// 迄今最小的有效样本。
    rtt_min: Duration,
    /// `rtt_min + rtt_min * mark_threshold / 1024`.
    rtt_thresh: Duration,
    /// Valid samples seen.
    observations: u32,
    mark_threshold: u32,
    observations_needed: u32,
}

impl RttTracker {
    pub fn new(mark_threshold: u32, observations_needed: u32) -> Self {
        Self {
            rtt_min: Duration::MAX,
            rtt_thresh: Duration::MAX,
            observations: 0,
            mark_threshold,
            observations_needed,
        }
    }

    /// Converts a signed microsecond sample, where anything non-positive
    /// means "no sample", into a `Duration` that [`on_sample`](Self::on_sample)
    /// will ignore when invalid.
    ///
    /// 将有符号微秒样本转换为 `Duration`，非正值映射为零。
    pub fn sample_from_micros(rtt_us: i64) -> Duration {
        u64::try_from(rtt_us)
            .map(Duration::from_micros)
            .unwrap_or(Duration::ZERO)
    }

    /// Feeds a sample. Returns `false` and leaves all state untouched if the
    /// sample is zero.
    ///
    /// 输入一个样本。样本为零时返回 `false` 且不修改任何状态。
    pub fn on_sample(&mut self, rtt: Duration) -> bool {
        if rtt.is_zero() {
            trace!("Ignoring empty RTT sample");
            return false;
        }

        self.observations = self.observations.saturating_add(1);
        if rtt < self.rtt_min {
            self.rtt_min = rtt;
            self.rtt_thresh = self.threshold_for(rtt);
            trace!(
                rtt_min_us = self.rtt_min.as_micros(),
                rtt_thresh_us = self.rtt_thresh.as_micros(),
                "New RTT baseline"
            );
        }
        true
    }

    fn threshold_for(&self, rtt_min: Duration) -> Duration {
        rtt_min
            .checked_mul(self.mark_threshold)
            .map(|margin| margin / MAX_MARK)
            .and_then(|margin| rtt_min.checked_add(margin))
            .unwrap_or(Duration::MAX)
    }

    pub fn is_congested(&self, rtt: Duration) -> bool {
        rtt > self.rtt_thresh
    }

    /// Whether enough samples have been seen to trust the baseline.
    ///
    /// 是否已观察到足够的样本以信任基础RTT。
    pub fn baseline_established(&self) -> bool {
        self.observations > self.observations_needed
    }

    /// Whether any valid sample has arrived.
    pub fn has_baseline(&self) -> bool {
        self.rtt_min != Duration::MAX
    }

    pub fn rtt_min(&self) -> Duration {
        self.rtt_min
    }

    pub fn rtt_thresh(&self) -> Duration {
        self.rtt_thresh
    }

    pub fn observations(&self) -> u32 {
        self.observations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> RttTracker {
        RttTracker::new(174, 10)
    }

    #[test]
    fn test_initial_state() {
        let tracker = tracker();
        assert_eq!(tracker.rtt_min(), Duration::MAX);
        assert_eq!(tracker.rtt_thresh(), Duration::MAX);
        assert_eq!(tracker.observations(), 0);
        assert!(!tracker.has_baseline());
        assert!(!tracker.is_congested(Duration::from_secs(10)));
    }

    #[test]
    fn test_first_sample_sets_threshold() {
        let mut tracker = tracker();
        assert!(tracker.on_sample(Duration::from_millis(100)));

        assert_eq!(tracker.rtt_min(), Duration::from_millis(100));
        // 100ms * 174 / 1024 = 16.9921875ms, truncated to whole nanoseconds.
        assert_eq!(tracker.rtt_thresh(), Duration::from_nanos(116_992_187));
        assert_eq!(tracker.observations(), 1);
        assert!(!tracker.is_congested(Duration::from_millis(100)));
        assert!(tracker.is_congested(Duration::from_millis(117)));
    }

    #[test]
    fn test_zero_sample_is_ignored() {
        let mut tracker = tracker();
        tracker.on_sample(Duration::from_millis(50));
        let before = tracker.clone();

        assert!(!tracker.on_sample(Duration::ZERO));
        assert_eq!(tracker.rtt_min(), before.rtt_min());
        assert_eq!(tracker.rtt_thresh(), before.rtt_thresh());
        assert_eq!(tracker.observations(), before.observations());
    }

    #[test]
    fn test_threshold_changes_only_on_strictly_smaller_sample() {
        let mut tracker = tracker();
        tracker.on_sample(Duration::from_millis(80));
        let thresh = tracker.rtt_thresh();

        tracker.on_sample(Duration::from_millis(80));
        assert_eq!(tracker.rtt_thresh(), thresh);
        tracker.on_sample(Duration::from_millis(300));
        assert_eq!(tracker.rtt_thresh(), thresh);
        assert_eq!(tracker.rtt_min(), Duration::from_millis(80));

        tracker.on_sample(Duration::from_millis(40));
        assert_eq!(tracker.rtt_min(), Duration::from_millis(40));
        assert!(tracker.rtt_thresh() < thresh);
    }

    #[test]
    fn test_baseline_needs_more_than_configured_observations() {
        let mut tracker = tracker();
        for _ in 0..10 {
            tracker.on_sample(Duration::from_millis(20));
        }
        assert!(!tracker.baseline_established());
        tracker.on_sample(Duration::from_millis(20));
        assert!(tracker.baseline_established());
    }

    #[test]
    fn test_sample_from_micros() {
        assert_eq!(
            RttTracker::sample_from_micros(100_000),
            Duration::from_millis(100)
        );
        assert_eq!(RttTracker::sample_from_micros(0), Duration::ZERO);
        assert_eq!(RttTracker::sample_from_micros(-1), Duration::ZERO);

        let mut tracker = tracker();
        assert!(!tracker.on_sample(RttTracker::sample_from_micros(-5)));
        assert_eq!(tracker.observations(), 0);
    }

    #[test]
    fn test_huge_sample_does_not_overflow_threshold() {
        let mut tracker = tracker();
        tracker.on_sample(Duration::MAX - Duration::from_secs(1));
        assert_eq!(tracker.rtt_thresh(), Duration::MAX);
    }
}
