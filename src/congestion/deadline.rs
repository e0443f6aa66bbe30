//! Deadline-aware backoff suppression.
//! 截止时间感知的退避抑制。
//!
//! Each flow belongs to a priority class that grants it a quota of packets
//! per period. The quota is renewed once per period, never leaked
//! continuously. While a flow is in congestion avoidance, the closer it is to
//! missing its deadline the less likely an RTT-driven backoff is applied.

use crate::config::DeadlineConfig;
use crate::congestion::rtt::RttTracker;
use crate::error::{Error, Result};
use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Upper end of the urgency range. Urgency and random draws both live in
/// `0..=URGENCY_MAX`.
pub const URGENCY_MAX: u32 = 1024;

/// Utilization bounds are expressed in 1/1024ths.
const UTILIZATION_SCALE: u64 = 1024;

const FIXED_CLASS_COUNT: usize = 9;

/// Traffic priority classes.
///
/// The first nine classes carry a fixed `(period, packets)` allowance from the
/// [`QuotaTable`]. The rest are utilization-bound classes: their allowance is
/// the window observed at the base RTT, over a period of base RTTs, scaled by
/// a schedulability bound from real-time scheduling theory.
///
/// 流量优先级类别。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PriorityClass {
    #[default]
    BestEffort,
    Scavenger,
    Background,
    Bulk,
    Transactional,
    Streaming,
    Interactive,
    Voice,
    Control,
    /// Liu & Layland rate-monotonic bound for 2 tasks, `2(2^(1/2) - 1)`.
    RateMonotonic2,
    /// Liu & Layland bound for 3 tasks.
    RateMonotonic3,
    /// Liu & Layland bound for 4 tasks.
    RateMonotonic4,
    /// Liu & Layland bound for 8 tasks.
    RateMonotonic8,
    /// The Liu & Layland bound as the task count grows, `ln 2`.
    RateMonotonicLimit,
    /// Earliest-deadline-first, schedulable up to full utilization.
    EarliestDeadlineFirst,
}

impl PriorityClass {
    pub const ALL: [PriorityClass; 15] = [
        PriorityClass::BestEffort,
        PriorityClass::Scavenger,
        PriorityClass::Background,
        PriorityClass::Bulk,
        PriorityClass::Transactional,
        PriorityClass::Streaming,
        PriorityClass::Interactive,
        PriorityClass::Voice,
        PriorityClass::Control,
        PriorityClass::RateMonotonic2,
        PriorityClass::RateMonotonic3,
        PriorityClass::RateMonotonic4,
        PriorityClass::RateMonotonic8,
        PriorityClass::RateMonotonicLimit,
        PriorityClass::EarliestDeadlineFirst,
    ];

    fn fixed_index(self) -> Option<usize> {
        match self {
            PriorityClass::BestEffort => Some(0),
            PriorityClass::Scavenger => Some(1),
            PriorityClass::Background => Some(2),
            PriorityClass::Bulk => Some(3),
            PriorityClass::Transactional => Some(4),
            PriorityClass::Streaming => Some(5),
            PriorityClass::Interactive => Some(6),
            PriorityClass::Voice => Some(7),
            PriorityClass::Control => Some(8),
            PriorityClass::RateMonotonic2
            | PriorityClass::RateMonotonic3
            | PriorityClass::RateMonotonic4
            | PriorityClass::RateMonotonic8
            | PriorityClass::RateMonotonicLimit
            | PriorityClass::EarliestDeadlineFirst => None,
        }
    }

    /// The schedulability bound of a utilization-bound class, in 1/1024ths.
    pub fn utilization_bound(self) -> Option<u32> {
        match self {
            PriorityClass::RateMonotonic2 => Some(848),
            PriorityClass::RateMonotonic3 => Some(798),
            PriorityClass::RateMonotonic4 => Some(775),
            PriorityClass::RateMonotonic8 => Some(741),
            PriorityClass::RateMonotonicLimit => Some(710),
            PriorityClass::EarliestDeadlineFirst => Some(1024),
            _ => None,
        }
    }
}

/// A packet allowance that renews every `period`.
///
/// 每个 `period` 更新一次的包配额。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub period: Duration,
    pub packets: u32,
}

impl Quota {
    const fn new(period: Duration, packets: u32) -> Self {
        Self { period, packets }
    }
}

/// Allowances of the fixed priority classes.
///
/// 固定优先级类别的配额表。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaTable {
    fixed: [Quota; FIXED_CLASS_COUNT],
}

impl Default for QuotaTable {
    fn default() -> Self {
        Self {
            fixed: [
                Quota::new(Duration::from_secs(1), 0),
                Quota::new(Duration::from_secs(10), 0),
                Quota::new(Duration::from_secs(10), 1_000),
                Quota::new(Duration::from_secs(2), 10_000),
                Quota::new(Duration::from_millis(200), 200),
                Quota::new(Duration::from_secs(1), 2_000),
                Quota::new(Duration::from_millis(100), 50),
                Quota::new(Duration::from_millis(20), 4),
                Quota::new(Duration::from_millis(10), 2),
            ],
        }
    }
}

impl QuotaTable {
    /// The allowance of a fixed class; `None` for utilization-bound classes.
    pub fn get(&self, class: PriorityClass) -> Option<Quota> {
        class.fixed_index().map(|index| self.fixed[index])
    }

    /// Overrides the allowance of a fixed class.
    pub fn set(&mut self, class: PriorityClass, quota: Quota) -> Result<()> {
        let index = class.fixed_index().ok_or_else(|| {
            Error::InvalidConfig(format!(
                "{class:?} is utilization-bound and has no fixed quota"
            ))
        })?;
        self.fixed[index] = quota;
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (PriorityClass, Quota)> + '_ {
        PriorityClass::ALL
            .into_iter()
            .filter_map(|class| self.get(class).map(|quota| (class, quota)))
    }

    /// Computes the allowance of `class` for the current path state.
    ///
    /// 根据当前路径状态计算 `class` 的配额。
    pub fn quota_for(
        &self,
        class: PriorityClass,
        maxw_at_rtt_min: u32,
        rtt: &RttTracker,
        period_rtts: u32,
    ) -> Result<Quota> {
        if let Some(quota) = self.get(class) {
            return Ok(quota);
        }
        let bound = class.utilization_bound().unwrap_or(URGENCY_MAX);

        if !rtt.has_baseline() {
            return Err(Error::NoRttBaseline);
        }
        if maxw_at_rtt_min == 0 {
            return Err(Error::NoWindowBaseline);
        }

        let period = rtt.rtt_min().saturating_mul(period_rtts);
        let packets = u64::from(maxw_at_rtt_min) * u64::from(period_rtts) * u64::from(bound)
            / UTILIZATION_SCALE;
        Ok(Quota {
            period,
            packets: u32::try_from(packets).unwrap_or(u32::MAX),
        })
    }
}

/// Per-flow quota and deadline.
///
/// 每个流的配额与截止时间。
#[derive(Debug, Clone)]
pub struct DeadlineScheduler {
    class: PriorityClass,
    packets_left: u32,
    period: Duration,
    deadline: Option<Instant>,
}

impl DeadlineScheduler {
    pub fn new(class: PriorityClass) -> Self {
        Self {
            class,
            packets_left: 0,
            period: Duration::ZERO,
            deadline: None,
        }
    }

    /// Whether a new quota may be drawn: there is none yet, or the current
    /// deadline has passed.
    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_none_or(|deadline| now >= deadline)
    }

    /// Draws a new quota and deadline.
    ///
    /// 获取新的配额和截止时间。
    pub fn refresh_quota(
        &mut self,
        now: Instant,
        config: &DeadlineConfig,
        maxw_at_rtt_min: u32,
        rtt: &RttTracker,
    ) -> Result<()> {
        let quota = config.quotas.quota_for(
            self.class,
            maxw_at_rtt_min,
            rtt,
            config.utilization_period_rtts,
        )?;
        let deadline = now.checked_add(quota.period).ok_or_else(|| {
            Error::InvalidConfig(format!("quota period {:?} overflows", quota.period))
        })?;

        self.packets_left = quota.packets;
        self.period = quota.period;
        self.deadline = Some(deadline);
        debug!(
            class = ?self.class,
            packets = quota.packets,
            period_ms = quota.period.as_millis(),
            "Deadline quota refreshed"
        );
        Ok(())
    }

    /// Refreshes the quota if it is due. A quota that cannot be computed yet
    /// leaves the flow without a deadline until the next attempt.
    pub fn maybe_refresh(
        &mut self,
        now: Instant,
        config: &DeadlineConfig,
        maxw_at_rtt_min: u32,
        rtt: &RttTracker,
    ) {
        if !self.is_due(now) {
            return;
        }
        if let Err(err) = self.refresh_quota(now, config, maxw_at_rtt_min, rtt) {
            warn!(class = ?self.class, %err, "Deadline quota unavailable");
            self.packets_left = 0;
            self.period = Duration::ZERO;
            self.deadline = None;
        }
    }

    /// Charges acknowledged packets against the quota.
    pub fn consume(&mut self, num_acked: u32) {
        self.packets_left = self.packets_left.saturating_sub(num_acked);
    }

    /// How close the flow is to missing its deadline, in `0..=URGENCY_MAX`.
    ///
    /// Returns `None` when there is no usable signal: no deadline, an empty
    /// window, or no RTT baseline to estimate round times from.
    ///
    /// 流距离错过截止时间有多近，取值 `0..=URGENCY_MAX`。
    pub fn urgency(&self, now: Instant, cwnd: u32, rtt: &RttTracker) -> Option<u32> {
        let deadline = self.deadline?;
        if cwnd == 0 || !rtt.has_baseline() {
            return None;
        }
        if self.packets_left == 0 {
            return Some(0);
        }

        let rounds = self.packets_left.div_ceil(cwnd);
        let needed = rtt.rtt_thresh().saturating_mul(rounds);
        let left = deadline.saturating_duration_since(now);
        if left.is_zero() {
            return Some(URGENCY_MAX);
        }

        let scaled = needed.as_nanos().saturating_mul(u128::from(URGENCY_MAX)) / left.as_nanos();
        Some(u32::try_from(scaled).unwrap_or(u32::MAX).min(URGENCY_MAX))
    }

    /// Decides whether a congestion backoff is applied. Without an urgency
    /// signal the backoff always applies; otherwise it applies only when a
    /// uniform draw over the urgency range exceeds the urgency.
    ///
    /// 决定是否执行拥塞退避。
    pub fn should_back_off<R: Rng + ?Sized>(
        &self,
        now: Instant,
        cwnd: u32,
        rtt: &RttTracker,
        rng: &mut R,
    ) -> bool {
        let Some(urgency) = self.urgency(now, cwnd, rtt) else {
            return true;
        };
        let draw = rng.random_range(0..=URGENCY_MAX);
        let back_off = draw > urgency;
        if !back_off {
            debug!(
                class = ?self.class,
                urgency,
                draw,
                packets_left = self.packets_left,
                "Backoff suppressed by deadline urgency"
            );
        } else {
            trace!(urgency, draw, "Backoff applied despite deadline");
        }
        back_off
    }

    pub fn class(&self) -> PriorityClass {
        self.class
    }

    pub fn packets_left(&self) -> u32 {
        self.packets_left
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}
