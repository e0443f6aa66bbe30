//! Relentless loss recovery.
//! Relentless 丢包恢复。
//!
//! Instead of halving, recovery ends with the slow start threshold set to the
//! window that was open before the episode minus the packets that were
//! actually retransmitted.

use crate::congestion::fixed::{MIN_SCALED_WINDOW, WIN_SCALE_SHIFT};

/// The smallest slow start threshold installed on loss, in packets.
const MIN_LOSS_SSTHRESH: u32 = MIN_SCALED_WINDOW >> WIN_SCALE_SHIFT;

/// Remembers the window plus retransmissions at the last congestion-avoidance
/// tick.
///
/// 记录上一次拥塞避免处理时的窗口加上重传总数。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LossRecoveryPolicy {
    cwnd_at_recovery_start: u32,
}

impl LossRecoveryPolicy {
    pub fn record(&mut self, cwnd: u32, total_retransmits: u32) {
        self.cwnd_at_recovery_start = cwnd.saturating_add(total_retransmits);
    }

    /// The slow start threshold to install once recovery is complete:
    /// the recorded mark minus everything retransmitted so far.
    ///
    /// 恢复完成后应设置的慢启动阈值：记录值减去迄今为止的全部重传。
    pub fn restored_ssthresh(&self, total_retransmits: u32) -> u32 {
        self.cwnd_at_recovery_start.saturating_sub(total_retransmits)
    }

    /// Slow start threshold follows cwnd on loss, defeating the host's own
    /// multiplicative decrease.
    pub fn ssthresh_on_loss(cwnd: u32) -> u32 {
        cwnd.max(MIN_LOSS_SSTHRESH)
    }

    pub fn cwnd_at_recovery_start(&self) -> u32 {
        self.cwnd_at_recovery_start
    }
}
