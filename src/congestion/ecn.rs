//! The receiver-side CE echo state machine.
//! 接收端CE回显状态机。
//!
//! A receiver that coalesces ACKs can merge segments with different CE
//! markings into one ACK, losing per-segment echo fidelity. When the marking
//! flips while a delayed ACK is still pending, the machine first sends an ACK
//! that reflects the old marking up to the cursor recorded at the previous
//! flip, then switches.

use super::transport::Transport;
use tracing::debug;

/// Whether the last received segment carried a CE mark.
///
/// 最近收到的段是否带有CE标记。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CeState {
    #[default]
    NoCe,
    Ce,
}

impl CeState {
    pub fn is_ce(self) -> bool {
        self == CeState::Ce
    }
}

/// The ACK replayed for the previous CE state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckFlush {
    /// Receive cursor the replayed ACK acknowledged.
    pub rcv_nxt: u32,
    /// ECN-Echo flag the replayed ACK carried.
    pub ecn_echo: bool,
}

/// CE echo state plus delayed-ACK bookkeeping.
///
/// CE回显状态以及延迟ACK的记录。
#[derive(Debug, Clone, Default)]
pub struct EcnStateMachine {
    ce_state: CeState,
    /// Receive cursor at the last CE transition.
    prior_rcv_nxt: u32,
    delayed_ack_reserved: bool,
}

impl EcnStateMachine {
    pub fn new(rcv_nxt: u32) -> Self {
        Self {
            prior_rcv_nxt: rcv_nxt,
            ..Self::default()
        }
    }

    /// Re-anchors the machine to the host's current receive cursor.
    pub fn bind(&mut self, rcv_nxt: u32) {
        self.prior_rcv_nxt = rcv_nxt;
        self.delayed_ack_reserved = false;
        self.ce_state = CeState::NoCe;
    }

    /// Applies an observed marking. Returns the replayed ACK, if the marking
    /// flipped while a delayed ACK was pending.
    ///
    /// 应用观察到的标记。如果在延迟ACK挂起时标记发生翻转，返回重放的ACK。
    pub fn observe(
        &mut self,
        transport: &mut dyn Transport,
        observed: CeState,
    ) -> Option<AckFlush> {
        let flips = self.ce_state != observed;
        let flush = if flips && self.delayed_ack_reserved {
            Some(self.flush_prior(transport))
        } else {
            None
        };

        self.prior_rcv_nxt = transport.rcv_nxt();
        self.ce_state = observed;
        transport.set_ecn_echo_demand(observed.is_ce());
        flush
    }

    fn flush_prior(&self, transport: &mut dyn Transport) -> AckFlush {
        let current_rcv_nxt = transport.rcv_nxt();
        let ecn_echo = self.ce_state.is_ce();

        transport.set_ecn_echo_demand(ecn_echo);
        transport.set_rcv_nxt(self.prior_rcv_nxt);
        transport.send_ack();
        transport.set_rcv_nxt(current_rcv_nxt);

        debug!(
            rcv_nxt = self.prior_rcv_nxt,
            ecn_echo, "Flushed delayed ACK for previous CE state"
        );
        AckFlush {
            rcv_nxt: self.prior_rcv_nxt,
            ecn_echo,
        }
    }

    pub fn on_delayed_ack_scheduled(&mut self) {
        self.delayed_ack_reserved = true;
    }

    pub fn on_ack_sent_immediately(&mut self) {
        self.delayed_ack_reserved = false;
    }

    pub fn ce_state(&self) -> CeState {
        self.ce_state
    }

    pub fn prior_rcv_nxt(&self) -> u32 {
        self.prior_rcv_nxt
    }

    pub fn delayed_ack_reserved(&self) -> bool {
        self.delayed_ack_reserved
    }
}
