//! Defines the pluggable congestion control interface.
//! 定义了可插拔的拥塞控制接口。
//!
//! The host transport drives a controller through three notification paths:
//! RTT samples, ACK arrivals and connection events. A congestion-avoidance
//! tick once per ACK-processing round turns the accumulated signals into the
//! effective window.

use std::time::Duration;

pub mod deadline;
pub mod ecn;
pub mod fixed;
pub mod recovery;
pub mod relentless;
pub mod rtt;
pub mod transport;

pub use relentless::{Relentless, RelentlessStats};
pub use transport::Transport;

/// Flag bits carried by an incoming acknowledgment.
///
/// 入站确认所携带的标志位。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AckFlags {
    /// The peer echoed a CE mark back to us.
    /// 对端回显了CE标记。
    pub ecn_echo: bool,
    /// The ACK only updated the advertised receive window.
    /// 该ACK仅更新了通告的接收窗口。
    pub window_update: bool,
}

/// Discrete connection events reported by the host.
///
/// 由宿主报告的离散连接事件。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CongestionEvent {
    /// A received segment carried a CE mark.
    CeObserved,
    /// A received segment carried no CE mark.
    NoCeObserved,
    /// The host scheduled a delayed ACK.
    DelayedAckScheduled,
    /// The host sent an ACK without delay.
    AckSentImmediately,
    /// Loss recovery (or a CWR episode) finished.
    RecoveryComplete,
    /// The first transmission after an idle period.
    TxStart,
    /// The host restarted the window after idle.
    CwndRestart,
    /// A retransmission timeout fired.
    Loss,
}

/// The inputs of one ACK-processing round, in the order a kernel TCP stack
/// feeds them to its congestion module.
///
/// 一个ACK处理轮次的输入。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AckRound {
    pub flags: AckFlags,
    /// Packets newly acknowledged in this round.
    pub num_acked: u32,
    /// RTT sample taken in this round, if any.
    pub rtt: Option<Duration>,
}

/// A trait for congestion control algorithms.
///
/// 拥塞控制算法的 trait。
pub trait CongestionControl: Send + 'static {
    /// Called with an RTT sample covering `num_acked` packets.
    ///
    /// 收到覆盖 `num_acked` 个包的RTT样本时调用。
    fn on_rtt_sample(&mut self, num_acked: u32, rtt: Duration);

    /// Called for every incoming acknowledgment.
    ///
    /// 每收到一个确认时调用。
    fn on_ack(&mut self, transport: &mut dyn Transport, flags: AckFlags);

    /// Called for lifecycle and ECN events.
    ///
    /// 生命周期和ECN事件发生时调用。
    fn on_event(&mut self, transport: &mut dyn Transport, event: CongestionEvent);

    /// The once-per-round congestion-avoidance tick.
    ///
    /// 每轮一次的拥塞避免处理。
    fn cong_avoid(&mut self, transport: &dyn Transport);

    /// The slow start threshold the host should install on entering loss
    /// recovery.
    fn ssthresh_on_loss(&self) -> u32;

    /// Gets the current congestion window size in packets.
    ///
    /// 获取当前的拥塞窗口大小（以包为单位）。
    fn congestion_window(&self) -> u32;

    /// Gets the current slow start threshold in packets.
    ///
    /// 获取当前的慢启动阈值（以包为单位）。
    fn slow_start_threshold(&self) -> u32;

    /// Runs one full ACK-processing round: the per-ACK path, the RTT-sample
    /// path when a sample was taken, then the congestion-avoidance tick.
    fn on_ack_round(&mut self, transport: &mut dyn Transport, round: AckRound) {
        self.on_ack(transport, round.flags);
        if let Some(rtt) = round.rtt {
            self.on_rtt_sample(round.num_acked, rtt);
        }
        self.cong_avoid(transport);
    }
}
