//! An implementation of Relentless DCTCP, a per-ACK congestion controller that
//! fuses RTT inflation, ECN echoes and loss-recovery accounting.
//!
//! Rather than backing off by a congestion ratio once per RTT, the window
//! shrinks by a fixed fraction of a packet for every acknowledged packet that
//! carried a congestion signal. ECN marks are used where the network provides
//! them; an RTT threshold above the path's base RTT stands in where it does
//! not. Loss recovery ends at the pre-loss window minus the packets actually
//! lost, instead of at half of it.
//!
//! Relentless DCTCP 的实现：一个逐ACK的拥塞控制器，融合了RTT膨胀、ECN回显以及
//! 丢包恢复记账。

use crate::config::{Config, FusionMode};
use crate::congestion::deadline::{DeadlineScheduler, PriorityClass};
use crate::congestion::ecn::{CeState, EcnStateMachine};
use crate::congestion::fixed::{ScaledWindow, WIN_SCALE};
use crate::congestion::recovery::LossRecoveryPolicy;
use crate::congestion::rtt::RttTracker;
use crate::congestion::{AckFlags, CongestionControl, CongestionEvent, Transport};
use crate::error::Result;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

/// The state of the congestion controller.
/// 拥塞控制器的状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// The window is below the slow start threshold.
    SlowStart,
    /// The window has reached the slow start threshold.
    CongestionAvoidance,
}

/// A Relentless DCTCP congestion controller for one flow.
///
/// `R` is the random source behind deadline-aware backoff suppression.
///
/// 单个流的 Relentless DCTCP 拥塞控制器。
#[derive(Debug)]
pub struct Relentless<R = SmallRng> {
    pub(super) congestion_window: u32,

    pub(super) slow_start_threshold: u32,

    pub(super) rtt: RttTracker,

    pub(super) ecn: EcnStateMachine,

    pub(super) recovery: LossRecoveryPolicy,

    /// Target window driven by RTT inflation.
    pub(super) rtt_window: ScaledWindow,

    /// Target window driven by ECN echoes.
    pub(super) ecn_window: ScaledWindow,

    /// Scaled units owed to `ecn_window` in congestion avoidance, carried
    /// until they add up to at least one unit per packet of window.
    ecn_growth_credit: u32,

    /// Send-acknowledged cursor seen by the last per-ACK call.
    prior_snd_una: u32,

    /// Largest window observed while the RTT sat at its baseline.
    pub(super) maxw_at_rtt_min: u32,

    pub(super) deadline: Option<DeadlineScheduler>,

    config: Config,

    rng: R,
}

impl Relentless<SmallRng> {
    /// Creates a controller with `initial_window` packets, seeding its random
    /// source from the thread-local generator.
    ///
    /// 创建一个初始窗口为 `initial_window` 个包的控制器。
    pub fn new(
        config: Config,
        initial_window: u32,
        priority: Option<PriorityClass>,
    ) -> Result<Self> {
        Self::with_rng(
            config,
            initial_window,
            priority,
            SmallRng::from_rng(&mut rand::rng()),
        )
    }
}

impl<R: Rng> Relentless<R> {
    /// Creates a controller that draws backoff decisions from `rng`.
    ///
    /// 创建一个使用 `rng` 作为随机源的控制器。
    pub fn with_rng(
        config: Config,
        initial_window: u32,
        priority: Option<PriorityClass>,
        rng: R,
    ) -> Result<Self> {
        config.validate()?;

        let cc = &config.congestion_control;
        let initial_ssthresh = cc.initial_ssthresh;
        let rtt = RttTracker::new(cc.mark_threshold, cc.slowstart_rtt_observations_needed);
        let deadline = config.deadline.enabled.then(|| {
            let mut scheduler = DeadlineScheduler::new(priority.unwrap_or_default());
            scheduler.maybe_refresh(Instant::now(), &config.deadline, 0, &rtt);
            scheduler
        });

        let window = ScaledWindow::from_packets(initial_window);
        debug!(
            cwnd = initial_window,
            fusion = ?cc.fusion_mode,
            deadline_aware = deadline.is_some(),
            "Relentless controller initialised"
        );

        Ok(Self {
            congestion_window: initial_window,
            slow_start_threshold: initial_ssthresh,
            rtt,
            ecn: EcnStateMachine::default(),
            recovery: LossRecoveryPolicy::default(),
            rtt_window: window,
            ecn_window: window,
            ecn_growth_credit: 0,
            prior_snd_una: 0,
            maxw_at_rtt_min: 0,
            deadline,
            config,
            rng,
        })
    }

    /// Anchors the per-ACK byte accounting and the CE echo replay to the
    /// host's current sequence cursors. Call once the connection's sequence
    /// space is known.
    ///
    /// 将逐ACK字节统计和CE回显重放锚定到宿主当前的序列号游标。
    pub fn bind(&mut self, transport: &dyn Transport) {
        self.prior_snd_una = transport.snd_una();
        self.ecn.bind(transport.rcv_nxt());
    }

    pub fn state(&self) -> State {
        if self.in_slow_start() {
            State::SlowStart
        } else {
            State::CongestionAvoidance
        }
    }

    fn in_slow_start(&self) -> bool {
        self.congestion_window < self.slow_start_threshold
    }

    /// Ends slow start at the current window.
    fn exit_slow_start(&mut self, signal: &'static str) {
        if self.in_slow_start() {
            self.slow_start_threshold = self.congestion_window;
            debug!(
                cwnd = self.congestion_window,
                signal, "Slow start exited on congestion signal"
            );
        }
    }

    /// Handles an RTT sample covering `num_acked` packets.
    ///
    /// 处理覆盖 `num_acked` 个包的RTT样本。
    pub fn on_rtt_sample(&mut self, num_acked: u32, rtt: Duration) {
        if !self.rtt.on_sample(rtt) {
            return;
        }

        let now = Instant::now();
        let in_slow_start = self.in_slow_start();
        if let Some(scheduler) = self.deadline.as_mut() {
            scheduler.maybe_refresh(now, &self.config.deadline, self.maxw_at_rtt_min, &self.rtt);
            if !in_slow_start {
                scheduler.consume(num_acked);
            }
        }

        if self.rtt.is_congested(rtt) {
            if !self.rtt.baseline_established() {
                trace!(
                    rtt_us = rtt.as_micros(),
                    observations = self.rtt.observations(),
                    "RTT above threshold before baseline, ignored"
                );
                return;
            }
            if !self.should_back_off(now) {
                return;
            }

            let decrement = num_acked
                .saturating_mul(self.config.congestion_control.rtt_decrement_per_packet);
            self.rtt_window.shrink(decrement);
            self.exit_slow_start("rtt");
            debug!(
                rtt_us = rtt.as_micros(),
                rtt_thresh_us = self.rtt.rtt_thresh().as_micros(),
                rtt_window = self.rtt_window.raw(),
                "RTT backoff"
            );
        } else {
            self.rtt_window.grow(WIN_SCALE);
            self.maxw_at_rtt_min = self.maxw_at_rtt_min.max(self.congestion_window);
            trace!(rtt_window = self.rtt_window.raw(), "RTT window grown");
        }
    }

    /// Backoff is only ever suppressed in congestion avoidance, and only by
    /// the deadline scheduler.
    fn should_back_off(&mut self, now: Instant) -> bool {
        if self.in_slow_start() {
            return true;
        }
        match self.deadline.as_ref() {
            Some(scheduler) => {
                scheduler.should_back_off(now, self.congestion_window, &self.rtt, &mut self.rng)
            }
            None => true,
        }
    }

    /// Handles an incoming acknowledgment.
    ///
    /// 处理入站确认。
    pub fn on_ack(&mut self, transport: &mut dyn Transport, flags: AckFlags) {
        let mss = transport.rcv_mss();
        let snd_una = transport.snd_una();

        // A duplicate ACK counts as one segment; a pure window update as nothing.
        let mut acked_bytes = snd_una.wrapping_sub(self.prior_snd_una);
        if acked_bytes == 0 && !flags.window_update {
            acked_bytes = mss;
        }
        if acked_bytes != 0 {
            self.prior_snd_una = snd_una;
        }

        if !flags.ecn_echo {
            let increment = if self.in_slow_start() {
                WIN_SCALE
            } else {
                self.congestion_avoidance_increment()
            };
            self.ecn_window.grow(increment);
            trace!(ecn_window = self.ecn_window.raw(), "ECN window grown");
            return;
        }

        self.exit_slow_start("ecn");

        let segments = acked_bytes.checked_div(mss).unwrap_or(0);
        let decrement =
            segments.saturating_mul(self.config.congestion_control.ecn_decrement_per_segment);
        self.ecn_window.shrink(decrement);
        debug!(
            acked_bytes,
            segments,
            ecn_window = self.ecn_window.raw(),
            "ECN backoff"
        );
    }

    /// One packet of growth per window of clean ACKs. The remainder of each
    /// division is carried so large windows still grow.
    fn congestion_avoidance_increment(&mut self) -> u32 {
        let cwnd = self.congestion_window.max(1);
        let credit = self.ecn_growth_credit.saturating_add(WIN_SCALE);
        self.ecn_growth_credit = credit % cwnd;
        credit / cwnd
    }

    /// Handles a connection event.
    ///
    /// 处理连接事件。
    pub fn on_event(&mut self, transport: &mut dyn Transport, event: CongestionEvent) {
        match event {
            CongestionEvent::CeObserved => {
                self.ecn.observe(transport, CeState::Ce);
            }
            CongestionEvent::NoCeObserved => {
                self.ecn.observe(transport, CeState::NoCe);
            }
            CongestionEvent::DelayedAckScheduled => self.ecn.on_delayed_ack_scheduled(),
            CongestionEvent::AckSentImmediately => self.ecn.on_ack_sent_immediately(),
            CongestionEvent::RecoveryComplete => {
                let total_retransmits = transport.total_retransmits();
                self.slow_start_threshold = self.recovery.restored_ssthresh(total_retransmits);
                debug!(
                    ssthresh = self.slow_start_threshold,
                    cwnd_at_recovery_start = self.recovery.cwnd_at_recovery_start(),
                    total_retransmits,
                    "Recovery complete, ssthresh restored"
                );
            }
            CongestionEvent::TxStart | CongestionEvent::CwndRestart | CongestionEvent::Loss => {}
        }
    }

    /// The effective window selected by the fusion mode, in packets.
    pub fn fused_window(&self) -> u32 {
        let window = match self.config.congestion_control.fusion_mode {
            FusionMode::RttOnly => self.rtt_window,
            FusionMode::EcnOnly => self.ecn_window,
            FusionMode::Combined => self.rtt_window.min(self.ecn_window),
        };
        window.packets()
    }

    /// The congestion-avoidance tick, once per ACK-processing round.
    ///
    /// The window never drops below the packets in flight, which defeats any
    /// policy-based reduction the host may have applied.
    ///
    /// 每个ACK处理轮次一次的拥塞避免处理。窗口永远不会低于在途包数。
    pub fn cong_avoid(&mut self, transport: &dyn Transport) {
        let in_flight = transport.packets_in_flight();
        self.congestion_window = self.congestion_window.max(in_flight);

        if transport.is_cwnd_limited() {
            let fused = self.fused_window();
            if fused < self.congestion_window {
                self.slow_start_threshold = fused;
            }
            let target = if self.in_slow_start() {
                fused.min(self.slow_start_threshold)
            } else {
                fused
            };
            self.congestion_window = target.max(in_flight);
        }

        self.recovery
            .record(self.congestion_window, transport.total_retransmits());
        trace!(
            cwnd = self.congestion_window,
            ssthresh = self.slow_start_threshold,
            in_flight,
            "Congestion avoidance tick"
        );
    }

    pub fn ssthresh_on_loss(&self) -> u32 {
        LossRecoveryPolicy::ssthresh_on_loss(self.congestion_window)
    }

    pub fn congestion_window(&self) -> u32 {
        self.congestion_window
    }

    pub fn slow_start_threshold(&self) -> u32 {
        self.slow_start_threshold
    }

    pub fn rtt_window(&self) -> ScaledWindow {
        self.rtt_window
    }

    pub fn ecn_window(&self) -> ScaledWindow {
        self.ecn_window
    }

    pub fn rtt_tracker(&self) -> &RttTracker {
        &self.rtt
    }

    pub fn ecn_state(&self) -> &EcnStateMachine {
        &self.ecn
    }

    pub fn deadline_scheduler(&self) -> Option<&DeadlineScheduler> {
        self.deadline.as_ref()
    }

    pub fn cwnd_at_recovery_start(&self) -> u32 {
        self.recovery.cwnd_at_recovery_start()
    }

    pub fn maxw_at_rtt_min(&self) -> u32 {
        self.maxw_at_rtt_min
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Gets a snapshot of the controller for logging.
    ///
    /// 获取控制器的快照用于日志记录。
    pub fn stats(&self) -> RelentlessStats {
        RelentlessStats {
            congestion_window: self.congestion_window,
            slow_start_threshold: self.slow_start_threshold,
            state: self.state(),
            rtt_window: self.rtt_window.raw(),
            ecn_window: self.ecn_window.raw(),
            rtt_min: self.rtt.has_baseline().then(|| self.rtt.rtt_min()),
            ce_state: self.ecn.ce_state(),
            packets_left: self.deadline.as_ref().map(DeadlineScheduler::packets_left),
        }
    }
}

impl<R: Rng + Send + 'static> CongestionControl for Relentless<R> {
    fn on_rtt_sample(&mut self, num_acked: u32, rtt: Duration) {
        Relentless::on_rtt_sample(self, num_acked, rtt);
    }

    fn on_ack(&mut self, transport: &mut dyn Transport, flags: AckFlags) {
        Relentless::on_ack(self, transport, flags);
    }

    fn on_event(&mut self, transport: &mut dyn Transport, event: CongestionEvent) {
        Relentless::on_event(self, transport, event);
    }

    fn cong_avoid(&mut self, transport: &dyn Transport) {
        Relentless::cong_avoid(self, transport);
    }

    fn ssthresh_on_loss(&self) -> u32 {
        Relentless::ssthresh_on_loss(self)
    }

    fn congestion_window(&self) -> u32 {
        self.congestion_window
    }

    fn slow_start_threshold(&self) -> u32 {
        self.slow_start_threshold
    }
}

/// Relentless congestion control statistics.
/// Relentless 拥塞控制统计信息。
#[derive(Debug, Clone)]
pub struct RelentlessStats {
    pub congestion_window: u32,
    pub slow_start_threshold: u32,
    pub state: State,
    pub rtt_window: u32,
    pub ecn_window: u32,
    pub rtt_min: Option<Duration>,
    pub ce_state: CeState,
    pub packets_left: Option<u32>,
}

impl fmt::Display for RelentlessStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Relentless[cwnd:{}, ssthresh:{}, state:{:?}, rtt_win:{}, ecn_win:{}, ce:{:?}",
            self.congestion_window,
            self.slow_start_threshold,
            self.state,
            self.rtt_window,
            self.ecn_window,
            self.ce_state,
        )?;
        if let Some(rtt_min) = self.rtt_min {
            write!(f, ", rtt_min:{:.1}ms", rtt_min.as_secs_f64() * 1000.0)?;
        }
        if let Some(packets_left) = self.packets_left {
            write!(f, ", quota:{packets_left}")?;
        }
        write!(f, "]")
    }
}
