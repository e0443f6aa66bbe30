//! 定义了拥塞控制引擎的可配置参数。
//! Defines configurable parameters for the congestion control engine.
//!
//! All values are read-only once a flow has been constructed from them.

use crate::congestion::deadline::QuotaTable;
use crate::error::{Error, Result};

/// Denominator of the RTT marking threshold. `mark_threshold` is expressed in
/// 1/1024ths of the base RTT.
pub const MAX_MARK: u32 = 1024;

/// A structure containing all configurable parameters of the engine.
///
/// 包含引擎所有可配置参数的结构体。
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Window control parameters.
    /// 窗口控制参数。
    pub congestion_control: CongestionControlConfig,

    /// Deadline-aware backoff suppression parameters.
    /// 截止时间感知的退避抑制参数。
    pub deadline: DeadlineConfig,
}

/// Which congestion signals feed the effective window.
///
/// 哪些拥塞信号参与计算有效窗口。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FusionMode {
    /// Only RTT inflation.
    RttOnly,
    /// Only ECN echoes.
    EcnOnly,
    /// The smaller of the two target windows.
    #[default]
    Combined,
}

impl TryFrom<u32> for FusionMode {
    type Error = Error;

    /// Maps the numeric detection knob used by kernel-module style hosts
    /// (0 = RTT, 1 = ECN, 2 = both).
    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(FusionMode::RttOnly),
            1 => Ok(FusionMode::EcnOnly),
            2 => Ok(FusionMode::Combined),
            other => Err(Error::InvalidConfig(format!(
                "fusion mode must be 0, 1 or 2, got {other}"
            ))),
        }
    }
}

/// Window control parameters.
///
/// 窗口控制参数。
#[derive(Debug, Clone)]
pub struct CongestionControlConfig {
    /// The initial slow start threshold in packets.
    /// 初始慢启动阈值（以包为单位）。
    pub initial_ssthresh: u32,
    /// RTT samples above `rtt_min + rtt_min * mark_threshold / 1024` count as
    /// congestion marks. The default of 174 mirrors a DCTCP marking threshold
    /// of roughly 0.17 BDP.
    ///
    /// 超过 `rtt_min + rtt_min * mark_threshold / 1024` 的RTT样本被视为拥塞标记。
    pub mark_threshold: u32,
    /// Number of valid RTT samples that must be seen before RTT inflation is
    /// allowed to shrink the window.
    ///
    /// 在RTT膨胀被允许缩小窗口之前必须观察到的有效RTT样本数。
    pub slowstart_rtt_observations_needed: u32,
    /// Which signals are fused into the effective window.
    /// 哪些信号融合为有效窗口。
    pub fusion_mode: FusionMode,
    /// Scaled-window units removed from the RTT target per acked packet while
    /// the path is congested. 64 is 1/16 of a packet.
    pub rtt_decrement_per_packet: u32,
    /// Scaled-window units removed from the ECN target per fully acked segment
    /// carrying an ECN echo. 512 is half a packet.
    pub ecn_decrement_per_segment: u32,
}

/// Deadline-aware backoff suppression parameters.
///
/// 截止时间感知的退避抑制参数。
#[derive(Debug, Clone)]
pub struct DeadlineConfig {
    /// Enables the deadline scheduler.
    /// 启用截止时间调度器。
    pub enabled: bool,
    /// Length of a utilization-bound class's quota period, in base RTTs.
    /// 利用率上界类别的配额周期长度（以基础RTT计）。
    pub utilization_period_rtts: u32,
    /// Per-class `(period, packets)` allowances for the fixed classes.
    /// 固定类别的每类 `(周期, 包数)` 配额。
    pub quotas: QuotaTable,
}

impl Config {
    /// Checks that every value is within the range the engine can honour.
    ///
    /// 检查所有值是否在引擎可接受的范围内。
    pub fn validate(&self) -> Result<()> {
        let cc = &self.congestion_control;
        if cc.mark_threshold > MAX_MARK {
            return Err(Error::InvalidConfig(format!(
                "mark_threshold {} exceeds {MAX_MARK}",
                cc.mark_threshold
            )));
        }
        if self.deadline.utilization_period_rtts == 0 {
            return Err(Error::InvalidConfig(
                "utilization_period_rtts must be non-zero".to_string(),
            ));
        }
        for (class, quota) in self.deadline.quotas.iter() {
            if quota.period.is_zero() {
                return Err(Error::InvalidConfig(format!(
                    "quota period for {class:?} is zero"
                )));
            }
        }
        Ok(())
    }
}

impl Default for CongestionControlConfig {
    fn default() -> Self {
        Self {
            initial_ssthresh: u32::MAX,
            mark_threshold: 174,
            slowstart_rtt_observations_needed: 10,
            fusion_mode: FusionMode::Combined,
            rtt_decrement_per_packet: 64,
            ecn_decrement_per_segment: 512,
        }
    }
}

impl Default for DeadlineConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            utilization_period_rtts: 64,
            quotas: QuotaTable::default(),
        }
    }
}
