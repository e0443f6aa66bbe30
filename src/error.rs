//! 定义了库中所有可能的错误类型。
//! Defines all possible error types in the library.

use thiserror::Error;

/// The primary error type for the congestion control library.
/// 拥塞控制库的主要错误类型。
///
/// None of the per-packet notification paths return this type: bad input
/// there is treated as "no signal". Errors only surface at construction,
/// configuration and registry boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A configuration value is out of range.
    /// 配置值超出范围。
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A quota that scales with the path's base RTT was requested before any
    /// valid RTT sample arrived.
    ///
    /// 在收到任何有效RTT样本之前请求了依赖基础RTT的配额。
    #[error("no RTT baseline has been measured yet")]
    NoRttBaseline,

    /// A quota that scales with the window seen at the base RTT was requested
    /// before any such window was recorded.
    ///
    /// 在记录基础RTT下的窗口之前请求了依赖该窗口的配额。
    #[error("no window has been observed at the RTT baseline yet")]
    NoWindowBaseline,

    /// No flow is registered under the given connection key.
    /// 给定的连接键下没有注册流。
    #[error("flow {0} is not registered")]
    UnknownFlow(String),

    /// A flow is already registered under the given connection key.
    /// 给定的连接键下已经注册了流。
    #[error("flow {0} is already open")]
    FlowAlreadyOpen(String),
}

/// A specialized `Result` type for this library.
/// 本库专用的 `Result` 类型。
pub type Result<T> = std::result::Result<T, Error>;
