//! The host transport as seen by a congestion controller.
//! 拥塞控制器所见的宿主传输层。

/// The subset of connection state a controller reads from, and the few
/// actions it asks of, the host transport.
///
/// Sequence numbers are 32-bit and wrap; controllers only ever take wrapping
/// differences of them.
///
/// 控制器从宿主传输层读取的连接状态子集，以及它请求宿主执行的少量操作。
pub trait Transport {
    /// The oldest unacknowledged send sequence number.
    fn snd_una(&self) -> u32;

    /// The next receive sequence number the host expects.
    fn rcv_nxt(&self) -> u32;

    /// Overwrites the receive cursor. Only used to replay an ACK for an
    /// earlier cursor; callers always restore the previous value.
    fn set_rcv_nxt(&mut self, rcv_nxt: u32);

    /// The segment size estimated for the peer, in bytes.
    fn rcv_mss(&self) -> u32;

    /// Packets sent but neither acknowledged nor declared lost.
    fn packets_in_flight(&self) -> u32;

    /// Cumulative retransmissions over the life of the connection.
    fn total_retransmits(&self) -> u32;

    /// Whether the sender is currently limited by the congestion window
    /// rather than by the application.
    fn is_cwnd_limited(&self) -> bool {
        true
    }

    /// Sets whether outgoing ACKs should carry the ECN-Echo flag.
    fn set_ecn_echo_demand(&mut self, demand: bool);

    /// Sends an ACK immediately, reflecting the current receive cursor and
    /// ECN-Echo demand.
    fn send_ack(&mut self);
}
