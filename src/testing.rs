//! 测试辅助工具模块
//! Test utilities module

#![cfg(test)]

use crate::congestion::Transport;
use rand::RngCore;

/// An ACK the mock transport was asked to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentAck {
    pub rcv_nxt: u32,
    pub ecn_echo: bool,
}

/// A scripted host transport that records every ACK it sends.
///
/// Tests move its cursors and counters directly between notifications.
#[derive(Debug, Clone)]
pub struct MockTransport {
    pub snd_una: u32,
    pub rcv_nxt: u32,
    pub mss: u32,
    pub in_flight: u32,
    pub total_retransmits: u32,
    pub cwnd_limited: bool,
    pub ecn_echo_demand: bool,
    pub sent_acks: Vec<SentAck>,
}

impl MockTransport {
    pub const MSS: u32 = 1000;

    pub fn new() -> Self {
        Self {
            snd_una: 1,
            rcv_nxt: 1,
            mss: Self::MSS,
            in_flight: 0,
            total_retransmits: 0,
            cwnd_limited: true,
            ecn_echo_demand: false,
            sent_acks: Vec::new(),
        }
    }

    /// Advances the send cursor by `segments` full segments.
    pub fn ack_segments(&mut self, segments: u32) {
        self.snd_una = self.snd_una.wrapping_add(segments * self.mss);
    }

    /// Advances the receive cursor by `segments` full segments.
    pub fn receive_segments(&mut self, segments: u32) {
        self.rcv_nxt = self.rcv_nxt.wrapping_add(segments * self.mss);
    }
}

impl Transport for MockTransport {
    fn snd_una(&self) -> u32 {
        self.snd_una
    }

    fn rcv_nxt(&self) -> u32 {
        self.rcv_nxt
    }

    fn set_rcv_nxt(&mut self, rcv_nxt: u32) {
        self.rcv_nxt = rcv_nxt;
    }

    fn rcv_mss(&self) -> u32 {
        self.mss
    }

    fn packets_in_flight(&self) -> u32 {
        self.in_flight
    }

    fn total_retransmits(&self) -> u32 {
        self.total_retransmits
    }

    fn is_cwnd_limited(&self) -> bool {
        self.cwnd_limited
    }

    fn set_ecn_echo_demand(&mut self, demand: bool) {
        self.ecn_echo_demand = demand;
    }

    fn send_ack(&mut self) {
        self.sent_acks.push(SentAck {
            rcv_nxt: self.rcv_nxt,
            ecn_echo: self.ecn_echo_demand,
        });
    }
}

/// A generator that yields either all-zero or all-one bits, pinning uniform
/// draws to the bottom or the top of their range.
#[derive(Debug, Clone, Copy)]
pub struct FixedRng {
    pub high: bool,
}

impl FixedRng {
    pub fn low() -> Self {
        Self { high: false }
    }

    pub fn high() -> Self {
        Self { high: true }
    }
}

impl RngCore for FixedRng {
    fn next_u32(&mut self) -> u32 {
        if self.high { u32::MAX } else { 0 }
    }

    fn next_u64(&mut self) -> u64 {
        if self.high { u64::MAX } else { 0 }
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        dst.fill(if self.high { 0xff } else { 0 });
    }
}
