//! tests/common/harness.rs
use relentless_cc::congestion::{AckFlags, AckRound, Transport};
use relentless_cc::registry::FlowRegistry;
use std::sync::Once;
use std::time::Duration;

/// Initializes tracing for tests, ensuring it's only done once.
pub fn init_tracing() {
    static TRACING_INIT: Once = Once::new();
    TRACING_INIT.call_once(|| {
        let filter =
            std::env::var("RUST_LOG").unwrap_or_else(|_| "relentless_cc=debug".to_string());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .init();
    });
}

/// A simulated host connection driven one ACK round at a time.
#[derive(Debug, Clone)]
pub struct SimTransport {
    pub snd_una: u32,
    pub rcv_nxt: u32,
    pub mss: u32,
    pub in_flight: u32,
    pub total_retransmits: u32,
    pub ecn_echo_demand: bool,
    /// Receive cursors of the ACKs sent so far.
    pub acks_sent: Vec<u32>,
}

impl SimTransport {
    pub fn new() -> Self {
        Self {
            snd_una: 1000,
            rcv_nxt: 5000,
            mss: 1460,
            in_flight: 0,
            total_retransmits: 0,
            ecn_echo_demand: false,
            acks_sent: Vec::new(),
        }
    }

    pub fn ack_segments(&mut self, segments: u32) {
        self.snd_una = self.snd_una.wrapping_add(segments * self.mss);
    }
}

impl Transport for SimTransport {
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

    fn set_ecn_echo_demand(&mut self, demand: bool) {
        self.ecn_echo_demand = demand;
    }

    fn send_ack(&mut self) {
        self.acks_sent.push(self.rcv_nxt);
    }
}

/// Acknowledges one segment on `key` and runs a full notification round.
pub fn ack_round(
    registry: &FlowRegistry<u32>,
    key: u32,
    transport: &mut SimTransport,
    ecn_echo: bool,
    rtt: Duration,
) {
    transport.ack_segments(1);
    registry
        .on_ack_round(
            &key,
            transport,
            AckRound {
                flags: AckFlags {
                    ecn_echo,
                    window_update: false,
                },
                num_acked: 1,
                rtt: Some(rtt),
            },
        )
        .unwrap();
}
