//! A table of per-connection congestion controllers.
//! 按连接标识索引的拥塞控制器表。
//!
//! Each flow's controller is owned by its entry. The entry lock is what
//! serializes a single flow's notification paths when the registry is shared
//! between tasks; different flows never contend beyond their shard.
//!
//! The registry is not re-entrant. A controller call runs with its shard
//! locked, so a `Transport` that calls back into the same registry from
//! inside it (for example from `send_ack`) can deadlock.

use crate::config::Config;
use crate::congestion::deadline::PriorityClass;
use crate::congestion::{
    AckFlags, AckRound, CongestionControl, CongestionEvent, Relentless, Transport,
};
use crate::error::{Error, Result};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;
use tracing::debug;

/// Congestion controllers keyed by connection identity.
///
/// 以连接标识为键的拥塞控制器集合。
#[derive(Debug)]
pub struct FlowRegistry<K, C = Relentless>
where
    K: Eq + Hash,
{
    config: Config,
    flows: DashMap<K, C>,
}

impl<K, C> FlowRegistry<K, C>
where
    K: Eq + Hash + Debug,
    C: CongestionControl,
{
    /// Creates an empty registry whose flows are built from `config`.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            flows: DashMap::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Registers an already constructed controller, returning the one it
    /// replaced.
    pub fn insert(&self, key: K, controller: C) -> Option<C> {
        self.flows.insert(key, controller)
    }

    /// Removes a flow when its connection is torn down.
    ///
    /// 连接拆除时移除对应的流。
    pub fn close(&self, key: &K) -> Option<C> {
        let removed = self.flows.remove(key).map(|(_, controller)| controller);
        if removed.is_some() {
            debug!(?key, "Flow closed");
        }
        removed
    }

    pub fn contains(&self, key: &K) -> bool {
        self.flows.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// Runs `f` with exclusive access to one flow's controller.
    ///
    /// `f` runs while the flow's shard is write-locked and must not touch
    /// this registry again.
    ///
    /// 以独占方式访问某个流的控制器并执行 `f`。`f` 执行期间不得再次访问本注册表。
    pub fn with_flow<T>(&self, key: &K, f: impl FnOnce(&mut C) -> T) -> Result<T> {
        let mut entry = self
            .flows
            .get_mut(key)
            .ok_or_else(|| Error::UnknownFlow(format!("{key:?}")))?;
        Ok(f(entry.value_mut()))
    }

    pub fn on_rtt_sample(&self, key: &K, num_acked: u32, rtt: Duration) -> Result<()> {
        self.with_flow(key, |cc| cc.on_rtt_sample(num_acked, rtt))
    }

    pub fn on_ack(&self, key: &K, transport: &mut dyn Transport, flags: AckFlags) -> Result<()> {
        self.with_flow(key, |cc| cc.on_ack(transport, flags))
    }

    pub fn on_event(
        &self,
        key: &K,
        transport: &mut dyn Transport,
        event: CongestionEvent,
    ) -> Result<()> {
        self.with_flow(key, |cc| cc.on_event(transport, event))
    }

    pub fn cong_avoid(&self, key: &K, transport: &dyn Transport) -> Result<()> {
        self.with_flow(key, |cc| cc.cong_avoid(transport))
    }

    pub fn on_ack_round(
        &self,
        key: &K,
        transport: &mut dyn Transport,
        round: AckRound,
    ) -> Result<()> {
        self.with_flow(key, |cc| cc.on_ack_round(transport, round))
    }

    pub fn congestion_window(&self, key: &K) -> Result<u32> {
        self.with_flow(key, |cc| cc.congestion_window())
    }

    pub fn slow_start_threshold(&self, key: &K) -> Result<u32> {
        self.with_flow(key, |cc| cc.slow_start_threshold())
    }
}

impl<K> FlowRegistry<K, Relentless>
where
    K: Eq + Hash + Debug,
{
    /// Creates, binds and registers a Relentless controller for a newly
    /// established connection. A key that is already open is left untouched.
    ///
    /// 为新建立的连接创建、绑定并注册一个 Relentless 控制器。
    pub fn open(
        &self,
        key: K,
        initial_window: u32,
        priority: Option<PriorityClass>,
        transport: &dyn Transport,
    ) -> Result<()> {
        let mut controller = Relentless::new(self.config.clone(), initial_window, priority)?;
        controller.bind(transport);
        match self.flows.entry(key) {
            Entry::Occupied(entry) => Err(Error::FlowAlreadyOpen(format!("{:?}", entry.key()))),
            Entry::Vacant(entry) => {
                debug!(key = ?entry.key(), initial_window, ?priority, "Flow opened");
                entry.insert(controller);
                Ok(())
            }
        }
    }
}

impl<K> Default for FlowRegistry<K, Relentless>
where
    K: Eq + Hash + Debug,
{
    fn default() -> Self {
        Self::new(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;

    #[test]
    fn test_open_and_close() {
        let registry: FlowRegistry<u64> = FlowRegistry::default();
        let tp = MockTransport::new();
        assert!(registry.is_empty());

        registry.open(7, 10, None, &tp).unwrap();
        assert!(registry.contains(&7));
        assert_eq!(registry.congestion_window(&7), Ok(10));
        assert_eq!(registry.slow_start_threshold(&7), Ok(u32::MAX));

        assert!(registry.close(&7).is_some());
        assert!(registry.close(&7).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_open_twice_keeps_live_flow() {
        let registry: FlowRegistry<u64> = FlowRegistry::default();
        let mut tp = MockTransport::new();
        registry.open(9, 10, None, &tp).unwrap();

        tp.ack_segments(1);
        registry
            .on_ack(
                &9,
                &mut tp,
                AckFlags {
                    ecn_echo: true,
                    window_update: false,
                },
            )
            .unwrap();

        assert_eq!(
            registry.open(9, 40, None, &tp),
            Err(Error::FlowAlreadyOpen("9".to_string()))
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.congestion_window(&9), Ok(10));
        assert_eq!(registry.slow_start_threshold(&9), Ok(10));
    }

    #[test]
    fn test_unknown_flow() {
        let registry: FlowRegistry<&'static str> = FlowRegistry::default();
        assert_eq!(
            registry.on_rtt_sample(&"missing", 1, Duration::from_millis(10)),
            Err(Error::UnknownFlow("\"missing\"".to_string()))
        );
    }

    #[test]
    fn test_open_rejects_invalid_config() {
        let mut config = Config::default();
        config.congestion_control.mark_threshold = 5000;
        let registry: FlowRegistry<u64> = FlowRegistry::new(config);
        assert!(registry.open(1, 10, None, &MockTransport::new()).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_flows_are_independent() {
        let registry: FlowRegistry<u64> = FlowRegistry::default();
        let mut tp = MockTransport::new();
        registry.open(1, 10, None, &tp).unwrap();
        registry.open(2, 10, None, &tp).unwrap();

        // An ECN echo on flow 1 exits slow start only there.
        tp.ack_segments(2);
        registry
            .on_ack(
                &1,
                &mut tp,
                AckFlags {
                    ecn_echo: true,
                    window_update: false,
                },
            )
            .unwrap();

        assert_eq!(registry.slow_start_threshold(&1), Ok(10));
        assert_eq!(registry.slow_start_threshold(&2), Ok(u32::MAX));
    }

    #[test]
    fn test_ack_round_through_registry() {
        let registry: FlowRegistry<u64> = FlowRegistry::default();
        let mut tp = MockTransport::new();
        registry.open(3, 10, None, &tp).unwrap();

        tp.ack_segments(1);
        tp.in_flight = 4;
        registry
            .on_ack_round(
                &3,
                &mut tp,
                AckRound {
                    flags: AckFlags::default(),
                    num_acked: 1,
                    rtt: Some(Duration::from_millis(20)),
                },
            )
            .unwrap();

        // Both targets grew by one packet in slow start: 10 -> 11.
        assert_eq!(registry.congestion_window(&3), Ok(11));
        let rtt_min = registry
            .with_flow(&3, |cc| cc.rtt_tracker().rtt_min())
            .unwrap();
        assert_eq!(rtt_min, Duration::from_millis(20));
    }
}
