//! Engine configuration.

use std::time::Duration;

use setsync_client::config::{clamp_timeout, DEFAULT_TIMEOUT_SECS};
use setsync_graph::Layout;

/// Default interval between background syncs.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Tunables for one engine instance.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Bound on every backend call. Expiry is a recoverable transport error.
    pub call_timeout: Duration,
    /// Interval between background syncs.
    pub poll_interval: Duration,
    /// Graph node arrangement.
    pub layout: Layout,
    /// Collapse pillars into aspect nodes when building the graph.
    pub extended_graph: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            poll_interval: DEFAULT_POLL_INTERVAL,
            layout: Layout::Radial,
            extended_graph: false,
        }
    }
}

impl EngineConfig {
    /// Set the call timeout in seconds, clamped to 10..=30.
    pub fn with_call_timeout_secs(mut self, secs: u64) -> Self {
        self.call_timeout = Duration::from_secs(clamp_timeout(secs));
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_layout(mut self, layout: Layout, extended: bool) -> Self {
        self.layout = layout;
        self.extended_graph = extended;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.call_timeout, Duration::from_secs(15));
        assert_eq!(cfg.poll_interval, Duration::from_secs(30));
        assert_eq!(cfg.layout, Layout::Radial);
        assert!(!cfg.extended_graph);
    }

    #[test]
    fn call_timeout_clamped() {
        let cfg = EngineConfig::default().with_call_timeout_secs(2);
        assert_eq!(cfg.call_timeout, Duration::from_secs(10));
        let cfg = EngineConfig::default().with_call_timeout_secs(45);
        assert_eq!(cfg.call_timeout, Duration::from_secs(30));
    }
}
