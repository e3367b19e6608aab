use std::time::Duration;

use crate::ledger::types::{Bps, RoomId};

/// Tunables for the lifecycle engine. Defaults carry the reference values;
/// `from_env` lets deployments override them without code changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Highest room id the registry scan visits.
    pub scan_ceiling: RoomId,
    /// Bound on concurrent outstanding ledger reads during scans.
    pub fetch_batch: usize,
    /// Completion watcher poll cadence.
    pub poll_interval: Duration,
    /// Completion watcher give-up bound.
    pub watch_timeout: Duration,
    /// Platform commission applied to the gross pool.
    pub commission_rate_bps: Bps,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scan_ceiling: 50,
            fetch_batch: 5,
            poll_interval: Duration::from_secs(5),
            watch_timeout: Duration::from_secs(120),
            commission_rate_bps: 1_000,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `ARENA_*` environment variables where present.
    /// Malformed values fall back to the default for that field.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            scan_ceiling: env_parse("ARENA_SCAN_CEILING").unwrap_or(defaults.scan_ceiling),
            fetch_batch: env_parse("ARENA_FETCH_BATCH").unwrap_or(defaults.fetch_batch),
            poll_interval: env_parse("ARENA_POLL_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            watch_timeout: env_parse("ARENA_WATCH_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.watch_timeout),
            commission_rate_bps: env_parse("ARENA_COMMISSION_BPS")
                .unwrap_or(defaults.commission_rate_bps),
        }
    }
}

fn env_parse<T: std::str::FromStr>(var: &str) -> Option<T> {
    std::env::var(var).ok().and_then(|raw| raw.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_values() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.scan_ceiling, 50);
        assert_eq!(cfg.fetch_batch, 5);
        assert_eq!(cfg.poll_interval, Duration::from_secs(5));
        assert_eq!(cfg.watch_timeout, Duration::from_secs(120));
        assert_eq!(cfg.commission_rate_bps, 1_000);
    }
}
