//! Relay configuration.

use std::time::Duration;

use flux_hub::HubConfig;
use flux_team::TeamConfig;
use serde::{Deserialize, Serialize};

/// Environment variable overriding [`RelayConfig::web_addr`].
pub const WEB_ADDR_VAR: &str = "FLUX_WEB_ADDR";

/// Environment variable overriding [`RelayConfig::game_addr`].
pub const GAME_ADDR_VAR: &str = "FLUX_GAME_ADDR";

/// Everything needed to start a relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Where browsers connect (WebSocket).
    pub web_addr: String,

    /// Where game clients connect (TCP, `$`-terminated records).
    pub game_addr: String,

    /// Capacity of the dispatcher's inbound packet queue.
    pub dispatch_queue: usize,

    /// How often connection and roster counts are logged.
    pub stats_interval: Duration,

    pub hub: HubConfig,

    pub team: TeamConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            web_addr: "0.0.0.0:8080".to_string(),
            game_addr: "0.0.0.0:8100".to_string(),
            dispatch_queue: 256,
            stats_interval: Duration::from_secs(60),
            hub: HubConfig::default(),
            team: TeamConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Defaults, with listen addresses taken from `FLUX_WEB_ADDR` and
    /// `FLUX_GAME_ADDR` when set.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|var| std::env::var(var).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(addr) = lookup(WEB_ADDR_VAR).filter(|a| !a.is_empty()) {
            self.web_addr = addr;
        }
        if let Some(addr) = lookup(GAME_ADDR_VAR).filter(|a| !a.is_empty()) {
            self.game_addr = addr;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_config_default() {
        let config = RelayConfig::default();
        assert_eq!(config.web_addr, "0.0.0.0:8080");
        assert_eq!(config.game_addr, "0.0.0.0:8100");
        assert_eq!(config.hub.outbox_capacity, 256);
        assert_eq!(config.team.badge_threshold, 8);
    }

    #[test]
    fn test_overrides_replace_only_what_is_set() {
        let config = RelayConfig::default().with_overrides(|var| {
            (var == GAME_ADDR_VAR).then(|| "127.0.0.1:9100".to_string())
        });
        assert_eq!(config.web_addr, "0.0.0.0:8080");
        assert_eq!(config.game_addr, "127.0.0.1:9100");
    }

    #[test]
    fn test_empty_override_is_ignored() {
        let config =
            RelayConfig::default().with_overrides(|_| Some(String::new()));
        assert_eq!(config.web_addr, "0.0.0.0:8080");
    }
}
