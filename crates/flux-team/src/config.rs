//! Team engine configuration.

use std::time::Duration;

use flux_protocol::Color;
use serde::{Deserialize, Serialize};

/// Colors handed to new teams, in round-robin order.
pub const PALETTE: [Color; 4] = [Color::RED, Color::GREEN, Color::BLUE, Color::WHITE];

/// Configuration for the team engine and its periodic passes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamConfig {
    /// Team size at which every member earns the population badge.
    pub badge_threshold: usize,

    /// A user whose last heartbeat is older than this is evicted.
    pub presence_window: Duration,

    /// How often the presence sweep runs.
    pub sweep_interval: Duration,

    /// How often shot counters are checked for badges.
    pub analytics_interval: Duration,

    /// Capacity of the engine's command mailbox.
    pub mailbox: usize,
}

impl Default for TeamConfig {
    fn default() -> Self {
        Self {
            badge_threshold: 8,
            presence_window: Duration::from_secs(10),
            sweep_interval: Duration::from_secs(5),
            analytics_interval: Duration::from_secs(30),
            mailbox: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_config_default() {
        let config = TeamConfig::default();
        assert_eq!(config.badge_threshold, 8);
        assert_eq!(config.presence_window, Duration::from_secs(10));
        assert_eq!(config.sweep_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_palette_has_four_distinct_colors() {
        for (i, a) in PALETTE.iter().enumerate() {
            for b in &PALETTE[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
