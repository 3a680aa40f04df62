//! Hub configuration.

use serde::{Deserialize, Serialize};

/// Sizes for a hub's channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Capacity of the hub's command mailbox.
    pub mailbox: usize,

    /// Capacity of each client's output queue. A client whose queue is
    /// full when a broadcast arrives is dropped.
    pub outbox_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            mailbox: 64,
            outbox_capacity: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hub_config_default() {
        let config = HubConfig::default();
        assert_eq!(config.outbox_capacity, 256);
        assert_eq!(config.mailbox, 64);
    }
}
