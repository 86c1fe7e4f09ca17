//! Manager configuration.

use serde::{Deserialize, Serialize};

use super::settings::GameSettings;

/// Collection that holds one document per game.
pub const DEFAULT_COLLECTION: &str = "games";

/// Settings and store layout for a [`GameManager`](super::manager::GameManager).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Store collection for game documents.
    pub collection: String,

    /// Settings new games start from, and what is reported while no game
    /// is active.
    pub default_settings: GameSettings,

    /// Seed for game codes and digit shuffles. OS entropy when unset.
    pub seed: Option<u64>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            default_settings: GameSettings::default(),
            seed: None,
        }
    }
}

impl ManagerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    #[must_use]
    pub fn with_default_settings(mut self, settings: GameSettings) -> Self {
        self.default_settings = settings;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ManagerConfig::new();
        assert_eq!(config.collection, "games");
        assert_eq!(config.default_settings, GameSettings::default());
        assert_eq!(config.seed, None);
    }

    #[test]
    fn test_partial_deserialize() {
        let config: ManagerConfig =
            serde_json::from_value(serde_json::json!({"collection": "pools", "seed": 9})).unwrap();
        assert_eq!(config.collection, "pools");
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.default_settings, GameSettings::default());
    }
}
