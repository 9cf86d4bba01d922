//! 对局配置。所有字段都有默认值，JSON 里可以只写需要覆盖的部分。

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::game::DeckCensus;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GameConfig {
    pub initial_hand_size: usize,
    pub draw_count: usize,
    pub base_damage: i32,
    /// Slashes per turn for the current player; `None` means unlimited.
    pub slash_limit: Option<u32>,
    pub census: DeckCensus,
    pub seed: Option<u64>,
    /// Events kept in `GameState::event_log`. The events an operation returns
    /// are read back from this log, so an operation emitting more than this
    /// many events only reports the most recent `event_log_capacity` of them.
    pub event_log_capacity: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            initial_hand_size: 4,
            draw_count: 2,
            base_damage: 1,
            slash_limit: Some(1),
            census: DeckCensus::standard(),
            seed: None,
            event_log_capacity: 256,
        }
    }
}

impl GameConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = if json.trim().is_empty() {
            GameConfig::default()
        } else {
            serde_json::from_str(json)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_damage < 1 {
            return Err(ConfigError::InvalidValue {
                field: "base_damage",
                reason: format!("must be at least 1, got {}", self.base_damage),
            });
        }
        if self.event_log_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "event_log_capacity",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = GameConfig::from_json(r#"{"draw_count": 3, "seed": 9}"#)
            .expect("config should parse");
        assert_eq!(config.draw_count, 3);
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.initial_hand_size, 4);
        assert_eq!(config.slash_limit, Some(1));
        assert_eq!(config.census.total(), 70);
    }

    #[test]
    fn empty_input_is_default() {
        let config = GameConfig::from_json("  ").expect("empty config is allowed");
        assert_eq!(config, GameConfig::default());
    }

    #[test]
    fn rejects_bad_values() {
        let err = GameConfig::from_json(r#"{"base_damage": 0}"#).expect_err("zero damage");
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "base_damage",
                ..
            }
        ));
        assert!(matches!(
            GameConfig::from_json("{not json"),
            Err(ConfigError::Json(_))
        ));
    }
}
