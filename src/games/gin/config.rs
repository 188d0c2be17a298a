//! Gin rummy rule parameters.

use serde::{Deserialize, Serialize};

use super::card::DECK_SIZE;
use crate::cfr::config::ConfigError;

/// Rule parameters for one hand of gin rummy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GinConfig {
    /// Cards dealt to each player.
    pub hand_size: usize,
    /// Highest deadwood a player may knock with.
    pub knock_limit: u16,
    /// Bonus for knocking with zero deadwood.
    pub gin_bonus: u16,
    /// Bonus for the defender when the knocker does not have strictly less deadwood.
    pub undercut_bonus: u16,
    /// The hand is a draw once the stock is down to this many cards.
    pub stock_floor: usize,
    /// How many of the lowest-deadwood discards are offered as actions.
    pub discard_options: usize,
    /// Payoffs are divided by this.
    pub payoff_scale: f64,
}

impl Default for GinConfig {
    fn default() -> Self {
        Self {
            hand_size: 10,
            knock_limit: 10,
            gin_bonus: 25,
            undercut_bonus: 25,
            stock_floor: 2,
            discard_options: 3,
            payoff_scale: 1.0,
        }
    }
}

impl GinConfig {
    /// Validate the rule parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hand_size < 3 || 2 * self.hand_size + 1 + self.stock_floor >= DECK_SIZE {
            return Err(ConfigError::InvalidRule("hand_size", self.hand_size as i64));
        }
        if self.discard_options == 0 || self.discard_options > self.hand_size {
            return Err(ConfigError::InvalidRule("discard_options", self.discard_options as i64));
        }
        if !(self.payoff_scale.is_finite() && self.payoff_scale > 0.0) {
            return Err(ConfigError::InvalidRule("payoff_scale", self.payoff_scale as i64));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_are_valid() {
        assert!(GinConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_oversized_hands() {
        let config = GinConfig {
            hand_size: 25,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidRule("hand_size", 25)));

        let config = GinConfig {
            discard_options: 11,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
