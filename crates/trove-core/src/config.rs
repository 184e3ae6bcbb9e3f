//! Game configuration consumed by the reward rules.
//!
//! Loaded from JSON by the host application and validated once; the economy
//! only ever reads it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::streak::{ResetSchedule, ONE_DAY_MS};
use crate::types::ItemId;

/// A rarity tier and the items that belong to it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RarityConfig {
    /// Obtaining edition 1 of an item in this tier grants the bonus item.
    #[serde(default)]
    pub gives_special: bool,
    /// Bucks granted whenever an item of this tier is collected.
    #[serde(default)]
    pub bucks: i64,
    #[serde(default)]
    pub items: Vec<ItemId>,
}

/// An amount of one powerup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerupGrant {
    pub powerup_id: String,
    pub amount: i64,
}

impl PowerupGrant {
    pub fn new(powerup_id: impl Into<String>, amount: i64) -> Self {
        Self {
            powerup_id: powerup_id.into(),
            amount,
        }
    }
}

/// Everything the economy needs to know about the game.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameConfig {
    /// Rarity tiers keyed by name.
    #[serde(default)]
    pub rarities: HashMap<String, RarityConfig>,
    /// Item granted alongside the first edition of a "gives special" item.
    pub first_item_id: ItemId,
    /// Powerup consumed when boosts are activated.
    #[serde(default = "default_boost_powerup")]
    pub boost_powerup_id: String,
    /// Largest amount a single boost may add to the multiplier.
    #[serde(default = "default_boost_increment_max")]
    pub boost_increment_max: u64,
    #[serde(default = "default_one_day_ms")]
    pub one_day_ms: i64,
    #[serde(default)]
    pub reset: ResetSchedule,
    /// Granted once, on a user's first ever daily claim.
    #[serde(default = "default_first_claim_bonus")]
    pub first_claim_bonus: Vec<PowerupGrant>,
    /// Base multiplier of newly created users.
    #[serde(default = "default_starting_multiplier")]
    pub starting_multiplier: u64,
}

fn default_boost_powerup() -> String {
    "miracle".to_string()
}

fn default_boost_increment_max() -> u64 {
    50
}

fn default_one_day_ms() -> i64 {
    ONE_DAY_MS
}

fn default_first_claim_bonus() -> Vec<PowerupGrant> {
    vec![PowerupGrant::new("miracle", 5), PowerupGrant::new("gift", 1)]
}

fn default_starting_multiplier() -> u64 {
    1
}

impl GameConfig {
    /// A configuration with no rarity tiers and default constants.
    pub fn new(first_item_id: impl Into<ItemId>) -> Self {
        Self {
            rarities: HashMap::new(),
            first_item_id: first_item_id.into(),
            boost_powerup_id: default_boost_powerup(),
            boost_increment_max: default_boost_increment_max(),
            one_day_ms: default_one_day_ms(),
            reset: ResetSchedule::default(),
            first_claim_bonus: default_first_claim_bonus(),
            starting_multiplier: default_starting_multiplier(),
        }
    }

    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Add a rarity tier. Builder-style, mostly for tests and fixtures.
    pub fn with_rarity(mut self, name: impl Into<String>, rarity: RarityConfig) -> Self {
        self.rarities.insert(name.into(), rarity);
        self
    }

    /// Name and configuration of the tier containing `item`.
    pub fn rarity_of(&self, item: &ItemId) -> Option<(&str, &RarityConfig)> {
        self.rarities
            .iter()
            .find(|(_, rarity)| rarity.items.contains(item))
            .map(|(name, rarity)| (name.as_str(), rarity))
    }

    /// Whether edition 1 of `item` grants the bonus item.
    pub fn grants_bonus_on_first_edition(&self, item: &ItemId) -> bool {
        self.rarity_of(item)
            .is_some_and(|(_, rarity)| rarity.gives_special)
    }

    /// The most recent daily reset boundary.
    pub fn last_reset(&self, now: i64) -> i64 {
        self.reset.last_boundary(now)
    }

    /// Check invariants the reward rules depend on.
    ///
    /// A bonus item listed in the tiers must not itself grant a bonus, which
    /// is what bounds bonus chaining to a single level. A bonus item listed
    /// nowhere is accepted; grants then skip it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.one_day_ms <= 0 {
            return Err(ConfigError::NonPositive {
                field: "oneDayMs",
                value: self.one_day_ms,
            });
        }
        if self.boost_increment_max == 0 {
            return Err(ConfigError::NonPositive {
                field: "boostIncrementMax",
                value: 0,
            });
        }
        if !(0..self.one_day_ms).contains(&self.reset.offset_ms) {
            return Err(ConfigError::ResetOffsetOutOfRange(self.reset.offset_ms));
        }

        let mut seen: HashMap<&ItemId, &str> = HashMap::new();
        for (name, rarity) in &self.rarities {
            for item in &rarity.items {
                if let Some(first) = seen.insert(item, name) {
                    return Err(ConfigError::DuplicateItem {
                        item: item.to_string(),
                        first: first.to_string(),
                        second: name.clone(),
                    });
                }
            }
        }

        match self.rarity_of(&self.first_item_id) {
            Some((name, rarity)) if rarity.gives_special => Err(ConfigError::ChainedBonus {
                item: self.first_item_id.to_string(),
                rarity: name.to_string(),
            }),
            _ => Ok(()),
        }
    }
}
