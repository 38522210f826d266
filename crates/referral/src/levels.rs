//! Level table: team-size thresholds and one-time rewards

use levelbank_core::Amount;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on table size (reward flags are a `u16` bitfield)
pub const MAX_LEVELS: usize = 16;

/// Errors from validating a level table
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LevelTableError {
    #[error("Level table is empty")]
    Empty,

    #[error("Level table has {0} entries (max {MAX_LEVELS})")]
    TooManyLevels(usize),

    #[error("Levels must be numbered 1..=n in order: expected {expected}, got {actual}")]
    BadNumbering { expected: u8, actual: u8 },

    #[error("Team size for level {0} must be greater than the previous level's")]
    TeamSizeNotIncreasing(u8),

    #[error("Reward for level {0} must be greater than the previous level's")]
    RewardNotIncreasing(u8),

    #[error("Reward for level {0} must be positive")]
    ZeroReward(u8),
}

/// One row of the level table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelConfig {
    pub level: u8,
    pub required_team_size: u64,
    pub reward: Amount,
}

impl LevelConfig {
    pub const fn new(level: u8, required_team_size: u64, reward: u64) -> Self {
        Self {
            level,
            required_team_size,
            reward: Amount::new(reward),
        }
    }
}

/// Validated, immutable level table
///
/// Team sizes and rewards are strictly increasing, levels are numbered
/// from 1 without gaps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<LevelConfig>", into = "Vec<LevelConfig>")]
pub struct LevelTable {
    entries: Vec<LevelConfig>,
}

impl LevelTable {
    pub fn new(entries: Vec<LevelConfig>) -> Result<Self, LevelTableError> {
        if entries.is_empty() {
            return Err(LevelTableError::Empty);
        }
        if entries.len() > MAX_LEVELS {
            return Err(LevelTableError::TooManyLevels(entries.len()));
        }

        for (i, entry) in entries.iter().enumerate() {
            let expected = i as u8 + 1;
            if entry.level != expected {
                return Err(LevelTableError::BadNumbering {
                    expected,
                    actual: entry.level,
                });
            }
            if entry.reward.is_zero() {
                return Err(LevelTableError::ZeroReward(entry.level));
            }
            if let Some(prev) = i.checked_sub(1).map(|p| &entries[p]) {
                if entry.required_team_size <= prev.required_team_size {
                    return Err(LevelTableError::TeamSizeNotIncreasing(entry.level));
                }
                if entry.reward <= prev.reward {
                    return Err(LevelTableError::RewardNotIncreasing(entry.level));
                }
            }
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[LevelConfig] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, level: u8) -> Option<&LevelConfig> {
        level
            .checked_sub(1)
            .and_then(|i| self.entries.get(i as usize))
    }

    /// Entries unlocked by a downline of `team_size`
    pub fn qualifying(&self, team_size: u64) -> impl Iterator<Item = &LevelConfig> {
        self.entries
            .iter()
            .take_while(move |e| e.required_team_size <= team_size)
    }

    /// Highest level unlocked by `team_size`; members start at level 1.
    pub fn level_for(&self, team_size: u64) -> u8 {
        self.qualifying(team_size)
            .last()
            .map(|e| e.level)
            .unwrap_or(1)
    }

    /// Sum of every reward in the table
    pub fn total_rewards(&self) -> Amount {
        Amount::new(self.entries.iter().map(|e| e.reward.value()).sum())
    }
}

impl Default for LevelTable {
    fn default() -> Self {
        Self {
            entries: vec![
                LevelConfig::new(1, 10, 100),
                LevelConfig::new(2, 20, 500),
                LevelConfig::new(3, 40, 1_000),
                LevelConfig::new(4, 80, 2_500),
                LevelConfig::new(5, 160, 3_500),
                LevelConfig::new(6, 320, 4_500),
                LevelConfig::new(7, 640, 7_000),
                LevelConfig::new(8, 1_280, 10_000),
                LevelConfig::new(9, 2_560, 15_000),
                LevelConfig::new(10, 5_120, 25_000),
            ],
        }
    }
}

impl TryFrom<Vec<LevelConfig>> for LevelTable {
    type Error = LevelTableError;

    fn try_from(entries: Vec<LevelConfig>) -> Result<Self, Self::Error> {
        Self::new(entries)
    }
}

impl From<LevelTable> for Vec<LevelConfig> {
    fn from(table: LevelTable) -> Self {
        table.entries
    }
}
