//! Engine configuration
//!
//! Every tunable has a serde default, so an empty JSON object is a valid
//! configuration. The admin phone allow-list can also be supplied through
//! the `LEVELBANK_ADMIN_PHONES` environment variable.

use levelbank_core::Amount;
use levelbank_referral::LevelTable;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Environment variable holding a comma-separated admin phone allow-list
pub const ADMIN_PHONES_ENV: &str = "LEVELBANK_ADMIN_PHONES";

const MAX_BPS: u32 = 10_000;

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Configuration for the platform engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Team-size thresholds and rewards; validated on deserialization
    #[serde(default)]
    pub level_table: LevelTable,

    /// Per-request withdrawal cap as a share of the current balance
    #[serde(default = "default_withdrawal_cap_bps")]
    pub withdrawal_cap_bps: u32,

    /// Commission paid on a submitted loan referral
    #[serde(default = "default_loan_commission_bps")]
    pub loan_commission_bps: u32,

    /// Payment at registration that marks a member active
    #[serde(default = "default_registration_fee")]
    pub registration_fee: Amount,

    /// Phone numbers whose holders may claim the admin role
    #[serde(default)]
    pub admin_phones: Vec<String>,
}

fn default_withdrawal_cap_bps() -> u32 {
    100 // 1%
}

fn default_loan_commission_bps() -> u32 {
    100 // 1%
}

fn default_registration_fee() -> Amount {
    Amount::new(100)
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            level_table: LevelTable::default(),
            withdrawal_cap_bps: default_withdrawal_cap_bps(),
            loan_commission_bps: default_loan_commission_bps(),
            registration_fee: default_registration_fee(),
            admin_phones: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Append admin phones from `LEVELBANK_ADMIN_PHONES`, if set
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(value) = std::env::var(ADMIN_PHONES_ENV) {
            self.add_admin_phones(&value);
        }
        self
    }

    /// Append a comma-separated list of phones, skipping blanks and duplicates
    pub fn add_admin_phones(&mut self, list: &str) {
        for phone in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if !self.admin_phones.iter().any(|p| p == phone) {
                self.admin_phones.push(phone.to_string());
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.withdrawal_cap_bps == 0 || self.withdrawal_cap_bps > MAX_BPS {
            return Err(ConfigError::Invalid(format!(
                "withdrawal_cap_bps must be in 1..={MAX_BPS}, got {}",
                self.withdrawal_cap_bps
            )));
        }
        if self.loan_commission_bps > MAX_BPS {
            return Err(ConfigError::Invalid(format!(
                "loan_commission_bps must be at most {MAX_BPS}, got {}",
                self.loan_commission_bps
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();

        assert_eq!(config.level_table.len(), 10);
        assert_eq!(config.withdrawal_cap_bps, 100);
        assert_eq!(config.loan_commission_bps, 100);
        assert_eq!(config.registration_fee, Amount::new(100));
        assert!(config.admin_phones.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_object_uses_defaults() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let json = r#"{
            "withdrawal_cap_bps": 500,
            "admin_phones": ["9876543210"],
            "level_table": [
                {"level": 1, "required_team_size": 2, "reward": 10},
                {"level": 2, "required_team_size": 5, "reward": 50}
            ]
        }"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.withdrawal_cap_bps, 500);
        assert_eq!(config.loan_commission_bps, 100);
        assert_eq!(config.level_table.len(), 2);
        assert_eq!(config.admin_phones, vec!["9876543210".to_string()]);
    }

    #[test]
    fn test_invalid_level_table_is_rejected() {
        let json = r#"{"level_table": [
            {"level": 1, "required_team_size": 10, "reward": 100},
            {"level": 2, "required_team_size": 5, "reward": 500}
        ]}"#;
        assert!(serde_json::from_str::<EngineConfig>(json).is_err());
    }

    #[test]
    fn test_validate_bps_bounds() {
        let config = EngineConfig {
            withdrawal_cap_bps: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = EngineConfig {
            loan_commission_bps: 10_001,
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_add_admin_phones() {
        let mut config = EngineConfig::default();
        config.add_admin_phones(" 111, ,222,111 ");
        assert_eq!(config.admin_phones, vec!["111".to_string(), "222".to_string()]);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"loan_commission_bps": 250}}"#).unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.loan_commission_bps, 250);

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        write!(bad, r#"{{"withdrawal_cap_bps": 20000}}"#).unwrap();
        assert!(matches!(
            EngineConfig::from_file(bad.path()),
            Err(ConfigError::Invalid(_))
        ));
    }
}
