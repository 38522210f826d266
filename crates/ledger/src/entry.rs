//! Journal entries and the movements they record

use levelbank_core::{Amount, Principal, Timestamp};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Why a balance went up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CreditKind {
    /// Member-declared deposit (payment reconciled out-of-band)
    Deposit,
    /// One-time reward for reaching a level
    LevelReward,
    /// Commission for a submitted loan referral
    LoanCommission,
}

/// Why a balance went down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DebitKind {
    /// Approved withdrawal request
    Withdrawal,
}

/// Direction and reason of a balance change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Movement {
    Credit(CreditKind),
    Debit(DebitKind),
}

impl Movement {
    pub fn is_credit(&self) -> bool {
        matches!(self, Movement::Credit(_))
    }

    /// Stable label used in hashes and logs
    pub fn label(&self) -> String {
        match self {
            Movement::Credit(kind) => format!("credit:{kind}"),
            Movement::Debit(kind) => format!("debit:{kind}"),
        }
    }
}

/// One credit inside a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditPosting {
    pub amount: Amount,
    pub kind: CreditKind,
    /// Business reference, e.g. `level:3` or `loan-referral:12`
    pub reference: Option<String>,
}

impl CreditPosting {
    pub fn new(amount: Amount, kind: CreditKind) -> Self {
        Self {
            amount,
            kind,
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// Audit record of a single committed balance change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Position in the journal, starting at 1
    pub sequence: u64,
    /// Hash of the previous entry (`GENESIS` for the first)
    pub prev_hash: String,
    /// SHA-256 over every other field
    pub hash: String,
    /// Commit time (ns)
    pub timestamp: Timestamp,
    pub user: Principal,
    pub movement: Movement,
    pub amount: Amount,
    /// Member balance right after this change
    pub balance_after: Amount,
    pub reference: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_strings() {
        assert_eq!(CreditKind::LevelReward.to_string(), "level_reward");
        assert_eq!("loan_commission".parse::<CreditKind>().unwrap(), CreditKind::LoanCommission);
        assert_eq!(
            Movement::Debit(DebitKind::Withdrawal).label(),
            "debit:withdrawal"
        );
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        assert_eq!(
            "bonus".parse::<CreditKind>(),
            Err(strum::ParseError::VariantNotFound)
        );
        assert!("Withdrawal".parse::<DebitKind>().is_err());
    }

    #[test]
    fn test_movement_serde() {
        let json = serde_json::to_string(&Movement::Credit(CreditKind::Deposit)).unwrap();
        assert_eq!(json, r#"{"credit":"deposit"}"#);
    }
}
