//! Withdrawal request data structures

use levelbank_core::{Amount, Principal, Timestamp};
use serde::{Deserialize, Serialize};

/// Status of a withdrawal request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum WithdrawalStatus {
    /// Awaiting admin review
    Pending,
    /// Approved; the amount has been debited
    Approved,
    /// Rejected by an admin; no balance effect
    Rejected { reason: String },
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Approved => "approved",
            WithdrawalStatus::Rejected { .. } => "rejected",
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, WithdrawalStatus::Pending)
    }
}

/// A member's request to withdraw funds to a bank account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    /// Monotonically increasing identifier, starting at 1
    pub id: u64,

    /// Requesting member
    pub user: Principal,

    pub amount: Amount,

    /// Opaque payout details (account number, IFSC, UPI id)
    pub bank_details: String,

    /// Creation time (ns)
    pub timestamp: Timestamp,

    pub status: WithdrawalStatus,

    /// When the request left `Pending` (ns)
    pub reviewed_at: Option<Timestamp>,
}

impl WithdrawalRequest {
    pub(crate) fn new(
        id: u64,
        user: Principal,
        amount: Amount,
        bank_details: String,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id,
            user,
            amount,
            bank_details,
            timestamp,
            status: WithdrawalStatus::Pending,
            reviewed_at: None,
        }
    }

    /// Reference recorded on the ledger debit
    pub fn reference(&self) -> String {
        format!("withdrawal:{}", self.id)
    }
}
