//! Member account state held by the ledger

use crate::entry::{CreditKind, DebitKind};
use levelbank_core::Amount;
use serde::{Deserialize, Serialize};

/// Balance and lifetime totals of one member
///
/// Only the ledger mutates this; everything else sees snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub balance: Amount,
    pub total_deposits: Amount,
    pub total_level_income: Amount,
    pub total_loan_commission: Amount,
    pub total_withdrawn: Amount,
}

impl Account {
    /// Level income plus loan commissions (deposits are not earnings)
    pub fn total_earnings(&self) -> Amount {
        Amount::new(
            self.total_level_income
                .value()
                .saturating_add(self.total_loan_commission.value()),
        )
    }

    pub(crate) fn record_credit(&mut self, amount: Amount, kind: CreditKind) {
        let total = match kind {
            CreditKind::Deposit => &mut self.total_deposits,
            CreditKind::LevelReward => &mut self.total_level_income,
            CreditKind::LoanCommission => &mut self.total_loan_commission,
        };
        *total = Amount::new(total.value().saturating_add(amount.value()));
    }

    pub(crate) fn record_debit(&mut self, amount: Amount, kind: DebitKind) {
        match kind {
            DebitKind::Withdrawal => {
                self.total_withdrawn =
                    Amount::new(self.total_withdrawn.value().saturating_add(amount.value()));
            }
        }
    }
}
