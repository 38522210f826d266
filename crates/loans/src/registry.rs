//! Append-only loan referral records

use levelbank_core::{now_nanos, Amount, EngineError, EngineResult, Principal, Timestamp};
use levelbank_ledger::{CreditKind, Ledger};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Borrower details supplied by the referrer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanReferralSubmission {
    pub borrower_name: String,
    pub phone_number: String,
    pub loan_amount: Amount,
    #[serde(default)]
    pub notes: String,
}

/// Immutable record of a submitted loan referral
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanReferralRecord {
    pub id: u64,
    pub referrer: Principal,
    pub borrower_name: String,
    pub phone_number: String,
    pub loan_amount: Amount,
    /// `loan_amount` at the registry's commission rate, rounded down
    pub commission: Amount,
    pub notes: String,
    pub timestamp: Timestamp,
}

/// Loan referral ledger, separate from the team tree
#[derive(Debug)]
pub struct LoanReferralRegistry {
    commission_bps: u32,
    records: RwLock<Vec<LoanReferralRecord>>,
}

impl LoanReferralRegistry {
    pub fn new(commission_bps: u32) -> Self {
        Self {
            commission_bps,
            records: RwLock::new(Vec::new()),
        }
    }

    pub fn commission_bps(&self) -> u32 {
        self.commission_bps
    }

    pub fn commission_for(&self, loan_amount: Amount) -> Amount {
        loan_amount.fraction_bps(self.commission_bps)
    }

    /// Record a referral and pay its commission.
    ///
    /// The commission is credited before the record is appended; if the
    /// credit fails nothing is recorded. A commission that rounds down to
    /// zero is recorded without a ledger posting.
    pub fn submit(
        &self,
        referrer: &Principal,
        submission: LoanReferralSubmission,
        ledger: &Ledger,
    ) -> EngineResult<LoanReferralRecord> {
        submission.loan_amount.ensure_positive()?;

        let borrower_name = submission.borrower_name.trim();
        let phone_number = submission.phone_number.trim();
        if borrower_name.is_empty() {
            return Err(EngineError::InvalidInput("borrower name is required".into()));
        }
        if phone_number.is_empty() {
            return Err(EngineError::InvalidInput("borrower phone number is required".into()));
        }

        let commission = self.commission_for(submission.loan_amount);

        // Held across the credit so ids stay gap-free.
        let mut records = self.records.write();
        let id = records.len() as u64 + 1;

        if !commission.is_zero() {
            ledger.credit(
                referrer,
                commission,
                CreditKind::LoanCommission,
                Some(format!("loan-referral:{id}")),
            )?;
        }

        let record = LoanReferralRecord {
            id,
            referrer: referrer.clone(),
            borrower_name: borrower_name.to_string(),
            phone_number: phone_number.to_string(),
            loan_amount: submission.loan_amount,
            commission,
            notes: submission.notes.trim().to_string(),
            timestamp: now_nanos(),
        };
        records.push(record.clone());

        tracing::info!(
            id,
            referrer = %referrer,
            loan_amount = record.loan_amount.value(),
            commission = commission.value(),
            "Loan referral submitted"
        );

        Ok(record)
    }

    pub fn get(&self, id: u64) -> Option<LoanReferralRecord> {
        let index = id.checked_sub(1)? as usize;
        self.records.read().get(index).cloned()
    }

    pub fn all(&self) -> Vec<LoanReferralRecord> {
        self.records.read().clone()
    }

    pub fn for_referrer(&self, referrer: &Principal) -> Vec<LoanReferralRecord> {
        self.records
            .read()
            .iter()
            .filter(|r| &r.referrer == referrer)
            .cloned()
            .collect()
    }

    /// Commission ever paid to `referrer` through this registry
    pub fn total_commission(&self, referrer: &Principal) -> Amount {
        Amount::new(
            self.records
                .read()
                .iter()
                .filter(|r| &r.referrer == referrer)
                .map(|r| r.commission.value())
                .sum(),
        )
    }
}

impl Default for LoanReferralRegistry {
    fn default() -> Self {
        Self::new(100) // 1%
    }
}
