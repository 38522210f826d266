//! The ledger: the only component allowed to change a balance

use crate::account::Account;
use crate::entry::{CreditKind, CreditPosting, DebitKind, JournalEntry, Movement};
use crate::hash::ChainError;
use crate::journal::Journal;
use dashmap::DashMap;
use levelbank_core::{Amount, EngineError, EngineResult, Principal};
use parking_lot::Mutex;
use std::sync::Arc;

/// Member balances behind per-member locks
///
/// Credits and debits on the same member are serialized by that member's
/// lock; different members proceed in parallel. Every committed change is
/// appended to the audit journal while the member lock is held, so the
/// journal order per member matches the balance history.
#[derive(Debug, Default)]
pub struct Ledger {
    accounts: DashMap<Principal, Arc<Mutex<Account>>>,
    journal: Journal,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock handle for a member, creating an empty account on first use.
    fn handle(&self, user: &Principal) -> Arc<Mutex<Account>> {
        // Clone the Arc out so the map shard is released before locking.
        self.accounts.entry(user.clone()).or_default().clone()
    }

    fn existing(&self, user: &Principal) -> Option<Arc<Mutex<Account>>> {
        self.accounts.get(user).map(|a| a.clone())
    }

    /// Open an empty account. No-op if one exists.
    pub fn open_account(&self, user: &Principal) {
        self.handle(user);
    }

    /// Add `amount` to a member's balance.
    ///
    /// Returns the balance after the credit.
    pub fn credit(
        &self,
        user: &Principal,
        amount: Amount,
        kind: CreditKind,
        reference: Option<String>,
    ) -> EngineResult<Amount> {
        self.credit_many(user, &[CreditPosting { amount, kind, reference }])
    }

    /// Apply several credits to one member as a single unit.
    ///
    /// Either every posting is applied or none is.
    pub fn credit_many(&self, user: &Principal, postings: &[CreditPosting]) -> EngineResult<Amount> {
        if postings.is_empty() {
            return Err(EngineError::InvalidAmount("no postings".into()));
        }
        for posting in postings {
            posting.amount.ensure_positive()?;
        }

        let handle = self.handle(user);
        let mut account = handle.lock();

        // Validate the whole batch before touching state.
        projected_balance(user, account.balance, postings)?;

        for posting in postings {
            // Cannot overflow: bounded by `projected`.
            account.balance = Amount::new(account.balance.value() + posting.amount.value());
            account.record_credit(posting.amount, posting.kind);
            let sequence = self.journal.append(
                user,
                Movement::Credit(posting.kind),
                posting.amount,
                account.balance,
                posting.reference.clone(),
            );

            tracing::debug!(
                user = %user,
                kind = %posting.kind,
                amount = posting.amount.value(),
                balance = account.balance.value(),
                sequence,
                "Ledger credit"
            );
        }

        Ok(account.balance)
    }

    /// Check that `credit_many` would accept `postings` right now, without
    /// applying anything.
    pub fn check_credit_many(&self, user: &Principal, postings: &[CreditPosting]) -> EngineResult<()> {
        if postings.is_empty() {
            return Err(EngineError::InvalidAmount("no postings".into()));
        }
        for posting in postings {
            posting.amount.ensure_positive()?;
        }
        projected_balance(user, self.balance(user), postings).map(|_| ())
    }

    /// Remove `amount` from a member's balance.
    ///
    /// Fails with `InsufficientFunds` instead of going below zero.
    pub fn debit(
        &self,
        user: &Principal,
        amount: Amount,
        kind: DebitKind,
        reference: Option<String>,
    ) -> EngineResult<Amount> {
        amount.ensure_positive()?;

        let insufficient = |available: Amount| EngineError::InsufficientFunds {
            user: user.to_string(),
            available: available.value(),
            required: amount.value(),
        };

        let Some(handle) = self.existing(user) else {
            return Err(insufficient(Amount::ZERO));
        };
        let mut account = handle.lock();

        let new_balance = account
            .balance
            .checked_sub(&amount)
            .ok_or_else(|| insufficient(account.balance))?;

        account.balance = new_balance;
        account.record_debit(amount, kind);
        let sequence =
            self.journal
                .append(user, Movement::Debit(kind), amount, new_balance, reference);

        tracing::debug!(
            user = %user,
            kind = %kind,
            amount = amount.value(),
            balance = new_balance.value(),
            sequence,
            "Ledger debit"
        );

        Ok(new_balance)
    }

    /// Credit a member-declared deposit.
    ///
    /// The ledger does not verify payment: the UPI transfer is reconciled
    /// out-of-band and the caller's claim is trusted as-is.
    pub fn deposit(&self, user: &Principal, amount: Amount) -> EngineResult<Amount> {
        self.credit(user, amount, CreditKind::Deposit, None)
    }

    /// Current balance (zero for unknown members)
    pub fn balance(&self, user: &Principal) -> Amount {
        self.existing(user)
            .map(|handle| handle.lock().balance)
            .unwrap_or_default()
    }

    /// Snapshot of a member's account (default for unknown members)
    pub fn account(&self, user: &Principal) -> Account {
        self.existing(user)
            .map(|handle| handle.lock().clone())
            .unwrap_or_default()
    }

    /// Sum of every balance. Not a consistent cut under concurrent writes.
    pub fn total_balance(&self) -> u128 {
        self.accounts
            .iter()
            .map(|a| a.value().lock().balance.value() as u128)
            .sum()
    }

    /// Transaction history of one member
    pub fn entries_for(&self, user: &Principal) -> Vec<JournalEntry> {
        self.journal.entries_for(user)
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn verify_journal(&self) -> Result<(), ChainError> {
        self.journal.verify()
    }
}

fn projected_balance(
    user: &Principal,
    balance: Amount,
    postings: &[CreditPosting],
) -> EngineResult<Amount> {
    postings.iter().try_fold(balance, |projected, posting| {
        projected
            .checked_add(&posting.amount)
            .ok_or_else(|| EngineError::InvalidAmount(format!("balance overflow for {user}")))
    })
}
