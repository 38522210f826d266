//! LevelBank Ledger - Single source of truth for member balances
//!
//! Every balance change in LevelBank goes through this crate: deposits,
//! level rewards, loan-referral commissions and withdrawal debits.
//!
//! # Key Types
//! - `Ledger`: per-member accounts behind per-member locks
//! - `Account`: balance plus running totals per movement kind
//! - `JournalEntry`: hash-chained audit record of one balance change
//! - `Movement`: credit or debit, with its business reason

pub mod account;
pub mod entry;
pub mod error;
pub mod hash;
pub mod journal;
mod ledger;

pub use account::Account;
pub use entry::{CreditKind, CreditPosting, DebitKind, JournalEntry, Movement};
pub use error::JournalError;
pub use hash::{calculate_entry_hash, verify_chain, ChainError};
pub use journal::{read_jsonl, Journal};
pub use ledger::Ledger;
