//! # LevelBank Withdrawal Module
//!
//! Admin-approved withdrawal workflow.
//!
//! ## Lifecycle
//! - Created `Pending` by the member, capped at a share of the balance
//! - `Approved` by an admin: the ledger debit happens here, exactly once
//! - `Rejected` by an admin with a reason: no balance effect
//!
//! ## Notes
//! - Pending requests do not lock funds; insufficiency is checked on approval
//! - Terminal states are immutable (no re-review)

mod request;
mod workflow;

pub use request::{WithdrawalRequest, WithdrawalStatus};
pub use workflow::{WithdrawalConfig, WithdrawalStats, WithdrawalWorkflow};
