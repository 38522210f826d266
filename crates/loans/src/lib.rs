//! LevelBank Loans - Loan referral registry
//!
//! Borrower referrals are a separate program from the team tree: the
//! referrer is paid a fixed-rate commission on submission, with no
//! approval step, and the record is kept forever.

mod registry;

pub use registry::{LoanReferralRecord, LoanReferralRegistry, LoanReferralSubmission};
