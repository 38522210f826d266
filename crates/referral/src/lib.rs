//! LevelBank Referral - Referral forest and level engine
//!
//! The forest is append-only: a member's referrer never changes once set,
//! so every ancestor keeps a cached downline counter that is bumped in
//! O(depth) on insertion and read in O(1).
//!
//! The level engine turns downline sizes into levels and pays each level's
//! one-time reward through the ledger.

mod engine;
mod graph;
mod levels;

pub use engine::{LevelEngine, LevelUp};
pub use graph::{GraphWriter, MemberReferral, ReferralGraph};
pub use levels::{LevelConfig, LevelTable, LevelTableError, MAX_LEVELS};
