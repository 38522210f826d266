//! LevelBank RPC - platform facade and CLI orchestrator
//!
//! Wires the ledger, referral graph, level engine, withdrawal workflow and
//! loan registry behind a caller-aware [`Platform`].

pub mod commands;
pub mod config;
pub mod gate;
pub mod members;
pub mod platform;

pub use config::{ConfigError, EngineConfig};
pub use gate::{Caller, IdentityResolver, Role, RoleGate, StaticIdentity};
pub use members::MemberRecord;
pub use platform::{AuditReport, Platform, Registration, UserProfile};
