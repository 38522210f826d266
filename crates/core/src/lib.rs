//! LevelBank Core - Domain primitives shared by every engine crate
//!
//! - `Principal`: opaque, immutable caller identity
//! - `Amount`: non-negative integer amount in the smallest currency unit
//! - `EngineError`: the error taxonomy returned by every operation

pub mod amount;
pub mod error;
pub mod principal;
pub mod time;

pub use amount::Amount;
pub use error::{EngineError, EngineResult};
pub use principal::{Principal, PrincipalError};
pub use time::{now_nanos, Timestamp};
