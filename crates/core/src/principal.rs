//! Principal - Opaque caller identity
//!
//! Principals are issued by the identity provider. The engine only requires
//! them to be stable, comparable and printable.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Maximum textual length of a principal
pub const MAX_PRINCIPAL_LEN: usize = 63;

/// Errors that can occur when parsing principals
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrincipalError {
    #[error("Empty principal")]
    Empty,

    #[error("Principal too long (max {MAX_PRINCIPAL_LEN} chars): {0}")]
    TooLong(String),

    #[error("Invalid principal format: {0}")]
    InvalidFormat(String),
}

/// Opaque, immutable identity of a caller
///
/// # Examples
/// ```
/// use levelbank_core::Principal;
///
/// let alice: Principal = "aaaaa-aa".parse().unwrap();
/// assert_eq!(alice.as_str(), "aaaaa-aa");
///
/// assert!("".parse::<Principal>().is_err());
/// assert!("bad principal".parse::<Principal>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Principal(String);

impl Principal {
    /// Returns the textual form
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Principal {
    type Err = PrincipalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if s.is_empty() {
            return Err(PrincipalError::Empty);
        }

        if s.len() > MAX_PRINCIPAL_LEN {
            return Err(PrincipalError::TooLong(s.to_string()));
        }

        if !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(PrincipalError::InvalidFormat(s.to_string()));
        }

        Ok(Principal(s.to_string()))
    }
}

impl TryFrom<String> for Principal {
    type Error = PrincipalError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl TryFrom<&str> for Principal {
    type Error = PrincipalError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Principal> for String {
    fn from(p: Principal) -> Self {
        p.0
    }
}
