//! Hash chain utilities for journal integrity

use crate::entry::JournalEntry;
use sha2::{Digest, Sha256};

/// `prev_hash` of the first journal entry
pub const GENESIS_HASH: &str = "GENESIS";

/// Calculate SHA256 hash of entry content (excluding the hash field itself)
pub fn calculate_entry_hash(entry: &JournalEntry) -> String {
    let mut hasher = Sha256::new();

    hasher.update(entry.sequence.to_le_bytes());
    hasher.update(entry.prev_hash.as_bytes());
    hasher.update(entry.timestamp.to_le_bytes());
    hasher.update(entry.user.as_str().as_bytes());
    hasher.update(entry.movement.label().as_bytes());
    hasher.update(entry.amount.value().to_le_bytes());
    hasher.update(entry.balance_after.value().to_le_bytes());

    if let Some(ref reference) = entry.reference {
        hasher.update(reference.as_bytes());
    }

    hex::encode(hasher.finalize())
}

/// Verify hash chain integrity
pub fn verify_chain(entries: &[JournalEntry]) -> Result<(), ChainError> {
    let mut prev_hash = GENESIS_HASH.to_string();

    for (i, entry) in entries.iter().enumerate() {
        if entry.prev_hash != prev_hash {
            return Err(ChainError::BrokenLink {
                sequence: entry.sequence,
                expected: prev_hash,
                actual: entry.prev_hash.clone(),
            });
        }

        let calculated = calculate_entry_hash(entry);
        if entry.hash != calculated {
            return Err(ChainError::InvalidHash {
                sequence: entry.sequence,
                expected: calculated,
                actual: entry.hash.clone(),
            });
        }

        let expected_sequence = i as u64 + 1;
        if entry.sequence != expected_sequence {
            return Err(ChainError::InvalidSequence {
                expected: expected_sequence,
                actual: entry.sequence,
            });
        }

        prev_hash = entry.hash.clone();
    }

    Ok(())
}

/// Errors in hash chain verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    BrokenLink {
        sequence: u64,
        expected: String,
        actual: String,
    },
    InvalidHash {
        sequence: u64,
        expected: String,
        actual: String,
    },
    InvalidSequence {
        expected: u64,
        actual: u64,
    },
}

impl std::fmt::Display for ChainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainError::BrokenLink {
                sequence,
                expected,
                actual,
            } => write!(
                f,
                "Broken link at seq {}: expected prev_hash '{}', got '{}'",
                sequence, expected, actual
            ),
            ChainError::InvalidHash {
                sequence,
                expected,
                actual,
            } => write!(
                f,
                "Invalid hash at seq {}: expected '{}', got '{}'",
                sequence, expected, actual
            ),
            ChainError::InvalidSequence { expected, actual } => {
                write!(f, "Invalid sequence: expected {}, got {}", expected, actual)
            }
        }
    }
}

impl std::error::Error for ChainError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{CreditKind, Movement};
    use levelbank_core::Amount;

    fn entry(sequence: u64, prev_hash: &str) -> JournalEntry {
        let mut entry = JournalEntry {
            sequence,
            prev_hash: prev_hash.to_string(),
            hash: String::new(),
            timestamp: 1_700_000_000_000_000_000 + sequence as i64,
            user: "alice".parse().unwrap(),
            movement: Movement::Credit(CreditKind::Deposit),
            amount: Amount::new(100),
            balance_after: Amount::new(100 * sequence),
            reference: None,
        };
        entry.hash = calculate_entry_hash(&entry);
        entry
    }

    #[test]
    fn test_valid_chain() {
        let first = entry(1, GENESIS_HASH);
        let second = entry(2, &first.hash);
        assert!(verify_chain(&[first, second]).is_ok());
    }

    #[test]
    fn test_tampered_amount_detected() {
        let first = entry(1, GENESIS_HASH);
        let mut second = entry(2, &first.hash);
        second.amount = Amount::new(1_000_000);

        let result = verify_chain(&[first, second]);
        assert!(matches!(result, Err(ChainError::InvalidHash { sequence: 2, .. })));
    }

    #[test]
    fn test_broken_link_detected() {
        let first = entry(1, GENESIS_HASH);
        let second = entry(2, "not-the-previous-hash");
        let result = verify_chain(&[first, second]);
        assert!(matches!(result, Err(ChainError::BrokenLink { sequence: 2, .. })));
    }
}
