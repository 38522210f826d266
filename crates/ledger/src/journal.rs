//! Append-only, hash-chained audit journal of balance changes
//!
//! The journal lives in memory next to the accounts. It can be exported as
//! JSONL (one entry per line) and read back for offline audit.

use crate::entry::{JournalEntry, Movement};
use crate::error::JournalError;
use crate::hash::{calculate_entry_hash, verify_chain, ChainError, GENESIS_HASH};
use levelbank_core::{now_nanos, Amount, Principal};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

#[derive(Debug)]
struct JournalState {
    entries: Vec<JournalEntry>,
    last_hash: String,
}

/// Hash-chained list of committed ledger movements
#[derive(Debug)]
pub struct Journal {
    state: Mutex<JournalState>,
}

impl Default for Journal {
    fn default() -> Self {
        Self::new()
    }
}

impl Journal {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(JournalState {
                entries: Vec::new(),
                last_hash: GENESIS_HASH.to_string(),
            }),
        }
    }

    /// Seal and append a movement. Returns the assigned sequence.
    pub(crate) fn append(
        &self,
        user: &Principal,
        movement: Movement,
        amount: Amount,
        balance_after: Amount,
        reference: Option<String>,
    ) -> u64 {
        let mut state = self.state.lock();
        let sequence = state.entries.len() as u64 + 1;

        let mut entry = JournalEntry {
            sequence,
            prev_hash: state.last_hash.clone(),
            hash: String::new(),
            timestamp: now_nanos(),
            user: user.clone(),
            movement,
            amount,
            balance_after,
            reference,
        };
        entry.hash = calculate_entry_hash(&entry);

        state.last_hash = entry.hash.clone();
        state.entries.push(entry);
        sequence
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every entry in commit order
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.state.lock().entries.clone()
    }

    /// Entries touching one member, in commit order
    pub fn entries_for(&self, user: &Principal) -> Vec<JournalEntry> {
        self.state
            .lock()
            .entries
            .iter()
            .filter(|e| &e.user == user)
            .cloned()
            .collect()
    }

    pub fn verify(&self) -> Result<(), ChainError> {
        verify_chain(&self.state.lock().entries)
    }

    /// Write the journal to `path` as JSONL, replacing any existing file.
    pub fn export_jsonl(&self, path: impl AsRef<Path>) -> Result<usize, JournalError> {
        let entries = self.entries();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path.as_ref())?;
        let mut writer = BufWriter::new(file);

        for entry in &entries {
            let json = serde_json::to_string(entry)?;
            writeln!(writer, "{}", json)?;
        }
        writer.flush()?;

        tracing::info!(
            path = %path.as_ref().display(),
            entries = entries.len(),
            "Journal exported"
        );
        Ok(entries.len())
    }
}

/// Read an exported JSONL journal and verify its hash chain
pub fn read_jsonl(path: impl AsRef<Path>) -> Result<Vec<JournalEntry>, JournalError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut entries = Vec::new();

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        entries.push(serde_json::from_str(&line)?);
    }

    verify_chain(&entries)?;
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{CreditKind, DebitKind};
    use tempfile::TempDir;

    fn user(name: &str) -> Principal {
        name.parse().unwrap()
    }

    #[test]
    fn test_append_links_hashes() {
        let journal = Journal::new();
        journal.append(
            &user("alice"),
            Movement::Credit(CreditKind::Deposit),
            Amount::new(100),
            Amount::new(100),
            None,
        );
        journal.append(
            &user("alice"),
            Movement::Debit(DebitKind::Withdrawal),
            Amount::new(1),
            Amount::new(99),
            Some("withdrawal:1".into()),
        );

        let entries = journal.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].prev_hash, GENESIS_HASH);
        assert_eq!(entries[1].prev_hash, entries[0].hash);
        assert!(journal.verify().is_ok());
    }

    #[test]
    fn test_export_and_read_back() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("journal.jsonl");

        let journal = Journal::new();
        for i in 1..=3 {
            journal.append(
                &user("bob"),
                Movement::Credit(CreditKind::LoanCommission),
                Amount::new(10),
                Amount::new(10 * i),
                Some(format!("loan-referral:{i}")),
            );
        }

        assert_eq!(journal.export_jsonl(&path).unwrap(), 3);
        let entries = read_jsonl(&path).unwrap();
        assert_eq!(entries, journal.entries());
    }

    #[test]
    fn test_read_rejects_tampered_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("journal.jsonl");

        let journal = Journal::new();
        journal.append(
            &user("carol"),
            Movement::Credit(CreditKind::Deposit),
            Amount::new(5),
            Amount::new(5),
            None,
        );
        journal.export_jsonl(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, content.replace("\"amount\":5", "\"amount\":500")).unwrap();

        assert!(matches!(read_jsonl(&path), Err(JournalError::Chain(_))));
    }
}
