//! Member profile store with a unique phone index

use dashmap::DashMap;
use levelbank_core::{EngineError, EngineResult, Principal, Timestamp};
use serde::{Deserialize, Serialize};

/// Canonical form of a phone number: whitespace, dashes, dots and
/// parentheses removed.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '.' | '(' | ')'))
        .collect()
}

/// Identity attributes of a registered member
///
/// Balance and level live in the ledger and level engine; see
/// [`UserProfile`](crate::UserProfile) for the assembled view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub principal: Principal,
    pub name: String,
    pub phone_number: String,
    pub active: bool,
    /// Set at registration or later by an admin; immutable once set
    pub referrer: Option<Principal>,
    pub registered_at: Timestamp,
}

/// Registered members keyed by principal
///
/// Mutations are serialized by the caller (the platform holds the
/// referral graph writer), which keeps the phone index consistent with
/// the records.
#[derive(Debug, Default)]
pub(crate) struct MemberDirectory {
    records: DashMap<Principal, MemberRecord>,
    phones: DashMap<String, Principal>,
}

impl MemberDirectory {
    pub fn contains(&self, principal: &Principal) -> bool {
        self.records.contains_key(principal)
    }

    pub fn get(&self, principal: &Principal) -> Option<MemberRecord> {
        self.records.get(principal).map(|r| r.clone())
    }

    pub fn owner_of_phone(&self, phone: &str) -> Option<Principal> {
        self.phones.get(&normalize_phone(phone)).map(|p| p.clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// `PhoneInUse` if `phone` belongs to someone other than `principal`
    pub fn ensure_phone_available(&self, phone: &str, principal: &Principal) -> EngineResult<()> {
        match self.owner_of_phone(phone) {
            Some(owner) if &owner != principal => Err(EngineError::PhoneInUse(phone.to_string())),
            _ => Ok(()),
        }
    }

    pub fn insert(&self, record: MemberRecord) -> EngineResult<()> {
        if self.contains(&record.principal) {
            return Err(EngineError::AlreadyRegistered(record.principal.to_string()));
        }
        self.ensure_phone_available(&record.phone_number, &record.principal)?;

        self.phones
            .insert(normalize_phone(&record.phone_number), record.principal.clone());
        self.records.insert(record.principal.clone(), record);
        Ok(())
    }

    /// Replace name and phone, moving the phone index entry.
    pub fn update_identity(
        &self,
        principal: &Principal,
        name: String,
        phone_number: String,
    ) -> EngineResult<MemberRecord> {
        self.ensure_phone_available(&phone_number, principal)?;

        let mut record = self
            .records
            .get_mut(principal)
            .ok_or_else(|| EngineError::NotFound(format!("user {principal}")))?;

        let old_phone = normalize_phone(&record.phone_number);
        let new_phone = normalize_phone(&phone_number);
        if old_phone != new_phone {
            self.phones.remove(&old_phone);
            self.phones.insert(new_phone, principal.clone());
        }

        record.name = name;
        record.phone_number = phone_number;
        Ok(record.clone())
    }

    /// Record a referrer for a member that had none.
    pub fn set_referrer(&self, principal: &Principal, referrer: &Principal) -> EngineResult<()> {
        let mut record = self
            .records
            .get_mut(principal)
            .ok_or_else(|| EngineError::NotFound(format!("user {principal}")))?;

        if record.referrer.is_some() {
            return Err(EngineError::DuplicateMembership(principal.to_string()));
        }
        record.referrer = Some(referrer.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, phone: &str) -> MemberRecord {
        MemberRecord {
            principal: name.parse().unwrap(),
            name: name.to_string(),
            phone_number: phone.to_string(),
            active: true,
            referrer: None,
            registered_at: 0,
        }
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone(" +91 (987) 654-32.10 "), "+919876543210");
        assert_eq!(normalize_phone("   "), "");
    }

    #[test]
    fn test_phone_uniqueness() {
        let directory = MemberDirectory::default();
        directory.insert(record("alice", "98765 43210")).unwrap();

        let result = directory.insert(record("bob", "9876543210"));
        assert!(matches!(result, Err(EngineError::PhoneInUse(_))));
        assert_eq!(
            directory.owner_of_phone("98765-43210"),
            Some("alice".parse().unwrap())
        );

        let result = directory.insert(record("alice", "111"));
        assert!(matches!(result, Err(EngineError::AlreadyRegistered(_))));
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn test_update_moves_phone_index() {
        let directory = MemberDirectory::default();
        let alice: Principal = "alice".parse().unwrap();
        directory.insert(record("alice", "111")).unwrap();
        directory.insert(record("bob", "222")).unwrap();

        let result = directory.update_identity(&alice, "Alice".into(), "222".into());
        assert!(matches!(result, Err(EngineError::PhoneInUse(_))));

        let updated = directory
            .update_identity(&alice, "Alice".into(), "333".into())
            .unwrap();
        assert_eq!(updated.name, "Alice");
        assert_eq!(directory.owner_of_phone("111"), None);
        assert_eq!(directory.owner_of_phone("333"), Some(alice));
    }

    #[test]
    fn test_referrer_set_once() {
        let directory = MemberDirectory::default();
        let alice: Principal = "alice".parse().unwrap();
        let bob: Principal = "bob".parse().unwrap();
        directory.insert(record("alice", "111")).unwrap();

        directory.set_referrer(&alice, &bob).unwrap();
        assert!(matches!(
            directory.set_referrer(&alice, &bob),
            Err(EngineError::DuplicateMembership(_))
        ));
        assert_eq!(directory.get(&alice).unwrap().referrer, Some(bob));
    }
}
