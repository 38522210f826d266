//! Withdrawal workflow logic

use crate::request::{WithdrawalRequest, WithdrawalStatus};
use dashmap::DashMap;
use levelbank_core::{now_nanos, Amount, EngineError, EngineResult, Principal};
use levelbank_ledger::{DebitKind, Ledger};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Configuration for the withdrawal workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalConfig {
    /// Per-request cap as basis points of the balance at request time
    pub cap_bps: u32,
}

impl Default for WithdrawalConfig {
    fn default() -> Self {
        Self { cap_bps: 100 } // 1%
    }
}

/// Statistics about withdrawal requests
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalStats {
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    /// Sum of every requested amount
    pub total_requested: Amount,
    /// Sum of approved (debited) amounts
    pub total_approved: Amount,
}

/// Request/approve/reject state machine
///
/// Each request sits behind its own lock. Approval checks the status and
/// debits the ledger while holding that lock, so concurrent approvals of
/// the same request debit exactly once.
#[derive(Debug)]
pub struct WithdrawalWorkflow {
    config: WithdrawalConfig,
    next_id: AtomicU64,
    requests: DashMap<u64, Arc<Mutex<WithdrawalRequest>>>,
}

impl WithdrawalWorkflow {
    pub fn new(config: WithdrawalConfig) -> Self {
        Self {
            config,
            next_id: AtomicU64::new(1),
            requests: DashMap::new(),
        }
    }

    pub fn config(&self) -> &WithdrawalConfig {
        &self.config
    }

    /// Largest amount a single request may ask for at `balance`
    pub fn limit_for(&self, balance: Amount) -> Amount {
        balance.fraction_bps(self.config.cap_bps)
    }

    fn handle(&self, id: u64) -> EngineResult<Arc<Mutex<WithdrawalRequest>>> {
        self.requests
            .get(&id)
            .map(|r| r.clone())
            .ok_or_else(|| EngineError::NotFound(format!("withdrawal request {id}")))
    }

    /// Create a pending request.
    ///
    /// The cap is evaluated against the balance now; nothing is debited
    /// until approval.
    pub fn create(
        &self,
        user: &Principal,
        amount: Amount,
        bank_details: &str,
        ledger: &Ledger,
    ) -> EngineResult<WithdrawalRequest> {
        amount.ensure_positive()?;

        let bank_details = bank_details.trim();
        if bank_details.is_empty() {
            return Err(EngineError::InvalidInput("bank details are required".into()));
        }

        let limit = self.limit_for(ledger.balance(user));
        if amount > limit {
            return Err(EngineError::ExceedsLimit {
                requested: amount.value(),
                limit: limit.value(),
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = WithdrawalRequest::new(
            id,
            user.clone(),
            amount,
            bank_details.to_string(),
            now_nanos(),
        );
        self.requests
            .insert(id, Arc::new(Mutex::new(request.clone())));

        tracing::info!(id, user = %user, amount = amount.value(), "Withdrawal requested");
        Ok(request)
    }

    /// Approve a pending request and debit the member.
    ///
    /// If the member can no longer cover the amount the approval fails with
    /// `InsufficientFunds` and the request stays pending.
    pub fn approve(&self, id: u64, ledger: &Ledger) -> EngineResult<WithdrawalRequest> {
        let handle = self.handle(id)?;
        let mut request = handle.lock();

        if !request.status.is_pending() {
            return Err(EngineError::InvalidState(format!(
                "withdrawal request {id} already {}",
                request.status.as_str()
            )));
        }

        if let Err(e) = ledger.debit(
            &request.user,
            request.amount,
            DebitKind::Withdrawal,
            Some(request.reference()),
        ) {
            tracing::warn!(id, user = %request.user, error = %e, "Withdrawal approval failed");
            return Err(e);
        }

        request.status = WithdrawalStatus::Approved;
        request.reviewed_at = Some(now_nanos());

        tracing::info!(id, user = %request.user, amount = request.amount.value(), "Withdrawal approved");
        Ok(request.clone())
    }

    /// Reject a pending request. No balance effect.
    pub fn reject(&self, id: u64, reason: &str) -> EngineResult<WithdrawalRequest> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(EngineError::InvalidInput("rejection reason is required".into()));
        }

        let handle = self.handle(id)?;
        let mut request = handle.lock();

        if !request.status.is_pending() {
            return Err(EngineError::InvalidState(format!(
                "withdrawal request {id} already {}",
                request.status.as_str()
            )));
        }

        request.status = WithdrawalStatus::Rejected {
            reason: reason.to_string(),
        };
        request.reviewed_at = Some(now_nanos());

        tracing::info!(id, user = %request.user, reason, "Withdrawal rejected");
        Ok(request.clone())
    }

    pub fn get(&self, id: u64) -> Option<WithdrawalRequest> {
        self.requests.get(&id).map(|r| r.lock().clone())
    }

    fn collect(&self, filter: impl Fn(&WithdrawalRequest) -> bool) -> Vec<WithdrawalRequest> {
        let handles: Vec<_> = self.requests.iter().map(|r| r.value().clone()).collect();
        let mut requests: Vec<_> = handles
            .iter()
            .map(|h| h.lock().clone())
            .filter(|r| filter(r))
            .collect();
        requests.sort_by_key(|r| r.id);
        requests
    }

    /// Every request, ordered by id
    pub fn all(&self) -> Vec<WithdrawalRequest> {
        self.collect(|_| true)
    }

    pub fn pending(&self) -> Vec<WithdrawalRequest> {
        self.collect(|r| r.status.is_pending())
    }

    pub fn for_user(&self, user: &Principal) -> Vec<WithdrawalRequest> {
        self.collect(|r| &r.user == user)
    }

    pub fn stats(&self) -> WithdrawalStats {
        self.all()
            .iter()
            .fold(WithdrawalStats::default(), |mut stats, r| {
                stats.total_requested =
                    Amount::new(stats.total_requested.value().saturating_add(r.amount.value()));
                match r.status {
                    WithdrawalStatus::Pending => stats.pending += 1,
                    WithdrawalStatus::Approved => {
                        stats.approved += 1;
                        stats.total_approved = Amount::new(
                            stats.total_approved.value().saturating_add(r.amount.value()),
                        );
                    }
                    WithdrawalStatus::Rejected { .. } => stats.rejected += 1,
                }
                stats
            })
    }
}

impl Default for WithdrawalWorkflow {
    fn default() -> Self {
        Self::new(WithdrawalConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn p(name: &str) -> Principal {
        name.parse().unwrap()
    }

    fn funded(balance: u64) -> (Ledger, Principal) {
        let ledger = Ledger::new();
        let alice = p("alice");
        ledger.deposit(&alice, Amount::new(balance)).unwrap();
        (ledger, alice)
    }

    #[test]
    fn test_create_does_not_debit() {
        let (ledger, alice) = funded(1_000);
        let workflow = WithdrawalWorkflow::default();

        let request = workflow
            .create(&alice, Amount::new(10), "SBIN0000001 / 123", &ledger)
            .unwrap();

        assert_eq!(request.id, 1);
        assert!(request.status.is_pending());
        assert_eq!(ledger.balance(&alice), Amount::new(1_000));
    }

    #[test]
    fn test_cap_is_one_percent() {
        let (ledger, alice) = funded(1_000);
        let workflow = WithdrawalWorkflow::default();

        let result = workflow.create(&alice, Amount::new(11), "bank", &ledger);
        assert_eq!(
            result,
            Err(EngineError::ExceedsLimit {
                requested: 11,
                limit: 10
            })
        );
        assert!(workflow.all().is_empty());
    }

    #[test]
    fn test_create_validates_input() {
        let (ledger, alice) = funded(1_000);
        let workflow = WithdrawalWorkflow::default();

        assert!(matches!(
            workflow.create(&alice, Amount::ZERO, "bank", &ledger),
            Err(EngineError::InvalidAmount(_))
        ));
        assert!(matches!(
            workflow.create(&alice, Amount::new(1), "   ", &ledger),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_approve_debits_once() {
        let (ledger, alice) = funded(1_000);
        let workflow = WithdrawalWorkflow::default();
        let id = workflow.create(&alice, Amount::new(10), "bank", &ledger).unwrap().id;

        let approved = workflow.approve(id, &ledger).unwrap();
        assert_eq!(approved.status, WithdrawalStatus::Approved);
        assert!(approved.reviewed_at.is_some());
        assert_eq!(ledger.balance(&alice), Amount::new(990));

        assert!(matches!(
            workflow.approve(id, &ledger),
            Err(EngineError::InvalidState(_))
        ));
        assert!(matches!(
            workflow.reject(id, "too late"),
            Err(EngineError::InvalidState(_))
        ));
        assert_eq!(ledger.balance(&alice), Amount::new(990));
    }

    #[test]
    fn test_approve_insufficient_funds_stays_pending() {
        let (ledger, alice) = funded(1_000);
        let workflow = WithdrawalWorkflow::default();

        // Sum of pending requests may exceed the balance
        let first = workflow.create(&alice, Amount::new(10), "bank", &ledger).unwrap().id;
        let second = workflow.create(&alice, Amount::new(10), "bank", &ledger).unwrap().id;
        ledger
            .debit(&alice, Amount::new(985), DebitKind::Withdrawal, None)
            .unwrap();

        workflow.approve(first, &ledger).unwrap();
        let result = workflow.approve(second, &ledger);
        assert!(matches!(result, Err(EngineError::InsufficientFunds { .. })));
        assert!(workflow.get(second).unwrap().status.is_pending());
        assert_eq!(ledger.balance(&alice), Amount::new(5));
    }

    #[test]
    fn test_reject_requires_reason() {
        let (ledger, alice) = funded(1_000);
        let workflow = WithdrawalWorkflow::default();
        let id = workflow.create(&alice, Amount::new(5), "bank", &ledger).unwrap().id;

        assert!(matches!(
            workflow.reject(id, " "),
            Err(EngineError::InvalidInput(_))
        ));

        let rejected = workflow.reject(id, "KYC incomplete").unwrap();
        assert_eq!(
            rejected.status,
            WithdrawalStatus::Rejected {
                reason: "KYC incomplete".into()
            }
        );
        assert_eq!(ledger.balance(&alice), Amount::new(1_000));
    }

    #[test]
    fn test_unknown_request() {
        let ledger = Ledger::new();
        let workflow = WithdrawalWorkflow::default();
        assert!(matches!(
            workflow.approve(42, &ledger),
            Err(EngineError::NotFound(_))
        ));
        assert!(matches!(
            workflow.reject(42, "no"),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn test_listing_and_stats() {
        let (ledger, alice) = funded(1_000);
        ledger.deposit(&p("bob"), Amount::new(500)).unwrap();
        let workflow = WithdrawalWorkflow::default();

        let a1 = workflow.create(&alice, Amount::new(10), "bank", &ledger).unwrap().id;
        let b1 = workflow.create(&p("bob"), Amount::new(5), "bank", &ledger).unwrap().id;
        let a2 = workflow.create(&alice, Amount::new(3), "bank", &ledger).unwrap().id;
        workflow.approve(a1, &ledger).unwrap();
        workflow.reject(b1, "duplicate").unwrap();

        let ids: Vec<u64> = workflow.all().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(workflow.pending().len(), 1);
        assert_eq!(workflow.pending()[0].id, a2);
        assert_eq!(workflow.for_user(&alice).len(), 2);

        let stats = workflow.stats();
        assert_eq!((stats.pending, stats.approved, stats.rejected), (1, 1, 1));
        assert_eq!(stats.total_requested, Amount::new(18));
        assert_eq!(stats.total_approved, Amount::new(10));
    }

    #[test]
    fn test_concurrent_approvals_debit_exactly_once() {
        let (ledger, alice) = funded(1_000);
        let ledger = Arc::new(ledger);
        let workflow = Arc::new(WithdrawalWorkflow::default());
        let id = workflow.create(&alice, Amount::new(10), "bank", &ledger).unwrap().id;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                let workflow = Arc::clone(&workflow);
                thread::spawn(move || workflow.approve(id, &ledger).is_ok())
            })
            .collect();
        let approvals = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(approvals, 1);
        assert_eq!(ledger.balance(&alice), Amount::new(990));
    }
}
