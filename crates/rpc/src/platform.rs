//! Platform facade - wires the components together
//!
//! Every operation takes the request's [`Caller`]. Authorization is checked
//! before any lookup, so a denied call learns nothing about the target.

use crate::config::{ConfigError, EngineConfig};
use crate::gate::{Caller, IdentityResolver, Role, RoleGate};
use crate::members::{normalize_phone, MemberDirectory, MemberRecord};
use levelbank_core::{now_nanos, Amount, EngineError, EngineResult, Principal};
use levelbank_ledger::{JournalEntry, Ledger};
use levelbank_loans::{LoanReferralRecord, LoanReferralRegistry, LoanReferralSubmission};
use levelbank_referral::{LevelEngine, LevelUp, MemberReferral, ReferralGraph};
use levelbank_withdrawal::{WithdrawalConfig, WithdrawalRequest, WithdrawalStats, WithdrawalWorkflow};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Member view assembled from the profile store, ledger and level engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub principal: Principal,
    pub name: String,
    pub phone_number: String,
    pub balance: Amount,
    pub level: u8,
    pub active: bool,
    pub referrer: Option<Principal>,
}

/// Result of a successful registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub profile: UserProfile,
    /// Ancestors whose level or rewards changed, nearest first
    pub level_ups: Vec<LevelUp>,
}

/// Consistency report over the whole platform
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    pub members: usize,
    pub edges: usize,
    pub total_balance: u128,
    pub journal_entries: usize,
    /// Credits minus debits replayed from the journal
    pub journal_net: i128,
    pub chain_error: Option<String>,
    /// Members whose cached downline differs from a recount
    pub downline_mismatches: Vec<Principal>,
    /// Members whose level differs from the level their downline unlocks
    pub level_mismatches: Vec<Principal>,
    /// Members with an unlocked level whose reward was never granted
    #[serde(default)]
    pub reward_mismatches: Vec<Principal>,
    /// Members whose ledger commission total differs from their loan records
    #[serde(default)]
    pub commission_mismatches: Vec<Principal>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.chain_error.is_none()
            && self.journal_net == self.total_balance as i128
            && self.downline_mismatches.is_empty()
            && self.level_mismatches.is_empty()
            && self.reward_mismatches.is_empty()
            && self.commission_mismatches.is_empty()
    }
}

/// The MLM engine behind a transport
///
/// `Send + Sync`; share it as `Arc<Platform>`.
#[derive(Debug)]
pub struct Platform {
    config: EngineConfig,
    members: MemberDirectory,
    ledger: Ledger,
    graph: ReferralGraph,
    levels: LevelEngine,
    withdrawals: WithdrawalWorkflow,
    loans: LoanReferralRegistry,
    gate: RoleGate,
}

fn required(value: &str, field: &str) -> EngineResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(EngineError::InvalidInput(format!("{field} is required")));
    }
    Ok(value.to_string())
}

fn required_phone(value: &str) -> EngineResult<String> {
    let phone = normalize_phone(value);
    if phone.is_empty() {
        return Err(EngineError::InvalidInput("phone number is required".into()));
    }
    Ok(phone)
}

impl Platform {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            members: MemberDirectory::default(),
            ledger: Ledger::new(),
            graph: ReferralGraph::new(),
            levels: LevelEngine::new(config.level_table.clone()),
            withdrawals: WithdrawalWorkflow::new(WithdrawalConfig {
                cap_bps: config.withdrawal_cap_bps,
            }),
            loans: LoanReferralRegistry::new(config.loan_commission_bps),
            gate: RoleGate::new(&config.admin_phones),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn graph(&self) -> &ReferralGraph {
        &self.graph
    }

    /// Build the caller context for one request
    pub fn resolve(&self, identity: &dyn IdentityResolver) -> Caller {
        self.gate.resolve(identity)
    }

    /// Phone to principal lookup for the identity layer (OTP login).
    ///
    /// Not gated; callers of this method sit on the trusted side.
    pub fn principal_for_phone(&self, phone_number: &str) -> Option<Principal> {
        self.members.owner_of_phone(phone_number)
    }

    fn require_member(&self, principal: &Principal) -> EngineResult<MemberRecord> {
        self.members
            .get(principal)
            .ok_or_else(|| EngineError::NotFound(format!("user {principal}")))
    }

    fn profile_of(&self, record: MemberRecord) -> UserProfile {
        UserProfile {
            balance: self.ledger.balance(&record.principal),
            level: self.levels.level_of(&record.principal),
            principal: record.principal,
            name: record.name,
            phone_number: record.phone_number,
            active: record.active,
            referrer: record.referrer,
        }
    }

    /// Refuse an edge whose ancestor rewards could not be credited.
    ///
    /// Runs under the same graph writer as the `add_edge` that follows, so
    /// `projected` is exactly the chain the edge will produce.
    fn ensure_rewards_payable(&self, projected: &[(Principal, u64)]) -> EngineResult<()> {
        for (ancestor, size) in projected {
            if let Err(e) = self.levels.check_payable(ancestor, *size, &self.ledger) {
                tracing::warn!(
                    user = %ancestor,
                    downline = *size,
                    error = %e,
                    "Referral refused: level reward not payable"
                );
                return Err(e);
            }
        }
        Ok(())
    }

    /// Evaluate each ancestor at its new downline size.
    ///
    /// Must run under the graph writer that produced `chain`, after
    /// `ensure_rewards_payable` accepted it. Deposits do not take the
    /// writer, so one landing in between can still overflow a reward
    /// credit; that reward is logged, left unflagged and reported by
    /// `audit` until `evaluate_level` pays it.
    fn evaluate_chain(&self, chain: Vec<(Principal, u64)>) -> Vec<LevelUp> {
        let mut level_ups = Vec::new();
        for (ancestor, size) in chain {
            match self.levels.evaluate(&ancestor, size, &self.ledger) {
                Ok(Some(level_up)) => level_ups.push(level_up),
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(
                        user = %ancestor,
                        downline = size,
                        error = %e,
                        "Level reward deferred"
                    );
                }
            }
        }
        level_ups
    }

    // === Caller-scoped mutations ===

    /// Register the caller, optionally under `referrer`.
    ///
    /// The profile, the referral edge, the ancestor counters and the
    /// ancestor level evaluations are applied under one graph writer.
    pub fn register_user(
        &self,
        caller: &Caller,
        name: &str,
        phone_number: &str,
        referrer: Option<&Principal>,
        payment: Amount,
    ) -> EngineResult<Registration> {
        let principal = caller.authenticated()?.clone();
        let name = required(name, "name")?;
        let phone_number = required_phone(phone_number)?;

        let mut writer = self.graph.writer();

        if self.members.contains(&principal) {
            return Err(EngineError::AlreadyRegistered(principal.to_string()));
        }
        self.members
            .ensure_phone_available(&phone_number, &principal)?;
        if let Some(referrer) = referrer {
            if referrer == &principal {
                return Err(EngineError::SelfReferral(principal.to_string()));
            }
            if !self.members.contains(referrer) {
                return Err(EngineError::NotFound(format!("referrer {referrer}")));
            }
        }

        let chain = match referrer {
            Some(referrer) => {
                self.ensure_rewards_payable(&writer.projected_sizes(referrer, &principal)?)?;
                writer.add_edge(referrer, &principal)?
            }
            None => {
                writer.insert_root(&principal);
                Vec::new()
            }
        };

        let record = MemberRecord {
            principal: principal.clone(),
            name,
            phone_number,
            active: payment >= self.config.registration_fee,
            referrer: referrer.cloned(),
            registered_at: now_nanos(),
        };
        self.members.insert(record.clone())?;
        self.ledger.open_account(&principal);

        let level_ups = self.evaluate_chain(chain);
        drop(writer);

        tracing::info!(
            user = %principal,
            referrer = ?referrer.map(|r| r.as_str()),
            active = record.active,
            level_ups = level_ups.len(),
            "Member registered"
        );

        Ok(Registration {
            profile: self.profile_of(record),
            level_ups,
        })
    }

    /// Update the caller's name and phone number.
    pub fn update_caller_profile(
        &self,
        caller: &Caller,
        name: &str,
        phone_number: &str,
    ) -> EngineResult<UserProfile> {
        let principal = caller.authenticated()?;
        let name = required(name, "name")?;
        let phone_number = required_phone(phone_number)?;

        // Serializes phone index changes with registrations.
        let _writer = self.graph.writer();
        let record = self
            .members
            .update_identity(principal, name, phone_number)?;

        tracing::info!(user = %principal, "Profile updated");
        Ok(self.profile_of(record))
    }

    /// Credit the caller. Payment proof is checked upstream.
    pub fn deposit(&self, caller: &Caller, amount: Amount) -> EngineResult<Amount> {
        let principal = caller.authenticated()?;
        self.require_member(principal)?;
        self.ledger.deposit(principal, amount)
    }

    pub fn create_withdrawal_request(
        &self,
        caller: &Caller,
        amount: Amount,
        bank_details: &str,
    ) -> EngineResult<WithdrawalRequest> {
        let principal = caller.authenticated()?;
        self.require_member(principal)?;
        self.withdrawals
            .create(principal, amount, bank_details, &self.ledger)
    }

    pub fn submit_loan_referral(
        &self,
        caller: &Caller,
        submission: LoanReferralSubmission,
    ) -> EngineResult<LoanReferralRecord> {
        let principal = caller.authenticated()?;
        self.require_member(principal)?;
        self.loans.submit(principal, submission, &self.ledger)
    }

    /// Claim the admin role with an allow-listed phone number
    pub fn admin_login(&self, caller: &Caller, phone_number: &str) -> EngineResult<bool> {
        self.gate.admin_login(caller, phone_number)
    }

    // === Admin operations ===

    pub fn approve_withdrawal_request(
        &self,
        caller: &Caller,
        id: u64,
    ) -> EngineResult<WithdrawalRequest> {
        let admin = caller.require_admin()?;
        let request = self.withdrawals.approve(id, &self.ledger)?;
        tracing::info!(id, admin = %admin, "Withdrawal approved by admin");
        Ok(request)
    }

    pub fn reject_withdrawal_request(
        &self,
        caller: &Caller,
        id: u64,
        reason: &str,
    ) -> EngineResult<WithdrawalRequest> {
        let admin = caller.require_admin()?;
        let request = self.withdrawals.reject(id, reason)?;
        tracing::info!(id, admin = %admin, "Withdrawal rejected by admin");
        Ok(request)
    }

    pub fn assign_caller_user_role(
        &self,
        caller: &Caller,
        user: &Principal,
        role: Role,
    ) -> EngineResult<()> {
        self.gate.assign(caller, user, role)
    }

    /// Attach an existing member that has no referrer under `referrer`.
    pub fn add_member_referral(
        &self,
        caller: &Caller,
        referrer: &Principal,
        new_member: &Principal,
    ) -> EngineResult<Vec<LevelUp>> {
        let admin = caller.require_admin()?;

        let mut writer = self.graph.writer();
        self.require_member(referrer)?;
        self.require_member(new_member)?;

        self.ensure_rewards_payable(&writer.projected_sizes(referrer, new_member)?)?;
        let chain = writer.add_edge(referrer, new_member)?;
        self.members.set_referrer(new_member, referrer)?;
        let level_ups = self.evaluate_chain(chain);
        drop(writer);

        tracing::info!(
            admin = %admin,
            referrer = %referrer,
            new_member = %new_member,
            "Member referral added"
        );
        Ok(level_ups)
    }

    /// Flag a level reward as granted without paying it.
    pub fn mark_level_rewarded(
        &self,
        caller: &Caller,
        user: &Principal,
        level: u8,
    ) -> EngineResult<bool> {
        let admin = caller.require_admin()?;
        self.require_member(user)?;

        let marked = self.levels.mark_level_rewarded(user, level)?;
        if marked {
            tracing::info!(admin = %admin, user = %user, level, "Level reward marked");
        }
        Ok(marked)
    }

    /// Re-run level evaluation for `user` at its current downline size.
    pub fn evaluate_level(&self, caller: &Caller, user: &Principal) -> EngineResult<Option<LevelUp>> {
        caller.require_admin()?;
        self.require_member(user)?;

        let _writer = self.graph.writer();
        let size = self.graph.downline_size(user);
        self.levels.evaluate(user, size, &self.ledger)
    }

    pub fn get_pending_withdrawal_requests(
        &self,
        caller: &Caller,
    ) -> EngineResult<Vec<WithdrawalRequest>> {
        caller.require_admin()?;
        Ok(self.withdrawals.pending())
    }

    pub fn get_all_withdrawal_requests(&self, caller: &Caller) -> EngineResult<Vec<WithdrawalRequest>> {
        caller.require_admin()?;
        Ok(self.withdrawals.all())
    }

    pub fn get_all_member_referrals(&self, caller: &Caller) -> EngineResult<Vec<MemberReferral>> {
        caller.require_admin()?;
        Ok(self.graph.edges())
    }

    pub fn get_all_loan_referral_records(
        &self,
        caller: &Caller,
    ) -> EngineResult<Vec<LoanReferralRecord>> {
        caller.require_admin()?;
        Ok(self.loans.all())
    }

    /// Loan referral records submitted by `user`
    pub fn get_user_loan_referral_records(
        &self,
        caller: &Caller,
        user: &Principal,
    ) -> EngineResult<Vec<LoanReferralRecord>> {
        caller.require_admin()?;
        Ok(self.loans.for_referrer(user))
    }

    /// One loan referral record; members may only read their own.
    ///
    /// Non-admins get `Unauthorized` for ids they do not own, whether or
    /// not the record exists.
    pub fn get_loan_referral_record(
        &self,
        caller: &Caller,
        id: u64,
    ) -> EngineResult<Option<LoanReferralRecord>> {
        let principal = caller.authenticated()?;
        if caller.is_admin() {
            return Ok(self.loans.get(id));
        }
        match self.loans.get(id) {
            Some(record) if &record.referrer == principal => Ok(Some(record)),
            _ => Err(EngineError::Unauthorized),
        }
    }

    pub fn withdrawal_stats(&self, caller: &Caller) -> EngineResult<WithdrawalStats> {
        caller.require_admin()?;
        Ok(self.withdrawals.stats())
    }

    /// Profile of `user`; members may only read their own
    pub fn get_user_profile(&self, caller: &Caller, user: &Principal) -> EngineResult<UserProfile> {
        caller.require_self_or_admin(user)?;
        let record = self.require_member(user)?;
        Ok(self.profile_of(record))
    }

    pub fn get_user_profile_by_phone_number(
        &self,
        caller: &Caller,
        phone_number: &str,
    ) -> EngineResult<Option<UserProfile>> {
        caller.require_admin()?;
        Ok(self
            .members
            .owner_of_phone(phone_number)
            .and_then(|p| self.members.get(&p))
            .map(|record| self.profile_of(record)))
    }

    // === Caller-scoped reads ===

    /// The caller's profile; `None` for anonymous or unregistered callers
    pub fn get_caller_user_profile(&self, caller: &Caller) -> Option<UserProfile> {
        caller
            .principal()
            .and_then(|p| self.members.get(p))
            .map(|record| self.profile_of(record))
    }

    pub fn get_caller_withdrawal_requests(
        &self,
        caller: &Caller,
    ) -> EngineResult<Vec<WithdrawalRequest>> {
        let principal = caller.authenticated()?;
        Ok(self.withdrawals.for_user(principal))
    }

    pub fn get_total_team_size(&self, caller: &Caller) -> EngineResult<u64> {
        let principal = caller.authenticated()?;
        Ok(self.graph.downline_size(principal))
    }

    /// Level income plus loan commission
    pub fn get_total_earnings(&self, caller: &Caller) -> EngineResult<Amount> {
        let principal = caller.authenticated()?;
        Ok(self.ledger.account(principal).total_earnings())
    }

    pub fn get_total_level_income(&self, caller: &Caller) -> EngineResult<Amount> {
        let principal = caller.authenticated()?;
        Ok(self.ledger.account(principal).total_level_income)
    }

    pub fn get_total_loan_referral_commission(&self, caller: &Caller) -> EngineResult<Amount> {
        let principal = caller.authenticated()?;
        Ok(self.ledger.account(principal).total_loan_commission)
    }

    pub fn get_caller_loan_referral_records(
        &self,
        caller: &Caller,
    ) -> EngineResult<Vec<LoanReferralRecord>> {
        let principal = caller.authenticated()?;
        Ok(self.loans.for_referrer(principal))
    }

    /// The edge that brought `new_member` in; members may only read their own
    pub fn get_member_referral(
        &self,
        caller: &Caller,
        new_member: &Principal,
    ) -> EngineResult<Option<MemberReferral>> {
        caller.require_self_or_admin(new_member)?;
        Ok(self.graph.edge_for(new_member))
    }

    /// The caller's ledger postings, oldest first
    pub fn get_caller_transactions(&self, caller: &Caller) -> EngineResult<Vec<JournalEntry>> {
        let principal = caller.authenticated()?;
        Ok(self.ledger.entries_for(principal))
    }

    pub fn is_caller_admin(&self, caller: &Caller) -> bool {
        self.get_caller_user_role(caller) == Role::Admin
    }

    /// Current role of the caller (`Guest` when anonymous)
    pub fn get_caller_user_role(&self, caller: &Caller) -> Role {
        caller
            .principal()
            .map(|p| self.gate.role_of(p))
            .unwrap_or(Role::Guest)
    }

    // === Audit ===

    /// Cross-check cached state against a recount.
    ///
    /// Holds the graph writer, so structure is frozen while it runs; ledger
    /// postings racing with the audit can make `journal_net` differ from
    /// `total_balance`, so run it on a quiet platform.
    pub fn audit(&self) -> AuditReport {
        let _writer = self.graph.writer();

        let entries = self.ledger.journal().entries();
        let journal_net: i128 = entries
            .iter()
            .map(|e| {
                if e.movement.is_credit() {
                    e.amount.value() as i128
                } else {
                    -(e.amount.value() as i128)
                }
            })
            .sum();

        let mut counted: HashMap<Principal, u64> = HashMap::new();
        let mut downline_mismatches = Vec::new();
        let mut level_mismatches = Vec::new();
        let mut reward_mismatches = Vec::new();
        let mut commission_mismatches = Vec::new();
        for member in &self.graph.members() {
            let recount = self.recount(member, &mut counted);
            if recount != self.graph.downline_size(member) {
                downline_mismatches.push(member.clone());
            }
            if self.levels.level_of(member) != self.levels.table().level_for(recount) {
                level_mismatches.push(member.clone());
            }
            if !self.levels.rewards_due(member, recount).is_empty() {
                reward_mismatches.push(member.clone());
            }
            if self.ledger.account(member).total_loan_commission
                != self.loans.total_commission(member)
            {
                commission_mismatches.push(member.clone());
            }
        }

        AuditReport {
            members: self.members.len(),
            edges: self.graph.edges().len(),
            total_balance: self.ledger.total_balance(),
            journal_entries: entries.len(),
            journal_net,
            chain_error: self.ledger.verify_journal().err().map(|e| e.to_string()),
            downline_mismatches,
            level_mismatches,
            reward_mismatches,
            commission_mismatches,
        }
    }

    /// Descendant count by walking children, memoized in `counted`.
    fn recount(&self, member: &Principal, counted: &mut HashMap<Principal, u64>) -> u64 {
        // Iterative post-order; referral chains can be deep.
        let mut stack = vec![(member.clone(), false)];
        while let Some((node, expanded)) = stack.pop() {
            if counted.contains_key(&node) {
                continue;
            }
            let children = self.graph.direct_referrals(&node);
            if expanded {
                let total: u64 = children
                    .iter()
                    .map(|c| counted.get(c).copied().unwrap_or(0) + 1)
                    .sum();
                counted.insert(node, total);
            } else {
                stack.push((node, true));
                stack.extend(children.into_iter().map(|c| (c, false)));
            }
        }
        counted.get(member).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::StaticIdentity;
    use levelbank_ledger::CreditKind;
    use levelbank_referral::{LevelConfig, LevelTable};

    fn p(name: &str) -> Principal {
        name.parse().unwrap()
    }

    fn platform() -> Platform {
        Platform::new(EngineConfig {
            admin_phones: vec!["999".into()],
            ..EngineConfig::default()
        })
        .unwrap()
    }

    fn as_user(platform: &Platform, name: &str) -> Caller {
        platform.resolve(&StaticIdentity::new(p(name)))
    }

    fn register(platform: &Platform, name: &str, phone: &str, referrer: Option<&str>) -> Registration {
        let caller = as_user(platform, name);
        let referrer = referrer.map(p);
        platform
            .register_user(&caller, name, phone, referrer.as_ref(), Amount::new(100))
            .unwrap()
    }

    #[test]
    fn test_register_root_member() {
        let platform = platform();
        let registration = register(&platform, "alice", "111", None);

        let profile = registration.profile;
        assert_eq!(profile.principal, p("alice"));
        assert_eq!(profile.balance, Amount::ZERO);
        assert_eq!(profile.level, 1);
        assert!(profile.active);
        assert_eq!(profile.referrer, None);
        assert!(registration.level_ups.is_empty());
    }

    #[test]
    fn test_registration_fee_sets_active_only() {
        let platform = platform();
        let caller = as_user(&platform, "alice");

        let registration = platform
            .register_user(&caller, "alice", "111", None, Amount::new(99))
            .unwrap();
        assert!(!registration.profile.active);
        assert_eq!(platform.ledger().balance(&p("alice")), Amount::ZERO);
    }

    #[test]
    fn test_register_validation_order() {
        let platform = platform();
        register(&platform, "alice", "111", None);

        let anon = platform.resolve(&StaticIdentity::anonymous());
        assert_eq!(
            platform.register_user(&anon, "x", "1", None, Amount::ZERO),
            Err(EngineError::Unauthorized)
        );

        let alice = as_user(&platform, "alice");
        assert!(matches!(
            platform.register_user(&alice, "alice", "222", None, Amount::ZERO),
            Err(EngineError::AlreadyRegistered(_))
        ));

        let bob = as_user(&platform, "bob");
        assert!(matches!(
            platform.register_user(&bob, " ", "222", None, Amount::ZERO),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            platform.register_user(&bob, "bob", "1-1-1", None, Amount::ZERO),
            Err(EngineError::PhoneInUse(_))
        ));
        assert!(matches!(
            platform.register_user(&bob, "bob", "222", Some(&p("bob")), Amount::ZERO),
            Err(EngineError::SelfReferral(_))
        ));
        assert!(matches!(
            platform.register_user(&bob, "bob", "222", Some(&p("carol")), Amount::ZERO),
            Err(EngineError::NotFound(_))
        ));
        assert!(platform.get_caller_user_profile(&bob).is_none());
        assert!(!platform.graph().contains(&p("bob")));
    }

    #[test]
    fn test_update_profile() {
        let platform = platform();
        register(&platform, "alice", "111", None);
        register(&platform, "bob", "222", None);
        let alice = as_user(&platform, "alice");

        assert!(matches!(
            platform.update_caller_profile(&alice, "Alice", "222"),
            Err(EngineError::PhoneInUse(_))
        ));

        let profile = platform
            .update_caller_profile(&alice, "Alice", "333")
            .unwrap();
        assert_eq!(profile.name, "Alice");
        assert_eq!(platform.principal_for_phone("333"), Some(p("alice")));
        assert_eq!(platform.principal_for_phone("111"), None);
    }

    #[test]
    fn test_deposit_requires_registration() {
        let platform = platform();
        let ghost = as_user(&platform, "ghost");
        assert!(matches!(
            platform.deposit(&ghost, Amount::new(10)),
            Err(EngineError::NotFound(_))
        ));

        register(&platform, "alice", "111", None);
        let alice = as_user(&platform, "alice");
        assert_eq!(platform.deposit(&alice, Amount::new(10)), Ok(Amount::new(10)));
    }

    #[test]
    fn test_admin_gate_checked_before_lookup() {
        let platform = platform();
        register(&platform, "alice", "111", None);
        let alice = as_user(&platform, "alice");

        assert_eq!(
            platform.approve_withdrawal_request(&alice, 12345),
            Err(EngineError::Unauthorized)
        );
        assert_eq!(
            platform.evaluate_level(&alice, &p("nobody")),
            Err(EngineError::Unauthorized)
        );
        assert_eq!(
            platform.get_user_profile(&alice, &p("nobody")),
            Err(EngineError::Unauthorized)
        );

        assert_eq!(platform.admin_login(&alice, "999"), Ok(true));
        let alice = as_user(&platform, "alice");
        assert!(matches!(
            platform.approve_withdrawal_request(&alice, 12345),
            Err(EngineError::NotFound(_))
        ));
        assert!(platform.is_caller_admin(&alice));
        assert_eq!(platform.get_caller_user_role(&alice), Role::Admin);
    }

    #[test]
    fn test_add_member_referral_attaches_root() {
        let platform = platform();
        register(&platform, "admin", "999", None);
        register(&platform, "alice", "111", None);
        register(&platform, "bob", "222", None);
        register(&platform, "carol", "333", Some("bob"));
        let admin = as_user(&platform, "admin");
        platform.admin_login(&admin, "999").unwrap();
        let admin = as_user(&platform, "admin");

        platform
            .add_member_referral(&admin, &p("alice"), &p("bob"))
            .unwrap();

        assert_eq!(platform.graph().downline_size(&p("alice")), 2);
        assert_eq!(
            platform.get_user_profile(&admin, &p("bob")).unwrap().referrer,
            Some(p("alice"))
        );
        assert!(matches!(
            platform.add_member_referral(&admin, &p("admin"), &p("bob")),
            Err(EngineError::DuplicateMembership(_))
        ));
        assert!(matches!(
            platform.add_member_referral(&admin, &p("carol"), &p("alice")),
            Err(EngineError::CycleDetected { .. })
        ));
        assert!(platform.audit().is_clean());
    }

    #[test]
    fn test_audit_reports_unpaid_unlocked_level() {
        let platform = Platform::new(EngineConfig {
            admin_phones: vec!["999".into()],
            level_table: LevelTable::new(vec![LevelConfig::new(1, 1, 10)]).unwrap(),
            ..EngineConfig::default()
        })
        .unwrap();
        register(&platform, "admin", "999", None);
        register(&platform, "alice", "111", None);
        register(&platform, "bob", "222", None);

        // Edge committed without level evaluation
        platform.graph.add_edge(&p("alice"), &p("bob")).unwrap();

        let report = platform.audit();
        assert_eq!(report.reward_mismatches, vec![p("alice")]);
        assert!(report.level_mismatches.is_empty());
        assert!(!report.is_clean());

        let admin = as_user(&platform, "admin");
        platform.admin_login(&admin, "999").unwrap();
        let admin = as_user(&platform, "admin");
        platform.evaluate_level(&admin, &p("alice")).unwrap();
        assert_eq!(platform.ledger().balance(&p("alice")), Amount::new(10));
        assert!(platform.audit().is_clean());
    }

    #[test]
    fn test_audit_reports_commission_without_record() {
        let platform = platform();
        register(&platform, "alice", "111", None);
        platform
            .ledger()
            .credit(&p("alice"), Amount::new(5), CreditKind::LoanCommission, None)
            .unwrap();

        let report = platform.audit();
        assert_eq!(report.commission_mismatches, vec![p("alice")]);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_audit_on_fresh_platform() {
        let report = platform().audit();
        assert!(report.is_clean());
        assert_eq!(report.members, 0);
    }
}
