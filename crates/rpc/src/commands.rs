//! CLI commands

use levelbank_core::{Amount, EngineError, Principal};
use levelbank_ledger::read_jsonl;
use levelbank_loans::LoanReferralSubmission;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;

use crate::config::EngineConfig;
use crate::gate::StaticIdentity;
use crate::platform::{AuditReport, Platform};

/// Allow-listed phone used by the simulated admin
const SIMULATION_ADMIN_PHONE: &str = "0000000000";

/// Print the level table
pub fn levels(config: &EngineConfig) {
    println!("{:>5}  {:>10}  {:>10}", "level", "team size", "reward");
    for entry in config.level_table.entries() {
        println!(
            "{:>5}  {:>10}  {:>10}",
            entry.level,
            entry.required_team_size,
            entry.reward.value()
        );
    }
    println!("Total rewards: {}", config.level_table.total_rewards());
}

/// Print the effective configuration as JSON
pub fn show_config(config: &EngineConfig) -> Result<(), anyhow::Error> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

/// Read an exported journal and verify its hash chain
pub fn verify(path: &Path) -> Result<(), anyhow::Error> {
    let entries = read_jsonl(path)?;
    println!("✅ Hash chain verified ({} entries)", entries.len());
    Ok(())
}

/// Parameters of a simulation run
#[derive(Debug, Clone)]
pub struct SimulateOptions {
    /// Members to register (including the root)
    pub members: usize,
    /// Direct referrals per member
    pub fanout: usize,
    /// Members that deposit and request a withdrawal
    pub withdrawals: usize,
    /// Members that submit a loan referral
    pub loans: usize,
    /// Export the journal as JSONL here when done
    pub export: Option<PathBuf>,
}

impl Default for SimulateOptions {
    fn default() -> Self {
        Self {
            members: 200,
            fanout: 3,
            withdrawals: 20,
            loans: 10,
            export: None,
        }
    }
}

/// Outcome of a simulation run
#[derive(Debug, Clone, Serialize)]
pub struct SimulationSummary {
    pub members: usize,
    pub level_ups: usize,
    pub level_rewards_paid: u64,
    pub withdrawals_requested: usize,
    pub withdrawals_approved: usize,
    /// Duplicate approvals refused with `InvalidState`
    pub duplicate_approvals_refused: usize,
    pub loan_referrals: usize,
    pub audit: AuditReport,
}

fn member(index: usize) -> Result<Principal, anyhow::Error> {
    Ok(format!("m{index}").parse()?)
}

/// Referrer of member `index` in a tree with the given fanout
fn parent_of(index: usize, fanout: usize) -> Option<usize> {
    (index > 0).then(|| (index - 1) / fanout)
}

fn depth_of(mut index: usize, fanout: usize) -> usize {
    let mut depth = 0;
    while let Some(parent) = parent_of(index, fanout) {
        index = parent;
        depth += 1;
    }
    depth
}

/// Run concurrent registrations, deposits, withdrawals and loan referrals
/// against a fresh platform, then audit it.
///
/// Members at the same tree depth register concurrently; every withdrawal
/// request is approved twice at the same time to exercise exactly-once
/// approval.
pub async fn simulate(
    mut config: EngineConfig,
    options: &SimulateOptions,
) -> Result<SimulationSummary, anyhow::Error> {
    if options.members == 0 || options.fanout == 0 {
        anyhow::bail!("members and fanout must be positive");
    }
    config.add_admin_phones(SIMULATION_ADMIN_PHONE);
    let platform = Arc::new(Platform::new(config)?);

    // === Registrations, one wave per depth ===
    let mut waves: Vec<Vec<usize>> = Vec::new();
    for index in 0..options.members {
        let depth = depth_of(index, options.fanout);
        if waves.len() <= depth {
            waves.resize_with(depth + 1, Vec::new);
        }
        waves[depth].push(index);
    }

    let mut level_ups = 0;
    let mut level_rewards_paid = 0u64;
    for wave in waves {
        let mut tasks = JoinSet::new();
        for index in wave {
            let platform = platform.clone();
            let principal = member(index)?;
            let referrer = parent_of(index, options.fanout).map(member).transpose()?;
            tasks.spawn(async move {
                let caller = platform.resolve(&StaticIdentity::new(principal.clone()));
                platform.register_user(
                    &caller,
                    principal.as_str(),
                    &format!("9{index:09}"),
                    referrer.as_ref(),
                    platform.config().registration_fee,
                )
            });
        }
        while let Some(joined) = tasks.join_next().await {
            let registration = joined??;
            level_ups += registration.level_ups.len();
            level_rewards_paid += registration
                .level_ups
                .iter()
                .map(|up| up.total_paid().value())
                .sum::<u64>();
        }
    }
    tracing::info!(members = options.members, level_ups, "Registrations complete");

    // === Deposits and withdrawal requests ===
    let withdrawers = options.withdrawals.min(options.members);
    let mut tasks = JoinSet::new();
    for index in 0..withdrawers {
        let platform = platform.clone();
        let principal = member(index)?;
        tasks.spawn(async move {
            let caller = platform.resolve(&StaticIdentity::new(principal));
            platform.deposit(&caller, Amount::new(10_000))?;
            let balance = platform.ledger().balance(caller.authenticated()?);
            let amount = balance.fraction_bps(platform.config().withdrawal_cap_bps);
            let bank_details = format!("IFSC0{index:06} / {index:010}");
            platform
                .create_withdrawal_request(&caller, amount, &bank_details)
                .map(|request| request.id)
        });
    }
    let mut request_ids = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        request_ids.push(joined??);
    }

    // === Concurrent double approval ===
    let admin: Principal = "admin".parse()?;
    let admin_caller = platform.resolve(&StaticIdentity::new(admin.clone()));
    platform.register_user(
        &admin_caller,
        "admin",
        SIMULATION_ADMIN_PHONE,
        None,
        Amount::ZERO,
    )?;
    if !platform.admin_login(&admin_caller, SIMULATION_ADMIN_PHONE)? {
        anyhow::bail!("simulation admin was refused");
    }
    let admin_caller = platform.resolve(&StaticIdentity::new(admin));

    let mut tasks = JoinSet::new();
    for id in request_ids.iter().copied() {
        for _ in 0..2 {
            let platform = platform.clone();
            let caller = admin_caller.clone();
            tasks.spawn(async move { platform.approve_withdrawal_request(&caller, id) });
        }
    }
    let mut withdrawals_approved = 0;
    let mut duplicate_approvals_refused = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined? {
            Ok(_) => withdrawals_approved += 1,
            Err(EngineError::InvalidState(_)) => duplicate_approvals_refused += 1,
            Err(e) => return Err(e.into()),
        }
    }

    // === Loan referrals ===
    let referrers = options.loans.min(options.members);
    for index in 0..referrers {
        let caller = platform.resolve(&StaticIdentity::new(member(index)?));
        platform.submit_loan_referral(
            &caller,
            LoanReferralSubmission {
                borrower_name: format!("Borrower {index}"),
                phone_number: format!("8{index:09}"),
                loan_amount: Amount::new(100_000),
                notes: String::new(),
            },
        )?;
    }

    let audit = platform.audit();
    if !audit.is_clean() {
        anyhow::bail!("audit failed: {audit:?}");
    }

    if let Some(path) = &options.export {
        let written = platform.ledger().journal().export_jsonl(path)?;
        println!("📝 Exported {written} journal entries to {}", path.display());
    }

    Ok(SimulationSummary {
        members: options.members,
        level_ups,
        level_rewards_paid,
        withdrawals_requested: request_ids.len(),
        withdrawals_approved,
        duplicate_approvals_refused,
        loan_referrals: referrers,
        audit,
    })
}

/// Print a simulation summary
pub fn print_summary(summary: &SimulationSummary) {
    println!("✅ Simulation complete");
    println!("   Members:               {}", summary.members);
    println!("   Level-ups:             {}", summary.level_ups);
    println!("   Level rewards paid:    {}", summary.level_rewards_paid);
    println!(
        "   Withdrawals approved:  {}/{} ({} duplicate approvals refused)",
        summary.withdrawals_approved,
        summary.withdrawals_requested,
        summary.duplicate_approvals_refused
    );
    println!("   Loan referrals:        {}", summary.loan_referrals);
    println!("   Total balance:         {}", summary.audit.total_balance);
    println!("   Journal entries:       {}", summary.audit.journal_entries);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_shape() {
        assert_eq!(parent_of(0, 3), None);
        assert_eq!(parent_of(1, 3), Some(0));
        assert_eq!(parent_of(3, 3), Some(0));
        assert_eq!(parent_of(4, 3), Some(1));
        assert_eq!(depth_of(0, 3), 0);
        assert_eq!(depth_of(3, 3), 1);
        assert_eq!(depth_of(13, 3), 3);
        assert_eq!(depth_of(5, 1), 5);
    }
}
