//! Level engine: derives levels from downline size and pays rewards once

use crate::levels::LevelTable;
use dashmap::DashMap;
use levelbank_core::{Amount, EngineError, EngineResult, Principal};
use levelbank_ledger::{CreditKind, CreditPosting, Ledger};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LevelState {
    level: u8,
    /// Bit `n - 1` set once level `n`'s reward has been granted
    rewarded: u16,
}

impl Default for LevelState {
    fn default() -> Self {
        Self {
            level: 1,
            rewarded: 0,
        }
    }
}

impl LevelState {
    fn is_rewarded(&self, level: u8) -> bool {
        self.rewarded & bit(level) != 0
    }
}

fn bit(level: u8) -> u16 {
    1u16 << (level - 1)
}

fn reward_postings(due: &[(u8, Amount)]) -> Vec<CreditPosting> {
    due.iter()
        .map(|(level, reward)| {
            CreditPosting::new(*reward, CreditKind::LevelReward)
                .with_reference(format!("level:{level}"))
        })
        .collect()
}

/// Outcome of an evaluation that changed something
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelUp {
    pub user: Principal,
    pub from_level: u8,
    pub to_level: u8,
    /// `(level, reward)` pairs paid by this evaluation, ascending
    pub rewards: Vec<(u8, Amount)>,
}

impl LevelUp {
    pub fn total_paid(&self) -> Amount {
        Amount::new(self.rewards.iter().map(|(_, r)| r.value()).sum())
    }
}

/// Per-member level and reward-granted flags
///
/// Level and "reward granted" are tracked separately so that a burst of
/// registrations that jumps several levels at once still pays every
/// intermediate reward exactly once.
#[derive(Debug)]
pub struct LevelEngine {
    table: LevelTable,
    states: DashMap<Principal, LevelState>,
}

impl LevelEngine {
    pub fn new(table: LevelTable) -> Self {
        Self {
            table,
            states: DashMap::new(),
        }
    }

    pub fn table(&self) -> &LevelTable {
        &self.table
    }

    /// Re-derive `user`'s level from `downline_size`, paying any reward due.
    ///
    /// Every unlocked level without a granted reward is paid in one ledger
    /// batch; flags and level are only updated after the batch commits, so
    /// a failed credit leaves the member untouched. Returns `None` when
    /// nothing changed.
    ///
    /// Callers must hold the referral graph writer that produced
    /// `downline_size`, so the size cannot be stale.
    pub fn evaluate(
        &self,
        user: &Principal,
        downline_size: u64,
        ledger: &Ledger,
    ) -> EngineResult<Option<LevelUp>> {
        let target = self.table.level_for(downline_size);
        let mut state = self.states.entry(user.clone()).or_default();

        let due = self.due(&state, downline_size);

        if due.is_empty() && state.level >= target {
            return Ok(None);
        }

        if !due.is_empty() {
            ledger.credit_many(user, &reward_postings(&due))?;
        }

        let from_level = state.level;
        for (level, _) in &due {
            state.rewarded |= bit(*level);
        }
        state.level = state.level.max(target);

        let level_up = LevelUp {
            user: user.clone(),
            from_level,
            to_level: state.level,
            rewards: due,
        };

        tracing::info!(
            user = %user,
            from = from_level,
            to = level_up.to_level,
            downline = downline_size,
            paid = level_up.total_paid().value(),
            "Level evaluated"
        );

        Ok(Some(level_up))
    }

    /// `(level, reward)` pairs unlocked by `downline_size` whose reward has
    /// not been granted yet, ascending.
    pub fn rewards_due(&self, user: &Principal, downline_size: u64) -> Vec<(u8, Amount)> {
        let state = self.states.get(user).map(|s| *s).unwrap_or_default();
        self.due(&state, downline_size)
    }

    /// Fail the way `evaluate` would if `user` reached `downline_size` now.
    ///
    /// Lets a caller refuse a structural change before committing it when
    /// the reward it unlocks cannot be credited.
    pub fn check_payable(
        &self,
        user: &Principal,
        downline_size: u64,
        ledger: &Ledger,
    ) -> EngineResult<()> {
        let due = self.rewards_due(user, downline_size);
        if due.is_empty() {
            return Ok(());
        }
        ledger.check_credit_many(user, &reward_postings(&due))
    }

    fn due(&self, state: &LevelState, downline_size: u64) -> Vec<(u8, Amount)> {
        self.table
            .qualifying(downline_size)
            .filter(|e| !state.is_rewarded(e.level))
            .map(|e| (e.level, e.reward))
            .collect()
    }

    /// Flag `level`'s reward as granted without paying it.
    ///
    /// Returns `true` on the first call for a `(user, level)` pair and
    /// `false` afterwards.
    pub fn mark_level_rewarded(&self, user: &Principal, level: u8) -> EngineResult<bool> {
        if self.table.get(level).is_none() {
            return Err(EngineError::InvalidState(format!(
                "level {level} is not in the level table"
            )));
        }

        let mut state = self.states.entry(user.clone()).or_default();
        if state.is_rewarded(level) {
            return Ok(false);
        }
        state.rewarded |= bit(level);
        Ok(true)
    }

    /// Current level (1 for members without state)
    pub fn level_of(&self, user: &Principal) -> u8 {
        self.states.get(user).map(|s| s.level).unwrap_or(1)
    }

    pub fn is_rewarded(&self, user: &Principal, level: u8) -> bool {
        if self.table.get(level).is_none() {
            return false;
        }
        self.states
            .get(user)
            .map(|s| s.is_rewarded(level))
            .unwrap_or(false)
    }
}
