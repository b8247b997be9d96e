//! Multiplier resolution and winner crediting.

use std::collections::HashSet;

use spintrack_types::{
    Bet, GameConfig, JackpotSlots, LedgerReason, Payout, PoolJackpotTarget,
};

use crate::ledger::LedgerStore;

pub struct PayoutEngine {
    config: GameConfig,
    jackpot: JackpotSlots,
}

impl PayoutEngine {
    pub fn new(config: GameConfig, jackpot: JackpotSlots) -> Self {
        Self { config, jackpot }
    }

    /// The slot the pooled jackpot is attached to.
    pub fn pool_jackpot_slot(&self) -> u32 {
        match self.config.pool_jackpot_slot {
            PoolJackpotTarget::Big => self.jackpot.big,
            PoolJackpotTarget::Small => self.jackpot.small,
        }
    }

    /// Resolve the flat multiplier for a slot.
    ///
    /// An explicit per-slot table wins when it has an entry (zero counts);
    /// under `strict` an absent entry pays nothing instead of falling
    /// through. The pool-jackpot slot pays 0 here when the pool replaces
    /// its flat multiplier. Everything else gets the jackpot big/small or
    /// normal default.
    pub fn multiplier(&self, slot_id: u32) -> u64 {
        if !self.config.slot_multipliers.is_empty() {
            if let Some(mult) = self.config.slot_multipliers.get(&slot_id) {
                return *mult;
            }
            if self.config.slot_multipliers_strict {
                return 0;
            }
        }
        if self.config.pool_jackpot_enabled
            && !self.config.pool_jackpot_keep_base_mult
            && slot_id == self.pool_jackpot_slot()
        {
            return 0;
        }
        if slot_id == self.jackpot.big {
            self.config.jackpot_big_mult
        } else if slot_id == self.jackpot.small {
            self.config.jackpot_small_mult
        } else {
            self.config.normal_mult
        }
    }

    /// Credit every bet sitting on a winning slot. Zero-multiplier slots
    /// are skipped entirely (no payout record, no ledger entry). Jackpot
    /// slots override the caller's reason with `jackpot`. Each payout
    /// carries the delta the ledger actually applied.
    pub fn apply_bets(
        &self,
        store: &mut LedgerStore,
        bets: &[Bet],
        winning_slots: &[u32],
        reason: LedgerReason,
        now_ms: u64,
    ) -> Vec<Payout> {
        let winning: HashSet<u32> = winning_slots.iter().copied().collect();
        let mut payouts = Vec::new();
        for bet in bets {
            if !winning.contains(&bet.slot_id) {
                continue;
            }
            let mult = self.multiplier(bet.slot_id);
            if mult == 0 {
                continue;
            }
            let nominal = (bet.amount * mult) as i64;
            let final_reason = if self.jackpot.contains(bet.slot_id) {
                LedgerReason::Jackpot
            } else {
                reason
            };
            let actual = store.add_ledger(&bet.user_id, nominal, final_reason, now_ms);
            payouts.push(Payout {
                user_id: bet.user_id.clone(),
                slot_id: bet.slot_id,
                amount: bet.amount,
                multiplier: mult,
                delta: actual,
                reason: final_reason,
            });
        }
        payouts
    }
}
