//! Quest reward strategies
//!
//! Each quest names the formula that turns its checkout into a reward. Both
//! formulas share the settlement math (fee, coins left, scam outcome) and
//! differ only in what they pay out.

use serde::{Deserialize, Serialize};

/// Bonus coins for walking away from the scam
pub const SCAM_BONUS: u32 = 5;

/// Coins left after the fee needed to count as planning well
pub const PLANNED_WELL_MIN_COINS: u32 = 2;

/// Inputs to reward computation, captured when the quest reaches RESULT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutTally {
    pub budget: u32,
    /// Cost of everything chosen (backpack and slots)
    pub total: u32,
    pub fee: u32,
    pub avoided_scam: bool,
}

impl CheckoutTally {
    pub fn total_with_fee(&self) -> u32 {
        self.total + self.fee
    }

    pub fn final_coins_left(&self) -> u32 {
        self.budget.saturating_sub(self.total_with_fee())
    }

    pub fn planned_well(&self) -> bool {
        self.final_coins_left() >= PLANNED_WELL_MIN_COINS && self.avoided_scam
    }
}

/// Outcome of a finished quest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuestReward {
    pub total: u32,
    pub total_with_fee: u32,
    pub final_coins_left: u32,
    pub avoided_scam: bool,
    pub planned_well: bool,
    pub coins_earned: u32,
    pub xp_gained: u32,
}

pub trait RewardStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn compute(&self, tally: &CheckoutTally) -> QuestReward;
}

fn settle(tally: &CheckoutTally, coins_earned: u32, xp_gained: u32) -> QuestReward {
    QuestReward {
        total: tally.total,
        total_with_fee: tally.total_with_fee(),
        final_coins_left: tally.final_coins_left(),
        avoided_scam: tally.avoided_scam,
        planned_well: tally.planned_well(),
        coins_earned,
        xp_gained,
    }
}

/// Coins left plus a bonus for avoiding the scam; no XP
pub struct ScamBonusReward;

impl RewardStrategy for ScamBonusReward {
    fn name(&self) -> &'static str {
        "coins"
    }

    fn compute(&self, tally: &CheckoutTally) -> QuestReward {
        let bonus = if tally.avoided_scam { SCAM_BONUS } else { 0 };
        settle(tally, tally.final_coins_left() + bonus, 0)
    }
}

/// Keeps the coins left and pays XP for saving and avoiding the scam
pub struct SnackXpReward;

impl SnackXpReward {
    const BASE_XP: u32 = 10;
    const XP_PER_COIN: u32 = 2;
}

impl RewardStrategy for SnackXpReward {
    fn name(&self) -> &'static str {
        "snack_xp"
    }

    fn compute(&self, tally: &CheckoutTally) -> QuestReward {
        let bonus = if tally.avoided_scam { SCAM_BONUS } else { 0 };
        let xp = Self::BASE_XP + tally.final_coins_left() * Self::XP_PER_COIN + bonus;
        settle(tally, tally.final_coins_left(), xp)
    }
}

/// Reward formula selected by a quest definition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RewardKind {
    #[default]
    CoinsWithScamBonus,
    SnackXp,
}

impl RewardKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "coins" | "coins_with_scam_bonus" => Some(RewardKind::CoinsWithScamBonus),
            "snack_xp" | "xp" => Some(RewardKind::SnackXp),
            _ => None,
        }
    }

    pub fn strategy(&self) -> &'static dyn RewardStrategy {
        match self {
            RewardKind::CoinsWithScamBonus => &ScamBonusReward,
            RewardKind::SnackXp => &SnackXpReward,
        }
    }
}
