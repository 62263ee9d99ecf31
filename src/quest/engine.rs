//! Quest Economy Engine
//!
//! Stage machine for one shopping session:
//! WORLD -> DIALOGUE -> SHOP -> TWIST -> SHOP -> CHECKOUT -> SCAM -> RESULT -> WORLD.
//!
//! Operations either succeed with a list of [`QuestEvent`]s for the level
//! controller or fail with a [`Rejection`]. A rejection never changes the
//! cart; the only stage change on rejection is the fee overflow, which
//! sends the player back to the shop with their picks intact.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use super::cart::Cart;
use super::definition::{ItemCategory, QuestDefinition, QuestItem, ScamChoice, TwistChoice};
use super::events::QuestEvent;
use super::reward::{CheckoutTally, QuestReward};
use crate::dialogue::{Advance, DialogueSequencer};
use crate::feedback::SoundCue;

/// Items shown per category tab
pub const VISIBLE_ITEMS_PER_TAB: usize = 3;

/// Steps shown by the stage progress indicator
pub const PROGRESS_STEPS: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Stage {
    World,
    Dialogue,
    Shop,
    Twist,
    Checkout,
    Scam,
    Result,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::World => "WORLD",
            Stage::Dialogue => "DIALOGUE",
            Stage::Shop => "SHOP",
            Stage::Twist => "TWIST",
            Stage::Checkout => "CHECKOUT",
            Stage::Scam => "SCAM",
            Stage::Result => "RESULT",
        }
    }

    /// Position on the progress indicator, out of [`PROGRESS_STEPS`]
    pub fn progress_step(&self) -> u8 {
        match self {
            Stage::World | Stage::Dialogue => 0,
            Stage::Shop => 1,
            Stage::Twist => 2,
            Stage::Checkout => 3,
            Stage::Scam | Stage::Result => 4,
        }
    }

    /// Stages that put a modal panel over the world
    pub fn is_modal(&self) -> bool {
        !matches!(self, Stage::World)
    }
}

/// A quest operation the engine refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("not enough coins left")]
    OverBudget,
    #[error("slot {slot} does not accept that category")]
    SlotMismatch { slot: usize },
    #[error("slot {slot} already holds an item")]
    SlotTaken { slot: usize },
    #[error("a required slot is empty")]
    MissingRequiredSlots,
    #[error("the fee does not fit the budget")]
    FeeOverflow,
    #[error("no backpack item selected")]
    NothingSelected,
    #[error("not available during {}", .stage.as_str())]
    WrongStage { stage: Stage },
    #[error("unknown item")]
    UnknownItem,
    #[error("slot is empty")]
    EmptySlot,
    #[error("no scam answer chosen")]
    NoScamChoice,
}

impl Rejection {
    /// Panel notice for this rejection, if the player should see one
    pub fn notice(&self, quest: &QuestDefinition) -> Option<String> {
        match self {
            Rejection::OverBudget => Some(quest.coach_hints.over_budget.clone()),
            Rejection::SlotMismatch { slot } => quest.slots.get(*slot).map(|config| {
                format!("{} needs {} items.", config.label, config.category.label())
            }),
            Rejection::MissingRequiredSlots => Some(quest.coach_hints.need_more.clone()),
            Rejection::FeeOverflow => Some(quest.fee.fail_message.clone()),
            Rejection::NoScamChoice => Some("Choose what to do first.".to_string()),
            Rejection::SlotTaken { .. }
            | Rejection::NothingSelected
            | Rejection::WrongStage { .. }
            | Rejection::UnknownItem
            | Rejection::EmptySlot => None,
        }
    }

    /// Coach hint that accompanies the notice
    pub fn coach_hint<'a>(&self, quest: &'a QuestDefinition) -> Option<&'a str> {
        match self {
            Rejection::SlotMismatch { .. } => Some(&quest.coach_hints.slot_mismatch),
            Rejection::MissingRequiredSlots => Some(&quest.coach_hints.default),
            Rejection::FeeOverflow => Some(&quest.fee.hint),
            _ => None,
        }
    }
}

pub type QuestResult = Result<Vec<QuestEvent>, Rejection>;

/// One shopping session against a quest definition
#[derive(Debug, Clone)]
pub struct QuestEngine {
    quest: Arc<QuestDefinition>,
    stage: Stage,
    dialogue: DialogueSequencer,
    cart: Cart,
    category: ItemCategory,
    notice: Option<String>,
    twist_shown: bool,
    twist_choice: Option<TwistChoice>,
    scam_choice: Option<ScamChoice>,
    outcome: Option<QuestReward>,
}

impl QuestEngine {
    /// Fresh session in the WORLD stage
    pub fn new(quest: Arc<QuestDefinition>) -> Self {
        let category = quest
            .categories()
            .first()
            .copied()
            .unwrap_or(ItemCategory::Need);
        Self {
            dialogue: DialogueSequencer::new(quest.intro_lines.clone()),
            cart: Cart::new(quest.budget, quest.slots.clone()),
            quest,
            stage: Stage::World,
            category,
            notice: None,
            twist_shown: false,
            twist_choice: None,
            scam_choice: None,
            outcome: None,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn quest(&self) -> &QuestDefinition {
        &self.quest
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn dialogue(&self) -> &DialogueSequencer {
        &self.dialogue
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn category(&self) -> ItemCategory {
        self.category
    }

    pub fn twist_choice(&self) -> Option<TwistChoice> {
        self.twist_choice
    }

    pub fn scam_choice(&self) -> Option<ScamChoice> {
        self.scam_choice
    }

    /// Reward fixed when RESULT was entered
    pub fn outcome(&self) -> Option<&QuestReward> {
        self.outcome.as_ref()
    }

    /// Items of the active category tab
    pub fn visible_items(&self) -> Vec<&QuestItem> {
        self.quest
            .items
            .iter()
            .filter(|item| item.category == self.category)
            .take(VISIBLE_ITEMS_PER_TAB)
            .collect()
    }

    /// Checkout figures for the current cart
    pub fn tally(&self) -> CheckoutTally {
        CheckoutTally {
            budget: self.quest.budget,
            total: self.cart.total(),
            fee: self.quest.fee.amount,
            avoided_scam: self.scam_choice != Some(ScamChoice::Pay),
        }
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    fn transition(&mut self, to: Stage) {
        debug!(
            "Quest {} stage {} -> {}",
            self.quest.level_id,
            self.stage.as_str(),
            to.as_str()
        );
        self.stage = to;
    }

    fn expect_stage(&self, stage: Stage) -> Result<(), Rejection> {
        if self.stage == stage {
            Ok(())
        } else {
            Err(Rejection::WrongStage { stage: self.stage })
        }
    }

    /// Record a rejection's notice and hand it back
    fn reject(&mut self, rejection: Rejection) -> Rejection {
        if let Some(notice) = rejection.notice(&self.quest) {
            self.notice = Some(notice);
        }
        debug!("Quest {} rejected: {}", self.quest.level_id, rejection);
        rejection
    }

    /// Shopkeeper interaction: WORLD -> DIALOGUE
    pub fn open(&mut self) -> QuestResult {
        self.expect_stage(Stage::World)?;
        self.dialogue.reset();
        self.transition(Stage::Dialogue);
        info!("Quest session started: {}", self.quest.title);
        Ok(vec![])
    }

    /// Show the next intro line; a silent no-op on the last one
    pub fn advance_dialogue(&mut self) -> QuestResult {
        self.expect_stage(Stage::Dialogue)?;
        match self.dialogue.advance() {
            Advance::NextLine => Ok(vec![QuestEvent::Sound(SoundCue::Click)]),
            Advance::ReadyToStart => {
                debug!("Intro is on its last line; waiting for start");
                Ok(vec![])
            }
        }
    }

    /// DIALOGUE -> SHOP, once the last line is showing
    pub fn start(&mut self) -> QuestResult {
        self.expect_stage(Stage::Dialogue)?;
        if !self.dialogue.can_start() {
            return Err(Rejection::WrongStage { stage: self.stage });
        }
        self.transition(Stage::Shop);
        Ok(vec![QuestEvent::Sound(SoundCue::Click)])
    }

    /// Abort the dialogue back to WORLD
    pub fn close_dialogue(&mut self) -> QuestResult {
        self.expect_stage(Stage::Dialogue)?;
        self.transition(Stage::World);
        Ok(vec![QuestEvent::Ended])
    }

    pub fn select_category(&mut self, category: ItemCategory) -> QuestResult {
        self.expect_stage(Stage::Shop)?;
        if self.quest.categories().contains(&category) {
            self.category = category;
        }
        Ok(vec![])
    }

    /// Buy an item into the backpack. The first pick of the session
    /// interrupts with the twist.
    pub fn add_item(&mut self, item_id: &str) -> QuestResult {
        self.expect_stage(Stage::Shop)?;
        let item = self.quest.item(item_id).cloned().ok_or(Rejection::UnknownItem)?;
        let category = item.category;

        if let Err(rejection) = self.cart.add(item) {
            return Err(self.reject(rejection));
        }

        let mut events = Vec::new();
        if self.quest.optional_category() == Some(category) && !self.cart.required_filled() {
            events.push(QuestEvent::Coach(self.quest.coach_hints.need_more.clone()));
        }
        events.push(QuestEvent::Sound(SoundCue::Click));
        self.notice = None;

        if !self.twist_shown && self.cart.chosen_count() >= 1 {
            self.twist_shown = true;
            self.transition(Stage::Twist);
        }
        Ok(events)
    }

    pub fn select_backpack(&mut self, index: usize) -> QuestResult {
        self.expect_stage(Stage::Shop)?;
        self.cart.toggle_select(index);
        Ok(vec![])
    }

    /// Drop a backpack item and get its coins back
    pub fn remove_backpack(&mut self, index: usize) -> QuestResult {
        self.expect_stage(Stage::Shop)?;
        if self.cart.remove_from_backpack(index).is_none() {
            return Ok(vec![]);
        }
        self.notice = None;
        Ok(vec![QuestEvent::Sound(SoundCue::Click)])
    }

    pub fn place_into_slot(&mut self, slot: usize) -> QuestResult {
        self.expect_stage(Stage::Shop)?;
        match self.cart.place_into_slot(slot) {
            Ok(()) => Ok(vec![QuestEvent::Sound(SoundCue::Click)]),
            Err(rejection) => Err(self.reject(rejection)),
        }
    }

    pub fn remove_from_slot(&mut self, slot: usize) -> QuestResult {
        self.expect_stage(Stage::Shop)?;
        self.cart.remove_from_slot(slot)?;
        Ok(vec![QuestEvent::Sound(SoundCue::Click)])
    }

    /// SHOP -> CHECKOUT when the required slots are filled and the cart fits
    pub fn request_checkout(&mut self) -> QuestResult {
        self.expect_stage(Stage::Shop)?;
        if !self.cart.required_filled() {
            return Err(self.reject(Rejection::MissingRequiredSlots));
        }
        if self.cart.coins_left() < 0 {
            return Err(self.reject(Rejection::OverBudget));
        }
        self.notice = None;
        self.transition(Stage::Checkout);
        Ok(vec![])
    }

    /// Accept the fee. CHECKOUT -> SCAM if it fits, otherwise back to SHOP.
    pub fn confirm_fee(&mut self) -> QuestResult {
        self.expect_stage(Stage::Checkout)?;
        if self.tally().total_with_fee() > self.quest.budget {
            self.transition(Stage::Shop);
            return Err(self.reject(Rejection::FeeOverflow));
        }
        self.transition(Stage::Scam);
        Ok(vec![QuestEvent::Sound(SoundCue::Click)])
    }

    /// Answer the twist. Only the first answer counts.
    pub fn choose_twist(&mut self, choice: TwistChoice) -> QuestResult {
        self.expect_stage(Stage::Twist)?;
        if self.twist_choice.is_some() {
            return Ok(vec![]);
        }
        self.twist_choice = Some(choice);
        self.notice = Some(self.quest.emergency.reactions.get(choice).to_string());

        let mut events = Vec::new();
        if choice != self.quest.emergency.correct_option {
            events.push(QuestEvent::Coach(self.quest.coach_hints.default.clone()));
        }
        events.push(QuestEvent::Sound(SoundCue::Click));
        events.push(QuestEvent::TwistReturnDue);
        Ok(events)
    }

    /// Delayed TWIST -> SHOP after an answer
    pub fn twist_return(&mut self) -> QuestResult {
        if self.stage != Stage::Twist || self.twist_choice.is_none() {
            return Ok(vec![]);
        }
        self.notice = None;
        self.transition(Stage::Shop);
        Ok(vec![])
    }

    /// Answer the scam message; may be changed until results are requested
    pub fn choose_scam(&mut self, choice: ScamChoice) -> QuestResult {
        self.expect_stage(Stage::Scam)?;
        self.scam_choice = Some(choice);
        self.notice = Some(self.quest.scam.reactions.get(choice).to_string());
        Ok(vec![QuestEvent::Sound(SoundCue::Click)])
    }

    /// SCAM -> RESULT. The reward is computed here and only here.
    pub fn see_results(&mut self) -> QuestResult {
        self.expect_stage(Stage::Scam)?;
        if self.scam_choice.is_none() {
            return Err(self.reject(Rejection::NoScamChoice));
        }

        let reward = match self.outcome {
            Some(reward) => reward,
            None => {
                let strategy = self.quest.reward.strategy();
                let reward = strategy.compute(&self.tally());
                info!(
                    "Quest {} finished ({}): {} coins, {} xp",
                    self.quest.level_id, strategy.name(), reward.coins_earned, reward.xp_gained
                );
                self.outcome = Some(reward);
                reward
            }
        };
        self.notice = None;
        self.transition(Stage::Result);
        Ok(vec![
            QuestEvent::Sound(SoundCue::Success),
            QuestEvent::Finished(reward),
        ])
    }

    /// RESULT -> WORLD; the session is over
    pub fn return_to_world(&mut self) -> QuestResult {
        self.expect_stage(Stage::Result)?;
        self.transition(Stage::World);
        Ok(vec![QuestEvent::Ended])
    }
}
