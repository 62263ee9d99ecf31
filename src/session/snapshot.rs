//! Immutable per-tick view of a level session, consumed by renderers

use serde::Serialize;

use crate::feedback::FeedbackMessage;
use crate::overworld::WorldState;
use crate::persistence::PlayerState;
use crate::quest::{ItemCategory, QuestItem, QuestReward, ScamChoice, Stage, TwistChoice};
use crate::quiz::QuizPhase;
use crate::tilemap::GridPosition;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub now_ms: u64,
    pub level_id: u32,
    pub level_name: String,
    pub grid_width: u32,
    pub grid_height: u32,
    pub world: WorldState,
    pub npcs: Vec<NpcView>,
    pub props: Vec<GridPosition>,
    /// NPC the action key would talk to
    pub nearby_npc: Option<String>,
    pub nearby_prop: bool,
    pub stage: Stage,
    pub progress_step: u8,
    pub quest: Option<QuestView>,
    /// Level has no quest; the recovery panel is showing
    pub quest_not_found: bool,
    pub quiz: Option<QuizView>,
    pub feedback: Option<FeedbackMessage>,
    pub player: PlayerState,
    pub tutorial_open: bool,
    pub loading: bool,
    pub celebrating: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NpcView {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub position: GridPosition,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestView {
    pub title: String,
    pub stage: Stage,
    pub budget: u32,
    pub coins_left: i64,
    pub total: u32,
    pub fee: u32,
    pub notice: Option<String>,
    pub dialogue_line: Option<String>,
    pub dialogue_step: usize,
    pub dialogue_steps: usize,
    pub categories: Vec<ItemCategory>,
    pub category: ItemCategory,
    pub visible_items: Vec<QuestItem>,
    pub backpack: Vec<QuestItem>,
    pub selected: Option<usize>,
    pub slots: Vec<SlotView>,
    pub twist_choice: Option<TwistChoice>,
    pub scam_choice: Option<ScamChoice>,
    pub outcome: Option<QuestReward>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotView {
    pub label: String,
    pub category: ItemCategory,
    pub required: bool,
    pub item: Option<QuestItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizView {
    pub speaker: String,
    pub prompt: String,
    pub options: Vec<String>,
    pub selected: Option<usize>,
    pub phase: QuizPhase,
    /// Set once the answer is revealed
    pub correct: Option<bool>,
    pub explanation: Option<String>,
}
