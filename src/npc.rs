//! Level NPCs
//!
//! NPCs are immutable level data. Whether one has already been resolved is
//! tracked by the session, not here.

use serde::{Deserialize, Serialize};

use crate::tilemap::GridPosition;

// ============================================================================
// Raw NPC Structures (as they appear in level TOML)
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RawNpc {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub icon: String,
    pub position: [i32; 2],
    /// Restrict to one level of a shared map; absent means every level
    #[serde(default)]
    pub level_id: Option<u32>,
    pub role: String,
    #[serde(default)]
    pub story: Option<RawStory>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawStory {
    pub prompt: String,
    pub options: Vec<RawStoryOption>,
    pub correct_answer_index: usize,
    pub explanation: String,
    #[serde(default)]
    pub reward: StoryReward,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawStoryOption {
    pub text: String,
    #[serde(default)]
    pub coins: Option<u32>,
}

// ============================================================================
// Resolved NPC Structures
// ============================================================================

/// Reward granted for a correct story answer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryReward {
    #[serde(default)]
    pub xp: u32,
    #[serde(default)]
    pub coins: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoryOption {
    pub text: String,
    /// Coin amount the option talks about, shown next to its text
    pub coins: Option<u32>,
}

/// A multiple-choice money story told by an NPC
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NpcStory {
    pub prompt: String,
    pub options: Vec<StoryOption>,
    pub correct_answer_index: usize,
    pub explanation: String,
    pub reward: StoryReward,
}

impl NpcStory {
    pub fn from_raw(raw: &RawStory) -> Result<Self, String> {
        if raw.options.is_empty() {
            return Err("story has no options".to_string());
        }
        if raw.correct_answer_index >= raw.options.len() {
            return Err(format!(
                "correct_answer_index {} out of range for {} options",
                raw.correct_answer_index,
                raw.options.len()
            ));
        }
        Ok(Self {
            prompt: raw.prompt.clone(),
            options: raw
                .options
                .iter()
                .map(|o| StoryOption {
                    text: o.text.clone(),
                    coins: o.coins,
                })
                .collect(),
            correct_answer_index: raw.correct_answer_index,
            explanation: raw.explanation.clone(),
            reward: raw.reward,
        })
    }
}

/// What interacting with an NPC does
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum NpcRole {
    /// Opens the level's shopping quest
    Shopkeeper,
    /// Asks a story question
    Storyteller(NpcStory),
}

impl NpcRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            NpcRole::Shopkeeper => "shopkeeper",
            NpcRole::Storyteller(_) => "storyteller",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Npc {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub position: GridPosition,
    pub level_id: u32,
    pub role: NpcRole,
}

impl Npc {
    /// Resolve a raw NPC for a concrete level
    pub fn from_raw(raw: &RawNpc, level_id: u32) -> Result<Self, String> {
        let role = match raw.role.to_lowercase().as_str() {
            "shopkeeper" | "shop" => NpcRole::Shopkeeper,
            "storyteller" | "story" => {
                let story = raw
                    .story
                    .as_ref()
                    .ok_or_else(|| format!("storyteller '{}' has no story", raw.id))?;
                NpcRole::Storyteller(
                    NpcStory::from_raw(story).map_err(|e| format!("npc '{}': {}", raw.id, e))?,
                )
            }
            other => return Err(format!("npc '{}' has unknown role '{}'", raw.id, other)),
        };

        Ok(Self {
            id: raw.id.clone(),
            name: raw.name.clone(),
            icon: raw.icon.clone(),
            position: GridPosition::new(raw.position[0], raw.position[1]),
            level_id,
            role,
        })
    }

    pub fn is_shopkeeper(&self) -> bool {
        matches!(self.role, NpcRole::Shopkeeper)
    }

    pub fn story(&self) -> Option<&NpcStory> {
        match &self.role {
            NpcRole::Storyteller(story) => Some(story),
            NpcRole::Shopkeeper => None,
        }
    }
}
