//! Quest Definition Structures
//!
//! Shopping quests are deserialized from TOML files and checked when they
//! are resolved, so a registered quest always has a budget, items, slots and
//! all of its narrative text.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::reward::RewardKind;

/// A quest definition loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct RawQuestFile {
    pub quest: RawQuest,
}

/// Raw quest data as it appears in TOML
#[derive(Debug, Clone, Deserialize)]
pub struct RawQuest {
    pub level_id: u32,
    pub title: String,
    pub budget: u32,
    /// Reward strategy name; "coins" when omitted
    #[serde(default)]
    pub reward: Option<String>,
    #[serde(default)]
    pub items: Vec<RawQuestItem>,
    #[serde(default)]
    pub slots: Vec<RawSlot>,
    #[serde(default)]
    pub intro_lines: Vec<String>,
    pub start_button: String,
    pub emergency: RawEmergency,
    pub fee: Fee,
    pub scam: ScamCopy,
    pub result: ResultCopy,
    pub coach_hints: CoachHints,
    #[serde(default)]
    pub toasts: Toasts,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawQuestItem {
    pub id: String,
    pub name: String,
    pub cost: u32,
    #[serde(default)]
    pub icon: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSlot {
    pub label: String,
    pub category: String,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawEmergency {
    pub message: String,
    pub speaker: String,
    pub choices: ChoicePair,
    pub reactions: ChoicePair,
    pub correct_option: String,
}

// ============================================================================
// Resolved Quest Structures (after parsing)
// ============================================================================

/// Item categories across all quest variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemCategory {
    Need,
    Want,
    Earn,
    Save,
    Fuel,
    Treat,
}

impl ItemCategory {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "need" => Some(ItemCategory::Need),
            "want" => Some(ItemCategory::Want),
            "earn" => Some(ItemCategory::Earn),
            "save" => Some(ItemCategory::Save),
            "fuel" => Some(ItemCategory::Fuel),
            "treat" => Some(ItemCategory::Treat),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemCategory::Need => "need",
            ItemCategory::Want => "want",
            ItemCategory::Earn => "earn",
            ItemCategory::Save => "save",
            ItemCategory::Fuel => "fuel",
            ItemCategory::Treat => "treat",
        }
    }

    /// Tab and message label
    pub fn label(&self) -> &'static str {
        match self {
            ItemCategory::Need => "Needs",
            ItemCategory::Want => "Wants",
            ItemCategory::Earn => "Supplies",
            ItemCategory::Save => "Savings",
            ItemCategory::Fuel => "Fuel",
            ItemCategory::Treat => "Treats",
        }
    }
}

/// An item the shop offers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestItem {
    pub id: String,
    pub name: String,
    pub cost: u32,
    pub icon: String,
    pub category: ItemCategory,
    pub description: String,
}

impl QuestItem {
    pub fn from_raw(raw: &RawQuestItem) -> Result<Self, String> {
        let category = ItemCategory::from_str(&raw.category)
            .ok_or_else(|| format!("item '{}' has unknown category '{}'", raw.id, raw.category))?;
        if raw.cost == 0 {
            return Err(format!("item '{}' must cost at least 1 coin", raw.id));
        }
        Ok(Self {
            id: raw.id.clone(),
            name: raw.name.clone(),
            cost: raw.cost,
            icon: raw.icon.clone(),
            category,
            description: raw.description.clone(),
        })
    }
}

/// A named inventory slot accepting one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotConfig {
    pub label: String,
    pub category: ItemCategory,
    /// Must be filled before checkout
    pub required: bool,
}

/// The two answers of the emergency twist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TwistChoice {
    Option1,
    Option2,
}

impl TwistChoice {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "option1" | "1" => Some(TwistChoice::Option1),
            "option2" | "2" => Some(TwistChoice::Option2),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TwistChoice::Option1 => "option1",
            TwistChoice::Option2 => "option2",
        }
    }
}

/// Answers to the scam message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScamChoice {
    Pay,
    Ask,
}

impl ScamChoice {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pay" => Some(ScamChoice::Pay),
            "ask" => Some(ScamChoice::Ask),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScamChoice::Pay => "pay",
            ScamChoice::Ask => "ask",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoicePair {
    pub option1: String,
    pub option2: String,
}

impl ChoicePair {
    pub fn get(&self, choice: TwistChoice) -> &str {
        match choice {
            TwistChoice::Option1 => &self.option1,
            TwistChoice::Option2 => &self.option2,
        }
    }
}

/// Scripted interrupt after the first pick
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Emergency {
    pub message: String,
    pub speaker: String,
    pub choices: ChoicePair,
    pub reactions: ChoicePair,
    pub correct_option: TwistChoice,
}

/// Surcharge applied at checkout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    pub message: String,
    pub hint: String,
    pub fail_message: String,
    pub amount: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScamPair {
    pub pay: String,
    pub ask: String,
}

impl ScamPair {
    pub fn get(&self, choice: ScamChoice) -> &str {
        match choice {
            ScamChoice::Pay => &self.pay,
            ScamChoice::Ask => &self.ask,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScamCopy {
    pub message: String,
    pub speaker: String,
    pub choices: ScamPair,
    pub reactions: ScamPair,
    pub rule: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultCopy {
    pub quest_complete: String,
    pub badge_title: String,
    pub badge_name: String,
    pub tip: String,
    pub return_button: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoachHints {
    pub default: String,
    pub slot_mismatch: String,
    pub over_budget: String,
    pub need_more: String,
}

/// Toast shown over the world after the result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toasts {
    pub planned_well: String,
    pub try_again: String,
}

impl Default for Toasts {
    fn default() -> Self {
        Self {
            planned_well: "You planned well!".to_string(),
            try_again: "Next time, save a little more.".to_string(),
        }
    }
}

/// A fully resolved shopping quest
#[derive(Debug, Clone, Serialize)]
pub struct QuestDefinition {
    pub level_id: u32,
    pub title: String,
    pub budget: u32,
    pub reward: RewardKind,
    pub items: Vec<QuestItem>,
    pub slots: Vec<SlotConfig>,
    pub intro_lines: Vec<String>,
    pub start_button: String,
    pub emergency: Emergency,
    pub fee: Fee,
    pub scam: ScamCopy,
    pub result: ResultCopy,
    pub coach_hints: CoachHints,
    pub toasts: Toasts,
}

impl QuestDefinition {
    /// Create a quest from raw TOML data, checking every required field
    pub fn from_raw(raw: &RawQuest) -> Result<Self, String> {
        if raw.title.trim().is_empty() {
            return Err("quest title is empty".to_string());
        }
        if raw.budget == 0 {
            return Err(format!("level {} budget must be positive", raw.level_id));
        }

        let items = raw
            .items
            .iter()
            .map(QuestItem::from_raw)
            .collect::<Result<Vec<_>, _>>()?;
        if items.is_empty() {
            return Err(format!("level {} has no items", raw.level_id));
        }
        let mut ids = HashSet::new();
        for item in &items {
            if !ids.insert(item.id.as_str()) {
                return Err(format!("duplicate item id '{}'", item.id));
            }
        }

        let slots = raw
            .slots
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let category = ItemCategory::from_str(&s.category).ok_or_else(|| {
                    format!("slot {} has unknown category '{}'", i, s.category)
                })?;
                if !items.iter().any(|item| item.category == category) {
                    return Err(format!(
                        "slot '{}' accepts {} but no item has that category",
                        s.label,
                        category.as_str()
                    ));
                }
                Ok(SlotConfig {
                    label: s.label.clone(),
                    category,
                    required: s.required,
                })
            })
            .collect::<Result<Vec<_>, String>>()?;
        if slots.is_empty() {
            return Err(format!("level {} has no slots", raw.level_id));
        }
        if !slots.iter().any(|s| s.required) {
            return Err(format!("level {} has no required slot", raw.level_id));
        }

        if raw.intro_lines.is_empty() {
            return Err(format!("level {} has no intro lines", raw.level_id));
        }

        let correct_option = TwistChoice::from_str(&raw.emergency.correct_option).ok_or_else(|| {
            format!(
                "emergency correct_option '{}' must be option1 or option2",
                raw.emergency.correct_option
            )
        })?;

        let reward = match raw.reward.as_deref() {
            None => RewardKind::default(),
            Some(name) => RewardKind::from_str(name)
                .ok_or_else(|| format!("unknown reward strategy '{}'", name))?,
        };

        Ok(Self {
            level_id: raw.level_id,
            title: raw.title.clone(),
            budget: raw.budget,
            reward,
            items,
            slots,
            intro_lines: raw.intro_lines.clone(),
            start_button: raw.start_button.clone(),
            emergency: Emergency {
                message: raw.emergency.message.clone(),
                speaker: raw.emergency.speaker.clone(),
                choices: raw.emergency.choices.clone(),
                reactions: raw.emergency.reactions.clone(),
                correct_option,
            },
            fee: raw.fee.clone(),
            scam: raw.scam.clone(),
            result: raw.result.clone(),
            coach_hints: raw.coach_hints.clone(),
            toasts: raw.toasts.clone(),
        })
    }

    pub fn item(&self, item_id: &str) -> Option<&QuestItem> {
        self.items.iter().find(|i| i.id == item_id)
    }

    /// Distinct item categories in the order items list them
    pub fn categories(&self) -> Vec<ItemCategory> {
        let mut seen = Vec::new();
        for item in &self.items {
            if !seen.contains(&item.category) {
                seen.push(item.category);
            }
        }
        seen
    }

    /// Category of the first optional slot, if any
    pub fn optional_category(&self) -> Option<ItemCategory> {
        self.slots.iter().find(|s| !s.required).map(|s| s.category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEVEL_ONE: &str = include_str!("../../data/quests/level1_saving_basics.toml");

    fn raw_level_one() -> RawQuest {
        toml::from_str::<RawQuestFile>(LEVEL_ONE).unwrap().quest
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!(ItemCategory::from_str("need"), Some(ItemCategory::Need));
        assert_eq!(ItemCategory::from_str("TREAT"), Some(ItemCategory::Treat));
        assert_eq!(ItemCategory::from_str("toy"), None);
        assert_eq!(ItemCategory::Earn.label(), "Supplies");
        assert_eq!(ItemCategory::Save.label(), "Savings");
    }

    #[test]
    fn test_level_one_resolves() {
        let quest = QuestDefinition::from_raw(&raw_level_one()).unwrap();
        assert_eq!(quest.title, "Saving Basics");
        assert_eq!(quest.budget, 20);
        assert_eq!(quest.fee.amount, 2);
        assert_eq!(quest.items.len(), 6);
        assert_eq!(quest.slots.len(), 3);
        assert_eq!(quest.slots.iter().filter(|s| s.required).count(), 2);
        assert_eq!(quest.categories(), vec![ItemCategory::Need, ItemCategory::Want]);
        assert_eq!(quest.optional_category(), Some(ItemCategory::Want));
        assert_eq!(quest.emergency.correct_option, TwistChoice::Option1);
        assert_eq!(quest.reward, RewardKind::CoinsWithScamBonus);
        assert_eq!(quest.item("soda").unwrap().cost, 8);
    }

    #[test]
    fn test_missing_items_rejected() {
        let mut raw = raw_level_one();
        raw.items.clear();
        assert!(QuestDefinition::from_raw(&raw).is_err());
    }

    #[test]
    fn test_duplicate_item_rejected() {
        let mut raw = raw_level_one();
        let copy = raw.items[0].clone();
        raw.items.push(copy);
        assert!(QuestDefinition::from_raw(&raw).unwrap_err().contains("duplicate"));
    }

    #[test]
    fn test_slot_without_matching_items_rejected() {
        let mut raw = raw_level_one();
        raw.slots[2].category = "save".to_string();
        assert!(QuestDefinition::from_raw(&raw).is_err());
    }

    #[test]
    fn test_bad_correct_option_rejected() {
        let mut raw = raw_level_one();
        raw.emergency.correct_option = "option3".to_string();
        assert!(QuestDefinition::from_raw(&raw).is_err());
    }

    #[test]
    fn test_unknown_reward_rejected() {
        let mut raw = raw_level_one();
        raw.reward = Some("lottery".to_string());
        assert!(QuestDefinition::from_raw(&raw).is_err());
    }

    #[test]
    fn test_zero_budget_rejected() {
        let mut raw = raw_level_one();
        raw.budget = 0;
        assert!(QuestDefinition::from_raw(&raw).is_err());
    }
}
