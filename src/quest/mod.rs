//! Quest System Module
//!
//! Shopping quests defined in TOML, validated into a table keyed by level
//! id, and played through a stage machine with a pluggable reward.

pub mod cart;
pub mod definition;
pub mod engine;
pub mod events;
pub mod registry;
pub mod reward;

pub use cart::Cart;
pub use definition::{ItemCategory, QuestDefinition, QuestItem, ScamChoice, SlotConfig, TwistChoice};
pub use engine::{QuestEngine, QuestResult, Rejection, Stage};
pub use events::QuestEvent;
pub use registry::QuestRegistry;
pub use reward::{CheckoutTally, QuestReward, RewardKind, RewardStrategy};
