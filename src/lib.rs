//! Sprout Quest
//!
//! Simulation core for a children's money-skills game: a tile overworld with
//! NPCs, shopping quests played as a budgeted stage machine, story quizzes,
//! and a persisted player record. Rendering and audio stay outside; a host
//! drives a [`session::GameSession`] with inputs and ticks and draws its
//! [`session::Snapshot`].

pub mod animation;
pub mod config;
pub mod console;
pub mod dialogue;
pub mod error;
pub mod feedback;
pub mod input;
pub mod level;
pub mod npc;
pub mod overworld;
pub mod persistence;
pub mod quest;
pub mod quiz;
pub mod render;
pub mod scenario;
pub mod scheduler;
pub mod session;
pub mod tilemap;

pub use config::EngineConfig;
pub use error::{ConfigError, DataError, ScenarioError, StoreError};
pub use persistence::{Persistence, PlayerState};
pub use session::{GameInput, GameSession, SessionHooks, Snapshot};
