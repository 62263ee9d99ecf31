//! Quest Event Types
//!
//! Side effects a quest operation asks the level controller to carry out.

use serde::Serialize;

use super::reward::QuestReward;
use crate::feedback::SoundCue;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum QuestEvent {
    /// Show a coach hint over the shop
    Coach(String),
    Sound(SoundCue),
    /// A twist answer was recorded; return to the shop after the delay
    TwistReturnDue,
    /// Result reached; carries the reward computed for this session
    Finished(QuestReward),
    /// Back in the world; the session is over
    Ended,
}

impl QuestEvent {
    /// Get event type as string (for logging)
    pub fn event_type(&self) -> &'static str {
        match self {
            QuestEvent::Coach(_) => "coach",
            QuestEvent::Sound(_) => "sound",
            QuestEvent::TwistReturnDue => "twist_return_due",
            QuestEvent::Finished(_) => "finished",
            QuestEvent::Ended => "ended",
        }
    }
}
