//! Quiz Overlay State
//!
//! One multiple-choice question, from a storyteller NPC or a generated
//! scenario: pick an option, submit, read the explanation, continue.

use serde::Serialize;

use crate::npc::{Npc, NpcStory, StoryReward};
use crate::scenario::Scenario;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QuizPhase {
    /// Choosing an option
    Answering,
    /// Answer submitted; correctness and explanation showing
    Revealed,
    /// Continued; waiting for the overlay to close
    Closing,
}

/// What continuing a quiz settles
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizOutcome {
    pub correct: bool,
    /// Paid only for a correct answer
    pub reward: Option<StoryReward>,
    /// NPC to mark completed when the answer was correct
    pub npc_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizSession {
    story: NpcStory,
    npc_id: Option<String>,
    speaker: String,
    selected: Option<usize>,
    phase: QuizPhase,
}

impl QuizSession {
    /// Quiz for a storyteller NPC; None for NPCs without a story
    pub fn for_npc(npc: &Npc) -> Option<Self> {
        let story = npc.story()?.clone();
        Some(Self {
            story,
            npc_id: Some(npc.id.clone()),
            speaker: npc.name.clone(),
            selected: None,
            phase: QuizPhase::Answering,
        })
    }

    pub fn from_scenario(scenario: Scenario) -> Self {
        Self {
            story: scenario.into_story(),
            npc_id: None,
            speaker: "Shopkeeper".to_string(),
            selected: None,
            phase: QuizPhase::Answering,
        }
    }

    pub fn story(&self) -> &NpcStory {
        &self.story
    }

    pub fn speaker(&self) -> &str {
        &self.speaker
    }

    pub fn npc_id(&self) -> Option<&str> {
        self.npc_id.as_deref()
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn phase(&self) -> QuizPhase {
        self.phase
    }

    /// Choose an option; ignored after submitting or out of range
    pub fn select(&mut self, index: usize) -> bool {
        if self.phase != QuizPhase::Answering || index >= self.story.options.len() {
            return false;
        }
        self.selected = Some(index);
        true
    }

    /// Lock in the selection. Returns whether it was correct, or None when
    /// nothing is selected yet.
    pub fn submit(&mut self) -> Option<bool> {
        if self.phase != QuizPhase::Answering {
            return None;
        }
        self.selected?;
        self.phase = QuizPhase::Revealed;
        Some(self.is_correct())
    }

    pub fn is_correct(&self) -> bool {
        self.selected == Some(self.story.correct_answer_index)
    }

    /// Settle the quiz. Only the first call after submitting yields an outcome.
    pub fn finish(&mut self) -> Option<QuizOutcome> {
        if self.phase != QuizPhase::Revealed {
            return None;
        }
        self.phase = QuizPhase::Closing;
        let correct = self.is_correct();
        Some(QuizOutcome {
            correct,
            reward: correct.then_some(self.story.reward),
            npc_id: if correct { self.npc_id.clone() } else { None },
        })
    }
}
