//! Scenario Provider
//!
//! Money scenarios for prop tiles in the quiz variant. A provider may be
//! slow or unavailable; [`generate_or_fallback`] always yields a usable
//! scenario so gameplay never stalls on it.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ScenarioError;
use crate::npc::{NpcStory, StoryOption, StoryReward};

/// A generated multiple-choice money question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer_index: usize,
    pub explanation: String,
    pub reward: StoryReward,
}

impl Scenario {
    /// Reject scenarios the quiz could not play
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.question.trim().is_empty() {
            return Err(ScenarioError::Malformed("empty question".to_string()));
        }
        if self.options.len() < 2 {
            return Err(ScenarioError::Malformed(format!(
                "needs at least 2 options, got {}",
                self.options.len()
            )));
        }
        if self.correct_answer_index >= self.options.len() {
            return Err(ScenarioError::Malformed(format!(
                "correct answer {} out of range",
                self.correct_answer_index
            )));
        }
        Ok(())
    }

    /// The same question in story form, for the quiz overlay
    pub fn into_story(self) -> NpcStory {
        NpcStory {
            prompt: self.question,
            options: self
                .options
                .into_iter()
                .map(|text| StoryOption { text, coins: None })
                .collect(),
            correct_answer_index: self.correct_answer_index,
            explanation: self.explanation,
            reward: self.reward,
        }
    }
}

/// Source of generated scenarios
#[async_trait]
pub trait ScenarioProvider: Send + Sync {
    async fn generate(&self) -> Result<Scenario, ScenarioError>;
}

/// Provider used when nothing is configured
pub struct UnconfiguredProvider;

#[async_trait]
impl ScenarioProvider for UnconfiguredProvider {
    async fn generate(&self) -> Result<Scenario, ScenarioError> {
        Err(ScenarioError::NotConfigured)
    }
}

/// Serves scenarios from a JSON file (one object or an array), rotating
/// through them on each request
pub struct FileScenarioProvider {
    path: PathBuf,
    cursor: AtomicUsize,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScenarioFile {
    Many(Vec<Scenario>),
    One(Scenario),
}

impl FileScenarioProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cursor: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ScenarioProvider for FileScenarioProvider {
    async fn generate(&self) -> Result<Scenario, ScenarioError> {
        let contents = tokio::fs::read_to_string(&self.path).await?;
        let scenarios = match serde_json::from_str::<ScenarioFile>(&contents)? {
            ScenarioFile::Many(list) => list,
            ScenarioFile::One(one) => vec![one],
        };
        if scenarios.is_empty() {
            return Err(ScenarioError::Malformed(format!("{:?} holds no scenarios", self.path)));
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % scenarios.len();
        Ok(scenarios[index].clone())
    }
}

/// Shown when no provider is configured
pub fn fallback_not_configured() -> Scenario {
    Scenario {
        question: "You earned $10 from your lemonade stand! What should you do first?".to_string(),
        options: vec![
            "Spend it all on candy".to_string(),
            "Save $5 and spend $5".to_string(),
            "Hide it under your bed".to_string(),
        ],
        correct_answer_index: 1,
        explanation: "Saving half helps you buy something bigger later!".to_string(),
        reward: StoryReward { xp: 15, coins: 10 },
    }
}

/// Shown when the provider failed or returned something unusable
pub fn fallback_failed() -> Scenario {
    Scenario {
        question: "Your grandma gave you $20 for your birthday. What is a smart move?".to_string(),
        options: vec![
            "Buy 20 chocolate bars".to_string(),
            "Put it in a savings jar".to_string(),
            "Lose it in the park".to_string(),
        ],
        correct_answer_index: 1,
        explanation: "Saving money keeps it safe and helps it grow!".to_string(),
        reward: StoryReward { xp: 20, coins: 5 },
    }
}

/// Ask the provider once; fall back on any failure. Never errors.
pub async fn generate_or_fallback(provider: &dyn ScenarioProvider) -> Scenario {
    match provider.generate().await {
        Ok(scenario) => match scenario.validate() {
            Ok(()) => {
                info!("Generated scenario: {}", scenario.question);
                scenario
            }
            Err(e) => {
                warn!("Discarding generated scenario: {}", e);
                fallback_failed()
            }
        },
        Err(ScenarioError::NotConfigured) => {
            warn!("No scenario provider configured, using built-in scenario");
            fallback_not_configured()
        }
        Err(e) => {
            warn!("Scenario generation failed: {}", e);
            fallback_failed()
        }
    }
}
