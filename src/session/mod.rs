//! Level Session
//!
//! The level controller: one player in one level. It owns the overworld,
//! input gate, the active quest or quiz, feedback, timers and the player
//! state context, and talks to its host only through [`SessionHooks`].
//!
//! Time is passed in by the caller. Every entry point first fires the
//! timers due at or before `now_ms`, so input is always evaluated against
//! the state those timers produce.

pub mod hooks;
pub mod snapshot;

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::TimingConfig;
use crate::feedback::{FeedbackKind, FeedbackPresenter, SoundCue};
use crate::input::{InputController, Intent, Key, ModalGate};
use crate::level::Level;
use crate::npc::NpcRole;
use crate::overworld::{Locomotion, Overworld, StepInput};
use crate::persistence::PlayerState;
use crate::quest::{
    ItemCategory, QuestEngine, QuestEvent, QuestRegistry, QuestResult, Rejection, ScamChoice,
    Stage, TwistChoice,
};
use crate::quiz::{QuizPhase, QuizSession};
use crate::scenario::Scenario;
use crate::scheduler::{Generation, Scheduler, TimerId};
use crate::tilemap::{Direction, TileType};

pub use hooks::{NoopHooks, ScenarioTicket, SessionHooks};
pub use snapshot::{NpcView, QuestView, QuizView, SlotView, Snapshot};

/// Player commands inside the quest panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum QuestAction {
    AdvanceDialogue,
    Start,
    CloseDialogue,
    SelectCategory(ItemCategory),
    AddItem(String),
    SelectBackpack(usize),
    RemoveBackpack(usize),
    PlaceIntoSlot(usize),
    RemoveFromSlot(usize),
    Checkout,
    ConfirmFee,
    Twist(TwistChoice),
    Scam(ScamChoice),
    SeeResults,
    ReturnToWorld,
}

/// Player commands inside the quiz overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QuizAction {
    Select(usize),
    Submit,
    Continue,
}

/// Everything a host can feed into a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum GameInput {
    KeyDown(Key),
    KeyUp(Key),
    DismissTutorial,
    Quest(QuestAction),
    Quiz(QuizAction),
    /// Close the "quest not found" panel
    DismissPanel,
    Restart,
    Exit,
    NextLevel,
}

/// Delayed effects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Effect {
    ExpireFeedback { token: u64 },
    TwistReturn,
    CloseQuiz,
    EndCelebration,
}

pub struct GameSession<H: SessionHooks> {
    quests: Arc<QuestRegistry>,
    timing: TimingConfig,
    overworld: Overworld,
    input: InputController,
    quest: Option<QuestEngine>,
    quest_not_found: bool,
    quiz: Option<QuizSession>,
    feedback: FeedbackPresenter,
    scheduler: Scheduler<Effect>,
    /// Timers that live as long as this level run
    level_generation: Generation,
    /// Timers that live as long as the current quest session
    quest_generation: Option<Generation>,
    /// Expiry of the message on screen
    feedback_timer: Option<TimerId>,
    pending_scenario: Option<ScenarioTicket>,
    player: PlayerState,
    hooks: H,
    tutorial_open: bool,
    celebrating: bool,
    next_level_available: bool,
    exited: bool,
    now_ms: u64,
}

impl<H: SessionHooks> GameSession<H> {
    pub fn new(
        level: Arc<Level>,
        quests: Arc<QuestRegistry>,
        locomotion: Locomotion,
        timing: TimingConfig,
        player: PlayerState,
        hooks: H,
    ) -> Self {
        let mut scheduler = Scheduler::new();
        let level_generation = scheduler.begin_generation();
        info!("Entering level {} ({})", level.id, level.name);
        Self {
            quests,
            overworld: Overworld::new(level, locomotion),
            input: InputController::new(),
            quest: None,
            quest_not_found: false,
            quiz: None,
            feedback: FeedbackPresenter::new(timing.feedback()),
            timing,
            scheduler,
            level_generation,
            quest_generation: None,
            feedback_timer: None,
            pending_scenario: None,
            player,
            hooks,
            tutorial_open: true,
            celebrating: false,
            next_level_available: false,
            exited: false,
            now_ms: 0,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn level(&self) -> &Level {
        self.overworld.level()
    }

    pub fn overworld(&self) -> &Overworld {
        &self.overworld
    }

    pub fn quest(&self) -> Option<&QuestEngine> {
        self.quest.as_ref()
    }

    pub fn quiz(&self) -> Option<&QuizSession> {
        self.quiz.as_ref()
    }

    pub fn feedback(&self) -> &FeedbackPresenter {
        &self.feedback
    }

    pub fn player(&self) -> &PlayerState {
        &self.player
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    pub fn stage(&self) -> Stage {
        self.quest.as_ref().map_or(Stage::World, QuestEngine::stage)
    }

    pub fn is_loading(&self) -> bool {
        self.pending_scenario.is_some()
    }

    pub fn is_celebrating(&self) -> bool {
        self.celebrating
    }

    pub fn is_exited(&self) -> bool {
        self.exited
    }

    pub fn quest_not_found(&self) -> bool {
        self.quest_not_found
    }

    /// Live timers, for hosts that sleep until the next one
    pub fn next_timer_due(&self) -> Option<u64> {
        self.scheduler.next_due()
    }

    fn gate(&self) -> ModalGate {
        let stage = self.stage();
        ModalGate {
            dialogue_open: stage == Stage::Dialogue,
            panel_open: (stage.is_modal() && stage != Stage::Dialogue) || self.quest_not_found,
            feedback_visible: self.feedback.is_visible(),
            quiz_open: self.quiz.is_some(),
            loading: self.is_loading(),
            tutorial_open: self.tutorial_open,
        }
    }

    // ========================================================================
    // Timeline
    // ========================================================================

    /// Fire every timer due at or before `now_ms`
    fn advance_to(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
        while let Some(fired) = self.scheduler.pop_due(self.now_ms) {
            match fired.effect {
                Effect::ExpireFeedback { token } => {
                    self.feedback.expire(token);
                }
                Effect::TwistReturn => {
                    if let Some(engine) = self.quest.as_mut() {
                        if let Ok(events) = engine.twist_return() {
                            self.apply_events(events);
                        }
                    }
                }
                Effect::CloseQuiz => {
                    self.quiz = None;
                }
                Effect::EndCelebration => {
                    self.celebrating = false;
                }
            }
        }
    }

    fn show_feedback(&mut self, kind: FeedbackKind, text: impl Into<String>) {
        let message = self.feedback.show(kind, text, self.now_ms);
        let (token, due) = (message.token, message.expires_at_ms);
        // The replaced message's expiry has nothing left to clear
        if let Some(old) = self.feedback_timer.take() {
            self.scheduler.cancel(old);
        }
        let id = self
            .scheduler
            .schedule(self.level_generation, due, Effect::ExpireFeedback { token });
        self.feedback_timer = Some(id);
    }

    /// Advance one render tick
    pub fn tick(&mut self, now_ms: u64, dt: f32) {
        self.advance_to(now_ms);
        if self.exited {
            return;
        }
        let input = match self.overworld.locomotion() {
            Locomotion::FreeRoam { speed, .. } if !self.gate().is_blocking() => {
                StepInput::held(self.input.velocity(speed))
            }
            _ => StepInput::default(),
        };
        self.overworld.tick(&input, dt);
    }

    // ========================================================================
    // Input
    // ========================================================================

    /// Apply one input at `now_ms`. Quest operations the engine refuses come
    /// back as the rejection; everything else is Ok, including dropped input.
    pub fn handle(&mut self, input: GameInput, now_ms: u64) -> Result<(), Rejection> {
        self.advance_to(now_ms);
        if self.exited {
            return Ok(());
        }

        match input {
            GameInput::KeyDown(key) => {
                let gate = self.gate();
                match self.input.key_down(key, &gate) {
                    Some(Intent::Move(direction)) => self.step_grid(direction),
                    Some(Intent::Interact) => self.interact(),
                    None => {}
                }
                Ok(())
            }
            GameInput::KeyUp(key) => {
                self.input.key_up(key);
                Ok(())
            }
            GameInput::DismissTutorial => {
                self.tutorial_open = false;
                Ok(())
            }
            GameInput::Quest(action) => self.quest_action(action),
            GameInput::Quiz(action) => {
                self.quiz_action(action);
                Ok(())
            }
            GameInput::DismissPanel => {
                self.quest_not_found = false;
                Ok(())
            }
            GameInput::Restart => {
                self.restart_level();
                Ok(())
            }
            GameInput::Exit => {
                self.exit();
                Ok(())
            }
            GameInput::NextLevel => {
                self.request_next_level();
                Ok(())
            }
        }
    }

    fn step_grid(&mut self, direction: Direction) {
        if self.overworld.locomotion() != Locomotion::Grid {
            // Free-roam moves from held keys on the next tick
            return;
        }
        let (dx, dy) = direction.delta();
        let pos = self.overworld.move_by(dx, dy);
        debug!("Player at ({}, {}) facing {}", pos.x, pos.y, direction.as_str());
    }

    /// Talk to the nearby NPC or inspect a nearby prop
    fn interact(&mut self) {
        if let Some(npc) = self.overworld.nearby_npc() {
            let npc = npc.clone();
            self.input.release_all();
            match &npc.role {
                NpcRole::Shopkeeper => self.open_quest(),
                NpcRole::Storyteller(_) => {
                    self.quiz = QuizSession::for_npc(&npc);
                    self.hooks.on_sound(SoundCue::Click);
                }
            }
            return;
        }

        if self.overworld.nearby_prop().is_some() {
            self.input.release_all();
            let ticket = ScenarioTicket(self.level_generation);
            self.pending_scenario = Some(ticket);
            debug!("Requesting scenario for prop");
            self.hooks.on_scenario_requested(ticket);
        }
    }

    fn open_quest(&mut self) {
        let level_id = self.level().id;
        let Some(definition) = self.quests.get(level_id) else {
            warn!("No quest defined for level {}", level_id);
            self.quest_not_found = true;
            return;
        };

        let mut engine = QuestEngine::new(definition);
        match engine.open() {
            Ok(events) => {
                if let Some(old) = self.quest_generation.take() {
                    self.scheduler.retire(old);
                }
                self.quest_generation = Some(self.scheduler.begin_generation());
                self.quest = Some(engine);
                self.apply_events(events);
            }
            Err(rejection) => warn!("Quest for level {} did not open: {}", level_id, rejection),
        }
    }

    /// A requested scenario arrived. Stale tickets are dropped.
    pub fn scenario_ready(&mut self, ticket: ScenarioTicket, scenario: Scenario, now_ms: u64) {
        self.advance_to(now_ms);
        if self.pending_scenario != Some(ticket) {
            debug!("Dropping scenario for a finished request");
            return;
        }
        self.pending_scenario = None;
        if self.exited {
            return;
        }
        self.quiz = Some(QuizSession::from_scenario(scenario));
    }

    fn quest_action(&mut self, action: QuestAction) -> Result<(), Rejection> {
        let Some(engine) = self.quest.as_mut() else {
            return Err(Rejection::WrongStage { stage: Stage::World });
        };

        let result: QuestResult = match action {
            QuestAction::AdvanceDialogue => engine.advance_dialogue(),
            QuestAction::Start => engine.start(),
            QuestAction::CloseDialogue => engine.close_dialogue(),
            QuestAction::SelectCategory(category) => engine.select_category(category),
            QuestAction::AddItem(item_id) => engine.add_item(&item_id),
            QuestAction::SelectBackpack(index) => engine.select_backpack(index),
            QuestAction::RemoveBackpack(index) => engine.remove_backpack(index),
            QuestAction::PlaceIntoSlot(slot) => engine.place_into_slot(slot),
            QuestAction::RemoveFromSlot(slot) => engine.remove_from_slot(slot),
            QuestAction::Checkout => engine.request_checkout(),
            QuestAction::ConfirmFee => engine.confirm_fee(),
            QuestAction::Twist(choice) => engine.choose_twist(choice),
            QuestAction::Scam(choice) => engine.choose_scam(choice),
            QuestAction::SeeResults => engine.see_results(),
            QuestAction::ReturnToWorld => engine.return_to_world(),
        };

        match result {
            Ok(events) => {
                self.apply_events(events);
                Ok(())
            }
            Err(rejection) => {
                let hint = rejection.coach_hint(engine.quest()).map(str::to_string);
                if let Some(hint) = hint {
                    self.show_feedback(FeedbackKind::Coach, hint);
                }
                Err(rejection)
            }
        }
    }

    fn apply_events(&mut self, events: Vec<QuestEvent>) {
        for event in events {
            debug!("Quest event: {}", event.event_type());
            match event {
                QuestEvent::Coach(text) => self.show_feedback(FeedbackKind::Coach, text),
                QuestEvent::Sound(cue) => self.hooks.on_sound(cue),
                QuestEvent::TwistReturnDue => {
                    if let Some(generation) = self.quest_generation {
                        let due = self.now_ms + self.timing.twist_return_ms;
                        self.scheduler.schedule(generation, due, Effect::TwistReturn);
                    }
                }
                QuestEvent::Finished(reward) => {
                    let level_id = self.level().id;
                    self.player.apply_reward(level_id, &reward);
                    info!(
                        "Level {} reward applied: +{} coins, +{} xp (now {} coins)",
                        level_id, reward.coins_earned, reward.xp_gained, self.player.coins
                    );
                    self.hooks.on_update_user(reward.coins_earned);

                    let toast = self.quest.as_ref().map(|engine| {
                        let toasts = &engine.quest().toasts;
                        if reward.planned_well {
                            toasts.planned_well.clone()
                        } else {
                            toasts.try_again.clone()
                        }
                    });
                    if let Some(toast) = toast {
                        self.show_feedback(FeedbackKind::Toast, toast);
                    }

                    self.celebrating = true;
                    let due = self.now_ms + self.timing.celebration_ms;
                    self.scheduler
                        .schedule(self.level_generation, due, Effect::EndCelebration);

                    self.next_level_available = true;
                    self.hooks.on_player_state_changed(&self.player);
                }
                QuestEvent::Ended => self.end_quest(),
            }
        }
    }

    fn end_quest(&mut self) {
        if let Some(generation) = self.quest_generation.take() {
            self.scheduler.retire(generation);
        }
        if self.quest.take().is_some() {
            info!("Quest session ended");
        }
    }

    fn quiz_action(&mut self, action: QuizAction) {
        let Some(quiz) = self.quiz.as_mut() else {
            return;
        };
        match action {
            QuizAction::Select(index) => {
                quiz.select(index);
            }
            QuizAction::Submit => {
                if quiz.submit().is_some() {
                    self.hooks.on_sound(SoundCue::Click);
                }
            }
            QuizAction::Continue => {
                let Some(outcome) = quiz.finish() else {
                    return;
                };
                if let Some(reward) = outcome.reward {
                    self.player.apply_story_reward(reward.xp, reward.coins);
                    info!("Quiz answered correctly: +{} xp, +{} coins", reward.xp, reward.coins);
                    self.hooks.on_sound(SoundCue::Coin);
                    self.hooks.on_update_user(reward.coins);
                    self.hooks.on_player_state_changed(&self.player);
                }
                if let Some(npc_id) = outcome.npc_id {
                    if self.overworld.mark_completed(&npc_id) {
                        info!(
                            "Resolved {} ({} of {} NPCs)",
                            npc_id,
                            self.overworld.completed_count(),
                            self.level().npcs.len()
                        );
                    }
                }
                let due = self.now_ms + self.timing.quiz_close_ms;
                self.scheduler
                    .schedule(self.level_generation, due, Effect::CloseQuiz);
            }
        }
    }

    // ========================================================================
    // Level control
    // ========================================================================

    /// Back to the start tile with a clean slate. Pending timers and any
    /// outstanding scenario request are dropped.
    pub fn restart_level(&mut self) {
        if self.exited {
            return;
        }
        self.scheduler.retire(self.level_generation);
        if let Some(generation) = self.quest_generation.take() {
            self.scheduler.retire(generation);
        }
        self.level_generation = self.scheduler.begin_generation();

        self.overworld.restart();
        self.input.release_all();
        self.quest = None;
        self.quest_not_found = false;
        self.quiz = None;
        self.pending_scenario = None;
        self.feedback.clear();
        self.feedback_timer = None;
        self.celebrating = false;
        self.next_level_available = false;
        info!("Level {} restarted", self.level().id);
    }

    /// Leave the level. `on_exit` fires once.
    pub fn exit(&mut self) {
        if self.exited {
            return;
        }
        self.scheduler.retire(self.level_generation);
        if let Some(generation) = self.quest_generation.take() {
            self.scheduler.retire(generation);
        }
        self.quest = None;
        self.quiz = None;
        self.pending_scenario = None;
        self.exited = true;
        info!("Exiting level {}", self.level().id);
        self.hooks.on_exit();
    }

    /// Ask the host for the next level; only after a result, once
    pub fn request_next_level(&mut self) -> bool {
        if self.exited || !self.next_level_available {
            return false;
        }
        self.next_level_available = false;
        self.hooks.on_next_level();
        true
    }

    // ========================================================================
    // Snapshot
    // ========================================================================

    pub fn snapshot(&self) -> Snapshot {
        let level = self.level();
        let stage = self.stage();
        Snapshot {
            now_ms: self.now_ms,
            level_id: level.id,
            level_name: level.name.clone(),
            grid_width: level.map.width,
            grid_height: level.map.height,
            world: *self.overworld.state(),
            npcs: level
                .npcs
                .iter()
                .map(|npc| NpcView {
                    id: npc.id.clone(),
                    name: npc.name.clone(),
                    icon: npc.icon.clone(),
                    position: npc.position,
                    completed: self.overworld.is_completed(&npc.id),
                })
                .collect(),
            props: level.map.positions_of(TileType::Prop),
            nearby_npc: self.overworld.nearby_npc().map(|npc| npc.id.clone()),
            nearby_prop: self.overworld.nearby_prop().is_some(),
            stage,
            progress_step: stage.progress_step(),
            quest: self.quest.as_ref().map(quest_view),
            quest_not_found: self.quest_not_found,
            quiz: self.quiz.as_ref().map(quiz_view),
            feedback: self.feedback.current().cloned(),
            player: self.player.clone(),
            tutorial_open: self.tutorial_open,
            loading: self.is_loading(),
            celebrating: self.celebrating,
        }
    }
}

fn quest_view(engine: &QuestEngine) -> QuestView {
    let quest = engine.quest();
    let cart = engine.cart();
    QuestView {
        title: quest.title.clone(),
        stage: engine.stage(),
        budget: quest.budget,
        coins_left: cart.coins_left(),
        total: cart.total(),
        fee: quest.fee.amount,
        notice: engine.notice().map(str::to_string),
        dialogue_line: engine.dialogue().current_line().map(str::to_string),
        dialogue_step: engine.dialogue().step_index(),
        dialogue_steps: engine.dialogue().total_steps(),
        categories: quest.categories(),
        category: engine.category(),
        visible_items: engine.visible_items().into_iter().cloned().collect(),
        backpack: cart.backpack().to_vec(),
        selected: cart.selected(),
        slots: cart
            .slot_configs()
            .iter()
            .zip(cart.slots())
            .map(|(config, item)| SlotView {
                label: config.label.clone(),
                category: config.category,
                required: config.required,
                item: item.clone(),
            })
            .collect(),
        twist_choice: engine.twist_choice(),
        scam_choice: engine.scam_choice(),
        outcome: engine.outcome().copied(),
    }
}

fn quiz_view(quiz: &QuizSession) -> QuizView {
    let story = quiz.story();
    let revealed = quiz.phase() != QuizPhase::Answering;
    QuizView {
        speaker: quiz.speaker().to_string(),
        prompt: story.prompt.clone(),
        options: story.options.iter().map(|o| o.text.clone()).collect(),
        selected: quiz.selected(),
        phase: quiz.phase(),
        correct: revealed.then(|| quiz.is_correct()),
        explanation: revealed.then(|| story.explanation.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::LevelRegistry;
    use crate::scenario::fallback_not_configured;
    use crate::tilemap::GridPosition;

    #[derive(Debug, Default)]
    struct Recorder {
        coins_updates: Vec<u32>,
        exits: u32,
        next_levels: u32,
        saves: Vec<PlayerState>,
        sounds: Vec<SoundCue>,
        tickets: Vec<ScenarioTicket>,
    }

    impl SessionHooks for Recorder {
        fn on_update_user(&mut self, coins_earned: u32) {
            self.coins_updates.push(coins_earned);
        }
        fn on_exit(&mut self) {
            self.exits += 1;
        }
        fn on_next_level(&mut self) {
            self.next_levels += 1;
        }
        fn on_player_state_changed(&mut self, state: &PlayerState) {
            self.saves.push(state.clone());
        }
        fn on_sound(&mut self, cue: SoundCue) {
            self.sounds.push(cue);
        }
        fn on_scenario_requested(&mut self, ticket: ScenarioTicket) {
            self.tickets.push(ticket);
        }
    }

    fn session_with(quests: QuestRegistry, level_id: u32) -> GameSession<Recorder> {
        let level = LevelRegistry::builtin().unwrap().get(level_id).unwrap();
        GameSession::new(
            level,
            Arc::new(quests),
            Locomotion::Grid,
            TimingConfig::default(),
            PlayerState::default(),
            Recorder::default(),
        )
    }

    fn session(level_id: u32) -> GameSession<Recorder> {
        let mut session = session_with(QuestRegistry::builtin().unwrap(), level_id);
        session.handle(GameInput::DismissTutorial, 0).unwrap();
        session
    }

    fn walk(session: &mut GameSession<Recorder>, path: &str, now: u64) {
        for step in path.chars() {
            let direction = match step {
                'R' => Direction::Right,
                'L' => Direction::Left,
                'U' => Direction::Up,
                _ => Direction::Down,
            };
            session.handle(GameInput::KeyDown(Key::Arrow(direction)), now).unwrap();
            session.handle(GameInput::KeyUp(Key::Arrow(direction)), now).unwrap();
        }
    }

    fn quest(session: &mut GameSession<Recorder>, action: QuestAction, now: u64) -> Result<(), Rejection> {
        session.handle(GameInput::Quest(action), now)
    }

    const TO_SHOPKEEPER: &str = "RRRDDRRUUR";
    const TO_STORYTELLER: &str = "DDRRDDL";
    const TO_PROP: &str = "DDRRDDRDD";

    /// Walk to the shopkeeper and get through the intro into the shop
    fn enter_shop(session: &mut GameSession<Recorder>, now: u64) {
        walk(session, TO_SHOPKEEPER, now);
        session.handle(GameInput::KeyDown(Key::Action), now).unwrap();
        assert_eq!(session.stage(), Stage::Dialogue);
        while !session.quest().unwrap().dialogue().can_start() {
            quest(session, QuestAction::AdvanceDialogue, now).unwrap();
        }
        quest(session, QuestAction::Start, now).unwrap();
        assert_eq!(session.stage(), Stage::Shop);
    }

    #[test]
    fn test_tutorial_gates_movement() {
        let mut session = session_with(QuestRegistry::builtin().unwrap(), 1);
        session
            .handle(GameInput::KeyDown(Key::Arrow(Direction::Right)), 0)
            .unwrap();
        assert_eq!(session.overworld().player(), GridPosition::new(1, 1));
        assert!(session.snapshot().tutorial_open);

        session.handle(GameInput::DismissTutorial, 10).unwrap();
        session
            .handle(GameInput::KeyDown(Key::Arrow(Direction::Right)), 20)
            .unwrap();
        assert_eq!(session.overworld().player(), GridPosition::new(2, 1));
    }

    #[test]
    fn test_action_without_neighbour_is_noop() {
        let mut session = session(1);
        session.handle(GameInput::KeyDown(Key::Action), 0).unwrap();
        assert_eq!(session.stage(), Stage::World);
        assert!(session.quiz().is_none());
        assert!(!session.is_loading());
    }

    #[test]
    fn test_full_quest_applies_reward_once() {
        let mut session = session(1);
        enter_shop(&mut session, 100);
        // Modal panels swallow movement
        let before = session.overworld().player();
        walk(&mut session, "L", 150);
        assert_eq!(session.overworld().player(), before);

        quest(&mut session, QuestAction::AddItem("granola".into()), 200).unwrap();
        assert_eq!(session.stage(), Stage::Twist);
        quest(&mut session, QuestAction::Twist(TwistChoice::Option1), 300).unwrap();
        // The return fires before an input at its due time is applied
        quest(&mut session, QuestAction::AddItem("granola".into()), 2300).unwrap();
        assert_eq!(session.quest().unwrap().cart().backpack().len(), 2);

        for slot in [0, 1] {
            quest(&mut session, QuestAction::SelectBackpack(0), 2400).unwrap();
            quest(&mut session, QuestAction::PlaceIntoSlot(slot), 2400).unwrap();
        }
        quest(&mut session, QuestAction::AddItem("granola".into()), 2500).unwrap();
        quest(&mut session, QuestAction::Checkout, 2600).unwrap();
        quest(&mut session, QuestAction::ConfirmFee, 2700).unwrap();
        quest(&mut session, QuestAction::Scam(ScamChoice::Ask), 2800).unwrap();
        quest(&mut session, QuestAction::SeeResults, 2900).unwrap();

        assert_eq!(session.stage(), Stage::Result);
        assert_eq!(session.player().coins, 11);
        assert!(session.player().quest1_complete);
        assert!(session.player().completed_levels.contains(&1));
        assert_eq!(session.hooks().coins_updates, vec![11]);
        assert_eq!(session.hooks().saves.len(), 1);
        assert!(session.hooks().sounds.contains(&SoundCue::Success));
        assert!(session.is_celebrating());
        assert_eq!(session.feedback().current().unwrap().text, "You planned well!");

        // Rendering the result over and over changes nothing
        for _ in 0..3 {
            let snapshot = session.snapshot();
            assert_eq!(snapshot.quest.unwrap().outcome.unwrap().coins_earned, 11);
        }
        assert!(quest(&mut session, QuestAction::SeeResults, 2950).is_err());
        assert_eq!(session.hooks().coins_updates, vec![11]);
        assert_eq!(session.player().coins, 11);

        session.tick(3900, 0.05);
        assert!(!session.is_celebrating());

        quest(&mut session, QuestAction::ReturnToWorld, 4000).unwrap();
        assert_eq!(session.stage(), Stage::World);
        assert!(session.quest().is_none());

        assert!(session.request_next_level());
        assert!(!session.request_next_level());
        assert_eq!(session.hooks().next_levels, 1);
    }

    #[test]
    fn test_rejection_shows_coach_hint() {
        let mut session = session(1);
        enter_shop(&mut session, 0);
        quest(&mut session, QuestAction::AddItem("candy".into()), 10).unwrap();
        quest(&mut session, QuestAction::Twist(TwistChoice::Option1), 20).unwrap();
        session.tick(2020, 0.05);
        assert_eq!(session.stage(), Stage::Shop);

        quest(&mut session, QuestAction::SelectBackpack(0), 3000).unwrap();
        let rejection = quest(&mut session, QuestAction::PlaceIntoSlot(0), 3000).unwrap_err();
        assert_eq!(rejection, Rejection::SlotMismatch { slot: 0 });
        let coach = session.feedback().current().unwrap();
        assert_eq!(coach.kind, FeedbackKind::Coach);
        assert_eq!(coach.text, "Fuel slots need Fuel snacks. Treat slot needs Treat.");

        // Expires on its own
        session.tick(3000 + 2200, 0.05);
        assert!(session.feedback().current().is_none());
    }

    #[test]
    fn test_new_message_survives_old_expiry() {
        let mut session = session(1);
        enter_shop(&mut session, 0);
        quest(&mut session, QuestAction::AddItem("candy".into()), 0).unwrap();
        // need_more coach shown at 0, expires at 2200
        quest(&mut session, QuestAction::Twist(TwistChoice::Option2), 1000).unwrap();
        // default coach replaced it at 1000, expires at 3200
        session.tick(2500, 0.05);
        assert_eq!(
            session.feedback().current().unwrap().text,
            "Pick 2 Fuel snacks, then 1 Treat."
        );
        session.tick(3200, 0.05);
        assert!(session.feedback().current().is_none());
    }

    #[test]
    fn test_replaced_message_drops_its_expiry() {
        let mut session = session(1);
        session.tick(100, 0.05);
        session.show_feedback(FeedbackKind::Toast, "first");
        assert_eq!(session.next_timer_due(), Some(2300));

        session.tick(1000, 0.05);
        session.show_feedback(FeedbackKind::Toast, "second");
        assert_eq!(session.next_timer_due(), Some(3200));
        assert_eq!(session.scheduler.pending(), 1);

        session.tick(3200, 0.05);
        assert!(session.feedback().current().is_none());
        assert_eq!(session.next_timer_due(), None);
    }

    #[test]
    fn test_restart_cancels_pending_twist_return() {
        let mut session = session(1);
        enter_shop(&mut session, 0);
        quest(&mut session, QuestAction::AddItem("granola".into()), 100).unwrap();
        quest(&mut session, QuestAction::Twist(TwistChoice::Option1), 100).unwrap();
        // Return due at 2100
        session.handle(GameInput::Restart, 200).unwrap();
        assert_eq!(session.stage(), Stage::World);
        assert_eq!(session.overworld().player(), GridPosition::new(1, 1));

        enter_shop(&mut session, 300);
        quest(&mut session, QuestAction::AddItem("granola".into()), 1500).unwrap();
        quest(&mut session, QuestAction::Twist(TwistChoice::Option1), 1500).unwrap();
        // The old timer would have fired here
        session.tick(2200, 0.05);
        assert_eq!(session.stage(), Stage::Twist);
        session.tick(3500, 0.05);
        assert_eq!(session.stage(), Stage::Shop);
    }

    #[test]
    fn test_missing_quest_shows_recovery_panel() {
        let mut session = session_with(QuestRegistry::new(), 2);
        session.handle(GameInput::DismissTutorial, 0).unwrap();
        walk(&mut session, TO_SHOPKEEPER, 0);
        session.handle(GameInput::KeyDown(Key::Action), 0).unwrap();

        assert!(session.quest_not_found());
        assert!(session.quest().is_none());
        assert_eq!(
            quest(&mut session, QuestAction::Start, 0),
            Err(Rejection::WrongStage { stage: Stage::World })
        );
        // Panel blocks movement until dismissed
        walk(&mut session, "L", 0);
        assert_eq!(session.overworld().player(), GridPosition::new(7, 1));

        session.handle(GameInput::DismissPanel, 0).unwrap();
        walk(&mut session, "L", 0);
        assert_eq!(session.overworld().player(), GridPosition::new(6, 1));
    }

    #[test]
    fn test_storyteller_quiz_completes_npc() {
        let mut session = session(1);
        walk(&mut session, TO_STORYTELLER, 0);
        assert_eq!(session.snapshot().nearby_npc.as_deref(), Some("coach-sam"));
        session.handle(GameInput::KeyDown(Key::Action), 0).unwrap();
        assert!(session.quiz().is_some());

        session.handle(GameInput::Quiz(QuizAction::Select(1)), 10).unwrap();
        session.handle(GameInput::Quiz(QuizAction::Submit), 20).unwrap();
        assert_eq!(session.snapshot().quiz.unwrap().correct, Some(true));
        session.handle(GameInput::Quiz(QuizAction::Continue), 30).unwrap();

        assert_eq!(session.player().xp, 10);
        assert_eq!(session.player().coins, 2);
        assert!(session.overworld().is_completed("coach-sam"));
        assert_eq!(session.overworld().completed_count(), 1);
        // Overlay stays up until the close delay passes
        assert!(session.quiz().is_some());
        session.tick(1530, 0.05);
        assert!(session.quiz().is_none());

        session.handle(GameInput::KeyDown(Key::Action), 1600).unwrap();
        assert!(session.quiz().is_none());

        session.restart_level();
        assert!(!session.overworld().is_completed("coach-sam"));
    }

    #[test]
    fn test_prop_requests_one_scenario() {
        let mut session = session(1);
        walk(&mut session, TO_PROP, 0);
        session.handle(GameInput::KeyDown(Key::Action), 0).unwrap();
        session.handle(GameInput::KeyDown(Key::Action), 10).unwrap();
        assert!(session.is_loading());
        assert_eq!(session.hooks().tickets.len(), 1);

        // Movement is blocked while loading
        let here = session.overworld().player();
        walk(&mut session, "U", 20);
        assert_eq!(session.overworld().player(), here);

        let ticket = session.hooks().tickets[0];
        session.scenario_ready(ticket, fallback_not_configured(), 500);
        assert!(!session.is_loading());
        assert_eq!(session.quiz().unwrap().speaker(), "Shopkeeper");

        // A duplicate delivery is ignored
        session.scenario_ready(ticket, fallback_not_configured(), 600);
        assert!(session.quiz().is_some());
    }

    #[test]
    fn test_scenario_after_restart_is_dropped() {
        let mut session = session(1);
        walk(&mut session, TO_PROP, 0);
        session.handle(GameInput::KeyDown(Key::Action), 0).unwrap();
        let ticket = session.hooks().tickets[0];

        session.restart_level();
        session.scenario_ready(ticket, fallback_not_configured(), 100);
        assert!(session.quiz().is_none());
        assert!(!session.is_loading());
    }

    #[test]
    fn test_exit_fires_once_and_stops_input() {
        let mut session = session(1);
        session.handle(GameInput::Exit, 0).unwrap();
        session.handle(GameInput::Exit, 10).unwrap();
        session.exit();
        assert_eq!(session.hooks().exits, 1);
        assert!(session.is_exited());

        session
            .handle(GameInput::KeyDown(Key::Arrow(Direction::Right)), 20)
            .unwrap();
        assert_eq!(session.overworld().player(), GridPosition::new(1, 1));
        assert!(!session.request_next_level());
    }

    #[test]
    fn test_free_roam_moves_on_tick() {
        let level = LevelRegistry::builtin().unwrap().get(1).unwrap();
        let mut session = GameSession::new(
            level,
            Arc::new(QuestRegistry::builtin().unwrap()),
            Locomotion::FreeRoam {
                speed: 110.0,
                tile_size: 32.0,
                interact_radius: 40.0,
            },
            TimingConfig::default(),
            PlayerState::default(),
            NoopHooks,
        );
        session.handle(GameInput::DismissTutorial, 0).unwrap();
        session
            .handle(GameInput::KeyDown(Key::Arrow(Direction::Right)), 0)
            .unwrap();
        // Key press alone does not move in free-roam
        assert_eq!(session.overworld().state().body, (1.0, 1.0));

        for i in 1..=10 {
            session.tick(i * 50, 0.05);
        }
        assert!(session.overworld().state().body.0 > 1.0);
        assert!(session.overworld().state().frame.is_moving());

        session
            .handle(GameInput::KeyUp(Key::Arrow(Direction::Right)), 600)
            .unwrap();
        session.tick(650, 0.05);
        assert!(!session.overworld().state().frame.is_moving());
    }
}
