//! Callbacks from a level session to its host

use crate::feedback::SoundCue;
use crate::persistence::PlayerState;
use crate::scheduler::Generation;

/// Identifies an outstanding scenario request. Hand it back with the
/// scenario; tickets from an earlier level run are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioTicket(pub(crate) Generation);

/// Host callbacks. Each fires at most once per logical event.
pub trait SessionHooks {
    /// A quest reward was applied to the player state
    fn on_update_user(&mut self, _coins_earned: u32) {}

    /// The player left the level
    fn on_exit(&mut self) {}

    /// The player asked for the next level after a result
    fn on_next_level(&mut self) {}

    /// Player state changed and should be persisted
    fn on_player_state_changed(&mut self, _state: &PlayerState) {}

    fn on_sound(&mut self, _cue: SoundCue) {}

    /// A scenario should be generated and passed to
    /// `GameSession::scenario_ready` with this ticket
    fn on_scenario_requested(&mut self, _ticket: ScenarioTicket) {}
}

/// Hooks that ignore everything
#[derive(Debug, Default)]
pub struct NoopHooks;

impl SessionHooks for NoopHooks {}
