//! Overworld Model
//!
//! Player movement and NPC proximity for the active level. Movement and
//! animation advance through the pure [`step`] function; [`Overworld`] keeps
//! the current [`WorldState`] plus the session's resolved-NPC set.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use crate::animation::{AnimationFrame, animate};
use crate::level::Level;
use crate::npc::Npc;
use crate::tilemap::{Direction, GridPosition};

/// How the player moves
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Locomotion {
    /// One cell per key press
    Grid,
    /// Continuous motion from held keys
    FreeRoam {
        /// Pixels per second
        speed: f32,
        /// Pixels per tile
        tile_size: f32,
        /// Pixel distance under which an NPC is in reach
        interact_radius: f32,
    },
}

/// Input for a single step
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepInput {
    /// Discrete grid step requested this tick
    pub step: Option<Direction>,
    /// Held-key velocity in pixels per second (free-roam only)
    pub velocity: (f32, f32),
}

impl StepInput {
    pub fn grid(direction: Direction) -> Self {
        Self {
            step: Some(direction),
            velocity: (0.0, 0.0),
        }
    }

    pub fn held(velocity: (f32, f32)) -> Self {
        Self { step: None, velocity }
    }
}

/// Immutable per-tick movement/animation state
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WorldState {
    pub player: GridPosition,
    /// Fractional position in tile units; equals `player` in grid mode
    pub body: (f32, f32),
    pub velocity: (f32, f32),
    /// Seconds spent moving without stopping
    pub walk_time: f32,
    pub frame: AnimationFrame,
}

impl WorldState {
    pub fn at(start: GridPosition) -> Self {
        Self {
            player: start,
            body: (start.x as f32, start.y as f32),
            velocity: (0.0, 0.0),
            walk_time: 0.0,
            frame: AnimationFrame::idle(Direction::Down),
        }
    }

    pub fn facing(&self) -> Direction {
        self.frame.direction
    }
}

/// Largest free-roam displacement per collision check, in tiles
const MAX_SUBSTEP: f32 = 0.5;
const MAX_SUBSTEPS: u32 = 4096;

/// Advance movement and animation by one tick. Blocked moves leave the
/// position unchanged.
pub fn step(
    state: &WorldState,
    level: &Level,
    input: &StepInput,
    locomotion: Locomotion,
    dt: f32,
) -> WorldState {
    let mut next = *state;
    let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };

    match locomotion {
        Locomotion::Grid => {
            next.velocity = (0.0, 0.0);
            if let Some(direction) = input.step {
                let (dx, dy) = direction.delta();
                let candidate = state.player.offset(dx, dy);
                if level.map.is_tile_walkable(candidate.x, candidate.y) {
                    next.player = candidate;
                    next.body = (candidate.x as f32, candidate.y as f32);
                }
                // Facing follows the attempt even when a wall blocks it
                next.velocity = (dx as f32, dy as f32);
            }
        }
        Locomotion::FreeRoam { tile_size, .. } => {
            let (vx, vy) = input.velocity;
            let reach = MAX_SUBSTEP * MAX_SUBSTEPS as f32;
            let dx = (vx * dt / tile_size).clamp(-reach, reach);
            let dy = (vy * dt / tile_size).clamp(-reach, reach);
            // No sub-step may cross more than half a tile, so no wall cell is skipped
            let steps = ((dx.abs().max(dy.abs()) / MAX_SUBSTEP).ceil() as u32).clamp(1, MAX_SUBSTEPS);
            let (sx, sy) = (dx / steps as f32, dy / steps as f32);
            let (mut x, mut y) = state.body;
            for _ in 0..steps {
                let (nx, ny) = level.map.resolve_movement(x, y, x + sx, y + sy);
                if (nx, ny) == (x, y) {
                    break;
                }
                (x, y) = (nx, ny);
            }
            next.body = (x, y);
            next.player = GridPosition::new(x.round() as i32, y.round() as i32);
            next.velocity = input.velocity;
        }
    }

    let frame = animate(state.facing(), next.velocity, state.walk_time);
    next.walk_time = if frame.is_moving() { state.walk_time + dt } else { 0.0 };
    next.frame = frame;
    next
}

/// Player position, level data and resolved NPCs for one level session
pub struct Overworld {
    level: Arc<Level>,
    locomotion: Locomotion,
    state: WorldState,
    completed_npc_ids: HashSet<String>,
}

impl Overworld {
    pub fn new(level: Arc<Level>, locomotion: Locomotion) -> Self {
        let state = WorldState::at(level.start);
        Self {
            level,
            locomotion,
            state,
            completed_npc_ids: HashSet::new(),
        }
    }

    pub fn level(&self) -> &Arc<Level> {
        &self.level
    }

    pub fn locomotion(&self) -> Locomotion {
        self.locomotion
    }

    pub fn state(&self) -> &WorldState {
        &self.state
    }

    pub fn player(&self) -> GridPosition {
        self.state.player
    }

    pub fn is_walkable(&self, x: i32, y: i32) -> bool {
        self.level.map.is_tile_walkable(x, y)
    }

    /// Move one cell along a single axis. The x component wins when both are
    /// set; magnitudes are clamped to one cell.
    pub fn move_by(&mut self, dx: i32, dy: i32) -> GridPosition {
        let direction = match (dx.signum(), dy.signum()) {
            (1, _) => Direction::Right,
            (-1, _) => Direction::Left,
            (_, 1) => Direction::Down,
            (_, -1) => Direction::Up,
            _ => return self.state.player,
        };
        self.state = step(
            &self.state,
            &self.level,
            &StepInput::grid(direction),
            Locomotion::Grid,
            0.0,
        );
        self.state.player
    }

    /// Advance one render tick
    pub fn tick(&mut self, input: &StepInput, dt: f32) {
        self.state = step(&self.state, &self.level, input, self.locomotion, dt);
    }

    /// First unresolved NPC within one cell (Chebyshev) of a position
    pub fn check_interaction(&self, pos: GridPosition) -> Option<&Npc> {
        self.level
            .npcs
            .iter()
            .find(|npc| pos.grid_distance(&npc.position) <= 1 && !self.is_completed(&npc.id))
    }

    /// NPC the player can currently talk to
    pub fn nearby_npc(&self) -> Option<&Npc> {
        match self.locomotion {
            Locomotion::Grid => self.check_interaction(self.state.player),
            Locomotion::FreeRoam {
                tile_size,
                interact_radius,
                ..
            } => {
                let (px, py) = self.state.body;
                self.level.npcs.iter().find(|npc| {
                    let dx = (npc.position.x as f32 - px) * tile_size;
                    let dy = (npc.position.y as f32 - py) * tile_size;
                    (dx * dx + dy * dy).sqrt() < interact_radius && !self.is_completed(&npc.id)
                })
            }
        }
    }

    /// Prop tile within one cell of the player, if any
    pub fn nearby_prop(&self) -> Option<GridPosition> {
        let player = self.state.player;
        (-1..=1)
            .flat_map(|dy| (-1..=1).map(move |dx| player.offset(dx, dy)))
            .find(|pos| self.level.map.is_prop(*pos))
    }

    pub fn is_completed(&self, npc_id: &str) -> bool {
        self.completed_npc_ids.contains(npc_id)
    }

    /// Returns false if the NPC was already resolved
    pub fn mark_completed(&mut self, npc_id: &str) -> bool {
        self.completed_npc_ids.insert(npc_id.to_string())
    }

    pub fn completed_count(&self) -> usize {
        self.completed_npc_ids.len()
    }

    /// Back to the start tile with every NPC unresolved
    pub fn restart(&mut self) {
        self.state = WorldState::at(self.level.start);
        self.completed_npc_ids.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::LevelRegistry;
    use crate::tilemap::{GRID_SIZE, TileType};

    fn store() -> Overworld {
        let level = LevelRegistry::builtin().unwrap().get(1).unwrap();
        Overworld::new(level, Locomotion::Grid)
    }

    fn free_roam() -> Overworld {
        let level = LevelRegistry::builtin().unwrap().get(1).unwrap();
        Overworld::new(
            level,
            Locomotion::FreeRoam {
                speed: 110.0,
                tile_size: 32.0,
                interact_radius: 40.0,
            },
        )
    }

    #[test]
    fn test_out_of_bounds_is_not_walkable() {
        let world = store();
        for i in -2..GRID_SIZE + 2 {
            assert!(!world.is_walkable(-1, i));
            assert!(!world.is_walkable(i, -1));
            assert!(!world.is_walkable(GRID_SIZE, i));
            assert!(!world.is_walkable(i, GRID_SIZE));
        }
    }

    #[test]
    fn test_walls_block_silently() {
        let mut world = store();
        // (1,0) is the top wall
        assert_eq!(world.move_by(0, -1), GridPosition::new(1, 1));
        assert_eq!(world.move_by(1, 0), GridPosition::new(2, 1));
    }

    #[test]
    fn test_move_uses_a_single_axis() {
        let mut world = store();
        assert_eq!(world.move_by(1, 1), GridPosition::new(2, 1));
        assert_eq!(world.move_by(5, 0), GridPosition::new(3, 1));
        assert_eq!(world.move_by(0, 0), GridPosition::new(3, 1));
    }

    #[test]
    fn test_player_never_on_wall_over_long_walk() {
        let mut world = store();
        let pattern = [(1, 0), (0, 1), (-1, 0), (0, -1), (1, 0), (1, 0), (0, 1), (0, 1)];
        let mut seed: u32 = 7;
        for _ in 0..2000 {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let (dx, dy) = pattern[(seed >> 16) as usize % pattern.len()];
            let pos = world.move_by(dx, dy);
            let tile = world.level().map.tile(pos.x, pos.y);
            assert!(tile.is_some() && tile != Some(TileType::Wall), "stood on {:?}", pos);
        }
    }

    #[test]
    fn test_interaction_uses_chebyshev_distance() {
        let world = store();
        // Shopkeeper stands at (8,1)
        assert_eq!(world.check_interaction(GridPosition::new(7, 2)).unwrap().id, "ms-laila");
        assert_eq!(world.check_interaction(GridPosition::new(8, 1)).unwrap().id, "ms-laila");
        assert!(world.check_interaction(GridPosition::new(6, 1)).is_none());
        assert!(world.check_interaction(GridPosition::new(8, 3)).is_none());
    }

    #[test]
    fn test_completed_npcs_are_skipped_until_restart() {
        let mut world = store();
        assert!(world.mark_completed("coach-sam"));
        assert!(!world.mark_completed("coach-sam"));
        assert!(world.check_interaction(GridPosition::new(2, 5)).is_none());

        world.move_by(1, 0);
        world.restart();
        assert_eq!(world.player(), GridPosition::new(1, 1));
        assert_eq!(world.completed_count(), 0);
        assert_eq!(world.check_interaction(GridPosition::new(2, 5)).unwrap().id, "coach-sam");
    }

    #[test]
    fn test_first_registered_npc_wins_ties() {
        let mut registry = LevelRegistry::new();
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("pair.toml"),
            r#"
            [level]
            ids = [1]
            name = "Pair"
            rows = ["11111", "10301", "11111"]

            [[npcs]]
            id = "first"
            name = "First"
            position = [1, 1]
            role = "shopkeeper"

            [[npcs]]
            id = "second"
            name = "Second"
            position = [3, 1]
            role = "shopkeeper"
            "#,
        )
        .unwrap();
        registry.load_from_directory(dir.path()).unwrap();
        let world = Overworld::new(registry.get(1).unwrap(), Locomotion::Grid);
        assert_eq!(world.nearby_npc().unwrap().id, "first");
    }

    #[test]
    fn test_step_is_pure_and_animates() {
        let level = LevelRegistry::builtin().unwrap().get(1).unwrap();
        let start = WorldState::at(level.start);
        let input = StepInput::grid(Direction::Right);
        let a = step(&start, &level, &input, Locomotion::Grid, 0.05);
        let b = step(&start, &level, &input, Locomotion::Grid, 0.05);
        assert_eq!(a, b);
        assert_eq!(a.player, GridPosition::new(2, 1));
        assert_eq!(a.facing(), Direction::Right);
        assert!(a.frame.is_moving());

        // No input: frozen on the idle frame facing right
        let idle = step(&a, &level, &StepInput::default(), Locomotion::Grid, 0.05);
        assert!(!idle.frame.is_moving());
        assert_eq!(idle.frame.frame_index, 7);
        assert_eq!(idle.walk_time, 0.0);
    }

    #[test]
    fn test_blocked_step_still_turns() {
        let level = LevelRegistry::builtin().unwrap().get(1).unwrap();
        let start = WorldState::at(level.start);
        let next = step(&start, &level, &StepInput::grid(Direction::Up), Locomotion::Grid, 0.05);
        assert_eq!(next.player, start.player);
        assert_eq!(next.facing(), Direction::Up);
    }

    #[test]
    fn test_free_roam_moves_and_slides() {
        let mut world = free_roam();
        // Hold right for one second at 110 px/s over 32 px tiles
        for _ in 0..20 {
            world.tick(&StepInput::held((110.0, 0.0)), 0.05);
        }
        let (x, y) = world.state().body;
        assert!(x > 3.0 && x < 4.6, "x = {}", x);
        assert_eq!(y, 1.0);
        assert_eq!(world.state().facing(), Direction::Right);
        assert!(world.is_walkable(world.player().x, world.player().y));

        // Pushing up into the wall stops before the wall cell
        for _ in 0..10 {
            world.tick(&StepInput::held((0.0, -110.0)), 0.05);
        }
        assert!(world.state().body.1 >= 0.5);
        assert!(world.is_walkable(world.player().x, world.player().y));
    }

    #[test]
    fn test_free_roam_long_tick_cannot_cross_wall() {
        let world = free_roam();
        // (5, 1) is a wall; a half-second tick covers 1.7 tiles
        let state = WorldState::at(GridPosition::new(4, 1));
        let next = step(&state, world.level(), &StepInput::held((110.0, 0.0)), world.locomotion(), 0.5);
        assert_eq!(next.player, GridPosition::new(4, 1));
        assert!(next.body.0 < 4.5);

        for dt in [1.0, 10.0, f32::INFINITY, f32::NAN] {
            let next = step(&state, world.level(), &StepInput::held((110.0, 0.0)), world.locomotion(), dt);
            assert_eq!(next.player, GridPosition::new(4, 1));
        }
    }

    #[test]
    fn test_free_roam_proximity_radius() {
        let mut world = free_roam();
        // Walk from (1,1) toward the shopkeeper at (8,1): (4,1) is open, (5,1) is a wall
        for _ in 0..200 {
            world.tick(&StepInput::held((110.0, 0.0)), 0.05);
        }
        assert!(world.nearby_npc().is_none());

        // One tile (32 px) from the shopkeeper is inside the 40 px radius
        world.state = WorldState::at(GridPosition::new(7, 1));
        assert_eq!(world.nearby_npc().unwrap().id, "ms-laila");
        world.state = WorldState::at(GridPosition::new(6, 2));
        assert!(world.nearby_npc().is_none());
    }
}
