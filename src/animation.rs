//! Character animation selection
//!
//! Sprite sheets hold three walk frames per direction, one direction per
//! block: down 0-2, left 3-5, right 6-8, up 9-11. The middle frame of each
//! block doubles as the idle pose.

use serde::Serialize;

use crate::tilemap::Direction;

/// Speeds at or below this count as standing still
pub const MOVE_EPSILON: f32 = 0.1;

/// Animation states a character can be in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum AnimationState {
    #[default]
    Idle,
    Walking,
}

/// Animation configuration for each state
#[derive(Debug, Clone, Copy)]
pub struct AnimationConfig {
    /// Number of frames in this animation
    pub frame_count: u32,
    /// Frames per second for this animation
    pub fps: f32,
}

pub fn animation_config(state: AnimationState) -> AnimationConfig {
    match state {
        AnimationState::Idle => AnimationConfig { frame_count: 1, fps: 0.0 },
        AnimationState::Walking => AnimationConfig { frame_count: 3, fps: 8.0 },
    }
}

/// First sheet frame of a direction's block
pub fn row_start(direction: Direction) -> u32 {
    match direction {
        Direction::Down => 0,
        Direction::Left => 3,
        Direction::Right => 6,
        Direction::Up => 9,
    }
}

/// Frame chosen for one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnimationFrame {
    pub direction: Direction,
    pub state: AnimationState,
    /// Absolute frame index in the sprite sheet
    pub frame_index: u32,
}

impl AnimationFrame {
    pub fn idle(direction: Direction) -> Self {
        Self {
            direction,
            state: AnimationState::Idle,
            frame_index: row_start(direction) + 1,
        }
    }

    pub fn is_moving(&self) -> bool {
        self.state == AnimationState::Walking
    }
}

/// Facing for a movement vector. The larger axis wins and ties go to the
/// vertical axis; a zero vector keeps the current facing.
pub fn direction_for(current: Direction, dx: f32, dy: f32) -> Direction {
    if dx == 0.0 && dy == 0.0 {
        return current;
    }
    if dy.abs() >= dx.abs() {
        if dy > 0.0 { Direction::Down } else { Direction::Up }
    } else if dx > 0.0 {
        Direction::Right
    } else {
        Direction::Left
    }
}

/// Select direction and frame from the current facing, a velocity, and the
/// time spent moving so far
pub fn animate(current: Direction, velocity: (f32, f32), elapsed: f32) -> AnimationFrame {
    let (vx, vy) = velocity;
    let speed = (vx * vx + vy * vy).sqrt();
    if speed <= MOVE_EPSILON {
        return AnimationFrame::idle(current);
    }

    let direction = direction_for(current, vx, vy);
    let config = animation_config(AnimationState::Walking);
    let step = (elapsed.max(0.0) * config.fps) as u32 % config.frame_count;

    AnimationFrame {
        direction,
        state: AnimationState::Walking,
        frame_index: row_start(direction) + step,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_horizontal_direction() {
        assert_eq!(direction_for(Direction::Down, 1.0, 0.0), Direction::Right);
        assert_eq!(direction_for(Direction::Down, -1.0, 0.0), Direction::Left);
    }

    #[test]
    fn test_larger_axis_wins_and_ties_go_vertical() {
        assert_eq!(direction_for(Direction::Left, 3.0, 1.0), Direction::Right);
        assert_eq!(direction_for(Direction::Left, 1.0, -3.0), Direction::Up);
        assert_eq!(direction_for(Direction::Left, 2.0, 2.0), Direction::Down);
        assert_eq!(direction_for(Direction::Right, -2.0, -2.0), Direction::Up);
    }

    #[test]
    fn test_zero_vector_keeps_facing() {
        assert_eq!(direction_for(Direction::Up, 0.0, 0.0), Direction::Up);
    }

    #[test]
    fn test_idle_freezes_on_middle_frame() {
        let frame = animate(Direction::Left, (0.0, 0.0), 5.0);
        assert_eq!(frame.state, AnimationState::Idle);
        assert_eq!(frame.frame_index, 4);

        // Below epsilon is still idle
        let frame = animate(Direction::Up, (0.05, 0.0), 1.0);
        assert!(!frame.is_moving());
        assert_eq!(frame.frame_index, 10);
    }

    #[test]
    fn test_walk_cycle_loops_at_eight_fps() {
        let frames: Vec<u32> = [0.0, 0.125, 0.25, 0.375, 0.5]
            .iter()
            .map(|t| animate(Direction::Down, (0.0, 110.0), *t).frame_index)
            .collect();
        assert_eq!(frames, vec![0, 1, 2, 0, 1]);

        let frame = animate(Direction::Down, (110.0, 0.0), 0.0);
        assert_eq!(frame.direction, Direction::Right);
        assert_eq!(frame.frame_index, 6);
    }

    #[test]
    fn test_animate_is_pure() {
        let a = animate(Direction::Down, (0.0, -50.0), 0.3);
        let b = animate(Direction::Down, (0.0, -50.0), 0.3);
        assert_eq!(a, b);
    }
}
