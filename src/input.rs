//! Input Controller
//!
//! Turns raw key events into movement or interaction intents. While any modal
//! surface is open the controller drops input instead of buffering it.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::tilemap::Direction;

/// Keys the simulation cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Key {
    Arrow(Direction),
    Action,
}

impl Key {
    /// Parse a key name. Arrow keys, WASD, Space, Enter and E, any case.
    pub fn parse(name: &str) -> Option<Self> {
        if name == " " {
            return Some(Key::Action);
        }
        match name.trim().to_lowercase().as_str() {
            "arrowup" | "up" | "w" => Some(Key::Arrow(Direction::Up)),
            "arrowdown" | "down" | "s" => Some(Key::Arrow(Direction::Down)),
            "arrowleft" | "left" | "a" => Some(Key::Arrow(Direction::Left)),
            "arrowright" | "right" | "d" => Some(Key::Arrow(Direction::Right)),
            "space" | "spacebar" | "enter" | "return" | "e" => Some(Key::Action),
            _ => None,
        }
    }
}

/// What the player asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Intent {
    /// One cell along a single axis
    Move(Direction),
    Interact,
}

/// Surfaces that swallow overworld input while open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModalGate {
    pub dialogue_open: bool,
    pub panel_open: bool,
    pub feedback_visible: bool,
    pub quiz_open: bool,
    pub loading: bool,
    pub tutorial_open: bool,
}

impl ModalGate {
    pub fn is_blocking(&self) -> bool {
        self.dialogue_open
            || self.panel_open
            || self.feedback_visible
            || self.quiz_open
            || self.loading
            || self.tutorial_open
    }
}

/// Tracks held directions for free-roam and maps presses to intents
#[derive(Debug, Clone, Default)]
pub struct InputController {
    held: BTreeSet<Direction>,
}

impl InputController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle a key press. Returns None when the gate drops it.
    pub fn key_down(&mut self, key: Key, gate: &ModalGate) -> Option<Intent> {
        if gate.is_blocking() {
            self.held.clear();
            return None;
        }
        match key {
            Key::Arrow(direction) => {
                self.held.insert(direction);
                Some(Intent::Move(direction))
            }
            Key::Action => Some(Intent::Interact),
        }
    }

    pub fn key_up(&mut self, key: Key) {
        if let Key::Arrow(direction) = key {
            self.held.remove(&direction);
        }
    }

    /// Forget every held key (e.g. when a modal opens)
    pub fn release_all(&mut self) {
        self.held.clear();
    }

    pub fn is_held(&self, direction: Direction) -> bool {
        self.held.contains(&direction)
    }

    /// Free-roam velocity from held keys: normalized, scaled by speed
    pub fn velocity(&self, speed: f32) -> (f32, f32) {
        let mut dx = 0.0f32;
        let mut dy = 0.0f32;
        if self.is_held(Direction::Left) {
            dx -= 1.0;
        }
        if self.is_held(Direction::Right) {
            dx += 1.0;
        }
        if self.is_held(Direction::Up) {
            dy -= 1.0;
        }
        if self.is_held(Direction::Down) {
            dy += 1.0;
        }

        let len = (dx * dx + dy * dy).sqrt();
        if len == 0.0 {
            return (0.0, 0.0);
        }
        (dx / len * speed, dy / len * speed)
    }
}
