//! Dialogue Sequencer
//!
//! Plays a fixed list of lines forward, one at a time.

use serde::Serialize;

/// Result of asking the sequencer to move on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Advance {
    /// Another line is now showing
    NextLine,
    /// Already on the last line; the caller should start the quest instead
    ReadyToStart,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DialogueSequencer {
    lines: Vec<String>,
    step_index: usize,
}

impl DialogueSequencer {
    pub fn new(lines: Vec<String>) -> Self {
        Self {
            lines,
            step_index: 0,
        }
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn total_steps(&self) -> usize {
        self.lines.len()
    }

    pub fn current_line(&self) -> Option<&str> {
        self.lines.get(self.step_index).map(String::as_str)
    }

    pub fn is_last(&self) -> bool {
        self.step_index + 1 >= self.lines.len()
    }

    /// Step forward one line; never moves past the last line
    pub fn advance(&mut self) -> Advance {
        if self.is_last() {
            return Advance::ReadyToStart;
        }
        self.step_index += 1;
        Advance::NextLine
    }

    /// True when `start` may be called
    pub fn can_start(&self) -> bool {
        self.is_last()
    }

    pub fn reset(&mut self) {
        self.step_index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intro() -> DialogueSequencer {
        DialogueSequencer::new(vec!["one".into(), "two".into(), "three".into()])
    }

    #[test]
    fn test_advances_to_last_line_then_stops() {
        let mut dialogue = intro();
        assert_eq!(dialogue.current_line(), Some("one"));
        assert!(!dialogue.can_start());
        assert_eq!(dialogue.advance(), Advance::NextLine);
        assert_eq!(dialogue.advance(), Advance::NextLine);
        assert_eq!(dialogue.current_line(), Some("three"));
        assert!(dialogue.can_start());

        assert_eq!(dialogue.advance(), Advance::ReadyToStart);
        assert_eq!(dialogue.step_index(), 2);
    }

    #[test]
    fn test_reset_returns_to_first_line() {
        let mut dialogue = intro();
        dialogue.advance();
        dialogue.reset();
        assert_eq!(dialogue.step_index(), 0);
        assert_eq!(dialogue.total_steps(), 3);
    }

    #[test]
    fn test_single_line_is_immediately_startable() {
        let mut dialogue = DialogueSequencer::new(vec!["only".into()]);
        assert!(dialogue.can_start());
        assert_eq!(dialogue.advance(), Advance::ReadyToStart);
    }
}
