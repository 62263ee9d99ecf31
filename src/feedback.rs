//! Feedback presenter - short-lived toasts and coach hints
//!
//! Holds at most one message. Showing a new one replaces the old one
//! immediately. Expiry is driven by the session scheduler, which hands back
//! the token it was given; a token from a replaced message is ignored.

use serde::Serialize;

/// Message flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FeedbackKind {
    /// Outcome notice over the world
    Toast,
    /// Tip from the shop coach
    Coach,
}

impl FeedbackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackKind::Toast => "toast",
            FeedbackKind::Coach => "coach",
        }
    }
}

/// Audio cue forwarded to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SoundCue {
    Click,
    Coin,
    Success,
}

impl SoundCue {
    pub fn as_str(&self) -> &'static str {
        match self {
            SoundCue::Click => "click",
            SoundCue::Coin => "coin",
            SoundCue::Success => "success",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedbackMessage {
    pub kind: FeedbackKind,
    pub text: String,
    pub shown_at_ms: u64,
    pub expires_at_ms: u64,
    /// Identifies this message to its expiry timer
    pub token: u64,
}

/// Display durations per kind, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedbackDurations {
    pub toast_ms: u64,
    pub coach_ms: u64,
}

impl Default for FeedbackDurations {
    fn default() -> Self {
        Self {
            toast_ms: 2200,
            coach_ms: 2200,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FeedbackPresenter {
    durations: FeedbackDurations,
    current: Option<FeedbackMessage>,
    next_token: u64,
}

impl FeedbackPresenter {
    pub fn new(durations: FeedbackDurations) -> Self {
        Self {
            durations,
            current: None,
            next_token: 0,
        }
    }

    /// Show a message, replacing any in flight. Returns the new message so
    /// the caller can schedule its expiry.
    pub fn show(&mut self, kind: FeedbackKind, text: impl Into<String>, now_ms: u64) -> &FeedbackMessage {
        self.next_token += 1;
        let duration = match kind {
            FeedbackKind::Toast => self.durations.toast_ms,
            FeedbackKind::Coach => self.durations.coach_ms,
        };
        self.current.insert(FeedbackMessage {
            kind,
            text: text.into(),
            shown_at_ms: now_ms,
            expires_at_ms: now_ms + duration,
            token: self.next_token,
        })
    }

    /// Clear the message if it is still the one the token refers to
    pub fn expire(&mut self, token: u64) -> bool {
        if self.current.as_ref().is_some_and(|m| m.token == token) {
            self.current = None;
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn current(&self) -> Option<&FeedbackMessage> {
        self.current.as_ref()
    }

    pub fn is_visible(&self) -> bool {
        self.current.is_some()
    }
}
