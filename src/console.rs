//! Console commands for the headless driver
//!
//! One line of text becomes one [`Command`]. Indices typed by the player are
//! 1-based; they are converted to the 0-based indices the session uses.

use crate::input::Key;
use crate::quest::{ItemCategory, ScamChoice, TwistChoice};
use crate::session::{GameInput, QuestAction, QuizAction};

pub const HELP: &str = "\
move:   up|down|left|right [n], w/a/s/d, hold <dir>, release <dir>
talk:   act (or e/space/enter), ok (close tutorial), dismiss
quest:  next, start, close, tab <category>, add <item>, pick <n>, drop <n>,
        slot <n>, unslot <n>, checkout, pay, twist 1|2, scam pay|ask,
        results, return
quiz:   answer <n>, submit, continue
level:  restart, nextlevel, exit
other:  status, save, help, quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Inputs to apply in order
    Inputs(Vec<GameInput>),
    Status,
    Save,
    Help,
    Quit,
    Unknown(String),
}

impl Command {
    fn one(input: GameInput) -> Self {
        Command::Inputs(vec![input])
    }

    fn quest(action: QuestAction) -> Self {
        Command::one(GameInput::Quest(action))
    }
}

/// Key press and release, as a single tap
fn tap(key: Key) -> [GameInput; 2] {
    [GameInput::KeyDown(key), GameInput::KeyUp(key)]
}

/// Parse a 1-based index argument
fn index_arg(parts: &[&str]) -> Option<usize> {
    let n: usize = parts.get(1)?.parse().ok()?;
    n.checked_sub(1)
}

fn usage(text: &str) -> Command {
    Command::Unknown(format!("Usage: {}", text))
}

pub fn parse_command(line: &str) -> Command {
    let input = line.trim().to_lowercase();
    let parts: Vec<&str> = input.split_whitespace().collect();

    let Some(&head) = parts.first() else {
        return Command::Unknown(String::new());
    };

    match head {
        "act" | "talk" => Command::Inputs(tap(Key::Action).to_vec()),
        "hold" | "release" => match parts.get(1).and_then(|d| Key::parse(d)) {
            Some(key @ Key::Arrow(_)) if head == "hold" => Command::one(GameInput::KeyDown(key)),
            Some(key @ Key::Arrow(_)) => Command::one(GameInput::KeyUp(key)),
            _ => usage("hold|release <direction>"),
        },
        "ok" | "tutorial" => Command::one(GameInput::DismissTutorial),
        "dismiss" => Command::one(GameInput::DismissPanel),

        // Quest
        "next" => Command::quest(QuestAction::AdvanceDialogue),
        "start" => Command::quest(QuestAction::Start),
        "close" => Command::quest(QuestAction::CloseDialogue),
        "tab" => match parts.get(1).and_then(|c| ItemCategory::from_str(c)) {
            Some(category) => Command::quest(QuestAction::SelectCategory(category)),
            None => usage("tab need|want|earn|save|fuel|treat"),
        },
        "add" | "buy" => match parts.get(1) {
            Some(item) => Command::quest(QuestAction::AddItem(item.to_string())),
            None => usage("add <item id>"),
        },
        "pick" => match index_arg(&parts) {
            Some(i) => Command::quest(QuestAction::SelectBackpack(i)),
            None => usage("pick <backpack #>"),
        },
        "drop" => match index_arg(&parts) {
            Some(i) => Command::quest(QuestAction::RemoveBackpack(i)),
            None => usage("drop <backpack #>"),
        },
        "slot" => match index_arg(&parts) {
            Some(i) => Command::quest(QuestAction::PlaceIntoSlot(i)),
            None => usage("slot <slot #>"),
        },
        "unslot" => match index_arg(&parts) {
            Some(i) => Command::quest(QuestAction::RemoveFromSlot(i)),
            None => usage("unslot <slot #>"),
        },
        "checkout" => Command::quest(QuestAction::Checkout),
        "pay" | "fee" => Command::quest(QuestAction::ConfirmFee),
        "twist" => match parts.get(1).and_then(|c| TwistChoice::from_str(c)) {
            Some(choice) => Command::quest(QuestAction::Twist(choice)),
            None => usage("twist 1|2"),
        },
        "scam" => match parts.get(1).and_then(|c| ScamChoice::from_str(c)) {
            Some(choice) => Command::quest(QuestAction::Scam(choice)),
            None => usage("scam pay|ask"),
        },
        "results" => Command::quest(QuestAction::SeeResults),
        "return" | "back" => Command::quest(QuestAction::ReturnToWorld),

        // Quiz
        "answer" => match index_arg(&parts) {
            Some(i) => Command::one(GameInput::Quiz(QuizAction::Select(i))),
            None => usage("answer <option #>"),
        },
        "submit" => Command::one(GameInput::Quiz(QuizAction::Submit)),
        "continue" => Command::one(GameInput::Quiz(QuizAction::Continue)),

        // Level
        "restart" => Command::one(GameInput::Restart),
        "nextlevel" => Command::one(GameInput::NextLevel),
        "exit" => Command::one(GameInput::Exit),

        "status" | "look" => Command::Status,
        "save" => Command::Save,
        "help" | "?" => Command::Help,
        "quit" | "q" => Command::Quit,
        _ => match Key::parse(head) {
            Some(key) => key_taps(key, &parts),
            None => Command::Unknown(input.clone()),
        },
    }
}

/// Movement and action keys, with an optional repeat count. Named commands
/// win over key names, so "return" is never the action key here.
fn key_taps(key: Key, parts: &[&str]) -> Command {
    let count = match parts.get(1) {
        Some(n) => match n.parse::<usize>() {
            Ok(n) if n > 0 => n,
            _ => return usage("<direction> [count]"),
        },
        None => 1,
    };
    Command::Inputs((0..count).flat_map(|_| tap(key)).collect())
}
