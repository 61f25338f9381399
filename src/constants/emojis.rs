use serenity::all::ReactionType;

use crate::services::games::wordle::LetterStatus;

/// Emoji used across embeds and components.
///
/// Built once at startup and shared read-only through `Data`.
#[derive(Debug, Clone)]
pub struct Emojis {
    pub green: &'static str,
    pub yellow: &'static str,
    pub black: &'static str,
    pub unused: &'static str,
    pub cross: &'static str,
    pub circle: &'static str,
    pub rock: &'static str,
    pub paper: &'static str,
    pub scissors: &'static str,
    pub first: &'static str,
    pub previous: &'static str,
    pub next: &'static str,
    pub last: &'static str,
    pub skipped: &'static str,
}

impl Default for Emojis {
    fn default() -> Self {
        Self {
            green: "🟩",
            yellow: "🟨",
            black: "⬛",
            unused: "⬜",
            cross: "❌",
            circle: "⭕",
            rock: "🪨",
            paper: "📄",
            scissors: "✂️",
            first: "⏮️",
            previous: "◀️",
            next: "▶️",
            last: "⏭️",
            skipped: "⛔",
        }
    }
}

impl Emojis {
    pub fn status(&self, status: LetterStatus) -> &'static str {
        match status {
            LetterStatus::Green => self.green,
            LetterStatus::Yellow => self.yellow,
            LetterStatus::Black => self.black,
            LetterStatus::Unused => self.unused,
        }
    }

    /// Component emoji for a unicode string
    pub fn reaction(symbol: &str) -> ReactionType {
        ReactionType::Unicode(symbol.to_string())
    }
}
