//! Word-guessing rules shared by Wordle (3-8 letters) and Letterle (one letter).
//!
//! Everything here is pure: the view layer feeds validated guesses in and
//! renders whatever state comes out.

use std::collections::{BTreeMap, HashMap};

/// Shortest and longest supported Wordle secret
pub const MIN_WORD_LENGTH: usize = 3;
pub const MAX_WORD_LENGTH: usize = 8;

pub const WORDLE_ATTEMPTS: u32 = 6;
pub const LETTERLE_ATTEMPTS: u32 = 24;

pub const ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Per-position and per-letter status. Ordering is the display priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LetterStatus {
    Unused,
    Black,
    Yellow,
    Green,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Wordle,
    Letterle,
}

impl Variant {
    /// Name used in the outcome table
    pub fn game_name(&self) -> &'static str {
        match self {
            Variant::Wordle => "wordle",
            Variant::Letterle => "letterle",
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Variant::Wordle => WORDLE_ATTEMPTS,
            Variant::Letterle => LETTERLE_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuessRecord {
    pub word: String,
    pub result: Vec<LetterStatus>,
    /// User the guess is attributed to
    pub by: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuessError {
    #[error("The game is already over")]
    GameOver,
    #[error("Your guess must be {expected} letters long, not {got}")]
    WrongLength { expected: usize, got: usize },
    #[error("Guesses may only contain letters A-Z")]
    NotAlphabetic,
    #[error("`{0}` was already guessed")]
    AlreadyGuessed(String),
    #[error("Secret must be {MIN_WORD_LENGTH}-{MAX_WORD_LENGTH} letters A-Z")]
    InvalidSecret,
}

/// Score `guess` against `secret` (both uppercase, equal length).
///
/// Greens are assigned first and consume their letter; the remaining
/// positions become yellow while unmatched copies of the letter remain.
pub fn score(secret: &str, guess: &str) -> Vec<LetterStatus> {
    let secret: Vec<char> = secret.chars().collect();
    let guess: Vec<char> = guess.chars().collect();
    debug_assert_eq!(secret.len(), guess.len());

    let mut result = vec![LetterStatus::Black; guess.len()];
    let mut remaining: HashMap<char, usize> = HashMap::new();

    for (i, (&s, &g)) in secret.iter().zip(guess.iter()).enumerate() {
        if s == g {
            result[i] = LetterStatus::Green;
        } else {
            *remaining.entry(s).or_insert(0) += 1;
        }
    }

    for (i, &g) in guess.iter().enumerate() {
        if result[i] == LetterStatus::Green {
            continue;
        }
        if let Some(count) = remaining.get_mut(&g) {
            if *count > 0 {
                *count -= 1;
                result[i] = LetterStatus::Yellow;
            }
        }
    }

    result
}

#[derive(Debug, Clone)]
pub struct WordleGame {
    secret: String,
    variant: Variant,
    attempts_left: u32,
    history: Vec<GuessRecord>,
    keyboard: BTreeMap<char, LetterStatus>,
    won: bool,
}

impl WordleGame {
    pub fn wordle(secret: &str) -> Result<Self, GuessError> {
        let secret = secret.trim().to_ascii_uppercase();
        let len = secret.chars().count();
        if !(MIN_WORD_LENGTH..=MAX_WORD_LENGTH).contains(&len)
            || !secret.chars().all(|c| c.is_ascii_uppercase())
        {
            return Err(GuessError::InvalidSecret);
        }
        Ok(Self::build(secret, Variant::Wordle))
    }

    pub fn letterle(secret: char) -> Result<Self, GuessError> {
        let secret = secret.to_ascii_uppercase();
        if !secret.is_ascii_uppercase() {
            return Err(GuessError::InvalidSecret);
        }
        Ok(Self::build(secret.to_string(), Variant::Letterle))
    }

    fn build(secret: String, variant: Variant) -> Self {
        Self {
            secret,
            variant,
            attempts_left: variant.attempts(),
            history: Vec::new(),
            keyboard: ALPHABET.chars().map(|c| (c, LetterStatus::Unused)).collect(),
            won: false,
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn word_length(&self) -> usize {
        self.secret.len()
    }

    pub fn attempts_left(&self) -> u32 {
        self.attempts_left
    }

    pub fn history(&self) -> &[GuessRecord] {
        &self.history
    }

    pub fn keyboard(&self) -> &BTreeMap<char, LetterStatus> {
        &self.keyboard
    }

    pub fn status_of(&self, letter: char) -> LetterStatus {
        self.keyboard
            .get(&letter.to_ascii_uppercase())
            .copied()
            .unwrap_or(LetterStatus::Unused)
    }

    pub fn is_won(&self) -> bool {
        self.won
    }

    pub fn is_over(&self) -> bool {
        self.won || self.attempts_left == 0
    }

    /// `Some(true)` won, `Some(false)` lost, `None` still running
    pub fn outcome(&self) -> Option<bool> {
        if self.won {
            Some(true)
        } else if self.attempts_left == 0 {
            Some(false)
        } else {
            None
        }
    }

    /// Letters never tried so far, in alphabetical order
    pub fn unused_letters(&self) -> Vec<char> {
        self.keyboard
            .iter()
            .filter(|(_, status)| **status == LetterStatus::Unused)
            .map(|(c, _)| *c)
            .collect()
    }

    /// Shape checks that do not depend on any external dictionary
    pub fn check_guess(&self, guess: &str) -> Result<String, GuessError> {
        if self.is_over() {
            return Err(GuessError::GameOver);
        }
        let guess = guess.trim().to_ascii_uppercase();
        if !guess.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(GuessError::NotAlphabetic);
        }
        let got = guess.chars().count();
        if got != self.word_length() {
            return Err(GuessError::WrongLength {
                expected: self.word_length(),
                got,
            });
        }
        if self.history.iter().any(|g| g.word == guess) {
            return Err(GuessError::AlreadyGuessed(guess));
        }
        Ok(guess)
    }

    /// Commit a guess, consuming one attempt
    pub fn guess(&mut self, guess: &str, by: u64) -> Result<&GuessRecord, GuessError> {
        let guess = self.check_guess(guess)?;
        let result = score(&self.secret, &guess);

        for (letter, status) in guess.chars().zip(result.iter()) {
            let entry = self.keyboard.entry(letter).or_insert(LetterStatus::Unused);
            if *status > *entry {
                *entry = *status;
            }
        }

        self.won = result.iter().all(|s| *s == LetterStatus::Green);
        self.attempts_left -= 1;
        self.history.push(GuessRecord {
            word: guess,
            result,
            by,
        });

        Ok(&self.history[self.history.len() - 1])
    }

    /// Abandon the game, counting it as a loss
    pub fn forfeit(&mut self) {
        if !self.won {
            self.attempts_left = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LetterStatus::*;

    fn count(word: &str, letter: char) -> usize {
        word.chars().filter(|c| *c == letter).count()
    }

    #[test]
    fn test_score_green_priority() {
        assert_eq!(score("ALLOY", "LLAMA"), vec![Yellow, Green, Yellow, Black, Black]);
    }

    #[test]
    fn test_keyboard_after_llama() {
        let mut game = WordleGame::wordle("alloy").unwrap();
        game.guess("llama", 1).unwrap();
        assert_eq!(game.status_of('A'), Yellow);
        assert_eq!(game.status_of('L'), Green);
        assert_eq!(game.status_of('M'), Black);
        assert_eq!(game.status_of('Z'), Unused);
    }

    #[test]
    fn test_marked_letters_match_multiset_intersection() {
        let cases = [
            ("ALLOY", "LLAMA"),
            ("ABBEY", "BABES"),
            ("SPEED", "ERASE"),
            ("EERIE", "EMBER"),
            ("ROBOT", "OOOOO"),
            ("CRANE", "NACRE"),
            ("CAT", "TAC"),
            ("BANANAS", "NABANAS"),
        ];

        for (secret, guess) in cases {
            let result = score(secret, guess);
            for letter in ALPHABET.chars() {
                let marked = guess
                    .chars()
                    .zip(result.iter())
                    .filter(|(c, s)| *c == letter && matches!(s, Green | Yellow))
                    .count();
                assert_eq!(
                    marked,
                    count(secret, letter).min(count(guess, letter)),
                    "{} vs {} letter {}",
                    secret,
                    guess,
                    letter
                );
            }
            let greens = result.iter().filter(|s| **s == Green).count();
            let positional = secret.chars().zip(guess.chars()).filter(|(a, b)| a == b).count();
            assert_eq!(greens, positional);
        }
    }

    #[test]
    fn test_keyboard_status_never_decreases() {
        let mut game = WordleGame::wordle("CRANE").unwrap();
        let mut previous = game.keyboard().clone();
        for guess in ["NACRE", "BLAST", "CRONY", "CRANE"] {
            game.guess(guess, 1).unwrap();
            for (letter, status) in game.keyboard() {
                assert!(status >= &previous[letter], "{} regressed", letter);
            }
            previous = game.keyboard().clone();
        }
        assert!(game.is_won());
        assert_eq!(game.outcome(), Some(true));
        assert_eq!(game.attempts_left(), 2);
    }

    #[test]
    fn test_loss_after_six_attempts() {
        let mut game = WordleGame::wordle("ZEBRA").unwrap();
        for guess in ["APPLE", "BERRY", "CHILI", "DONUT", "FUDGE", "GRAPE"] {
            game.guess(guess, 1).unwrap();
        }
        assert_eq!(game.outcome(), Some(false));
        assert_eq!(game.guess("ZEBRA", 1).unwrap_err(), GuessError::GameOver);
    }

    #[test]
    fn test_guess_validation() {
        let mut game = WordleGame::wordle("TREE").unwrap();
        assert_eq!(
            game.guess("TREES", 1).unwrap_err(),
            GuessError::WrongLength { expected: 4, got: 5 }
        );
        assert_eq!(game.guess("TR3E", 1).unwrap_err(), GuessError::NotAlphabetic);
        game.guess("tore", 1).unwrap();
        assert_eq!(
            game.guess("TORE", 1).unwrap_err(),
            GuessError::AlreadyGuessed("TORE".into())
        );
        assert_eq!(game.attempts_left(), 5);
    }

    #[test]
    fn test_invalid_secret() {
        assert!(WordleGame::wordle("AB").is_err());
        assert!(WordleGame::wordle("ABCDEFGHI").is_err());
        assert!(WordleGame::wordle("AB1").is_err());
        assert!(WordleGame::letterle('7').is_err());
    }

    #[test]
    fn test_letterle_is_green_or_black() {
        let mut game = WordleGame::letterle('q').unwrap();
        assert_eq!(game.attempts_left(), 24);

        let record = game.guess("A", 5).unwrap();
        assert_eq!(record.result, vec![Black]);
        assert_eq!(game.unused_letters().len(), 25);
        assert!(!game.unused_letters().contains(&'A'));

        let record = game.guess("q", 5).unwrap();
        assert_eq!(record.result, vec![Green]);
        assert!(game.is_won());
        assert_eq!(game.attempts_left(), 22);
    }

    #[test]
    fn test_forfeit_counts_as_loss() {
        let mut game = WordleGame::wordle("PLANT").unwrap();
        game.forfeit();
        assert_eq!(game.outcome(), Some(false));
    }
}
