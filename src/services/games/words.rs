use once_cell::sync::Lazy;
use rand::seq::IndexedRandom;
use rand::Rng;
use tracing::warn;

use crate::bot::error::Error;
use crate::services::games::wordle::{ALPHABET, MAX_WORD_LENGTH, MIN_WORD_LENGTH};
use crate::utils::retry::retry_once;

/// Used when the word list service is down
static FALLBACK_WORDS: Lazy<Vec<Vec<&'static str>>> = Lazy::new(|| {
    vec![
        vec!["cat", "dog", "sun", "map", "owl", "jam", "fig", "cup"],
        vec!["tree", "lamp", "frog", "milk", "snow", "gold", "wind", "kite"],
        vec!["alloy", "crane", "plant", "zebra", "lemon", "quiet", "brick", "storm"],
        vec!["garden", "planet", "silver", "rocket", "bridge", "castle", "forest", "pencil"],
        vec!["harvest", "blanket", "kitchen", "lantern", "monster", "pilgrim", "thunder", "voyage"],
        vec!["absolute", "calendar", "dinosaur", "elephant", "mountain", "notebook", "treasure", "vacation"],
    ]
});

/// Draws Wordle secrets from the configured word list service
#[derive(Debug, Clone)]
pub struct WordSource {
    http: reqwest::Client,
    /// Contains `{len}`
    url_template: String,
}

impl WordSource {
    pub fn new(http: reqwest::Client, url_template: impl Into<String>) -> Self {
        Self {
            http,
            url_template: url_template.into(),
        }
    }

    async fn fetch(&self, len: usize) -> Result<Option<String>, Error> {
        let url = self.url_template.replace("{len}", &len.to_string());
        let response = self.http.get(url).send().await?;
        if response.status().is_server_error() {
            return Err(Error::transient(format!("Word list returned {}", response.status())));
        }

        let words: Vec<String> = response.error_for_status()?.json().await?;
        Ok(words.into_iter().find(|w| is_candidate(w, len)))
    }

    /// Uppercase secret of exactly `len` letters
    pub async fn random_word(&self, len: usize) -> Result<String, Error> {
        if !(MIN_WORD_LENGTH..=MAX_WORD_LENGTH).contains(&len) {
            return Err(Error::invocation(format!(
                "Word length must be between {} and {}",
                MIN_WORD_LENGTH, MAX_WORD_LENGTH
            )));
        }

        match retry_once("word list", || self.fetch(len)).await {
            Ok(Some(word)) => return Ok(word.to_ascii_uppercase()),
            Ok(None) => warn!("Word list returned no {}-letter word, using fallback", len),
            Err(e) => warn!("Word list unavailable, using fallback: {}", e),
        }

        fallback_word(len).ok_or_else(|| Error::custom("No fallback word available"))
    }
}

fn is_candidate(word: &str, len: usize) -> bool {
    word.chars().count() == len && word.chars().all(|c| c.is_ascii_alphabetic())
}

pub fn fallback_word(len: usize) -> Option<String> {
    let bucket = FALLBACK_WORDS.get(len.checked_sub(MIN_WORD_LENGTH)?)?;
    bucket
        .choose(&mut rand::rng())
        .map(|w| w.to_ascii_uppercase())
}

/// Uniformly random letter for Letterle
pub fn random_letter() -> char {
    let letters = ALPHABET.as_bytes();
    letters[rand::rng().random_range(0..letters.len())] as char
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_covers_every_length() {
        for len in MIN_WORD_LENGTH..=MAX_WORD_LENGTH {
            let word = fallback_word(len).unwrap();
            assert_eq!(word.len(), len);
            assert!(word.chars().all(|c| c.is_ascii_uppercase()));
        }
        assert!(fallback_word(2).is_none());
        assert!(fallback_word(9).is_none());
    }

    #[test]
    fn test_candidate_filter() {
        assert!(is_candidate("crane", 5));
        assert!(!is_candidate("cranes", 5));
        assert!(!is_candidate("can't", 5));
    }

    #[test]
    fn test_random_letter_in_alphabet() {
        for _ in 0..50 {
            assert!(ALPHABET.contains(random_letter()));
        }
    }
}
