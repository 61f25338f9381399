//! Client for the free dictionary endpoint, shared by Wordle guess
//! validation and the `dictionary` command.

use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::bot::error::Error;
use crate::utils::retry::retry_once;

/// Human-facing page linked from finished Wordle games
pub const PUBLIC_DICTIONARY_PAGE: &str = "https://www.dictionary.com/browse/";

#[derive(Debug, Clone, Deserialize)]
pub struct Entry {
    pub word: String,
    #[serde(default)]
    pub phonetic: Option<String>,
    #[serde(default)]
    pub meanings: Vec<Meaning>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meaning {
    pub part_of_speech: String,
    #[serde(default)]
    pub definitions: Vec<Definition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Definition {
    pub definition: String,
    #[serde(default)]
    pub example: Option<String>,
    #[serde(default)]
    pub synonyms: Vec<String>,
}

/// One paginator page: a single part of speech of one entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeaningPage {
    pub word: String,
    pub phonetic: Option<String>,
    pub part_of_speech: String,
    pub definitions: Vec<String>,
    pub example: Option<String>,
    pub synonyms: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DictionaryClient {
    http: reqwest::Client,
    base_url: String,
}

impl DictionaryClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    fn entry_url(&self, word: &str) -> Result<Url, Error> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| Error::custom(format!("Invalid dictionary URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| Error::custom("Dictionary URL cannot be a base"))?
            .pop_if_empty()
            .push(&word.to_lowercase());
        Ok(url)
    }

    async fn fetch(&self, word: &str) -> Result<reqwest::Response, Error> {
        let url = self.entry_url(word)?;
        let response = self.http.get(url).send().await?;
        if response.status().is_server_error() {
            return Err(Error::transient(format!(
                "Dictionary returned {}",
                response.status()
            )));
        }
        Ok(response)
    }

    /// A word is valid when the endpoint answers 200 for it
    pub async fn is_valid(&self, word: &str) -> Result<bool, Error> {
        let response = retry_once("dictionary check", || self.fetch(word)).await?;
        debug!("Dictionary check for {}: {}", word, response.status());
        Ok(response.status() == StatusCode::OK)
    }

    pub async fn lookup(&self, word: &str) -> Result<Vec<Entry>, Error> {
        let response = retry_once("dictionary lookup", || self.fetch(word)).await?;
        if response.status() != StatusCode::OK {
            return Err(Error::NoResults(word.to_string()));
        }

        let entries: Vec<Entry> = response.json().await?;
        if entries.is_empty() {
            return Err(Error::NoResults(word.to_string()));
        }
        Ok(entries)
    }
}

/// Flatten entries into one page per part of speech
pub fn meaning_pages(entries: &[Entry]) -> Vec<MeaningPage> {
    entries
        .iter()
        .flat_map(|entry| {
            entry.meanings.iter().map(move |meaning| MeaningPage {
                word: entry.word.clone(),
                phonetic: entry.phonetic.clone(),
                part_of_speech: meaning.part_of_speech.clone(),
                definitions: meaning
                    .definitions
                    .iter()
                    .take(5)
                    .map(|d| d.definition.clone())
                    .collect(),
                example: meaning.definitions.iter().find_map(|d| d.example.clone()),
                synonyms: meaning
                    .definitions
                    .iter()
                    .flat_map(|d| d.synonyms.iter().cloned())
                    .take(8)
                    .collect(),
            })
        })
        .collect()
}

pub fn public_page(word: &str) -> String {
    format!("{}{}", PUBLIC_DICTIONARY_PAGE, word.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        {
            "word": "alloy",
            "phonetic": "/ˈælɔɪ/",
            "meanings": [
                {
                    "partOfSpeech": "noun",
                    "definitions": [
                        {"definition": "A metal combined with other elements.", "synonyms": ["blend"]},
                        {"definition": "An admixture.", "example": "an alloy of hope and fear", "synonyms": []}
                    ]
                },
                {
                    "partOfSpeech": "verb",
                    "definitions": [{"definition": "To mix or combine."}]
                }
            ]
        }
    ]"#;

    #[test]
    fn test_meaning_pages() {
        let entries: Vec<Entry> = serde_json::from_str(SAMPLE).unwrap();
        let pages = meaning_pages(&entries);

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].part_of_speech, "noun");
        assert_eq!(pages[0].definitions.len(), 2);
        assert_eq!(pages[0].example.as_deref(), Some("an alloy of hope and fear"));
        assert_eq!(pages[0].synonyms, vec!["blend".to_string()]);
        assert_eq!(pages[1].example, None);
    }

    #[test]
    fn test_entry_url_escapes_word() {
        let client = DictionaryClient::new(
            reqwest::Client::new(),
            "https://api.dictionaryapi.dev/api/v2/entries/en/",
        );
        assert_eq!(
            client.entry_url("LLAMA").unwrap().as_str(),
            "https://api.dictionaryapi.dev/api/v2/entries/en/llama"
        );
        assert_eq!(
            client.entry_url("ice cream").unwrap().as_str(),
            "https://api.dictionaryapi.dev/api/v2/entries/en/ice%20cream"
        );
    }
}
