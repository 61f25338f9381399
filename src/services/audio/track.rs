use std::fmt;

use serenity::all::UserId;

use crate::constants::timeouts::format_millis;
use crate::services::audio::protocol::{TrackData, TrackInfo};

/// Tracks this long or longer never enter a queue through user actions
pub const MAX_TRACK_LENGTH_MS: u64 = 3_600_000;

/// Catalog a query is searched in
#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum Source {
    #[name = "default"]
    Default,
    #[name = "youtube"]
    YouTube,
    #[name = "youtubemusic"]
    YouTubeMusic,
    #[name = "soundcloud"]
    SoundCloud,
}

impl Source {
    /// Search prefix understood by the node
    pub fn search_prefix(&self) -> &'static str {
        match self {
            Source::Default | Source::YouTube => "ytsearch",
            Source::YouTubeMusic => "ytmsearch",
            Source::SoundCloud => "scsearch",
        }
    }

    /// Parse the optional first word of a prefix-command query
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "youtube" | "yt" => Some(Source::YouTube),
            "youtubemusic" | "ytm" => Some(Source::YouTubeMusic),
            "soundcloud" | "sc" => Some(Source::SoundCloud),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Source::Default => "Default",
            Source::YouTube => "YouTube",
            Source::YouTubeMusic => "YouTube Music",
            Source::SoundCloud => "SoundCloud",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Stream,
    TooLong,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Stream => write!(f, "live streams cannot be queued"),
            Rejection::TooLong => write!(
                f,
                "tracks must be shorter than {}",
                format_millis(MAX_TRACK_LENGTH_MS)
            ),
        }
    }
}

/// A playable descriptor plus who asked for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub encoded: String,
    pub info: TrackInfo,
    pub requester: Option<UserId>,
}

impl Track {
    pub fn new(data: TrackData, requester: Option<UserId>) -> Self {
        Self {
            encoded: data.encoded,
            info: data.info,
            requester,
        }
    }

    pub fn title(&self) -> &str {
        &self.info.title
    }

    pub fn author(&self) -> &str {
        &self.info.author
    }

    pub fn identifier(&self) -> &str {
        &self.info.identifier
    }

    pub fn length_ms(&self) -> u64 {
        self.info.length
    }

    pub fn is_stream(&self) -> bool {
        self.info.is_stream
    }

    pub fn uri(&self) -> Option<&str> {
        self.info.uri.as_deref()
    }

    pub fn artwork_url(&self) -> Option<&str> {
        self.info.artwork_url.as_deref()
    }

    pub fn is_youtube(&self) -> bool {
        self.info.source_name == "youtube"
    }

    /// Markdown `[title](uri)` when the track has a URI
    pub fn display(&self) -> String {
        match self.uri() {
            Some(uri) => crate::utils::formatting::link(self.title(), uri),
            None => self.title().to_string(),
        }
    }

    pub fn admission(&self) -> Result<(), Rejection> {
        admit(self.is_stream(), self.length_ms())
    }
}

pub fn admit(is_stream: bool, length_ms: u64) -> Result<(), Rejection> {
    if is_stream {
        Err(Rejection::Stream)
    } else if length_ms >= MAX_TRACK_LENGTH_MS {
        Err(Rejection::TooLong)
    } else {
        Ok(())
    }
}

/// Named bag of tracks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    pub name: String,
    pub tracks: Vec<Track>,
}

/// What a query resolved to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Tracks(Vec<Track>),
    Playlist(Playlist),
}

#[cfg(test)]
pub(crate) fn test_track(id: &str, length: u64, is_stream: bool) -> Track {
    Track {
        encoded: format!("enc-{}", id),
        info: TrackInfo {
            identifier: id.to_string(),
            is_seekable: !is_stream,
            author: "Artist".to_string(),
            length,
            is_stream,
            position: 0,
            title: format!("Track {}", id),
            uri: Some(format!("https://www.youtube.com/watch?v={}", id)),
            artwork_url: None,
            source_name: "youtube".to_string(),
        },
        requester: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admission_boundary() {
        assert_eq!(admit(false, 3_599_999), Ok(()));
        assert_eq!(admit(false, 3_600_000), Err(Rejection::TooLong));
        assert_eq!(admit(true, 1_000), Err(Rejection::Stream));
        assert_eq!(test_track("a", 3_700_000, false).admission(), Err(Rejection::TooLong));
    }

    #[test]
    fn test_source_keywords() {
        assert_eq!(Source::from_keyword("SoundCloud"), Some(Source::SoundCloud));
        assert_eq!(Source::from_keyword("ytm"), Some(Source::YouTubeMusic));
        assert_eq!(Source::from_keyword("never"), None);
        assert_eq!(Source::YouTubeMusic.search_prefix(), "ytmsearch");
    }
}
