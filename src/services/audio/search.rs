use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serenity::all::UserId;
use tracing::debug;
use url::Url;

use crate::bot::error::Error;
use crate::services::audio::node::NodeClient;
use crate::services::audio::protocol::LoadResult;
use crate::services::audio::track::{Playlist, Resolved, Source, Track};
use crate::utils::retry::retry_once;

const YOUTUBE_RESULTS: &str = "https://www.youtube.com/results";
/// Per-catalog result count for interactive search
pub const CHOICES_PER_SOURCE: usize = 5;

static VIDEO_ID: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#""videoId":"([A-Za-z0-9_-]{11})""#).ok());

pub fn is_url(query: &str) -> bool {
    Url::parse(query.trim())
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

/// The YouTube radio mix seeded by a video
pub fn mix_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}&list=RD{}", video_id, video_id)
}

/// First video id in a results page
pub fn first_video_id(html: &str) -> Option<&str> {
    VIDEO_ID
        .as_ref()?
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Whether a URL belongs to the catalog a source restricts to
pub fn url_matches_source(url: &str, source: Source) -> bool {
    let Some(host) = Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_ascii_lowercase)) else {
        return false;
    };
    let host = host.trim_start_matches("www.").trim_start_matches("m.");
    match source {
        Source::Default => true,
        Source::YouTube => host == "youtube.com" || host == "youtu.be",
        Source::YouTubeMusic => host == "music.youtube.com" || host == "youtube.com" || host == "youtu.be",
        Source::SoundCloud => host.ends_with("soundcloud.com"),
    }
}

/// Turns queries and URLs into tracks through the audio node
pub struct Resolver {
    http: reqwest::Client,
    node: Arc<NodeClient>,
}

impl Resolver {
    pub fn new(http: reqwest::Client, node: Arc<NodeClient>) -> Self {
        Self { http, node }
    }

    pub async fn resolve(&self, query: &str, source: Source, requester: UserId) -> Result<Resolved, Error> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::invocation("Give me something to search for"));
        }

        let identifier = if is_url(query) {
            if !url_matches_source(query, source) {
                return Err(Error::domain(format!(
                    "That link is not a {} link",
                    source.label()
                )));
            }
            query.to_string()
        } else {
            match source {
                Source::Default | Source::YouTube => match self.scrape_video(query).await {
                    Ok(Some(id)) => watch_url(&id),
                    Ok(None) => format!("{}:{}", source.search_prefix(), query),
                    Err(e) => {
                        debug!("Video search for {:?} failed, using node search: {}", query, e);
                        format!("{}:{}", source.search_prefix(), query)
                    }
                },
                _ => format!("{}:{}", source.search_prefix(), query),
            }
        };

        self.load(&identifier, Some(requester))
            .await?
            .ok_or_else(|| Error::NoResults(query.to_string()))
    }

    /// Five YouTube results followed by five SoundCloud results
    pub async fn search_choices(&self, query: &str, requester: UserId) -> Result<Vec<Track>, Error> {
        let mut choices = Vec::with_capacity(CHOICES_PER_SOURCE * 2);
        for source in [Source::YouTube, Source::SoundCloud] {
            let identifier = format!("{}:{}", source.search_prefix(), query);
            if let Some(Resolved::Tracks(tracks)) = self.load(&identifier, Some(requester)).await? {
                choices.extend(tracks.into_iter().take(CHOICES_PER_SOURCE));
            }
        }
        if choices.is_empty() {
            return Err(Error::NoResults(query.to_string()));
        }
        Ok(choices)
    }

    /// Tracks related to `seed`, for autoplay
    pub async fn recommendations(&self, seed: &Track) -> Result<Vec<Track>, Error> {
        let video_id = if seed.is_youtube() {
            Some(seed.identifier().to_string())
        } else {
            self.scrape_video(&format!("{} {}", seed.author(), seed.title()))
                .await?
        };
        let Some(video_id) = video_id else {
            return Ok(Vec::new());
        };

        let tracks = match self.load(&mix_url(&video_id), None).await? {
            Some(Resolved::Playlist(playlist)) => playlist.tracks,
            Some(Resolved::Tracks(tracks)) => tracks,
            None => Vec::new(),
        };
        Ok(tracks
            .into_iter()
            .filter(|t| t.identifier() != seed.identifier())
            .collect())
    }

    async fn load(&self, identifier: &str, requester: Option<UserId>) -> Result<Option<Resolved>, Error> {
        let result = retry_once("track lookup", || self.node.load_tracks(identifier)).await?;
        let wrap = |data| Track::new(data, requester);

        Ok(match result {
            LoadResult::Track(data) => Some(Resolved::Tracks(vec![wrap(data)])),
            LoadResult::Search(results) if results.is_empty() => None,
            LoadResult::Search(results) => Some(Resolved::Tracks(results.into_iter().map(wrap).collect())),
            LoadResult::Playlist(data) if data.tracks.is_empty() => None,
            LoadResult::Playlist(data) => Some(Resolved::Playlist(Playlist {
                name: data.info.name,
                tracks: data.tracks.into_iter().map(wrap).collect(),
            })),
            LoadResult::Empty(_) => None,
            LoadResult::Error(exception) => return Err(Error::domain(exception.describe())),
        })
    }

    async fn scrape_video(&self, query: &str) -> Result<Option<String>, Error> {
        let html = retry_once("video search", || async {
            let response = self
                .http
                .get(YOUTUBE_RESULTS)
                .query(&[("search_query", query)])
                .send()
                .await?
                .error_for_status()?;
            Ok::<_, Error>(response.text().await?)
        })
        .await?;
        Ok(first_video_id(&html).map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(is_url("  http://soundcloud.com/a/b "));
        assert!(!is_url("never gonna give you up"));
        assert!(!is_url("ytsearch:abc"));
    }

    #[test]
    fn test_first_video_id() {
        let html = r#"var x = {"videoId":"short"}; {"videoId":"dQw4w9WgXcQ","title":"x"} {"videoId":"aaaaaaaaaaa"}"#;
        assert_eq!(first_video_id(html), Some("dQw4w9WgXcQ"));
        assert_eq!(first_video_id("nothing here"), None);
    }

    #[test]
    fn test_mix_url() {
        assert_eq!(
            mix_url("dQw4w9WgXcQ"),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=RDdQw4w9WgXcQ"
        );
    }

    #[test]
    fn test_url_source_constraint() {
        let yt = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";
        let sc = "https://soundcloud.com/artist/track";
        assert!(url_matches_source(yt, Source::Default));
        assert!(url_matches_source(yt, Source::YouTube));
        assert!(!url_matches_source(yt, Source::SoundCloud));
        assert!(url_matches_source(sc, Source::SoundCloud));
        assert!(url_matches_source("https://music.youtube.com/watch?v=x", Source::YouTubeMusic));
        assert!(!url_matches_source(sc, Source::YouTube));
    }
}
