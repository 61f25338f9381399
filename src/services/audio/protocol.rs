//! Wire types of the audio node (Lavalink v4 compatible).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    pub identifier: String,
    pub is_seekable: bool,
    pub author: String,
    /// Milliseconds
    pub length: u64,
    pub is_stream: bool,
    #[serde(default)]
    pub position: u64,
    pub title: String,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub artwork_url: Option<String>,
    #[serde(default)]
    pub source_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackData {
    pub encoded: String,
    pub info: TrackInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistInfo {
    pub name: String,
    #[serde(default)]
    pub selected_track: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlaylistData {
    pub info: PlaylistInfo,
    pub tracks: Vec<TrackData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Exception {
    #[serde(default)]
    pub message: Option<String>,
    pub severity: String,
    #[serde(default)]
    pub cause: String,
}

impl Exception {
    pub fn describe(&self) -> String {
        self.message.clone().unwrap_or_else(|| self.cause.clone())
    }
}

/// Response of `GET /v4/loadtracks`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "loadType", content = "data", rename_all = "camelCase")]
pub enum LoadResult {
    Track(TrackData),
    Playlist(PlaylistData),
    Search(Vec<TrackData>),
    Empty(serde_json::Value),
    Error(Exception),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EndReason {
    Finished,
    LoadFailed,
    Stopped,
    Replaced,
    Cleanup,
}

impl EndReason {
    /// Whether the queue may advance after this end
    pub fn may_start_next(&self) -> bool {
        matches!(self, EndReason::Finished | EndReason::LoadFailed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum NodeEvent {
    #[serde(rename_all = "camelCase")]
    TrackStartEvent { guild_id: String, track: TrackData },
    #[serde(rename_all = "camelCase")]
    TrackEndEvent {
        guild_id: String,
        track: TrackData,
        reason: EndReason,
    },
    #[serde(rename_all = "camelCase")]
    TrackExceptionEvent {
        guild_id: String,
        track: TrackData,
        exception: Exception,
    },
    #[serde(rename_all = "camelCase")]
    TrackStuckEvent {
        guild_id: String,
        track: TrackData,
        threshold_ms: u64,
    },
    #[serde(rename_all = "camelCase")]
    WebSocketClosedEvent {
        guild_id: String,
        code: u16,
        reason: String,
        by_remote: bool,
    },
}

impl NodeEvent {
    pub fn guild_id(&self) -> &str {
        match self {
            NodeEvent::TrackStartEvent { guild_id, .. }
            | NodeEvent::TrackEndEvent { guild_id, .. }
            | NodeEvent::TrackExceptionEvent { guild_id, .. }
            | NodeEvent::TrackStuckEvent { guild_id, .. }
            | NodeEvent::WebSocketClosedEvent { guild_id, .. } => guild_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PlayerState {
    pub time: u64,
    #[serde(default)]
    pub position: u64,
    pub connected: bool,
    #[serde(default)]
    pub ping: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStats {
    pub players: u32,
    pub playing_players: u32,
    pub uptime: u64,
}

/// Messages received on the node websocket
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Incoming {
    #[serde(rename_all = "camelCase")]
    Ready { resumed: bool, session_id: String },
    #[serde(rename_all = "camelCase")]
    PlayerUpdate { guild_id: String, state: PlayerState },
    Stats(NodeStats),
    Event(NodeEvent),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceState {
    pub token: String,
    pub endpoint: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateTrack {
    /// `Some(None)` serializes as `null` and stops the player
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoded: Option<Option<String>>,
}

/// Body of `PATCH /v4/sessions/{session}/players/{guild}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdatePlayer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<UpdateTrack>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<VoiceState>,
}

impl UpdatePlayer {
    pub fn play(encoded: &str) -> Self {
        Self {
            track: Some(UpdateTrack {
                encoded: Some(Some(encoded.to_string())),
            }),
            paused: Some(false),
            ..Default::default()
        }
    }

    pub fn stop() -> Self {
        Self {
            track: Some(UpdateTrack {
                encoded: Some(None),
            }),
            ..Default::default()
        }
    }

    pub fn seek(position: u64) -> Self {
        Self {
            position: Some(position),
            ..Default::default()
        }
    }

    pub fn pause(paused: bool) -> Self {
        Self {
            paused: Some(paused),
            ..Default::default()
        }
    }

    pub fn volume(volume: u16) -> Self {
        Self {
            volume: Some(volume),
            ..Default::default()
        }
    }

    pub fn voice(voice: VoiceState) -> Self {
        Self {
            voice: Some(voice),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACK: &str = r#"{
        "encoded": "QAAA...",
        "info": {
            "identifier": "dQw4w9WgXcQ",
            "isSeekable": true,
            "author": "Rick Astley",
            "length": 212000,
            "isStream": false,
            "position": 0,
            "title": "Never Gonna Give You Up",
            "uri": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "artworkUrl": "https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg",
            "isrc": null,
            "sourceName": "youtube"
        },
        "pluginInfo": {},
        "userData": {}
    }"#;

    #[test]
    fn test_parse_ready_and_player_update() {
        let ready: Incoming =
            serde_json::from_str(r#"{"op":"ready","resumed":false,"sessionId":"abc"}"#).unwrap();
        assert_eq!(
            ready,
            Incoming::Ready {
                resumed: false,
                session_id: "abc".into()
            }
        );

        let update: Incoming = serde_json::from_str(
            r#"{"op":"playerUpdate","guildId":"42","state":{"time":1,"position":10000,"connected":true,"ping":12}}"#,
        )
        .unwrap();
        match update {
            Incoming::PlayerUpdate { guild_id, state } => {
                assert_eq!(guild_id, "42");
                assert_eq!(state.position, 10_000);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_track_end_event() {
        let raw = format!(
            r#"{{"op":"event","type":"TrackEndEvent","guildId":"42","track":{},"reason":"finished"}}"#,
            TRACK
        );
        let parsed: Incoming = serde_json::from_str(&raw).unwrap();
        match parsed {
            Incoming::Event(NodeEvent::TrackEndEvent { track, reason, .. }) => {
                assert_eq!(track.info.length, 212_000);
                assert_eq!(reason, EndReason::Finished);
                assert!(reason.may_start_next());
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(!EndReason::Replaced.may_start_next());
        assert!(!EndReason::Stopped.may_start_next());
    }

    #[test]
    fn test_parse_stats_ignores_extra_fields() {
        let stats: Incoming = serde_json::from_str(
            r#"{"op":"stats","players":2,"playingPlayers":1,"uptime":1000,"memory":{"free":1},"cpu":{"cores":4}}"#,
        )
        .unwrap();
        assert!(matches!(stats, Incoming::Stats(NodeStats { players: 2, .. })));
    }

    #[test]
    fn test_parse_load_results() {
        let search: LoadResult =
            serde_json::from_str(&format!(r#"{{"loadType":"search","data":[{}]}}"#, TRACK)).unwrap();
        assert!(matches!(search, LoadResult::Search(ref t) if t.len() == 1));

        let empty: LoadResult = serde_json::from_str(r#"{"loadType":"empty","data":{}}"#).unwrap();
        assert!(matches!(empty, LoadResult::Empty(_)));

        let error: LoadResult = serde_json::from_str(
            r#"{"loadType":"error","data":{"message":"Video unavailable","severity":"common","cause":"x"}}"#,
        )
        .unwrap();
        match error {
            LoadResult::Error(e) => assert_eq!(e.describe(), "Video unavailable"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_update_player_serialization() {
        let stop = serde_json::to_value(UpdatePlayer::stop()).unwrap();
        assert_eq!(stop, serde_json::json!({"track": {"encoded": null}}));

        let seek = serde_json::to_value(UpdatePlayer::seek(200_000)).unwrap();
        assert_eq!(seek, serde_json::json!({"position": 200000}));

        let play = serde_json::to_value(UpdatePlayer::play("QAAA")).unwrap();
        assert_eq!(play, serde_json::json!({"track": {"encoded": "QAAA"}, "paused": false}));
    }
}
