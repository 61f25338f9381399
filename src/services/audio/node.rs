//! Control channel to the audio node: one websocket for events, REST for commands.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serenity::all::{GuildId, UserId};
use tokio::sync::{mpsc, RwLock};
use tokio_retry2::strategy::ExponentialBackoff;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::bot::error::Error;
use crate::config::NodeSettings;
use crate::services::audio::protocol::{
    Incoming, LoadResult, NodeEvent, NodeStats, PlayerState, UpdatePlayer,
};

const CLIENT_NAME: &str = concat!("cadence/", env!("CARGO_PKG_VERSION"));
const MAX_BACKOFF: Duration = Duration::from_secs(60);
/// Consecutive refused connections before switching to the next node
const FAILOVER_THRESHOLD: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeEndpoint {
    pub url: Url,
    pub password: String,
    pub region: Option<String>,
}

impl NodeEndpoint {
    pub fn parse(raw: &str, password: &str, region: Option<String>) -> Result<Self, Error> {
        let mut url = Url::parse(raw)
            .map_err(|e| Error::custom(format!("Invalid audio node URL {:?}: {}", raw, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::custom(format!(
                "Audio node URL must be http(s), got {:?}",
                raw
            )));
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(Self {
            url,
            password: password.to_string(),
            region,
        })
    }

    pub fn local(port: u16, password: &str, region: Option<String>) -> Result<Self, Error> {
        Self::parse(&format!("http://127.0.0.1:{}/", port), password, region)
    }

    pub fn rest_url(&self, path: &str) -> Result<Url, Error> {
        self.url
            .join(path)
            .map_err(|e| Error::custom(format!("Invalid audio node path {:?}: {}", path, e)))
    }

    pub fn websocket_url(&self) -> Result<Url, Error> {
        let mut url = self.rest_url("v4/websocket")?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|_| Error::custom(format!("Cannot derive websocket URL from {}", self.url)))?;
        Ok(url)
    }

    /// Endpoints in failover order: the configured (or managed) node first, then the backup
    pub fn from_settings(settings: &NodeSettings) -> Result<Vec<Self>, Error> {
        let mut endpoints = Vec::with_capacity(2);

        match (&settings.url, settings.managed) {
            (_, true) => endpoints.push(Self::local(
                settings.port,
                &settings.password,
                settings.region.clone(),
            )?),
            (Some(url), false) => endpoints.push(Self::parse(
                url,
                &settings.password,
                settings.region.clone(),
            )?),
            (None, false) => {}
        }

        if let Some(backup) = &settings.backup_url {
            let password = settings
                .backup_password
                .as_deref()
                .unwrap_or(&settings.password);
            endpoints.push(Self::parse(backup, password, settings.region.clone())?);
        }

        if endpoints.is_empty() {
            return Err(Error::custom(
                "No audio node configured: set LAVALINK_URL or enable LAVALINK_MANAGED",
            ));
        }
        Ok(endpoints)
    }
}

/// Messages forwarded from the websocket to the playback controller
#[derive(Debug, Clone)]
pub enum NodeMessage {
    Ready { resumed: bool },
    PlayerUpdate { guild_id: GuildId, state: PlayerState },
    Event { guild_id: GuildId, event: NodeEvent },
}

pub struct NodeClient {
    http: reqwest::Client,
    endpoints: Vec<NodeEndpoint>,
    active: AtomicUsize,
    session_id: RwLock<Option<String>>,
    stats: RwLock<Option<NodeStats>>,
}

impl NodeClient {
    pub fn new(http: reqwest::Client, endpoints: Vec<NodeEndpoint>) -> Result<Self, Error> {
        if endpoints.is_empty() {
            return Err(Error::custom("At least one audio node endpoint is required"));
        }
        Ok(Self {
            http,
            endpoints,
            active: AtomicUsize::new(0),
            session_id: RwLock::new(None),
            stats: RwLock::new(None),
        })
    }

    pub fn active_endpoint(&self) -> &NodeEndpoint {
        let index = self.active.load(Ordering::Relaxed) % self.endpoints.len();
        &self.endpoints[index]
    }

    pub async fn is_ready(&self) -> bool {
        self.session_id.read().await.is_some()
    }

    pub async fn stats(&self) -> Option<NodeStats> {
        *self.stats.read().await
    }

    /// Move to the next endpoint; false when there is nowhere to go
    fn fail_over(&self) -> bool {
        if self.endpoints.len() < 2 {
            return false;
        }
        let next = (self.active.load(Ordering::Relaxed) + 1) % self.endpoints.len();
        self.active.store(next, Ordering::Relaxed);
        warn!("Switching to audio node {}", self.endpoints[next].url);
        true
    }

    /// Start the websocket loop; events arrive on the returned receiver
    pub fn spawn(self: &Arc<Self>, user_id: UserId) -> mpsc::UnboundedReceiver<NodeMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = Arc::clone(self);
        tokio::spawn(async move {
            client.run(user_id, tx).await;
        });
        rx
    }

    async fn run(self: Arc<Self>, user_id: UserId, events: mpsc::UnboundedSender<NodeMessage>) {
        let mut failures = 0u32;
        let mut backoff = reconnect_backoff();

        loop {
            let endpoint = self.active_endpoint().clone();
            match self.listen(&endpoint, user_id, &events).await {
                Ok(()) => {
                    warn!("Audio node {} closed the connection", endpoint.url);
                    failures = 0;
                    backoff = reconnect_backoff();
                }
                Err(e) => {
                    failures += 1;
                    warn!(
                        "Audio node {} refused connection ({} in a row): {}",
                        endpoint.url, failures, e
                    );
                    if failures >= FAILOVER_THRESHOLD && self.fail_over() {
                        failures = 0;
                        backoff = reconnect_backoff();
                    }
                }
            }

            *self.session_id.write().await = None;
            if events.is_closed() {
                debug!("Audio node event receiver dropped, stopping websocket loop");
                break;
            }

            let delay = backoff.next().unwrap_or(MAX_BACKOFF);
            debug!("Reconnecting to audio node in {:?}", delay);
            tokio::time::sleep(delay).await;
        }
    }

    /// Returns `Err` only when the connection could not be opened
    async fn listen(
        &self,
        endpoint: &NodeEndpoint,
        user_id: UserId,
        events: &mpsc::UnboundedSender<NodeMessage>,
    ) -> Result<(), Error> {
        let url = endpoint.websocket_url()?;
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| Error::NodeUnreachable(e.to_string()))?;
        let headers = request.headers_mut();
        headers.insert("Authorization", header(&endpoint.password)?);
        headers.insert("User-Id", header(&user_id.get().to_string())?);
        headers.insert("Client-Name", header(CLIENT_NAME)?);

        let (mut stream, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| Error::NodeUnreachable(e.to_string()))?;
        info!("Connected to audio node {}", endpoint.url);

        while let Some(message) = stream.next().await {
            let text = match message {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(frame)) => {
                    debug!("Audio node sent close frame: {:?}", frame);
                    break;
                }
                Ok(_) => continue,
                Err(e) => {
                    warn!("Audio node websocket error: {}", e);
                    break;
                }
            };

            let incoming: Incoming = match serde_json::from_str(text.as_str()) {
                Ok(incoming) => incoming,
                Err(e) => {
                    debug!("Ignoring unknown audio node message: {}", e);
                    continue;
                }
            };

            if let Some(forward) = self.absorb(incoming).await {
                if events.send(forward).is_err() {
                    break;
                }
            }
        }

        Ok(())
    }

    /// Update local state from a node message, returning what the controller needs to see
    async fn absorb(&self, incoming: Incoming) -> Option<NodeMessage> {
        match incoming {
            Incoming::Ready {
                resumed,
                session_id,
            } => {
                info!("Audio node ready (session {}, resumed: {})", session_id, resumed);
                *self.session_id.write().await = Some(session_id);
                Some(NodeMessage::Ready { resumed })
            }
            Incoming::Stats(stats) => {
                debug!(
                    "Audio node stats: {} players, {} playing",
                    stats.players, stats.playing_players
                );
                *self.stats.write().await = Some(stats);
                None
            }
            Incoming::PlayerUpdate { guild_id, state } => {
                parse_guild(&guild_id).map(|guild_id| NodeMessage::PlayerUpdate { guild_id, state })
            }
            Incoming::Event(event) => match parse_guild(event.guild_id()) {
                Some(guild_id) => Some(NodeMessage::Event { guild_id, event }),
                None => {
                    error!("Audio node event with invalid guild id: {:?}", event);
                    None
                }
            },
        }
    }

    async fn session(&self) -> Result<String, Error> {
        self.session_id
            .read()
            .await
            .clone()
            .ok_or_else(|| Error::transient("The audio node is not ready yet"))
    }

    pub async fn load_tracks(&self, identifier: &str) -> Result<LoadResult, Error> {
        let endpoint = self.active_endpoint();
        let mut url = endpoint.rest_url("v4/loadtracks")?;
        url.query_pairs_mut().append_pair("identifier", identifier);

        let response = self
            .http
            .get(url)
            .header("Authorization", &endpoint.password)
            .send()
            .await?;
        let response = check(response).await?;
        Ok(response.json().await?)
    }

    pub async fn update_player(&self, guild_id: GuildId, update: &UpdatePlayer) -> Result<(), Error> {
        let session = self.session().await?;
        let endpoint = self.active_endpoint();
        let url = endpoint.rest_url(&format!("v4/sessions/{}/players/{}", session, guild_id))?;

        let response = self
            .http
            .patch(url)
            .header("Authorization", &endpoint.password)
            .json(update)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    pub async fn destroy_player(&self, guild_id: GuildId) -> Result<(), Error> {
        let session = self.session().await?;
        let endpoint = self.active_endpoint();
        let url = endpoint.rest_url(&format!("v4/sessions/{}/players/{}", session, guild_id))?;

        let response = self
            .http
            .delete(url)
            .header("Authorization", &endpoint.password)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

/// Health probe: the node answers `GET /version` once it accepts connections
pub async fn probe(http: &reqwest::Client, endpoint: &NodeEndpoint) -> Option<String> {
    let url = endpoint.rest_url("version").ok()?;
    let response = http
        .get(url)
        .header("Authorization", &endpoint.password)
        .send()
        .await
        .ok()?;
    if !response.status().is_success() {
        return None;
    }
    response.text().await.ok()
}

fn header(value: &str) -> Result<HeaderValue, Error> {
    HeaderValue::from_str(value).map_err(|e| Error::custom(format!("Invalid header value: {}", e)))
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status.is_server_error() {
        Err(Error::transient(format!("Audio node returned {}: {}", status, body)))
    } else {
        Err(Error::custom(format!("Audio node rejected request ({}): {}", status, body)))
    }
}

fn parse_guild(raw: &str) -> Option<GuildId> {
    raw.parse::<u64>().ok().filter(|id| *id != 0).map(GuildId::new)
}

/// 1s, 2s, 4s and so on, capped at a minute
fn reconnect_backoff() -> ExponentialBackoff {
    ExponentialBackoff::from_millis(2)
        .factor(500)
        .max_delay(MAX_BACKOFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> NodeSettings {
        NodeSettings {
            url: None,
            password: "pw".into(),
            backup_url: None,
            backup_password: None,
            managed: true,
            port: 2333,
            region: None,
            java_bin: "java".into(),
        }
    }

    #[test]
    fn test_websocket_url_follows_scheme() {
        let plain = NodeEndpoint::parse("http://node:2333", "pw", None).unwrap();
        assert_eq!(plain.websocket_url().unwrap().as_str(), "ws://node:2333/v4/websocket");

        let tls = NodeEndpoint::parse("https://node.example/lavalink", "pw", None).unwrap();
        assert_eq!(
            tls.websocket_url().unwrap().as_str(),
            "wss://node.example/lavalink/v4/websocket"
        );
        assert!(NodeEndpoint::parse("ftp://node", "pw", None).is_err());
    }

    #[test]
    fn test_endpoints_from_settings() {
        let managed = NodeEndpoint::from_settings(&settings()).unwrap();
        assert_eq!(managed.len(), 1);
        assert_eq!(managed[0].url.as_str(), "http://127.0.0.1:2333/");

        let mut external = settings();
        external.managed = false;
        external.url = Some("http://primary:2333".into());
        external.backup_url = Some("http://backup:2333".into());
        external.backup_password = Some("other".into());
        let endpoints = NodeEndpoint::from_settings(&external).unwrap();
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[1].password, "other");

        let mut nothing = settings();
        nothing.managed = false;
        assert!(NodeEndpoint::from_settings(&nothing).is_err());
    }

    #[test]
    fn test_fail_over_cycles_endpoints() {
        let single = NodeClient::new(
            reqwest::Client::new(),
            vec![NodeEndpoint::local(2333, "pw", None).unwrap()],
        )
        .unwrap();
        assert!(!single.fail_over());

        let pair = NodeClient::new(
            reqwest::Client::new(),
            vec![
                NodeEndpoint::parse("http://a:1", "pw", None).unwrap(),
                NodeEndpoint::parse("http://b:1", "pw", None).unwrap(),
            ],
        )
        .unwrap();
        assert!(pair.fail_over());
        assert_eq!(pair.active_endpoint().url.host_str(), Some("b"));
        assert!(pair.fail_over());
        assert_eq!(pair.active_endpoint().url.host_str(), Some("a"));
    }

    #[tokio::test]
    async fn test_ready_sets_session() {
        let client = NodeClient::new(
            reqwest::Client::new(),
            vec![NodeEndpoint::local(2333, "pw", None).unwrap()],
        )
        .unwrap();
        assert!(client.session().await.unwrap_err().is_transient());

        let forwarded = client
            .absorb(Incoming::Ready {
                resumed: false,
                session_id: "abc".into(),
            })
            .await;
        assert!(matches!(forwarded, Some(NodeMessage::Ready { resumed: false })));
        assert!(client.is_ready().await);
        assert_eq!(client.session().await.unwrap(), "abc");
    }

    #[test]
    fn test_parse_guild() {
        assert_eq!(parse_guild("42"), Some(GuildId::new(42)));
        assert_eq!(parse_guild("0"), None);
        assert_eq!(parse_guild("x"), None);
    }

    #[test]
    fn test_reconnect_backoff_doubles_up_to_cap() {
        let delays: Vec<Duration> = reconnect_backoff().take(10).collect();
        assert_eq!(delays[0], Duration::from_secs(1));
        assert_eq!(delays[1], Duration::from_secs(2));
        assert_eq!(delays[2], Duration::from_secs(4));
        assert_eq!(delays[9], MAX_BACKOFF);
        assert!(delays.iter().all(|d| *d <= MAX_BACKOFF));
    }
}
