use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use sqlx::SqlitePool;
use tokio::sync::Mutex;

use crate::bot::error::Error;
use crate::config::Settings;
use crate::constants::emojis::Emojis;
use crate::services::audio::{NodeClient, NodeEndpoint, NodeSupervisor, Resolver, VoiceRegistry};
use crate::services::dictionary::DictionaryClient;
use crate::services::games::words::WordSource;
use crate::services::prefix::PrefixRegistry;
use crate::services::translate::TranslateClient;
use crate::services::ui::UiEngine;

pub type Context<'a> = poise::Context<'a, Arc<Data>, Error>;

/// Shared data available to all commands and handlers
pub struct Data {
    pub pool: SqlitePool,
    pub settings: Settings,
    pub http: reqwest::Client,
    /// Per-guild command prefixes, mirrored from the database
    pub prefixes: PrefixRegistry,
    pub voice: VoiceRegistry,
    pub node: Arc<NodeClient>,
    pub resolver: Resolver,
    pub ui: UiEngine,
    pub emojis: Emojis,
    pub dictionary: DictionaryClient,
    pub translator: TranslateClient,
    pub words: WordSource,
    /// Locally managed audio node, taken on shutdown
    pub supervisor: Mutex<Option<NodeSupervisor>>,
    pub started_at: Instant,
}

impl Data {
    pub fn new(pool: SqlitePool, settings: Settings) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.http_timeout_seconds))
            .build()?;

        let node = Arc::new(NodeClient::new(
            http.clone(),
            NodeEndpoint::from_settings(&settings.node)?,
        )?);

        Ok(Self {
            prefixes: PrefixRegistry::new(settings.default_prefix.clone()),
            voice: VoiceRegistry::new(),
            resolver: Resolver::new(http.clone(), node.clone()),
            ui: UiEngine::new(Duration::from_secs(settings.ui_cooldown_seconds)),
            emojis: Emojis::default(),
            dictionary: DictionaryClient::new(http.clone(), settings.dictionary_url.clone()),
            translator: TranslateClient::new(http.clone(), settings.translate_url.clone()),
            words: WordSource::new(http.clone(), settings.word_list_url.clone()),
            supervisor: Mutex::new(None),
            started_at: Instant::now(),
            node,
            http,
            pool,
            settings,
        })
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Data")
            .field("voice_sessions", &self.voice.len())
            .field("ui_sessions", &self.ui.len())
            .finish()
    }
}
