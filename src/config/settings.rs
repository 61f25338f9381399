use std::env;
use std::path::PathBuf;

use crate::constants::timeouts::{DEFAULT_HTTP_TIMEOUT_SECONDS, DEFAULT_UI_COOLDOWN_SECONDS};

const DEFAULT_LAVALINK_PASSWORD: &str = "youshallnotpass";
const DEFAULT_LAVALINK_PORT: u16 = 2333;
const DEFAULT_WORD_LIST_URL: &str = "https://random-word-api.vercel.app/api?words=1&length={len}";
const DEFAULT_DICTIONARY_URL: &str = "https://api.dictionaryapi.dev/api/v2/entries/en/";
const DEFAULT_TRANSLATE_URL: &str = "https://translate.googleapis.com/translate_a/single";

/// Where the audio node lives and how to reach it
#[derive(Debug, Clone)]
pub struct NodeSettings {
    /// External node URL (`http://host:port`). When absent the bot runs its own node.
    pub url: Option<String>,
    pub password: String,
    pub backup_url: Option<String>,
    pub backup_password: Option<String>,
    /// Download and launch the node jar as a child process
    pub managed: bool,
    /// Port used for a managed node
    pub port: u16,
    pub region: Option<String>,
    pub java_bin: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub discord_token: String,
    /// SQLite file name under `./db/`
    pub database_name: String,
    pub default_prefix: String,
    pub owner_id: Option<u64>,
    pub guild_id: Option<u64>,
    pub debug_webhook_url: Option<String>,
    /// Fallback for now-playing notifications when a guild has no music channel
    pub music_webhook_url: Option<String>,
    pub node: NodeSettings,
    pub data_dir: PathBuf,
    /// Contains `{len}`, replaced by the requested word length
    pub word_list_url: String,
    pub dictionary_url: String,
    pub translate_url: String,
    pub ui_cooldown_seconds: u64,
    pub http_timeout_seconds: u64,
}

impl Settings {
    pub fn from_env() -> Result<Self, String> {
        let discord_token = env::var("DISCORD_TOKEN")
            .map_err(|_| "DISCORD_TOKEN environment variable not set")?;

        let database_name = non_empty("DATABASE_NAME").unwrap_or_else(|| "cadence".to_string());
        if database_name.contains(['/', '\\']) {
            return Err(format!("DATABASE_NAME must be a bare file name, got {:?}", database_name));
        }

        let default_prefix = non_empty("DEFAULT_PREFIX").unwrap_or_else(|| "!".to_string());

        let owner_id = parse_optional::<u64>("OWNER_ID")?;
        let guild_id = parse_optional::<u64>("GUILD_ID")?;

        let url = non_empty("LAVALINK_URL");
        let managed = match non_empty("LAVALINK_MANAGED") {
            Some(v) => parse_bool(&v).ok_or_else(|| format!("LAVALINK_MANAGED: invalid boolean {:?}", v))?,
            None => url.is_none(),
        };

        let node = NodeSettings {
            password: non_empty("LAVALINK_PASSWORD")
                .unwrap_or_else(|| DEFAULT_LAVALINK_PASSWORD.to_string()),
            backup_url: non_empty("LAVALINK_BACKUP_URL"),
            backup_password: non_empty("LAVALINK_BACKUP_PASSWORD"),
            managed,
            port: parse_optional::<u16>("LAVALINK_PORT")?.unwrap_or(DEFAULT_LAVALINK_PORT),
            region: non_empty("LAVALINK_REGION"),
            java_bin: non_empty("JAVA_BIN").unwrap_or_else(|| "java".to_string()),
            url,
        };

        let word_list_url =
            non_empty("WORD_LIST_URL").unwrap_or_else(|| DEFAULT_WORD_LIST_URL.to_string());
        if !word_list_url.contains("{len}") {
            return Err("WORD_LIST_URL must contain a {len} placeholder".to_string());
        }

        Ok(Self {
            discord_token,
            database_name,
            default_prefix,
            owner_id,
            guild_id,
            debug_webhook_url: non_empty("DEBUG_WEBHOOK_URL"),
            music_webhook_url: non_empty("MUSIC_WEBHOOK_URL"),
            node,
            data_dir: non_empty("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data")),
            word_list_url,
            dictionary_url: non_empty("DICTIONARY_URL")
                .unwrap_or_else(|| DEFAULT_DICTIONARY_URL.to_string()),
            translate_url: non_empty("TRANSLATE_URL")
                .unwrap_or_else(|| DEFAULT_TRANSLATE_URL.to_string()),
            ui_cooldown_seconds: parse_optional("UI_COOLDOWN_SECONDS")?
                .unwrap_or(DEFAULT_UI_COOLDOWN_SECONDS),
            http_timeout_seconds: parse_optional("HTTP_TIMEOUT_SECONDS")?
                .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECONDS),
        })
    }

    /// Path of the SQLite file: `./db/<name>.db`
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from("./db").join(format!("{}.db", self.database_name))
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn parse_optional<T: std::str::FromStr>(key: &str) -> Result<Option<T>, String> {
    match non_empty(key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| format!("{}: could not parse {:?}", key, raw)),
        None => Ok(None),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
