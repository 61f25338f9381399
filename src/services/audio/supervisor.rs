//! Downloads, configures and runs a local audio node as a child process.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use futures_util::StreamExt;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::bot::error::Error;
use crate::config::Settings;
use crate::constants::timeouts::NODE_STARTUP_GRACE;
use crate::services::audio::node::{probe, NodeEndpoint};

const RELEASES_URL: &str = "https://api.github.com/repos/lavalink-devs/Lavalink/releases/latest";
const JAR_ASSET: &str = "Lavalink.jar";
const JAR_PREFIX: &str = "Lavalink-";
const PROBE_INTERVAL: Duration = Duration::from_secs(2);
const LOG_TARGET: &str = "cadence::lavalink";

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
    assets: Vec<Asset>,
}

#[derive(Debug, Deserialize)]
struct Asset {
    name: String,
    browser_download_url: String,
    /// `sha256:<hex>` when the release API provides it
    #[serde(default)]
    digest: Option<String>,
}

/// Owns the node process; dropping it kills the node
pub struct NodeSupervisor {
    child: Child,
    endpoint: NodeEndpoint,
    version: String,
}

impl NodeSupervisor {
    pub async fn start(http: &reqwest::Client, settings: &Settings) -> Result<Self, Error> {
        let node = &settings.node;
        check_runtime(&node.java_bin).await?;

        let dir = settings.data_dir.join("lavalink");
        fs::create_dir_all(&dir).await?;

        let jar = ensure_jar(http, &dir).await?;
        fs::write(dir.join("application.yml"), render_config(node.port, &node.password)).await?;

        info!("Launching audio node {}", jar.display());
        let mut child = Command::new(&node.java_bin)
            .arg("-jar")
            .arg(&jar)
            .current_dir(&dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::DependencyMissing(format!("{}: {}", node.java_bin, e)))?;

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_output(stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_output(stderr));
        }

        let endpoint = NodeEndpoint::local(node.port, &node.password, node.region.clone())?;
        let version = wait_ready(http, &endpoint, &mut child).await?;
        info!("Audio node {} is ready at {}", version, endpoint.url);

        Ok(Self {
            child,
            endpoint,
            version,
        })
    }

    pub fn endpoint(&self) -> &NodeEndpoint {
        &self.endpoint
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub async fn shutdown(mut self) {
        info!("Stopping audio node");
        if let Err(e) = self.child.kill().await {
            warn!("Failed to stop audio node: {}", e);
        }
    }
}

async fn check_runtime(java_bin: &str) -> Result<(), Error> {
    let output = Command::new(java_bin)
        .arg("-version")
        .output()
        .await
        .map_err(|e| Error::DependencyMissing(format!("{}: {}", java_bin, e)))?;

    if !output.status.success() {
        return Err(Error::DependencyMissing(format!(
            "{} -version exited with {}",
            java_bin, output.status
        )));
    }

    // `java -version` prints to stderr
    let banner = String::from_utf8_lossy(&output.stderr);
    debug!("Java runtime: {}", banner.lines().next().unwrap_or("unknown"));
    Ok(())
}

/// Latest jar on disk, downloading it and removing older versions when a new release exists
async fn ensure_jar(http: &reqwest::Client, dir: &Path) -> Result<PathBuf, Error> {
    let cached = cached_jars(dir).await?;

    let release = match fetch_release(http).await {
        Ok(release) => release,
        Err(e) => {
            // Offline start is fine as long as some version is on disk
            let newest = cached.iter().max().cloned();
            return match newest {
                Some(name) => {
                    warn!("Could not check for audio node updates ({}), using {}", e, name);
                    Ok(dir.join(name))
                }
                None => Err(Error::DownloadFailed(e.to_string())),
            };
        }
    };

    let current = jar_file_name(&release.tag_name);
    let path = dir.join(&current);

    if !cached.contains(&current) {
        let asset = release
            .assets
            .iter()
            .find(|a| a.name == JAR_ASSET)
            .ok_or_else(|| Error::DownloadFailed(format!("release {} has no {}", release.tag_name, JAR_ASSET)))?;
        info!("Downloading audio node {}", release.tag_name);
        download(http, asset, &path).await?;
    }

    for outdated in outdated_jars(&cached, &current) {
        info!("Removing outdated audio node {}", outdated);
        if let Err(e) = fs::remove_file(dir.join(&outdated)).await {
            warn!("Failed to remove {}: {}", outdated, e);
        }
    }

    Ok(path)
}

async fn fetch_release(http: &reqwest::Client) -> Result<Release, Error> {
    let response = http
        .get(RELEASES_URL)
        .header("User-Agent", concat!("cadence/", env!("CARGO_PKG_VERSION")))
        .header("Accept", "application/vnd.github+json")
        .send()
        .await?
        .error_for_status()?;
    Ok(response.json().await?)
}

async fn download(http: &reqwest::Client, asset: &Asset, path: &Path) -> Result<(), Error> {
    let partial = path.with_extension("part");
    let response = http
        .get(&asset.browser_download_url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| Error::DownloadFailed(e.to_string()))?;

    let mut file = fs::File::create(&partial).await?;
    let mut hasher = Sha256::new();
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| Error::DownloadFailed(e.to_string()))?;
        hasher.update(&chunk);
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    drop(file);

    if let Some(expected) = asset.digest.as_deref().and_then(parse_digest) {
        let actual = to_hex(&hasher.finalize());
        if actual != expected {
            let _ = fs::remove_file(&partial).await;
            return Err(Error::DownloadFailed(format!(
                "checksum mismatch: expected {}, got {}",
                expected, actual
            )));
        }
    } else {
        warn!("No checksum published for {}, skipping verification", asset.name);
    }

    fs::rename(&partial, path).await?;
    Ok(())
}

async fn cached_jars(dir: &Path) -> Result<Vec<String>, Error> {
    let mut names = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if let Some(name) = entry.file_name().to_str() {
            if name.starts_with(JAR_PREFIX) && name.ends_with(".jar") {
                names.push(name.to_string());
            }
        }
    }
    Ok(names)
}

async fn wait_ready(http: &reqwest::Client, endpoint: &NodeEndpoint, child: &mut Child) -> Result<String, Error> {
    let deadline = Instant::now() + NODE_STARTUP_GRACE;
    loop {
        if let Some(status) = child.try_wait()? {
            return Err(Error::NodeUnreachable(format!("node exited during startup ({})", status)));
        }
        if let Some(version) = probe(http, endpoint).await {
            return Ok(version);
        }
        if Instant::now() >= deadline {
            return Err(Error::NodeUnreachable(format!(
                "no response from {} within {}s",
                endpoint.url,
                NODE_STARTUP_GRACE.as_secs()
            )));
        }
        tokio::time::sleep(PROBE_INTERVAL).await;
    }
}

async fn forward_output<R: AsyncRead + Unpin>(stream: R) {
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim_end();
        if !line.is_empty() {
            info!(target: LOG_TARGET, "{}", line);
        }
    }
}

pub fn jar_file_name(tag: &str) -> String {
    format!("{}{}.jar", JAR_PREFIX, tag)
}

pub fn outdated_jars(cached: &[String], current: &str) -> Vec<String> {
    cached.iter().filter(|name| *name != current).cloned().collect()
}

/// `sha256:<hex>` → lowercase hex
pub fn parse_digest(raw: &str) -> Option<String> {
    let hex = raw.strip_prefix("sha256:")?;
    if hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(hex.to_ascii_lowercase())
    } else {
        None
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

pub fn render_config(port: u16, password: &str) -> String {
    format!(
        "server:
  port: {port}
  address: 127.0.0.1
lavalink:
  server:
    password: \"{password}\"
    sources:
      youtube: true
      soundcloud: true
      http: true
      local: false
    bufferDurationMs: 400
    frameBufferDurationMs: 5000
    trackStuckThresholdMs: 10000
    youtubePlaylistLoadLimit: 6
    playerUpdateInterval: 5
    youtubeSearchEnabled: true
    soundcloudSearchEnabled: true
logging:
  level:
    root: INFO
    lavalink: INFO
",
        port = port,
        password = password.replace('"', "\\\"")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jar_names() {
        assert_eq!(jar_file_name("4.0.8"), "Lavalink-4.0.8.jar");
        let cached = vec!["Lavalink-4.0.7.jar".to_string(), "Lavalink-4.0.8.jar".to_string()];
        assert_eq!(outdated_jars(&cached, "Lavalink-4.0.8.jar"), vec!["Lavalink-4.0.7.jar"]);
        assert!(outdated_jars(&cached[1..], "Lavalink-4.0.8.jar").is_empty());
    }

    #[test]
    fn test_parse_digest() {
        let hex = "A".repeat(64);
        assert_eq!(parse_digest(&format!("sha256:{}", hex)), Some("a".repeat(64)));
        assert_eq!(parse_digest("sha256:abc"), None);
        assert_eq!(parse_digest(&format!("md5:{}", hex)), None);
    }

    #[test]
    fn test_hex_of_known_digest() {
        let digest = Sha256::digest(b"abc");
        assert_eq!(
            to_hex(&digest),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_render_config() {
        let yml = render_config(2333, "pa\"ss");
        assert!(yml.contains("port: 2333"));
        assert!(yml.contains("password: \"pa\\\"ss\""));
    }

    #[tokio::test]
    async fn test_cached_jars_lists_only_node_jars() {
        let scratch = tempfile::tempdir().unwrap();
        let dir = scratch.path();
        fs::write(dir.join("Lavalink-4.0.8.jar"), b"").await.unwrap();
        fs::write(dir.join("application.yml"), b"").await.unwrap();

        let jars = cached_jars(dir).await.unwrap();
        assert_eq!(jars, vec!["Lavalink-4.0.8.jar"]);
    }
}
