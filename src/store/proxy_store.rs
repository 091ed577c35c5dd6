use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use eyre::{Report, Result};
use futures_util::future::join_all;
use log::{info, warn};
use reqwest::{Client, Proxy};
use tempfile::NamedTempFile;
use url::Url;

use crate::engine::errors::EngineError;

/// Endpoint that echoes the caller's address.
pub const DEFAULT_PROBE_URL: &str = "http://ifconfig.me/ip";

/// JSON file of `{key: proxy_url}` holding the identity pool.
#[derive(Debug, Clone)]
pub struct ProxyStore {
    /// File location
    path: PathBuf,
}

impl ProxyStore {
    /// Creates a store over `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File location
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every entry. A missing file is an empty pool.
    ///
    /// # Errors
    /// `EngineError::ConfigLoad` if the file exists but cannot be read or parsed
    pub fn load(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = fs::read_to_string(&self.path).map_err(|err| self.error(err))?;
        serde_json::from_str(&raw).map_err(|err| self.error(err))
    }

    /// Proxy URLs that parse, in key order. Invalid entries are skipped.
    ///
    /// # Errors
    /// See [`ProxyStore::load`]
    pub fn list_identities(&self) -> Result<Vec<String>> {
        Ok(self
            .load()?
            .into_iter()
            .filter_map(|(key, url)| match Url::parse(&url) {
                Ok(_) => Some(url),
                Err(err) => {
                    warn!("store::proxies: skipping {key}: {err}");
                    None
                }
            })
            .collect())
    }

    /// Adds or replaces `key`.
    ///
    /// # Errors
    /// If `url` is not a valid URL or the file cannot be written
    pub fn add(&self, key: &str, url: &str) -> Result<BTreeMap<String, String>> {
        Url::parse(url)?;
        let mut proxies = self.load()?;
        proxies.insert(key.to_string(), url.to_string());
        self.save(&proxies)?;
        Ok(proxies)
    }

    /// Removes `key`.
    ///
    /// # Returns
    /// Whether the key existed
    ///
    /// # Errors
    /// If the file cannot be read or written
    pub fn remove(&self, key: &str) -> Result<bool> {
        let mut proxies = self.load()?;
        if proxies.remove(key).is_none() {
            return Ok(false);
        }
        self.save(&proxies)?;
        Ok(true)
    }

    /// Writes a sibling temp file and renames it over the store, so a
    /// concurrent reader sees either the old or the new file.
    fn save(&self, proxies: &BTreeMap<String, String>) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(serde_json::to_string_pretty(proxies)?.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)?;
        Ok(())
    }

    fn error(&self, err: impl std::fmt::Display) -> Report {
        Report::new(EngineError::ConfigLoad {
            reason: format!("{}: {err}", self.path.display()),
        })
    }
}

/// Decides whether an identity can currently reach the outside world.
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    /// Whether `identity` answered in time
    async fn is_alive(&self, identity: &str) -> bool;
}

/// Fetches a small URL through the proxy with a short deadline.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    /// Target URL
    url: Url,
    /// Deadline for connect and response
    timeout: Duration,
}

impl HttpProbe {
    /// Creates a probe
    ///
    /// # Errors
    /// If `url` does not parse
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            url: Url::parse(url)?,
            timeout,
        })
    }

    async fn fetch(&self, identity: &str) -> Result<()> {
        let client = Client::builder()
            .proxy(Proxy::all(identity)?)
            .connect_timeout(self.timeout)
            .timeout(self.timeout)
            .build()?;
        client.get(self.url.clone()).send().await?.error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl LivenessProbe for HttpProbe {
    async fn is_alive(&self, identity: &str) -> bool {
        match self.fetch(identity).await {
            Ok(()) => {
                info!("store::proxies: {identity} OK");
                true
            }
            Err(err) => {
                warn!("store::proxies: {identity} failed: {err}");
                false
            }
        }
    }
}

/// Probes every identity concurrently.
///
/// # Returns
/// The identities that answered, in their original order
pub async fn probe_all(probe: &dyn LivenessProbe, identities: &[String]) -> Vec<String> {
    let results = join_all(identities.iter().map(|identity| probe.is_alive(identity))).await;
    identities
        .iter()
        .zip(results)
        .filter_map(|(identity, alive)| alive.then(|| identity.clone()))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    struct FixedProbe(HashSet<&'static str>);

    #[async_trait]
    impl LivenessProbe for FixedProbe {
        async fn is_alive(&self, identity: &str) -> bool {
            self.0.contains(identity)
        }
    }

    #[test]
    fn test_list_skips_invalid_urls() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("proxies.json");
        fs::write(
            &path,
            r#"{"b": "socks5://user:pw@10.0.0.2:1080", "a": "socks5://10.0.0.1:1080", "bad": "not a url"}"#,
        )
        .unwrap();

        let identities = ProxyStore::new(&path).list_identities().unwrap();
        assert_eq!(identities, ["socks5://10.0.0.1:1080", "socks5://user:pw@10.0.0.2:1080"]);
    }

    #[test]
    fn test_missing_file_is_empty_pool() {
        let dir = TempDir::new().unwrap();
        let store = ProxyStore::new(dir.path().join("proxies.json"));
        assert!(store.list_identities().unwrap().is_empty());
    }

    #[test]
    fn test_add_and_remove() {
        let dir = TempDir::new().unwrap();
        let store = ProxyStore::new(dir.path().join("proxies.json"));

        store.add("p1", "socks5://10.0.0.1:1080").unwrap();
        store.add("p2", "socks5://10.0.0.2:1080").unwrap();
        assert!(store.add("p3", "::nope::").is_err());
        assert_eq!(store.load().unwrap().len(), 2);

        assert!(store.remove("p1").unwrap());
        assert!(!store.remove("p1").unwrap());
        assert_eq!(store.list_identities().unwrap(), ["socks5://10.0.0.2:1080"]);
    }

    #[test]
    fn test_save_replaces_file_without_leftovers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("proxies.json");
        fs::write(&path, r#"{"old": "socks5://10.0.0.9:1080"}"#).unwrap();
        let store = ProxyStore::new(&path);

        store.add("new", "socks5://10.0.0.1:1080").unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        let parsed: BTreeMap<String, String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["new"], "socks5://10.0.0.1:1080");
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_probe_all_keeps_order() {
        let identities: Vec<String> = ["socks5://c:1", "socks5://a:1", "socks5://b:1"]
            .iter()
            .map(ToString::to_string)
            .collect();
        let probe = FixedProbe(HashSet::from(["socks5://c:1", "socks5://b:1"]));

        let alive = probe_all(&probe, &identities).await;
        assert_eq!(alive, ["socks5://c:1", "socks5://b:1"]);
    }
}
