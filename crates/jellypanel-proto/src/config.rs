use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::platform;
use crate::protocol::{NowPlayingRequest, RecentlyAddedRequest};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub jellyfin: JellyfinConfig,
    #[serde(default)]
    pub intervals: IntervalsConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub panel: PanelConfig,
}

/// Server, credentials and query parameters for the Jellyfin data source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JellyfinConfig {
    #[serde(default)]
    pub server_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub user_id: String,
    /// Library to restrict "recently added" to.  Empty means all libraries.
    #[serde(default)]
    pub parent_id: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[serde(default = "default_max_items")]
    pub max_items: u32,
    /// Passed through as `SortOrder` when non-empty.
    #[serde(default)]
    pub sort_order: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// The four independent timers driving the reconciler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalsConfig {
    #[serde(default = "default_update_secs")]
    pub update_secs: u64,
    #[serde(default = "default_rotate_secs")]
    pub rotate_secs: u64,
    #[serde(default = "default_now_playing_secs")]
    pub now_playing_secs: u64,
    #[serde(default = "default_retry_secs")]
    pub retry_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_enabled")]
    pub enabled: bool,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Presentation settings passed through to consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelConfig {
    /// Header shown above the panel.  Blank hides it.
    #[serde(default = "default_title")]
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_socket_port")]
    pub socket_port: u16,
}

impl Default for JellyfinConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            api_key: String::new(),
            user_id: String::new(),
            parent_id: String::new(),
            content_type: default_content_type(),
            max_items: default_max_items(),
            sort_order: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for IntervalsConfig {
    fn default() -> Self {
        Self {
            update_secs: default_update_secs(),
            rotate_secs: default_rotate_secs(),
            now_playing_secs: default_now_playing_secs(),
            retry_secs: default_retry_secs(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: default_http_enabled(),
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_port: default_socket_port(),
        }
    }
}

fn default_title() -> String {
    crate::view::DEFAULT_HEADER.to_string()
}

fn default_content_type() -> String {
    "Movie".to_string()
}

fn default_max_items() -> u32 {
    15
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_update_secs() -> u64 {
    60
}

fn default_rotate_secs() -> u64 {
    30
}

fn default_now_playing_secs() -> u64 {
    15
}

fn default_retry_secs() -> u64 {
    5 * 60
}

fn default_http_enabled() -> bool {
    true
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8097
}

fn default_socket_port() -> u16 {
    platform::DAEMON_SOCKET_PORT
}

fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

impl JellyfinConfig {
    /// Server URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.server_url.trim().trim_end_matches('/')
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn recently_added_request(&self) -> RecentlyAddedRequest {
        RecentlyAddedRequest {
            content_type: non_empty(&self.content_type).unwrap_or_else(default_content_type),
            library_scope: non_empty(&self.parent_id),
            max_items: self.max_items,
            sort_order: non_empty(&self.sort_order),
        }
    }

    pub fn now_playing_request(&self) -> NowPlayingRequest {
        NowPlayingRequest {
            user_id: self.user_id.trim().to_string(),
        }
    }
}

impl IntervalsConfig {
    pub fn update(&self) -> Duration {
        Duration::from_secs(self.update_secs)
    }

    pub fn rotate(&self) -> Duration {
        Duration::from_secs(self.rotate_secs)
    }

    pub fn now_playing(&self) -> Duration {
        Duration::from_secs(self.now_playing_secs)
    }

    pub fn retry(&self) -> Duration {
        Duration::from_secs(self.retry_secs)
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            tracing::info!("Wrote default config to {:?}", config_path);
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }

    /// Reject values the daemon cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.jellyfin.base_url().is_empty() {
            anyhow::bail!("jellyfin.server_url is not set ({})", Self::config_path().display());
        }
        if self.jellyfin.user_id.trim().is_empty() {
            anyhow::bail!("jellyfin.user_id is not set");
        }
        if self.jellyfin.max_items == 0 {
            anyhow::bail!("jellyfin.max_items must be at least 1");
        }
        let iv = &self.intervals;
        for (name, secs) in [
            ("update_secs", iv.update_secs),
            ("rotate_secs", iv.rotate_secs),
            ("now_playing_secs", iv.now_playing_secs),
            ("retry_secs", iv.retry_secs),
        ] {
            if secs == 0 {
                anyhow::bail!("intervals.{} must be greater than zero", name);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.http.enabled);
        assert_eq!(config.http.port, 8097);
        assert_eq!(config.http.bind_address, "127.0.0.1");
        assert_eq!(config.jellyfin.content_type, "Movie");
        assert_eq!(config.jellyfin.max_items, 15);
        assert_eq!(config.intervals.update(), Duration::from_secs(60));
        assert_eq!(config.intervals.rotate(), Duration::from_secs(30));
        assert_eq!(config.intervals.now_playing(), Duration::from_secs(15));
        assert_eq!(config.intervals.retry(), Duration::from_secs(300));
        assert_eq!(config.daemon.socket_port, 9877);
        assert_eq!(config.panel.title, "Jellyfin");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = Config::parse(
            r#"
            [jellyfin]
            server_url = "http://media.local:8096/"
            user_id = "u1"

            [intervals]
            rotate_secs = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.jellyfin.base_url(), "http://media.local:8096");
        assert_eq!(config.intervals.rotate_secs, 5);
        assert_eq!(config.intervals.update_secs, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let config = Config::parse("header = \"x\"\n[jellyfin]\nserver_url = \"x\"\n");
        assert!(config.is_ok());
    }

    #[test]
    fn test_panel_title() {
        let config = Config::parse("[panel]\ntitle = \"Cinema\"\n").unwrap();
        assert_eq!(config.panel.title, "Cinema");
        let config = Config::parse("[panel]\n").unwrap();
        assert_eq!(config.panel.title, "Jellyfin");
    }

    #[test]
    fn test_request_descriptors() {
        let mut jf = JellyfinConfig {
            user_id: " u1 ".into(),
            content_type: "  ".into(),
            ..Default::default()
        };
        let req = jf.recently_added_request();
        assert_eq!(req.content_type, "Movie");
        assert!(req.library_scope.is_none());
        assert!(req.sort_order.is_none());
        assert_eq!(jf.now_playing_request().user_id, "u1");

        jf.parent_id = "lib9".into();
        jf.sort_order = "Descending".into();
        let req = jf.recently_added_request();
        assert_eq!(req.library_scope.as_deref(), Some("lib9"));
        assert_eq!(req.sort_order.as_deref(), Some("Descending"));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = Config::default();
        config.jellyfin.server_url = "http://x".into();
        config.jellyfin.user_id = "u".into();
        config.intervals.retry_secs = 0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("retry_secs"));
    }

    #[test]
    fn test_validate_requires_server() {
        assert!(Config::default().validate().is_err());
    }
}
