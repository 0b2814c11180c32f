//! Configuration for the sync engine.
//!
//! [`SyncConfig`] is the persisted, user-edited configuration: which provider
//! to use, its endpoint and credentials, the proxy setting and the record of
//! the last successful sync. Loading, migrating and saving it is the job of
//! [`ConfigStore`](crate::ConfigStore).
//!
//! Credentials are opaque. Nothing in this crate compares, rewrites or logs
//! them, and the `Debug` output of every config type redacts them.

use crate::error::{SyncError, SyncResult};
use crate::http::ProxyRoute;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 3;

/// Default key under which the Upstash adapter addresses the document.
pub const DEFAULT_STORAGE_KEY: &str = "chatsync";

/// Default WebDAV folder holding the snapshot files.
pub const DEFAULT_WEBDAV_FOLDER: &str = "chatsync";

const REDACTED: &str = "<redacted>";

/// Kind of remote backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// WebDAV server holding one file per identity.
    WebDav,
    /// Upstash Redis REST key-value store.
    Upstash,
}

impl ProviderKind {
    /// Returns the lowercase provider name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::WebDav => "webdav",
            ProviderKind::Upstash => "upstash",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "webdav" => Ok(ProviderKind::WebDav),
            "upstash" => Ok(ProviderKind::Upstash),
            other => Err(SyncError::Config(format!("unknown provider: {other}"))),
        }
    }
}

/// WebDAV account settings.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebDavConfig {
    /// Server URL, e.g. `https://dav.example.com/remote.php/dav/files/me`.
    pub endpoint: String,
    /// Account name; also the identity key.
    pub username: String,
    /// Account password.
    pub password: String,
    /// Folder under the endpoint that holds the snapshots.
    #[serde(default = "default_folder")]
    pub folder: String,
}

fn default_folder() -> String {
    DEFAULT_WEBDAV_FOLDER.to_string()
}

impl fmt::Debug for WebDavConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebDavConfig")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("password", &REDACTED)
            .field("folder", &self.folder)
            .finish()
    }
}

/// Upstash account settings.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstashConfig {
    /// REST endpoint, e.g. `https://eu1-example.upstash.io`.
    pub endpoint: String,
    /// Storage key; also the identity key.
    pub username: String,
    /// REST token.
    pub api_key: String,
}

impl fmt::Debug for UpstashConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstashConfig")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("api_key", &REDACTED)
            .finish()
    }
}

/// Persisted sync configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    /// Selected backend.
    pub provider: ProviderKind,
    /// Route requests through `proxy_url`.
    pub use_proxy: bool,
    /// Proxy prefix used when `use_proxy` is set.
    pub proxy_url: String,
    /// WebDAV account.
    pub webdav: WebDavConfig,
    /// Upstash account.
    pub upstash: UpstashConfig,
    /// Time of the last successful sync (Unix milliseconds, 0 = never).
    pub last_sync_time: u64,
    /// Provider used for the last successful sync.
    pub last_provider: Option<ProviderKind>,
    /// Schema version of this config.
    pub schema_version: u32,
}

impl SyncConfig {
    /// Creates a configuration with defaults at the current schema version.
    pub fn new() -> Self {
        Self {
            provider: ProviderKind::WebDav,
            use_proxy: false,
            proxy_url: String::new(),
            webdav: WebDavConfig {
                folder: default_folder(),
                ..WebDavConfig::default()
            },
            upstash: UpstashConfig {
                username: DEFAULT_STORAGE_KEY.to_string(),
                ..UpstashConfig::default()
            },
            last_sync_time: 0,
            last_provider: None,
            schema_version: CONFIG_SCHEMA_VERSION,
        }
    }

    /// Selects WebDAV with the given account.
    pub fn with_webdav(
        mut self,
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.provider = ProviderKind::WebDav;
        self.webdav.endpoint = endpoint.into();
        self.webdav.username = username.into();
        self.webdav.password = password.into();
        self
    }

    /// Selects Upstash with the given account.
    pub fn with_upstash(
        mut self,
        endpoint: impl Into<String>,
        username: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        self.provider = ProviderKind::Upstash;
        self.upstash.endpoint = endpoint.into();
        self.upstash.username = username.into();
        self.upstash.api_key = api_key.into();
        self
    }

    /// Enables the proxy with the given prefix.
    pub fn with_proxy(mut self, proxy_url: impl Into<String>) -> Self {
        self.use_proxy = true;
        self.proxy_url = proxy_url.into();
        self
    }

    /// Returns true if every field of the selected provider's account is set.
    pub fn is_configured(&self) -> bool {
        match self.provider {
            ProviderKind::WebDav => [
                &self.webdav.endpoint,
                &self.webdav.username,
                &self.webdav.password,
                &self.webdav.folder,
            ]
            .iter()
            .all(|field| !field.is_empty()),
            ProviderKind::Upstash => [
                &self.upstash.endpoint,
                &self.upstash.username,
                &self.upstash.api_key,
            ]
            .iter()
            .all(|field| !field.is_empty()),
        }
    }

    /// Returns the key under which the selected account stores its document.
    ///
    /// This is the configured username, passed through unchanged.
    pub fn identity(&self) -> SyncResult<String> {
        let username = match self.provider {
            ProviderKind::WebDav => &self.webdav.username,
            ProviderKind::Upstash => &self.upstash.username,
        };
        if username.is_empty() {
            return Err(SyncError::Config(format!(
                "{} username is not set",
                self.provider
            )));
        }
        Ok(username.clone())
    }

    /// Returns the proxy route implied by this configuration.
    pub fn proxy_route(&self) -> ProxyRoute {
        if self.use_proxy && !self.proxy_url.is_empty() {
            ProxyRoute::via(self.proxy_url.clone())
        } else {
            ProxyRoute::Direct
        }
    }

    /// Records a successful sync with the current provider.
    pub fn mark_sync_time(&mut self, now: u64) {
        self.last_sync_time = now;
        self.last_provider = Some(self.provider);
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Current time in Unix milliseconds.
pub(crate) fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.provider, ProviderKind::WebDav);
        assert_eq!(config.upstash.username, DEFAULT_STORAGE_KEY);
        assert_eq!(config.webdav.folder, DEFAULT_WEBDAV_FOLDER);
        assert_eq!(config.schema_version, CONFIG_SCHEMA_VERSION);
        assert!(!config.is_configured());
        assert_eq!(config.proxy_route(), ProxyRoute::Direct);
    }

    #[test]
    fn builder_selects_provider() {
        let config = SyncConfig::new().with_upstash("https://kv.example.com", "alice", "tok");
        assert_eq!(config.provider, ProviderKind::Upstash);
        assert!(config.is_configured());
        assert_eq!(config.identity().unwrap(), "alice");

        let config = SyncConfig::new().with_webdav("https://dav.example.com", "bob", "pw");
        assert_eq!(config.provider, ProviderKind::WebDav);
        assert!(config.is_configured());
    }

    #[test]
    fn identity_is_username_verbatim() {
        let config = SyncConfig::new().with_webdav("https://dav.example.com", "KKKbob", "pw");
        assert_eq!(config.identity().unwrap(), "KKKbob");
    }

    #[test]
    fn identity_requires_username() {
        let config = SyncConfig::new().with_webdav("https://dav.example.com", "", "pw");
        assert!(matches!(config.identity(), Err(SyncError::Config(_))));
    }

    #[test]
    fn mark_sync_time_records_provider() {
        let mut config = SyncConfig::new().with_upstash("https://kv.example.com", "k", "t");
        config.mark_sync_time(1234);
        assert_eq!(config.last_sync_time, 1234);
        assert_eq!(config.last_provider, Some(ProviderKind::Upstash));
    }

    #[test]
    fn proxy_requires_url() {
        let mut config = SyncConfig::new().with_proxy("https://proxy.example.com");
        assert_eq!(
            config.proxy_route(),
            ProxyRoute::via("https://proxy.example.com")
        );
        config.proxy_url.clear();
        assert_eq!(config.proxy_route(), ProxyRoute::Direct);
    }

    #[test]
    fn debug_redacts_credentials() {
        let config = SyncConfig::new()
            .with_webdav("https://dav.example.com", "bob", "hunter2")
            .with_upstash("https://kv.example.com", "k", "sekret-token");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("sekret-token"));
        assert!(rendered.contains("bob"));
    }

    #[test]
    fn provider_parsing() {
        assert_eq!("WebDAV".parse::<ProviderKind>().unwrap(), ProviderKind::WebDav);
        assert_eq!("upstash".parse::<ProviderKind>().unwrap(), ProviderKind::Upstash);
        assert!("s3".parse::<ProviderKind>().is_err());
    }
}
