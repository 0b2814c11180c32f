//! Config commands: init, show, set-provider, proxy.
//!
//! All edits go through [`ConfigStore`], so an outdated file is migrated
//! before it is changed.

use super::CommandResult;
use chatsync_engine::{ConfigStore, ProviderKind, SyncConfig};
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Account fields that may be set alongside the provider.
#[derive(Debug, Default, Clone, clap::Args)]
pub struct AccountArgs {
    /// Server endpoint URL
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Account user name (also the storage key)
    #[arg(long)]
    pub username: Option<String>,

    /// WebDAV password
    #[arg(long)]
    pub password: Option<String>,

    /// Upstash REST token
    #[arg(long)]
    pub api_key: Option<String>,

    /// WebDAV folder holding the snapshot
    #[arg(long)]
    pub folder: Option<String>,
}

/// Printable view of the config. Secrets are reported as set or unset only.
#[derive(Debug, Serialize)]
pub struct ConfigView {
    /// Config file path.
    pub path: String,
    /// Selected provider.
    pub provider: String,
    /// Whether the selected account is complete.
    pub configured: bool,
    /// Proxy enabled.
    pub use_proxy: bool,
    /// Proxy prefix.
    pub proxy_url: String,
    /// WebDAV endpoint.
    pub webdav_endpoint: String,
    /// WebDAV user name.
    pub webdav_username: String,
    /// WebDAV folder.
    pub webdav_folder: String,
    /// Whether a WebDAV password is stored.
    pub webdav_password_set: bool,
    /// Upstash endpoint.
    pub upstash_endpoint: String,
    /// Upstash storage key.
    pub upstash_username: String,
    /// Whether an Upstash token is stored.
    pub upstash_api_key_set: bool,
    /// Last successful sync, if any.
    pub last_sync: Option<String>,
    /// Provider used by the last successful sync.
    pub last_provider: Option<String>,
    /// Schema version.
    pub schema_version: u32,
}

impl ConfigView {
    fn new(path: &Path, config: &SyncConfig) -> Self {
        Self {
            path: path.display().to_string(),
            provider: config.provider.to_string(),
            configured: config.is_configured(),
            use_proxy: config.use_proxy,
            proxy_url: config.proxy_url.clone(),
            webdav_endpoint: config.webdav.endpoint.clone(),
            webdav_username: config.webdav.username.clone(),
            webdav_folder: config.webdav.folder.clone(),
            webdav_password_set: !config.webdav.password.is_empty(),
            upstash_endpoint: config.upstash.endpoint.clone(),
            upstash_username: config.upstash.username.clone(),
            upstash_api_key_set: !config.upstash.api_key.is_empty(),
            last_sync: super::format_time(config.last_sync_time),
            last_provider: config.last_provider.map(|p| p.to_string()),
            schema_version: config.schema_version,
        }
    }
}

/// Writes a default config file.
pub fn init(path: &Path, force: bool) -> CommandResult {
    if path.exists() && !force {
        return Err(format!(
            "Config already exists at {}. Use --force to overwrite.",
            path.display()
        )
        .into());
    }

    ConfigStore::new(path).save(&SyncConfig::default())?;
    info!(path = %path.display(), "wrote default config");
    println!("✓ Config written to {}", path.display());
    println!("  Next: chatsync config set-provider webdav --endpoint URL --username NAME --password PASS");
    Ok(())
}

/// Prints the config.
pub fn show(path: &Path, format: &str) -> CommandResult {
    let config = ConfigStore::new(path).load()?;
    let view = ConfigView::new(path, &config);

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&view)?),
        _ => print_text(&view),
    }
    Ok(())
}

/// Selects a provider and updates the given account fields.
pub fn set_provider(path: &Path, provider: ProviderKind, account: &AccountArgs) -> CommandResult {
    let store = ConfigStore::new(path);
    let mut config = store.load()?;
    apply_provider(&mut config, provider, account);
    store.save(&config)?;

    println!("✓ Provider set to {provider}");
    if !config.is_configured() {
        println!("  Account is incomplete; sync will be refused until every field is set.");
    }
    Ok(())
}

/// Turns the proxy on or off.
pub fn proxy(path: &Path, enabled: bool, url: Option<String>) -> CommandResult {
    let store = ConfigStore::new(path);
    let mut config = store.load()?;
    apply_proxy(&mut config, enabled, url)?;
    store.save(&config)?;

    if config.use_proxy {
        println!("✓ Proxy enabled via {}", config.proxy_url);
    } else {
        println!("✓ Proxy disabled");
    }
    Ok(())
}

fn apply_provider(config: &mut SyncConfig, provider: ProviderKind, account: &AccountArgs) {
    config.provider = provider;
    match provider {
        ProviderKind::WebDav => {
            let webdav = &mut config.webdav;
            set_if_some(&mut webdav.endpoint, &account.endpoint);
            set_if_some(&mut webdav.username, &account.username);
            set_if_some(&mut webdav.password, &account.password);
            set_if_some(&mut webdav.folder, &account.folder);
        }
        ProviderKind::Upstash => {
            let upstash = &mut config.upstash;
            set_if_some(&mut upstash.endpoint, &account.endpoint);
            set_if_some(&mut upstash.username, &account.username);
            set_if_some(&mut upstash.api_key, &account.api_key);
        }
    }
}

fn apply_proxy(config: &mut SyncConfig, enabled: bool, url: Option<String>) -> CommandResult {
    if let Some(url) = url {
        config.proxy_url = url;
    }
    if enabled && config.proxy_url.is_empty() {
        return Err("Proxy URL required: pass --url".into());
    }
    config.use_proxy = enabled;
    Ok(())
}

fn set_if_some(field: &mut String, value: &Option<String>) {
    if let Some(value) = value {
        field.clone_from(value);
    }
}

fn print_text(view: &ConfigView) {
    println!("chatsync Sync Config");
    println!("====================");
    println!();
    println!("Path:     {}", view.path);
    println!("Provider: {}", view.provider);
    println!("Ready:    {}", if view.configured { "yes" } else { "no" });
    println!("Schema:   v{}", view.schema_version);
    println!();
    println!("Proxy:");
    println!("  Enabled: {}", view.use_proxy);
    println!("  URL:     {}", view.proxy_url);
    println!();
    println!("WebDAV:");
    println!("  Endpoint: {}", view.webdav_endpoint);
    println!("  Username: {}", view.webdav_username);
    println!("  Folder:   {}", view.webdav_folder);
    println!("  Password: {}", set_label(view.webdav_password_set));
    println!();
    println!("Upstash:");
    println!("  Endpoint: {}", view.upstash_endpoint);
    println!("  Key:      {}", view.upstash_username);
    println!("  Token:    {}", set_label(view.upstash_api_key_set));
    println!();
    match (&view.last_sync, &view.last_provider) {
        (Some(time), Some(provider)) => println!("Last sync: {time} via {provider}"),
        (Some(time), None) => println!("Last sync: {time}"),
        _ => println!("Last sync: never"),
    }
}

fn set_label(set: bool) -> &'static str {
    if set {
        "<set>"
    } else {
        "<unset>"
    }
}
