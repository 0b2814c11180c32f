//! Remote adapter abstraction.

use crate::config::{ProviderKind, SyncConfig};
use crate::error::{SyncError, SyncResult};
use crate::http::{HttpClient, RoutedClient};
use crate::upstash::UpstashAdapter;
use crate::webdav::WebDavAdapter;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// A remote adapter stores one opaque blob per identity key.
///
/// Adapters hold no sync state. Every call names the identity it addresses,
/// and none of them interpret the blob.
pub trait RemoteAdapter: Send + Sync {
    /// Returns the blob stored under `identity`, or `None` if never written.
    ///
    /// # Errors
    ///
    /// [`SyncError::Network`] on transport failure, [`SyncError::Auth`] when
    /// the backend rejects the credentials.
    fn fetch(&self, identity: &str) -> SyncResult<Option<String>>;

    /// Overwrites the blob stored under `identity`.
    ///
    /// # Errors
    ///
    /// Same as [`fetch`](Self::fetch).
    fn store(&self, identity: &str, blob: &str) -> SyncResult<()>;

    /// Checks reachability and credentials without changing remote state.
    fn probe(&self) -> bool;

    /// Returns the backend kind, if this adapter talks to a real provider.
    fn kind(&self) -> Option<ProviderKind> {
        None
    }
}

impl<A: RemoteAdapter + ?Sized> RemoteAdapter for std::sync::Arc<A> {
    fn fetch(&self, identity: &str) -> SyncResult<Option<String>> {
        (**self).fetch(identity)
    }

    fn store(&self, identity: &str, blob: &str) -> SyncResult<()> {
        (**self).store(identity, blob)
    }

    fn probe(&self) -> bool {
        (**self).probe()
    }

    fn kind(&self) -> Option<ProviderKind> {
        (**self).kind()
    }
}

/// Builds the adapter selected by `config.provider`.
///
/// The client is wrapped with the configured proxy route.
pub fn create_adapter(
    config: &SyncConfig,
    client: Box<dyn HttpClient>,
) -> SyncResult<Box<dyn RemoteAdapter>> {
    if !config.is_configured() {
        return Err(SyncError::Config(format!(
            "{} account is not fully configured",
            config.provider
        )));
    }

    let client = RoutedClient::new(client, config.proxy_route());
    let adapter: Box<dyn RemoteAdapter> = match config.provider {
        ProviderKind::WebDav => Box::new(WebDavAdapter::new(&config.webdav, client)),
        ProviderKind::Upstash => Box::new(UpstashAdapter::new(&config.upstash, client)),
    };
    Ok(adapter)
}

/// An in-memory adapter for testing.
#[derive(Debug)]
pub struct MemoryAdapter {
    blobs: Mutex<HashMap<String, String>>,
    connected: AtomicBool,
    reject_auth: AtomicBool,
    fetches: AtomicU64,
    stores: AtomicU64,
}

impl MemoryAdapter {
    /// Creates an empty, reachable adapter.
    pub fn new() -> Self {
        Self {
            blobs: Mutex::new(HashMap::new()),
            connected: AtomicBool::new(true),
            reject_auth: AtomicBool::new(false),
            fetches: AtomicU64::new(0),
            stores: AtomicU64::new(0),
        }
    }

    /// Returns the blob stored under `identity`.
    pub fn blob(&self, identity: &str) -> Option<String> {
        self.blobs.lock().get(identity).cloned()
    }

    /// Stores a blob directly, bypassing counters and failure modes.
    pub fn put_blob(&self, identity: &str, blob: impl Into<String>) {
        self.blobs.lock().insert(identity.to_string(), blob.into());
    }

    /// Sets the connected state; a disconnected adapter fails every call.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Makes every call fail with [`SyncError::Auth`].
    pub fn set_reject_auth(&self, reject: bool) {
        self.reject_auth.store(reject, Ordering::SeqCst);
    }

    /// Number of `fetch` calls that reached the store.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of `store` calls that reached the store.
    pub fn store_count(&self) -> u64 {
        self.stores.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> SyncResult<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(SyncError::network_retryable("memory adapter disconnected"));
        }
        if self.reject_auth.load(Ordering::SeqCst) {
            return Err(SyncError::Auth("memory adapter rejected credentials".into()));
        }
        Ok(())
    }
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteAdapter for MemoryAdapter {
    fn fetch(&self, identity: &str) -> SyncResult<Option<String>> {
        self.check_available()?;
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.blob(identity))
    }

    fn store(&self, identity: &str, blob: &str) -> SyncResult<()> {
        self.check_available()?;
        self.stores.fetch_add(1, Ordering::SeqCst);
        self.put_blob(identity, blob);
        Ok(())
    }

    fn probe(&self) -> bool {
        self.check_available().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpRequest, HttpResponse};

    struct NullClient;

    impl HttpClient for NullClient {
        fn send(&self, _request: HttpRequest) -> Result<HttpResponse, String> {
            Ok(HttpResponse::new(200, ""))
        }
    }

    #[test]
    fn memory_adapter_roundtrip() {
        let adapter = MemoryAdapter::new();
        assert_eq!(adapter.fetch("alice").unwrap(), None);

        adapter.store("alice", "blob").unwrap();
        assert_eq!(adapter.fetch("alice").unwrap().as_deref(), Some("blob"));
        assert_eq!(adapter.fetch("bob").unwrap(), None);
        assert_eq!(adapter.fetch_count(), 3);
        assert_eq!(adapter.store_count(), 1);
    }

    #[test]
    fn memory_adapter_failure_modes() {
        let adapter = MemoryAdapter::new();
        assert!(adapter.probe());

        adapter.set_connected(false);
        assert!(!adapter.probe());
        assert!(matches!(
            adapter.fetch("alice"),
            Err(SyncError::Network { .. })
        ));

        adapter.set_connected(true);
        adapter.set_reject_auth(true);
        assert!(matches!(adapter.store("alice", "x"), Err(SyncError::Auth(_))));
        assert_eq!(adapter.blob("alice"), None);
    }

    #[test]
    fn factory_selects_provider() {
        let config = SyncConfig::new().with_webdav("https://dav.example.com", "bob", "pw");
        let adapter = create_adapter(&config, Box::new(NullClient)).unwrap();
        assert_eq!(adapter.kind(), Some(ProviderKind::WebDav));

        let config = SyncConfig::new().with_upstash("https://kv.example.com", "k", "tok");
        let adapter = create_adapter(&config, Box::new(NullClient)).unwrap();
        assert_eq!(adapter.kind(), Some(ProviderKind::Upstash));
    }

    #[test]
    fn factory_rejects_incomplete_config() {
        let config = SyncConfig::new();
        assert!(matches!(
            create_adapter(&config, Box::new(NullClient)),
            Err(SyncError::Config(_))
        ));
    }
}
