//! # chatsync engine
//!
//! Sync orchestrator, remote adapters and local persistence for chatsync.
//!
//! This crate provides:
//! - Sync state machine (idle → fetching → merging → pushing → idle)
//! - Remote adapters for WebDAV and Upstash behind one [`RemoteAdapter`] trait
//! - Optional proxy indirection for every adapter request
//! - Atomic local document storage
//! - Sync config persistence with forward-only schema migrations
//! - Manual backup export and import
//!
//! ## Architecture
//!
//! Every cycle is a **bidirectional merge**:
//! 1. Fetch the remote snapshot for the configured identity
//! 2. Merge it into the local document (local is the base)
//! 3. Replace the local document with the merge result
//! 4. Push the merge result back to the remote
//!
//! ## Key Invariants
//!
//! - At most one cycle runs per engine at a time
//! - The local document is replaced only after fetch and merge succeed
//! - The remote is written only after the local replacement
//! - Credentials are passed through to the backend unchanged and never logged

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backup;
mod config;
mod error;
mod http;
mod migration;
mod state;
mod store;
mod transport;
mod upstash;
mod webdav;

pub use backup::{backup_file_name, export_snapshot, import_snapshot, Backup, ImportOutcome};
pub use config::{
    ProviderKind, SyncConfig, UpstashConfig, WebDavConfig, CONFIG_SCHEMA_VERSION,
    DEFAULT_STORAGE_KEY, DEFAULT_WEBDAV_FOLDER,
};
pub use error::{SyncError, SyncResult};
#[cfg(feature = "reqwest-client")]
pub use http::ReqwestClient;
pub use http::{HttpAuth, HttpClient, HttpRequest, HttpResponse, Method, ProxyRoute, RoutedClient};
pub use migration::{default_migrations, migrate_config, ConfigMigration, ConfigStore, MigrationReport};
pub use state::{CancelHandle, SyncCycleResult, SyncEngine, SyncState, SyncStats};
pub use store::{DocumentStore, FileStore, MemoryStore};
pub use transport::{create_adapter, MemoryAdapter, RemoteAdapter};
pub use upstash::{UpstashAdapter, DEFAULT_CHUNK_SIZE};
pub use webdav::WebDavAdapter;
