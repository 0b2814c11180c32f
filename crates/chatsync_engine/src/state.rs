//! Sync orchestrator state machine.
//!
//! One cycle runs `Idle -> Fetching -> Merging -> Pushing -> Idle`. A failed
//! cycle passes through `Failed` back to `Idle`; the error stays in
//! [`SyncStats::last_error`].
//!
//! The local document is replaced only after fetch and merge both succeed,
//! and the remote is written only after that replacement. Local writes that
//! go through the engine (sync and import) hold the same cycle guard, so two
//! merges never interleave.

use crate::backup::{self, ImportOutcome};
use crate::config::{now_millis, ProviderKind, SyncConfig};
use crate::error::{SyncError, SyncResult};
use crate::store::DocumentStore;
use crate::transport::RemoteAdapter;
use chatsync_protocol::{decode_snapshot, encode_snapshot, is_blank, merge_with_report, MergeReport};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// The current state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No cycle running.
    Idle,
    /// Reading the remote snapshot.
    Fetching,
    /// Reconciling local and remote documents.
    Merging,
    /// Writing the merged snapshot to the remote.
    Pushing,
    /// A cycle failed; the engine returns to `Idle` once the error is
    /// recorded.
    Failed,
}

impl SyncState {
    /// Returns true while a cycle is in flight.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SyncState::Fetching | SyncState::Merging | SyncState::Pushing
        )
    }
}

/// Statistics about sync cycles.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Cycles that finished with a successful push.
    pub cycles_completed: u64,
    /// Cycles that returned an error.
    pub cycles_failed: u64,
    /// Sessions taken from the remote across all cycles.
    pub sessions_received: u64,
    /// Messages added or replaced from the remote across all cycles.
    pub messages_received: u64,
    /// Unix milliseconds of the last successful cycle.
    pub last_sync_time: Option<u64>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Result of a successful sync cycle.
#[derive(Debug, Clone)]
pub struct SyncCycleResult {
    /// True if the remote held no snapshot and the local document was
    /// uploaded as is.
    pub first_upload: bool,
    /// What the merge took from the remote.
    pub report: MergeReport,
    /// Size of the pushed snapshot in bytes.
    pub bytes_pushed: usize,
    /// Time recorded as the last sync.
    pub synced_at: u64,
    /// Duration of the cycle.
    pub duration: Duration,
}

/// Requests cancellation of the running cycle from another thread.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Requests cancellation. Takes effect at the next phase boundary.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Runs fetch, merge and push cycles against one remote adapter.
pub struct SyncEngine<S: DocumentStore> {
    adapter: Box<dyn RemoteAdapter>,
    store: S,
    cycle: Mutex<()>,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
    cancelled: Arc<AtomicBool>,
}

impl<S: DocumentStore> SyncEngine<S> {
    /// Creates a new sync engine.
    pub fn new(adapter: Box<dyn RemoteAdapter>, store: S) -> Self {
        Self {
            adapter,
            store,
            cycle: Mutex::new(()),
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns the local document store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Cancels the running cycle, if any.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns a handle that can cancel cycles from another thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(Arc::clone(&self.cancelled))
    }

    /// Checks that the remote is reachable and accepts the credentials.
    pub fn check(&self) -> bool {
        self.adapter.probe()
    }

    fn check_cancelled(&self) -> SyncResult<()> {
        if self.cancelled.load(Ordering::SeqCst) {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn set_state(&self, state: SyncState) {
        *self.state.write() = state;
    }

    /// Runs one sync cycle.
    ///
    /// On success `config` is stamped with the sync time and provider; the
    /// caller decides whether to persist it.
    ///
    /// # Errors
    ///
    /// [`SyncError::InProgress`] if another cycle is running. Otherwise any
    /// adapter, decode or storage error, after which the local document is
    /// either untouched or holds the merged result.
    pub fn sync(&self, config: &mut SyncConfig) -> SyncResult<SyncCycleResult> {
        let Some(_guard) = self.cycle.try_lock() else {
            debug!("sync rejected: cycle already running");
            return Err(SyncError::InProgress);
        };

        let start = Instant::now();
        self.cancelled.store(false, Ordering::SeqCst);

        match self.run_cycle(config, start) {
            Ok(result) => {
                self.set_state(SyncState::Idle);
                let mut stats = self.stats.write();
                stats.cycles_completed += 1;
                stats.sessions_received += result.report.sessions_added as u64;
                stats.messages_received +=
                    (result.report.messages_added + result.report.messages_replaced) as u64;
                stats.last_sync_time = Some(result.synced_at);
                stats.last_error = None;
                Ok(result)
            }
            Err(e) => {
                self.handle_error(&e);
                Err(e)
            }
        }
    }

    /// Merges a backup into the local document.
    ///
    /// # Errors
    ///
    /// [`SyncError::InProgress`] while a sync cycle is running, otherwise the
    /// errors of [`crate::import_snapshot`].
    pub fn import_snapshot(&self, blob: &str) -> SyncResult<ImportOutcome> {
        let Some(_guard) = self.cycle.try_lock() else {
            debug!("import rejected: cycle already running");
            return Err(SyncError::InProgress);
        };
        backup::import_snapshot(&self.store, blob)
    }

    fn run_cycle(&self, config: &mut SyncConfig, start: Instant) -> SyncResult<SyncCycleResult> {
        if let Some(kind) = self.adapter.kind() {
            if kind != config.provider {
                return Err(SyncError::Config(format!(
                    "adapter is {kind} but config selects {}",
                    config.provider
                )));
            }
        }
        let identity = config.identity()?;

        self.check_cancelled()?;
        self.set_state(SyncState::Fetching);
        debug!(provider = %config.provider, "fetching remote snapshot");
        let remote = self
            .adapter
            .fetch(&identity)?
            .filter(|blob| !is_blank(blob))
            .map(|blob| decode_snapshot(&blob))
            .transpose()?;

        self.check_cancelled()?;
        self.set_state(SyncState::Merging);
        let local = self.store.load()?;
        let (merged, report, first_upload) = match remote {
            Some(remote) => {
                let (merged, report) = merge_with_report(&local, &remote);
                (merged, report, false)
            }
            None => {
                debug!("remote is empty, uploading local document");
                (local.clone(), MergeReport::default(), true)
            }
        };

        self.check_cancelled()?;
        if merged != local {
            self.store.save(&merged)?;
        }

        self.set_state(SyncState::Pushing);
        let blob = encode_snapshot(&merged)?;
        self.adapter.store(&identity, &blob)?;

        let synced_at = now_millis();
        self.stamp_local(synced_at, config.provider)?;
        config.mark_sync_time(synced_at);

        info!(
            provider = %config.provider,
            first_upload,
            sessions_added = report.sessions_added,
            messages_added = report.messages_added,
            messages_replaced = report.messages_replaced,
            settings_from_remote = report.settings_from_incoming,
            bytes = blob.len(),
            "sync cycle complete"
        );

        Ok(SyncCycleResult {
            first_upload,
            report,
            bytes_pushed: blob.len(),
            synced_at,
            duration: start.elapsed(),
        })
    }

    /// Records the sync time on the current local document.
    ///
    /// Reloads instead of reusing the pushed copy, so only `sync_meta`
    /// changes here.
    fn stamp_local(&self, synced_at: u64, provider: ProviderKind) -> SyncResult<()> {
        let mut current = self.store.load()?;
        current.sync_meta.last_sync_time = Some(synced_at);
        current.sync_meta.last_provider = Some(provider.to_string());
        self.store.save(&current)
    }

    fn handle_error(&self, error: &SyncError) {
        warn!(error = %error, retryable = error.is_retryable(), "sync cycle failed");
        self.set_state(SyncState::Failed);
        {
            let mut stats = self.stats.write();
            stats.cycles_failed += 1;
            stats.last_error = Some(error.to_string());
        }
        self.set_state(SyncState::Idle);
    }
}
