//! Manual backup export and import.

use crate::error::{SyncError, SyncResult};
use crate::store::DocumentStore;
use chatsync_protocol::{decode_snapshot, encode_snapshot, is_blank, merge_with_report, MergeReport};
use chrono::{DateTime, TimeZone};
use std::fmt::Display;
use tracing::info;

/// A serialized local document ready to be written to a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backup {
    /// Suggested file name, e.g. `Backup-2024-03-09_14-05-07-042.json`.
    pub file_name: String,
    /// The snapshot itself.
    pub contents: String,
}

/// Outcome of a successful import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOutcome {
    /// The local document was rewritten and views should reload it.
    pub reload_required: bool,
    /// What the import added to the local document.
    pub report: MergeReport,
}

/// Builds the backup file name for `now`, with millisecond precision.
pub fn backup_file_name<Tz>(now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    now.format("Backup-%Y-%m-%d_%H-%M-%S-%3f.json").to_string()
}

/// Serializes the current local document verbatim.
pub fn export_snapshot<S, Tz>(store: &S, now: &DateTime<Tz>) -> SyncResult<Backup>
where
    S: DocumentStore + ?Sized,
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let document = store.load()?;
    let contents = encode_snapshot(&document)?;
    Ok(Backup {
        file_name: backup_file_name(now),
        contents,
    })
}

/// Merges a backup into the local document.
///
/// The backup is the incoming side, so nothing local is lost. This takes no
/// cycle guard; when a [`SyncEngine`](crate::SyncEngine) shares `store`, use
/// [`SyncEngine::import_snapshot`](crate::SyncEngine::import_snapshot).
///
/// # Errors
///
/// [`SyncError::Validation`] if `blob` is not a document; the local document
/// is left untouched.
pub fn import_snapshot<S>(store: &S, blob: &str) -> SyncResult<ImportOutcome>
where
    S: DocumentStore + ?Sized,
{
    if is_blank(blob) {
        return Err(SyncError::Validation("backup is empty".into()));
    }
    let imported = decode_snapshot(blob)?;

    let local = store.load()?;
    let (merged, report) = merge_with_report(&local, &imported);
    if merged != local {
        store.save(&merged)?;
    }

    info!(
        sessions_added = report.sessions_added,
        messages_added = report.messages_added,
        messages_replaced = report.messages_replaced,
        "backup imported"
    );
    Ok(ImportOutcome {
        reload_required: true,
        report,
    })
}
