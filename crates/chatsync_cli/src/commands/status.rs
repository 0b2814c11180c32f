//! Local document summary.

use super::CommandResult;
use chatsync_engine::{DocumentStore, FileStore};
use serde::Serialize;
use std::path::Path;

/// Summary of the local document.
#[derive(Debug, Serialize)]
pub struct StatusResult {
    /// Document path.
    pub path: String,
    /// Number of sessions.
    pub session_count: usize,
    /// Number of messages across all sessions.
    pub message_count: usize,
    /// Number of settings keys.
    pub setting_count: usize,
    /// Last successful sync, if any.
    pub last_sync: Option<String>,
    /// Provider used by the last sync.
    pub last_provider: Option<String>,
    /// Per-session details (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sessions: Option<Vec<SessionSummary>>,
}

/// One session in the summary.
#[derive(Debug, Serialize)]
pub struct SessionSummary {
    /// Session id.
    pub id: String,
    /// Session topic.
    pub topic: String,
    /// Number of messages.
    pub messages: usize,
}

/// Prints a summary of the local document.
pub fn run(data_path: &Path, show_sessions: bool, format: &str) -> CommandResult {
    let document = FileStore::new(data_path).load()?;

    let result = StatusResult {
        path: data_path.display().to_string(),
        session_count: document.sessions.len(),
        message_count: document.message_count(),
        setting_count: document.settings.len(),
        last_sync: document
            .sync_meta
            .last_sync_time
            .and_then(super::format_time),
        last_provider: document.sync_meta.last_provider.clone(),
        sessions: show_sessions.then(|| {
            document
                .sessions
                .iter()
                .map(|s| SessionSummary {
                    id: s.id.clone(),
                    topic: s.topic.clone(),
                    messages: s.messages.len(),
                })
                .collect()
        }),
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text(&result),
    }
    Ok(())
}

fn print_text(result: &StatusResult) {
    println!("chatsync Local Data");
    println!("===================");
    println!();
    println!("Path:     {}", result.path);
    println!("Sessions: {}", result.session_count);
    println!("Messages: {}", result.message_count);
    println!("Settings: {}", result.setting_count);
    match (&result.last_sync, &result.last_provider) {
        (Some(time), Some(provider)) => println!("Synced:   {time} via {provider}"),
        (Some(time), None) => println!("Synced:   {time}"),
        _ => println!("Synced:   never"),
    }

    if let Some(sessions) = &result.sessions {
        println!();
        println!("Sessions:");
        for session in sessions {
            println!(
                "  {:<24} {:>5} msgs  {}",
                session.id, session.messages, session.topic
            );
        }
    }
}
