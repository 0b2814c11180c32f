//! Backup export and import commands.

use super::CommandResult;
use chatsync_engine::{export_snapshot, import_snapshot, FileStore};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Writes a snapshot of the local document into `out_dir`.
pub fn export(data_path: &Path, out_dir: &Path) -> CommandResult<PathBuf> {
    let store = FileStore::new(data_path);
    let backup = export_snapshot(&store, &chrono::Local::now())?;

    fs::create_dir_all(out_dir)?;
    let path = out_dir.join(&backup.file_name);
    if path.exists() {
        return Err(format!("{} already exists", path.display()).into());
    }
    fs::write(&path, &backup.contents)?;

    info!(path = %path.display(), bytes = backup.contents.len(), "backup written");
    println!("✓ Backup created");
    println!("  Path: {}", path.display());
    println!("  Size: {} bytes", backup.contents.len());
    Ok(path)
}

/// Merges a backup file into the local document.
pub fn import(data_path: &Path, input: &Path) -> CommandResult {
    info!(path = %input.display(), "importing backup");
    let blob = fs::read_to_string(input)?;
    let store = FileStore::new(data_path);
    let outcome = import_snapshot(&store, &blob)
        .map_err(|e| format!("{}: {e}", input.display()))?;

    println!("✓ Backup imported");
    println!("  Sessions added:   {}", outcome.report.sessions_added);
    println!("  Messages added:   {}", outcome.report.messages_added);
    println!("  Messages updated: {}", outcome.report.messages_replaced);
    if outcome.reload_required {
        println!("  Reload any open views to see the imported data.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatsync_engine::DocumentStore;
    use chatsync_protocol::{Document, Message, Role, Session};
    use tempfile::tempdir;

    #[test]
    fn export_then_import_into_fresh_store() {
        let dir = tempdir().unwrap();
        let data = dir.path().join("state.json");

        let mut doc = Document::new();
        let mut session = Session::new("s1", "ideas", 4);
        session.push_message(Message::new("m1", Role::User, "write a cli", 4), 4);
        doc.upsert_session(session);
        FileStore::new(&data).save(&doc).unwrap();

        let backup = export(&data, &dir.path().join("backups")).unwrap();
        assert!(backup
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("Backup-"));

        let other = dir.path().join("other.json");
        import(&other, &backup).unwrap();
        assert_eq!(FileStore::new(&other).load().unwrap(), doc);
    }

    #[test]
    fn import_rejects_garbage() {
        let dir = tempdir().unwrap();
        let data = dir.path().join("state.json");
        let input = dir.path().join("bad.json");
        fs::write(&input, "[1, 2, 3]").unwrap();

        assert!(import(&data, &input).is_err());
        assert!(!data.exists());
    }
}
