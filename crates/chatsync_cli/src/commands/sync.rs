//! Sync and check commands.

use super::CommandResult;
use chatsync_engine::{
    create_adapter, ConfigStore, FileStore, ReqwestClient, SyncConfig, SyncEngine,
};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Per-request timeout for backend calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn open_engine(config: &SyncConfig, data_path: &Path) -> CommandResult<SyncEngine<FileStore>> {
    let client = ReqwestClient::new(REQUEST_TIMEOUT)?;
    let adapter = create_adapter(config, Box::new(client))?;
    Ok(SyncEngine::new(adapter, FileStore::new(data_path)))
}

/// Runs one sync cycle and records the sync time in the config file.
pub fn run(config_path: &Path, data_path: &Path) -> CommandResult {
    let configs = ConfigStore::new(config_path);
    let mut config = configs.load()?;
    let engine = open_engine(&config, data_path)?;

    info!(provider = %config.provider, "starting sync");
    let result = match engine.sync(&mut config) {
        Ok(result) => result,
        Err(e) if e.is_retryable() => {
            return Err(format!("{e} (temporary; run sync again)").into());
        }
        Err(e) => return Err(e.into()),
    };
    configs.save(&config)?;

    if result.first_upload {
        println!("✓ Uploaded local data to an empty {}", config.provider);
    } else {
        println!("✓ Synced with {}", config.provider);
    }
    println!("  Sessions received: {}", result.report.sessions_added);
    println!("  Messages received: {}", result.report.messages_added);
    println!("  Messages updated:  {}", result.report.messages_replaced);
    if result.report.settings_from_incoming {
        println!("  Settings taken from remote");
    }
    println!("  Uploaded:          {} bytes", result.bytes_pushed);
    println!("  Took:              {} ms", result.duration.as_millis());
    Ok(())
}

/// Checks that the configured backend is reachable with the stored account.
pub fn check(config_path: &Path, data_path: &Path) -> CommandResult {
    let config = ConfigStore::new(config_path).load()?;
    let engine = open_engine(&config, data_path)?;

    if engine.check() {
        println!("✓ {} is reachable and accepted the account", config.provider);
        Ok(())
    } else {
        println!("✗ {} check failed", config.provider);
        Err("Backend unreachable or credentials rejected".into())
    }
}
