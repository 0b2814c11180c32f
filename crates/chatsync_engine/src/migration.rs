//! Sync config persistence and schema migration.
//!
//! The config file carries a `schemaVersion`. On load, every registered
//! [`ConfigMigration`] whose version is greater than the stored one runs in
//! ascending order against the raw JSON, then the result is overlaid on the
//! current defaults and deserialized.
//!
//! Migrations are:
//! - **Forward-only**: no step undoes another
//! - **Idempotent**: re-running a step on migrated data changes nothing
//! - **Fail-closed**: a failing step aborts the load instead of falling back
//!   to defaults, so user settings are never silently dropped

use crate::config::{SyncConfig, DEFAULT_STORAGE_KEY};
use crate::error::{SyncError, SyncResult};
use crate::store::write_atomic;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::info;

/// Schema version assumed for files written before versioning existed.
const INITIAL_SCHEMA_VERSION: u32 = 1;

/// Proxy path shipped as the default by early releases.
const LEGACY_CORS_PATH: &str = "/api/cors/";

/// A single config migration step.
pub trait ConfigMigration: Send + Sync {
    /// Schema version this step upgrades to.
    fn version(&self) -> u32;

    /// Short name for logging.
    fn name(&self) -> &str;

    /// Rewrites the raw config object in place.
    fn up(&self, config: &mut Map<String, Value>) -> Result<(), String>;
}

/// v2: the Upstash account is addressed under the shared storage key.
struct ResetUpstashStorageKey;

impl ConfigMigration for ResetUpstashStorageKey {
    fn version(&self) -> u32 {
        2
    }

    fn name(&self) -> &str {
        "reset_upstash_storage_key"
    }

    fn up(&self, config: &mut Map<String, Value>) -> Result<(), String> {
        let upstash = config
            .entry("upstash")
            .or_insert_with(|| Value::Object(Map::new()));
        let upstash = upstash
            .as_object_mut()
            .ok_or("upstash is not an object")?;
        upstash.insert("username".into(), Value::String(DEFAULT_STORAGE_KEY.into()));
        Ok(())
    }
}

/// v3: drop the relative CORS path early releases used as the proxy default.
struct ClearLegacyCorsProxy;

impl ConfigMigration for ClearLegacyCorsProxy {
    fn version(&self) -> u32 {
        3
    }

    fn name(&self) -> &str {
        "clear_legacy_cors_proxy"
    }

    fn up(&self, config: &mut Map<String, Value>) -> Result<(), String> {
        match config.get("proxyUrl") {
            Some(Value::String(url)) if url == LEGACY_CORS_PATH => {
                config.insert("proxyUrl".into(), Value::String(String::new()));
                Ok(())
            }
            None | Some(Value::String(_)) => Ok(()),
            Some(_) => Err("proxyUrl is not a string".into()),
        }
    }
}

/// The migration steps shipped with this version, in ascending order.
pub fn default_migrations() -> Vec<Box<dyn ConfigMigration>> {
    vec![Box::new(ResetUpstashStorageKey), Box::new(ClearLegacyCorsProxy)]
}

/// Outcome of migrating a stored config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// Version found on disk.
    pub from_version: u32,
    /// Version after migration.
    pub to_version: u32,
    /// Names of the steps that ran.
    pub applied: Vec<String>,
}

/// Migrates a raw stored config to the current schema.
pub fn migrate_config(
    stored: Value,
    migrations: &[Box<dyn ConfigMigration>],
) -> SyncResult<(SyncConfig, MigrationReport)> {
    let Value::Object(mut object) = stored else {
        return Err(SyncError::Migration {
            version: INITIAL_SCHEMA_VERSION,
            message: "stored config is not an object".into(),
        });
    };

    let from_version = match object.get("schemaVersion").and_then(Value::as_u64) {
        Some(v) => u32::try_from(v).map_err(|_| SyncError::Migration {
            version: INITIAL_SCHEMA_VERSION,
            message: format!("schemaVersion {v} is out of range"),
        })?,
        None => INITIAL_SCHEMA_VERSION,
    };

    let mut steps: Vec<&dyn ConfigMigration> = migrations.iter().map(|m| m.as_ref()).collect();
    steps.sort_by_key(|m| m.version());

    let mut version = from_version;
    let mut applied = Vec::new();
    for step in steps {
        if from_version < step.version() {
            step.up(&mut object).map_err(|message| SyncError::Migration {
                version: step.version(),
                message,
            })?;
            version = version.max(step.version());
            applied.push(step.name().to_string());
        }
    }
    let to_version = version;
    object.insert("schemaVersion".into(), Value::from(to_version));

    let mut merged = serde_json::to_value(SyncConfig::default()).map_err(|e| {
        SyncError::Migration {
            version: to_version,
            message: e.to_string(),
        }
    })?;
    overlay(&mut merged, Value::Object(object));

    let config: SyncConfig =
        serde_json::from_value(merged).map_err(|e| SyncError::Migration {
            version: to_version,
            message: e.to_string(),
        })?;

    let report = MigrationReport {
        from_version,
        to_version,
        applied,
    };
    Ok((config, report))
}

/// Recursively copies object fields of `patch` over `base`.
fn overlay(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                match base.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        overlay(existing, value)
                    }
                    _ => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, patch) => *base = patch,
    }
}

/// Loads, migrates and saves the sync config file.
pub struct ConfigStore {
    path: PathBuf,
    migrations: Vec<Box<dyn ConfigMigration>>,
}

impl ConfigStore {
    /// Creates a store with the default migrations.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_migrations(path, default_migrations())
    }

    /// Creates a store with a custom migration list.
    pub fn with_migrations(
        path: impl Into<PathBuf>,
        migrations: Vec<Box<dyn ConfigMigration>>,
    ) -> Self {
        Self {
            path: path.into(),
            migrations,
        }
    }

    /// Returns the config file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the config, migrating and re-saving it if it was outdated.
    ///
    /// A missing file yields the defaults at the current schema version.
    pub fn load(&self) -> SyncResult<SyncConfig> {
        if !self.path.exists() {
            return Ok(SyncConfig::default());
        }

        let contents = std::fs::read_to_string(&self.path)?;
        let stored: Value = serde_json::from_str(&contents).map_err(|e| {
            SyncError::Config(format!("unreadable config {}: {e}", self.path.display()))
        })?;

        let (config, report) = migrate_config(stored, &self.migrations)?;
        if !report.applied.is_empty() {
            info!(
                from = report.from_version,
                to = report.to_version,
                steps = ?report.applied,
                "migrated sync config"
            );
            self.save(&config)?;
        }
        Ok(config)
    }

    /// Writes the config atomically.
    pub fn save(&self, config: &SyncConfig) -> SyncResult<()> {
        let data = serde_json::to_vec_pretty(config)?;
        let mut temp = self.path.as_os_str().to_os_string();
        temp.push(".tmp");
        write_atomic(&self.path, Path::new(&temp), &data)
    }
}
