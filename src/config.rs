use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default interval between periodic sync passes.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DeviceDbConfig {
    pub database: Option<String>,
    pub api_url: Option<String>,
    pub sync_interval_secs: Option<u64>,
}

impl DeviceDbConfig {
    pub fn sync_interval(&self) -> Duration {
        self.sync_interval_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_SYNC_INTERVAL)
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("devicedb.toml")
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join(".devicedb").join(crate::storage::schema::DB_NAME)
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<DeviceDbConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: DeviceDbConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &DeviceDbConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
