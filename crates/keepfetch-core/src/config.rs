use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::framer::PartialBodyPolicy;

/// Global configuration loaded from `~/.config/keepfetch/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeepfetchConfig {
    /// Maximum persistent connections a pool opens to its host.
    pub max_connections: usize,
    /// Deadline for one task (send + receive + write), in seconds.
    pub task_timeout_secs: u64,
    /// Deadline for opening one connection (TCP + TLS handshake), in seconds.
    pub connect_timeout_secs: u64,
    /// Largest single read from a connection.
    pub receive_chunk_bytes: usize,
    /// Early EOF handling: "discard" (default) writes nothing, "flush" writes what arrived.
    #[serde(default)]
    pub partial_body: PartialBodyPolicy,
    /// Optional `User-Agent` override; defaults to `keepfetch/<version>`.
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for KeepfetchConfig {
    fn default() -> Self {
        Self {
            max_connections: 4,
            task_timeout_secs: 120,
            connect_timeout_secs: 15,
            receive_chunk_bytes: 64 * 1024,
            partial_body: PartialBodyPolicy::Discard,
            user_agent: None,
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("keepfetch")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<KeepfetchConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = KeepfetchConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: KeepfetchConfig = toml::from_str(&data)?;
    Ok(cfg)
}
