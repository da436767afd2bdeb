//! `keepfetch config` – print where the config lives and what it holds.

use anyhow::Result;
use keepfetch_core::config::{self, KeepfetchConfig};

pub fn run_config(cfg: &KeepfetchConfig) -> Result<()> {
    println!("# {}", config::config_path()?.display());
    print!("{}", toml::to_string_pretty(cfg)?);
    Ok(())
}
