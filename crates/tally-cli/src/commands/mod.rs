//! Command handler modules for tally-cli.
//!
//! Shared utilities used by multiple command paths live here.

pub mod backtest;

use anyhow::Result;
use tally_config::LoadedConfig;

/// Merge layered YAML files in the order given.
pub fn load_config(paths: &[String]) -> Result<LoadedConfig> {
    let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    tally_config::load_layered_yaml(&path_refs)
}
