//! Loading and saving the agent configuration as TOML.

use std::path::Path;

use orcl_core::AgentConfig;

/// Load the config at `path`; a missing file yields the defaults.
pub fn load(path: &Path) -> anyhow::Result<AgentConfig> {
    if path.exists() {
        let contents = std::fs::read_to_string(path)?;
        let config: AgentConfig = toml::from_str(&contents)?;
        Ok(config)
    } else {
        Ok(AgentConfig::default())
    }
}

pub fn save(config: &AgentConfig, path: &Path) -> anyhow::Result<()> {
    let contents = toml::to_string_pretty(config)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;
    Ok(())
}
