use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use sesmerge_autoroute::AutorouterConfig;
use sesmerge_core::MergeConfig;

/// Contents of a `sesmerge.toml` file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub merge: MergeConfig,
    pub autorouter: AutorouterConfig,
}

impl Config {
    /// Read `path`, or return the defaults when no file was given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = toml::from_str(&text)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        log::debug!("Loaded config from {}: {config:?}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_both_sections() {
        let config: Config = toml::from_str(
            r#"
[merge]
anchor_reference = "J1"

[merge.default_via]
diameter = 0.8
drill = 0.4

[autorouter]
jar = "/opt/freerouting.jar"
args = ["-mp", "20"]
"#,
        )
        .unwrap();
        assert_eq!(config.merge.anchor_reference, "J1");
        assert!(config.merge.via_fallback);
        assert_eq!(config.autorouter.args, vec!["-mp", "20"]);
        assert_eq!(config.autorouter.timeout_secs, 600);
    }

    #[test]
    fn empty_file_is_all_defaults() {
        assert_eq!(toml::from_str::<Config>("").unwrap(), Config::default());
    }
}
