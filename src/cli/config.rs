//! Optional `canopy.toml` configuration file.
//!
//! Looked up in the current directory and then in the nearest ancestor
//! carrying a `.git` marker. CLI flags always win over file values.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// File-level defaults for the CLI.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CliConfig {
    /// Index database path.
    pub db: Option<PathBuf>,
    /// Language allow-list.
    #[serde(default)]
    pub languages: Vec<String>,
    /// Process files serially instead of through the worker pool.
    #[serde(default)]
    pub serial: bool,
    /// Default server URL for query commands.
    pub server: Option<String>,
}

const CONFIG_FILE: &str = "canopy.toml";

/// Load `canopy.toml` from the working directory or the repository
/// root, if present.
pub fn load_config() -> Result<Option<CliConfig>> {
    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    for candidate in candidates(&cwd) {
        if candidate.is_file() {
            let text = std::fs::read_to_string(&candidate)
                .with_context(|| format!("cannot read {}", candidate.display()))?;
            let config: CliConfig = toml::from_str(&text)
                .with_context(|| format!("invalid config at {}", candidate.display()))?;
            return Ok(Some(config));
        }
    }
    Ok(None)
}

fn candidates(cwd: &Path) -> Vec<PathBuf> {
    let mut out = vec![cwd.join(CONFIG_FILE)];
    let mut current = cwd.parent();
    while let Some(dir) = current {
        if dir.join(".git").exists() {
            out.push(dir.join(CONFIG_FILE));
            break;
        }
        current = dir.parent();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_parses_all_fields() {
        let config: CliConfig = toml::from_str(
            "db = \"/tmp/index.db\"\nlanguages = [\"go\", \"rust\"]\nserial = true\nserver = \"http://127.0.0.1:7345\"\n",
        )
        .expect("parse");
        assert_eq!(config.db.as_deref(), Some(Path::new("/tmp/index.db")));
        assert_eq!(config.languages, vec!["go", "rust"]);
        assert!(config.serial);
        assert_eq!(config.server.as_deref(), Some("http://127.0.0.1:7345"));
    }

    #[test]
    fn empty_config_is_valid() {
        let config: CliConfig = toml::from_str("").expect("parse");
        assert!(config.db.is_none());
        assert!(config.languages.is_empty());
        assert!(!config.serial);
    }
}
