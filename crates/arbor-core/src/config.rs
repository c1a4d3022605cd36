//! `arbor.toml` configuration with environment overrides

use crate::error::{ArborError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Config file name, looked up at the project root.
pub const CONFIG_FILE: &str = "arbor.toml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ArborConfig {
    /// Quiet period before a burst of file changes is emitted as one batch.
    pub debounce_ms: u64,
    /// Re-analyze files that reference symbols of a changed file.
    pub cascade: bool,
    /// Ask the analyzer for parameters and locals as well.
    pub include_locals: bool,
    /// Extensions (without the dot) of files worth analyzing.
    pub extensions: Vec<String>,
    /// Glob patterns, relative to the root, that are never watched.
    pub ignore: Vec<String>,
    /// Honor the root `.gitignore` when watching.
    pub respect_gitignore: bool,
    /// Directory, relative to the root, holding the graph snapshot.
    pub cache_dir: String,
    /// Result cap applied when a query does not give one.
    pub default_limit: usize,
}

impl Default for ArborConfig {
    fn default() -> Self {
        ArborConfig {
            debounce_ms: 300,
            cascade: true,
            include_locals: false,
            extensions: ["cs", "rs", "ts", "tsx", "js", "jsx", "py", "go", "java", "c", "h", "cpp"]
                .into_iter()
                .map(String::from)
                .collect(),
            ignore: vec![
                "**/bin/**".to_string(),
                "**/obj/**".to_string(),
                "**/target/**".to_string(),
                "**/node_modules/**".to_string(),
                "**/.git/**".to_string(),
            ],
            respect_gitignore: true,
            cache_dir: ".arbor".to_string(),
            default_limit: 100,
        }
    }
}

impl ArborConfig {
    /// Load `arbor.toml` from `root` (defaults when absent), then apply
    /// `ARBOR_*` environment overrides. A `.env` file at the root is loaded
    /// into the environment first.
    pub fn load(root: &Path) -> Result<Self> {
        let _ = dotenvy::from_path(root.join(".env"));

        let path = root.join(CONFIG_FILE);
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            toml::from_str(&text).map_err(|e| ArborError::Config {
                path: path.clone(),
                message: e.to_string(),
            })?
        } else {
            ArborConfig::default()
        };

        config.apply_env(&path, |key| std::env::var(key).ok())?;
        tracing::debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    /// Apply overrides from `lookup` (an environment accessor).
    pub fn apply_env(
        &mut self,
        source: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<()> {
        if let Some(value) = lookup("ARBOR_DEBOUNCE_MS") {
            self.debounce_ms = parse_env(source, "ARBOR_DEBOUNCE_MS", &value)?;
        }
        if let Some(value) = lookup("ARBOR_CASCADE") {
            self.cascade = parse_env(source, "ARBOR_CASCADE", &value)?;
        }
        if let Some(value) = lookup("ARBOR_INCLUDE_LOCALS") {
            self.include_locals = parse_env(source, "ARBOR_INCLUDE_LOCALS", &value)?;
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

fn parse_env<T: std::str::FromStr>(source: &Path, key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| ArborError::Config {
        path: source.to_path_buf(),
        message: format!("{key}={value} is not a valid value"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_file() {
        let temp_dir = TempDir::new().unwrap();
        let config = ArborConfig::load(temp_dir.path()).unwrap();
        assert_eq!(config.debounce(), Duration::from_millis(300));
        assert!(config.cascade);
        assert!(config.extensions.iter().any(|e| e == "cs"));
        assert_eq!(config.cache_dir, ".arbor");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(CONFIG_FILE),
            "debounce_ms = 50\nextensions = [\"cs\"]\n",
        )
        .unwrap();

        let config = ArborConfig::load(temp_dir.path()).unwrap();
        assert_eq!(config.debounce_ms, 50);
        assert_eq!(config.extensions, vec!["cs".to_string()]);
        assert_eq!(config.cache_dir, ".arbor");
    }

    #[test]
    fn test_malformed_file_is_a_config_error() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(CONFIG_FILE), "debounce_ms = \"soon\"").unwrap();

        let err = ArborConfig::load(temp_dir.path()).unwrap_err();
        assert!(matches!(err, ArborError::Config { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let env = HashMap::from([
            ("ARBOR_DEBOUNCE_MS", "25"),
            ("ARBOR_CASCADE", "false"),
        ]);
        let mut config = ArborConfig::default();
        config
            .apply_env(Path::new(CONFIG_FILE), |key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.debounce_ms, 25);
        assert!(!config.cascade);

        let bad = HashMap::from([("ARBOR_CASCADE", "maybe")]);
        let err = config
            .apply_env(Path::new(CONFIG_FILE), |key| bad.get(key).map(|v| v.to_string()))
            .unwrap_err();
        assert!(matches!(err, ArborError::Config { .. }));
    }
}
