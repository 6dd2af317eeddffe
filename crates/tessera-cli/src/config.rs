use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tessera_grid::CatalogConfig;

/// Configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "tessera.toml";

/// Contents of `tessera.toml`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Snapshot file holding the blob store.
    pub store_path: PathBuf,
    pub catalog: CatalogConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(".tessera/store.bin"),
            catalog: CatalogConfig::default(),
        }
    }
}

impl CliConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Load the explicit config file, else `./tessera.toml` if present, else
    /// defaults; then apply command-line overrides.
    pub fn resolve(
        explicit: Option<&Path>,
        store: Option<PathBuf>,
        bucket: Option<String>,
    ) -> anyhow::Result<Self> {
        let default_file = Path::new(DEFAULT_CONFIG_FILE);
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None if default_file.exists() => Self::load(default_file)?,
            None => Self::default(),
        };
        if let Some(store) = store {
            config.store_path = store;
        }
        if let Some(bucket) = bucket {
            config.catalog.bucket = bucket;
        }
        config.catalog.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_file() {
        let config: CliConfig = toml::from_str(
            r#"
            store_path = "/var/lib/tessera/store.bin"

            [catalog]
            bucket = "media"
            default_chunk_size = 1048576
            "#,
        )
        .unwrap();
        assert_eq!(config.store_path, PathBuf::from("/var/lib/tessera/store.bin"));
        assert_eq!(config.catalog.bucket, "media");
        assert_eq!(config.catalog.default_chunk_size, 1_048_576);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config: CliConfig = toml::from_str("").unwrap();
        assert_eq!(config, CliConfig::default());
    }

    #[test]
    fn overrides_apply_after_loading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tessera.toml");
        std::fs::write(&path, "[catalog]\nbucket = \"media\"\n").unwrap();

        let config = CliConfig::resolve(
            Some(&path),
            Some(PathBuf::from("elsewhere.bin")),
            Some("archive".into()),
        )
        .unwrap();
        assert_eq!(config.store_path, PathBuf::from("elsewhere.bin"));
        assert_eq!(config.catalog.bucket, "archive");
    }

    #[test]
    fn invalid_override_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tessera.toml");
        std::fs::write(&path, "").unwrap();
        assert!(CliConfig::resolve(Some(&path), None, Some(String::new())).is_err());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(CliConfig::resolve(Some(&missing), None, None).is_err());
    }
}
