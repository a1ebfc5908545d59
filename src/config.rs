use crate::{error::AssetTreeError, status::ErrorMode};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::{
    env,
    fs::{read_to_string, write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

/// Global static variable to hold the config provider.
pub static CONFIG_PROVIDER: OnceCell<Mutex<Arc<dyn ConfigProvider>>> = OnceCell::new();

pub const ENV_PREFIX: &str = "ASSET_TREE_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetTreeConfig {
    /// Workbook new trees are created in
    pub workbook: String,
    pub error_mode: ErrorMode,
    /// Default for whether modifications are pushed right away
    pub push_after_modify: bool,
    /// Extra declarative templates to register next to the built-in ones
    pub template_dir: Option<PathBuf>,
    /// JSON snapshot file backing the in-memory remote
    pub remote_snapshot: Option<PathBuf>,
}

impl Default for AssetTreeConfig {
    fn default() -> Self {
        AssetTreeConfig {
            workbook: "Asset Trees".to_string(),
            error_mode: ErrorMode::Catalog,
            push_after_modify: true,
            template_dir: None,
            remote_snapshot: None,
        }
    }
}

impl AssetTreeConfig {
    /// Apply `ASSET_TREE_*` overrides from `vars`.
    pub fn apply_overrides<I>(mut self, vars: I) -> Result<Self, AssetTreeError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(field) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match field {
                "WORKBOOK" => self.workbook = value,
                "ERROR_MODE" => {
                    self.error_mode = match value.to_lowercase().as_str() {
                        "raise" => ErrorMode::Raise,
                        "catalog" => ErrorMode::Catalog,
                        other => {
                            return Err(AssetTreeError::Config(format!(
                                "{key} must be 'raise' or 'catalog', got '{other}'"
                            )))
                        }
                    }
                }
                "PUSH_AFTER_MODIFY" => {
                    self.push_after_modify = value.parse().map_err(|_| {
                        AssetTreeError::Config(format!("{key} must be true or false"))
                    })?
                }
                "TEMPLATE_DIR" => self.template_dir = Some(PathBuf::from(value)),
                "REMOTE_SNAPSHOT" => self.remote_snapshot = Some(PathBuf::from(value)),
                _ => tracing::debug!("Ignoring unknown setting {}", key),
            }
        }
        Ok(self)
    }
}

pub trait ConfigProvider: Send + Sync {
    fn get_config(&self) -> Result<AssetTreeConfig, AssetTreeError>;
    fn set_config(&self, config: &AssetTreeConfig) -> Result<(), AssetTreeError>;
}

/// Reads the configuration from a TOML file, then applies environment overrides. A missing file
/// yields the defaults.
#[derive(Debug, Serialize, Deserialize)]
pub struct TomlConfigProvider {
    path: PathBuf,
}

impl TomlConfigProvider {
    pub fn new(path: PathBuf) -> Self {
        TomlConfigProvider { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigProvider for TomlConfigProvider {
    fn get_config(&self) -> Result<AssetTreeConfig, AssetTreeError> {
        tracing::debug!("Attempting to read config from: {:?}", &self.path);
        let config = if self.path.exists() {
            let content = read_to_string(&self.path)?;
            toml::from_str(&content)?
        } else {
            tracing::debug!("Config file not found, using defaults.");
            AssetTreeConfig::default()
        };
        config.apply_overrides(env::vars())
    }

    fn set_config(&self, config: &AssetTreeConfig) -> Result<(), AssetTreeError> {
        tracing::debug!("Attempting to write config to: {:?}", &self.path);
        let toml_string = toml::to_string(config)?;
        write(&self.path, toml_string)?;
        Ok(())
    }
}

/// Install `provider` as the global provider. Fails if one is already installed.
pub fn set_provider(provider: Arc<dyn ConfigProvider>) -> Result<(), AssetTreeError> {
    CONFIG_PROVIDER
        .set(Mutex::new(provider))
        .map_err(|_| AssetTreeError::Config("config provider already installed".to_string()))
}

/// Configuration from the global provider, or the defaults (with environment overrides) when
/// none is installed.
pub fn current() -> Result<AssetTreeConfig, AssetTreeError> {
    match CONFIG_PROVIDER.get() {
        Some(provider) => {
            let provider = provider
                .lock()
                .map_err(|_| AssetTreeError::Config("config provider lock poisoned".to_string()))?
                .clone();
            provider.get_config()
        }
        None => AssetTreeConfig::default().apply_overrides(env::vars()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let provider = TomlConfigProvider::new(dir.path().join("asset_tree.toml"));
        let config = provider.get_config().unwrap();
        assert_eq!(config.error_mode, ErrorMode::Catalog);
        assert!(config.push_after_modify);
    }

    #[test]
    fn round_trips_through_toml() {
        let dir = tempdir().unwrap();
        let provider = TomlConfigProvider::new(dir.path().join("asset_tree.toml"));
        let config = AssetTreeConfig {
            workbook: "Plant".to_string(),
            error_mode: ErrorMode::Raise,
            push_after_modify: false,
            template_dir: Some(PathBuf::from("templates")),
            remote_snapshot: None,
        };
        provider.set_config(&config).unwrap();
        let text = read_to_string(provider.path()).unwrap();
        assert!(text.contains("error_mode = \"raise\""));
        assert_eq!(
            toml::from_str::<AssetTreeConfig>(&text).unwrap(),
            config
        );
    }

    #[test]
    fn environment_overrides() {
        let vars = vec![
            ("ASSET_TREE_WORKBOOK".to_string(), "Ops".to_string()),
            ("ASSET_TREE_PUSH_AFTER_MODIFY".to_string(), "false".to_string()),
            ("PATH".to_string(), "/usr/bin".to_string()),
        ];
        let config = AssetTreeConfig::default().apply_overrides(vars).unwrap();
        assert_eq!(config.workbook, "Ops");
        assert!(!config.push_after_modify);

        let bad = vec![("ASSET_TREE_ERROR_MODE".to_string(), "loud".to_string())];
        assert!(matches!(
            AssetTreeConfig::default().apply_overrides(bad),
            Err(AssetTreeError::Config(_))
        ));
    }
}
