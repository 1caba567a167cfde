//! Settings from `.atlas/config.json`, overridable on the command line.

use crate::commands::Result;
use atlas_graph::GraphStore;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_DIR: &str = ".atlas";
pub const CONFIG_FILE: &str = "config.json";
pub const DEFAULT_WORKSPACE: &str = "default";

fn default_workspace() -> String {
    DEFAULT_WORKSPACE.to_string()
}

/// Contents of `.atlas/config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default = "default_workspace")]
    pub workspace: String,
    /// Store location; relative paths are taken from the config's directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<PathBuf>,
}

impl Config {
    pub fn new(workspace: Option<&str>) -> Self {
        Self {
            version: "1.0".to_string(),
            workspace: workspace.map_or_else(default_workspace, str::to_string),
            store: Some(PathBuf::from(CONFIG_DIR).join("store")),
        }
    }

    /// Reads the config under `dir`, if there is one.
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(CONFIG_DIR).join(CONFIG_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    /// Writes the config under `dir`, returning its path.
    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        let config_dir = dir.join(CONFIG_DIR);
        fs::create_dir_all(&config_dir)?;
        let path = config_dir.join(CONFIG_FILE);
        fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(path)
    }
}

/// Where the store lives when nothing says otherwise.
pub fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("atlas"))
        .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join("store"))
}

/// Effective settings for one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub store_path: PathBuf,
    pub workspace: String,
}

impl Settings {
    /// Resolves settings for the current directory.
    pub fn resolve(store: Option<PathBuf>, workspace: Option<String>) -> Result<Self> {
        let cwd = std::env::current_dir()?;
        Self::resolve_in(&cwd, store, workspace)
    }

    /// Flags win over the config file, which wins over the defaults.
    pub fn resolve_in(dir: &Path, store: Option<PathBuf>, workspace: Option<String>) -> Result<Self> {
        let config = Config::load(dir)?;

        let store_path = match (store, config.as_ref().and_then(|c| c.store.clone())) {
            (Some(flag), _) => flag,
            (None, Some(configured)) if configured.is_relative() => dir.join(configured),
            (None, Some(configured)) => configured,
            (None, None) => default_store_path(),
        };

        let workspace = workspace
            .or_else(|| config.map(|c| c.workspace))
            .unwrap_or_else(default_workspace);

        Ok(Self {
            store_path,
            workspace,
        })
    }

    pub fn open_store(&self) -> Result<GraphStore> {
        Ok(GraphStore::open(&self.store_path)?)
    }
}
