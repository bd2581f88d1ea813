use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub archive: ArchiveConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins, `*` allows any origin
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one JSON-lines file per collection
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub root: PathBuf,
    pub file_name: String,
    pub exclude_dirs: Vec<String>,
    pub exclude_extensions: Vec<String>,
    pub exclude_files: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8001,
            cors_origins: vec!["*".to_string()],
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            file_name: "combien-ca-coute-project.tar.gz".to_string(),
            exclude_dirs: strings(&[
                "node_modules",
                "__pycache__",
                ".git",
                ".emergent",
                "build",
                "dist",
                ".venv",
                "test_reports",
                ".cache",
                ".npm",
                ".yarn",
                "target",
                "data",
            ]),
            exclude_extensions: strings(&[".pyc", ".pyo", ".log", ".tmp", ".lock"]),
            exclude_files: strings(&["project.zip", "yarn.lock", "package-lock.json", "bun.lockb"]),
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl AppConfig {
    /// Load configuration from the TOML file named by `APP_CONFIG` (default
    /// `config.toml`), then apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = std::env::var("APP_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_file(Path::new(&path))?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Read a config file, falling back to defaults when it does not exist
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = toml::from_str(&raw)
            .with_context(|| format!("Invalid config file {}", path.display()))?;

        info!(path = %path.display(), "Config file loaded");
        Ok(config)
    }

    /// Apply `HOST`, `PORT`, `CORS_ORIGINS`, `DATA_DIR` and `PROJECT_ROOT`
    /// overrides using the given lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid PORT value: {port}"))?;
        }
        if let Some(origins) = lookup("CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Some(dir) = lookup("DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(root) = lookup("PROJECT_ROOT") {
            self.archive.root = PathBuf::from(root);
        }
        Ok(())
    }
}
