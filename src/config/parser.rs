//! Configuration parser for deployment files.
//!
//! Loads YAML from disk, applies `BEANSTALK_*` environment overrides and
//! locates the deployment file by walking up from a starting directory.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ConfigError, DeployError, Result};

use super::file::DeployFile;

/// Environment variable overriding `application.name`.
pub const ENV_APPLICATION_NAME: &str = "BEANSTALK_APPLICATION_NAME";
/// Environment variable overriding `environment.name`.
pub const ENV_ENVIRONMENT_NAME: &str = "BEANSTALK_ENVIRONMENT_NAME";
/// Environment variable overriding `application.version`.
pub const ENV_VERSION_LABEL: &str = "BEANSTALK_VERSION_LABEL";
/// Environment variable overriding `region`.
pub const ENV_REGION: &str = "BEANSTALK_REGION";

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &[
    "beanstalk.deploy.yaml",
    "beanstalk.deploy.yml",
    "deploy.yaml",
    "deploy.yml",
];

/// Parser for deployment files.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Directory the `.env` file is looked up in.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving the `.env` file.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads a deployment file from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<DeployFile> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(DeployError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            DeployError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses a deployment file from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<DeployFile> {
        let file: DeployFile = serde_yaml::from_str(content).map_err(|e| {
            DeployError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location: source.map(|p| p.display().to_string()),
            })
        })?;

        debug!("Parsed configuration for application: {}", file.application.name);
        Ok(file)
    }

    /// Loads a deployment file and applies process environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<DeployFile> {
        let mut file = self.load_file(path)?;
        apply_env_overrides(&mut file, |name| std::env::var(name).ok());
        Ok(file)
    }

    /// Loads the `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the `.env` file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                DeployError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Applies `BEANSTALK_*` overrides read through `lookup`.
pub fn apply_env_overrides(file: &mut DeployFile, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(name) = lookup(ENV_APPLICATION_NAME) {
        debug!("Overriding application.name from environment");
        file.application.name = name;
    }

    if let Some(name) = lookup(ENV_ENVIRONMENT_NAME) {
        debug!("Overriding environment.name from environment");
        file.environment.name = Some(name);
    }

    if let Some(version) = lookup(ENV_VERSION_LABEL) {
        debug!("Overriding application.version from environment");
        file.application.version = Some(version);
    }

    if let Some(region) = lookup(ENV_REGION) {
        debug!("Overriding region from environment");
        file.region = Some(region);
    }
}

/// Finds the deployment file in the directory or its parents.
///
/// # Errors
///
/// Returns an error if no deployment file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(DeployError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}
