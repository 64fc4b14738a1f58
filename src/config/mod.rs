//! Configuration module for the deployment tool.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `beanstalk.deploy.yaml`
//! - Resolving the file into a [`DesiredConfig`]
//! - Validation of configuration values

mod desired;
mod file;
mod parser;
mod validator;

pub use desired::{DesiredConfig, NameGenerator, UuidNameGenerator};
pub use file::{
    ApplicationConfig, DEFAULT_POLL_INTERVAL_SECS, DeployFile, EnvironmentConfig, LifecycleState,
    PollingConfig,
};
pub use parser::{
    ConfigParser, DEFAULT_CONFIG_FILES, ENV_APPLICATION_NAME, ENV_ENVIRONMENT_NAME, ENV_REGION,
    ENV_VERSION_LABEL, apply_env_overrides, find_config_file,
};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
