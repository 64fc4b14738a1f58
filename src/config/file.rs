//! Deployment file types.
//!
//! This module defines the structs that map to `beanstalk.deploy.yaml`. They
//! describe the desired state declaratively; defaults that need randomness
//! are filled in later, when a [`DesiredConfig`](super::DesiredConfig) is
//! built from the file.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::platform::{OptionSetting, SourceBundle};

/// Default interval between status polls, in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// The root structure of a deployment file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct DeployFile {
    /// Application and version to deploy.
    #[validate(nested)]
    pub application: ApplicationConfig,
    /// Environment settings.
    #[serde(default)]
    #[validate(nested)]
    pub environment: EnvironmentConfig,
    /// Desired lifecycle state.
    #[serde(default)]
    pub state: LifecycleState,
    /// Create a parallel environment and swap CNAMEs when the alias is taken.
    #[serde(default)]
    pub redeploy: bool,
    /// AWS region (falls back to the ambient AWS configuration).
    #[serde(default)]
    pub region: Option<String>,
    /// Status polling settings.
    #[serde(default)]
    pub polling: PollingConfig,
}

/// Application-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct ApplicationConfig {
    /// Application name.
    #[validate(length(min = 1, max = 100, message = "Application name must be 1 to 100 characters"))]
    pub name: String,
    /// Version label to deploy.
    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "Version label must be 1 to 100 characters"))]
    pub version: Option<String>,
    /// Source object the version is built from.
    #[serde(default)]
    pub source: Option<SourceBundle>,
}

/// Environment-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct EnvironmentConfig {
    /// Environment name; generated when omitted.
    #[serde(default)]
    #[validate(length(min = 4, max = 40, message = "Environment name must be 4 to 40 characters"))]
    pub name: Option<String>,
    /// CNAME prefix; generated when omitted.
    #[serde(default)]
    #[validate(length(min = 4, max = 63, message = "CNAME prefix must be 4 to 63 characters"))]
    pub cname: Option<String>,
    /// Solution stack to launch new environments on.
    #[serde(default)]
    pub solution_stack: Option<String>,
    /// Option settings applied at creation.
    #[serde(default)]
    pub options: Vec<OptionSetting>,
    /// Saved configuration template; mutually exclusive with `options`.
    #[serde(default)]
    pub configuration_template: Option<String>,
}

/// Desired lifecycle state of the environment.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// The environment exists and serves the configured version.
    #[default]
    Present,
    /// The environment does not exist.
    Absent,
    /// The environment's application servers have been restarted.
    Restarted,
}

/// Status polling configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollingConfig {
    /// Seconds between status reads.
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,
    /// Maximum number of status reads per wait; unbounded when omitted.
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            max_attempts: None,
        }
    }
}

const fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Restarted => "restarted",
        };
        f.write_str(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_settings_accept_platform_keys() {
        let yaml = r"
namespace: aws:autoscaling:launchconfiguration
option_name: InstanceType
value: t3.micro
";
        let option: OptionSetting = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(option.option_name, "InstanceType");

        let yaml = r"
Namespace: aws:autoscaling:launchconfiguration
OptionName: InstanceType
Value: t3.micro
";
        let option: OptionSetting = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(option.namespace, "aws:autoscaling:launchconfiguration");
    }

    #[test]
    fn test_field_validation() {
        let file = DeployFile {
            application: ApplicationConfig {
                name: String::new(),
                version: None,
                source: None,
            },
            environment: EnvironmentConfig {
                name: Some(String::from("abc")),
                ..EnvironmentConfig::default()
            },
            state: LifecycleState::Present,
            redeploy: false,
            region: None,
            polling: PollingConfig::default(),
        };

        let errors = file.validate().unwrap_err();
        let fields = errors.errors();
        assert!(fields.contains_key("application"));
        assert!(fields.contains_key("environment"));
    }

    #[test]
    fn test_lifecycle_state_parsing() {
        let state: LifecycleState = serde_yaml::from_str("restarted").unwrap();
        assert_eq!(state, LifecycleState::Restarted);
        assert_eq!(LifecycleState::Absent.to_string(), "absent");
    }
}
