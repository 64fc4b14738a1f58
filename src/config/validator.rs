//! Configuration validation for deployment files.
//!
//! Field-level rules are declared with the `validator` derive on the file
//! types. Cross-field and state-specific rules live here and run on the
//! resolved [`DesiredConfig`].

use std::collections::HashSet;

use tracing::debug;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use crate::error::{ConfigError, DeployError, Result};

use super::desired::DesiredConfig;
use super::file::{DeployFile, LifecycleState};

/// Longest environment name the platform accepts.
const MAX_ENVIRONMENT_NAME_LEN: usize = 40;

/// Shortest environment name the platform accepts.
const MIN_ENVIRONMENT_NAME_LEN: usize = 4;

/// Validator for deployment configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Runs the field-level rules declared on the file types.
    ///
    /// # Errors
    ///
    /// Returns the first field that failed validation.
    pub fn validate_file(&self, file: &DeployFile) -> Result<()> {
        match file.validate() {
            Ok(()) => Ok(()),
            Err(errors) => {
                let mut flattened = Vec::new();
                flatten_errors("", &errors, &mut flattened);
                let first = flattened.into_iter().next().unwrap_or_else(|| ValidationError {
                    field: String::from("config"),
                    message: String::from("invalid configuration"),
                });
                Err(DeployError::Config(ConfigError::validation(
                    first.message,
                    first.field,
                )))
            }
        }
    }

    /// Validates a resolved desired state.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration template and option settings
    /// are both given, or if any other rule fails.
    pub fn validate(&self, config: &DesiredConfig) -> Result<ValidationResult> {
        if config.configuration_template.is_some() && !config.options.is_empty() {
            return Err(DeployError::Config(ConfigError::MutuallyExclusive {
                first: String::from("environment.configuration_template"),
                second: String::from("environment.options"),
            }));
        }

        let mut result = ValidationResult::default();

        Self::validate_names(config, &mut result);
        Self::validate_source(config, &mut result);
        Self::validate_state(config, &mut result);
        Self::validate_options(config, &mut result);

        if config.polling.interval_secs == 0 {
            result
                .warnings
                .push(String::from("polling.interval_secs: 0 polls the platform without pause"));
        }

        if result.errors.is_empty() {
            debug!("Configuration validation passed");
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(DeployError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }))
        }
    }

    fn validate_names(config: &DesiredConfig, result: &mut ValidationResult) {
        if config.application_name.trim().is_empty() {
            result.errors.push(ValidationError {
                field: String::from("application.name"),
                message: String::from("Application name cannot be empty"),
            });
        }

        if !is_valid_environment_name(&config.environment_name) {
            result.errors.push(ValidationError {
                field: String::from("environment.name"),
                message: format!(
                    "Environment name '{}' is invalid. Must be {MIN_ENVIRONMENT_NAME_LEN} to {MAX_ENVIRONMENT_NAME_LEN} letters, digits or hyphens, not starting or ending with a hyphen.",
                    config.environment_name
                ),
            });
        }

        if config.cname_prefix.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("environment.cname"),
                message: String::from("CNAME prefix cannot be empty"),
            });
        }
    }

    fn validate_source(config: &DesiredConfig, result: &mut ValidationResult) {
        let Some(source) = &config.source else {
            return;
        };

        if source.bucket.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("application.source.bucket"),
                message: String::from("Source bucket cannot be empty"),
            });
        }

        if source.key.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("application.source.key"),
                message: String::from("Source key cannot be empty"),
            });
        }
    }

    fn validate_state(config: &DesiredConfig, result: &mut ValidationResult) {
        match config.state {
            LifecycleState::Present => {
                // Only creation needs these; an existing environment short-circuits.
                if config.version_label.is_none() {
                    result.warnings.push(String::from(
                        "application.version: not set, creating an environment will fail",
                    ));
                }

                if config.source.is_none() {
                    result.warnings.push(String::from(
                        "application.source: not set, creating an environment will fail",
                    ));
                }

                if config.solution_stack.is_none() {
                    result.warnings.push(String::from(
                        "environment.solution_stack: not set, creating an environment will fail",
                    ));
                }
            }
            LifecycleState::Absent | LifecycleState::Restarted => {
                if !config.environment_name_explicit {
                    result.warnings.push(format!(
                        "environment.name: not set for state '{}', a generated name will not match any environment",
                        config.state
                    ));
                }

                if config.redeploy {
                    result.warnings.push(format!(
                        "redeploy: ignored for state '{}'",
                        config.state
                    ));
                }
            }
        }
    }

    fn validate_options(config: &DesiredConfig, result: &mut ValidationResult) {
        let mut seen = HashSet::new();

        for (i, option) in config.options.iter().enumerate() {
            if option.namespace.is_empty() || option.option_name.is_empty() {
                result.errors.push(ValidationError {
                    field: format!("environment.options[{i}]"),
                    message: String::from("Option namespace and name cannot be empty"),
                });
                continue;
            }

            if !seen.insert((&option.namespace, &option.option_name)) {
                result.warnings.push(format!(
                    "environment.options[{i}]: {}:{} is set more than once",
                    option.namespace, option.option_name
                ));
            }
        }
    }
}

/// Collects nested `validator` errors as dotted field paths.
fn flatten_errors(prefix: &str, errors: &ValidationErrors, out: &mut Vec<ValidationError>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };

        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for error in field_errors {
                    let message = error
                        .message
                        .as_ref()
                        .map_or_else(|| error.code.to_string(), ToString::to_string);
                    out.push(ValidationError {
                        field: path.clone(),
                        message,
                    });
                }
            }
            ValidationErrorsKind::Struct(nested) => flatten_errors(&path, nested, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    flatten_errors(&format!("{path}[{index}]"), nested, out);
                }
            }
        }
    }
}

/// Environment names are letters, digits and hyphens, with no leading or
/// trailing hyphen.
fn is_valid_environment_name(name: &str) -> bool {
    (MIN_ENVIRONMENT_NAME_LEN..=MAX_ENVIRONMENT_NAME_LEN).contains(&name.len())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        && !name.starts_with('-')
        && !name.ends_with('-')
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        ApplicationConfig, EnvironmentConfig, NameGenerator, PollingConfig, UuidNameGenerator,
    };
    use crate::platform::{OptionSetting, SourceBundle};

    fn desired() -> DesiredConfig {
        DesiredConfig::new("shop", &mut UuidNameGenerator)
            .with_environment_name("web-blue")
            .with_cname_prefix("my_cname")
            .with_version("2.0", SourceBundle::new("my_bucket", "my_war_file"))
            .with_solution_stack("64bit Amazon Linux 2023 v5.1.0 running Tomcat 10 Corretto 17")
    }

    #[test]
    fn test_valid_environment_name() {
        assert!(is_valid_environment_name("web-blue"));
        assert!(is_valid_environment_name(&UuidNameGenerator.generate()));
        assert!(!is_valid_environment_name("web"));
        assert!(!is_valid_environment_name("-web-blue"));
        assert!(!is_valid_environment_name("web_blue"));
    }

    #[test]
    fn test_valid_present_config() {
        let result = ConfigValidator::new().validate(&desired()).unwrap();
        assert!(result.is_valid());
        assert_eq!(result.warning_count(), 0);
    }

    #[test]
    fn test_template_and_options_are_exclusive() {
        let mut config = desired().with_option(OptionSetting::new(
            "aws:autoscaling:launchconfiguration",
            "InstanceType",
            "t3.micro",
        ));
        config.configuration_template = Some(String::from("saved-config"));

        let err = ConfigValidator::new().validate(&config).unwrap_err();
        assert!(matches!(
            err,
            DeployError::Config(ConfigError::MutuallyExclusive { .. })
        ));
    }

    #[test]
    fn test_present_without_version_only_warns() {
        let mut config = desired();
        config.version_label = None;
        config.source = None;

        let result = ConfigValidator::new().validate(&config).unwrap();
        assert!(result.is_valid());
        assert_eq!(result.warning_count(), 2);
        assert!(result.warnings[0].starts_with("application.version"));
    }

    #[test]
    fn test_absent_with_generated_name_warns() {
        let config = DesiredConfig::new("shop", &mut UuidNameGenerator)
            .with_state(LifecycleState::Absent)
            .with_redeploy(true);

        let result = ConfigValidator::new().validate(&config).unwrap();
        assert_eq!(result.warning_count(), 2);
    }

    #[test]
    fn test_duplicate_options_warn() {
        let option = OptionSetting::new("aws:elasticbeanstalk:environment", "EnvironmentType", "SingleInstance");
        let config = desired().with_option(option.clone()).with_option(option);

        let result = ConfigValidator::new().validate(&config).unwrap();
        assert_eq!(result.warning_count(), 1);
    }

    #[test]
    fn test_validate_file_reports_nested_field() {
        let file = DeployFile {
            application: ApplicationConfig {
                name: String::from("shop"),
                version: Some(String::new()),
                source: None,
            },
            environment: EnvironmentConfig::default(),
            state: LifecycleState::Present,
            redeploy: false,
            region: None,
            polling: PollingConfig::default(),
        };

        let err = ConfigValidator::new().validate_file(&file).unwrap_err();
        assert!(matches!(
            err,
            DeployError::Config(ConfigError::ValidationError { field: Some(ref f), .. })
                if f == "application.version"
        ));
    }
}
