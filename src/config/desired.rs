//! Resolved desired state.
//!
//! A [`DesiredConfig`] is what the reconciler actually works from: the
//! deployment file with every optional name filled in.

use serde::Serialize;
use uuid::Uuid;

use crate::platform::{OptionSetting, SourceBundle};

use super::file::{DeployFile, LifecycleState, PollingConfig};

/// Length of generated environment names and CNAME prefixes.
const GENERATED_NAME_LEN: usize = 10;

/// Source of names for environments and CNAME prefixes left unspecified.
pub trait NameGenerator: Send {
    /// Returns a fresh name.
    fn generate(&mut self) -> String;
}

/// Generates names from random v4 UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidNameGenerator;

impl NameGenerator for UuidNameGenerator {
    fn generate(&mut self) -> String {
        let mut name = Uuid::new_v4().simple().to_string();
        name.truncate(GENERATED_NAME_LEN);
        name
    }
}

/// Desired state of one environment, with every name resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DesiredConfig {
    /// Application name.
    pub application_name: String,
    /// Version label to deploy.
    pub version_label: Option<String>,
    /// Environment name.
    pub environment_name: String,
    /// True if the environment name came from configuration.
    pub environment_name_explicit: bool,
    /// CNAME prefix the environment should answer on.
    pub cname_prefix: String,
    /// Source object of the version.
    pub source: Option<SourceBundle>,
    /// Solution stack for new environments.
    pub solution_stack: Option<String>,
    /// Option settings applied at creation.
    pub options: Vec<OptionSetting>,
    /// Saved configuration template.
    pub configuration_template: Option<String>,
    /// Desired lifecycle state.
    pub state: LifecycleState,
    /// Blue-green redeploy flag.
    pub redeploy: bool,
    /// AWS region override.
    pub region: Option<String>,
    /// Polling settings.
    pub polling: PollingConfig,
}

impl DesiredConfig {
    /// Creates a desired state with generated environment name and CNAME.
    #[must_use]
    pub fn new(application_name: impl Into<String>, names: &mut dyn NameGenerator) -> Self {
        Self {
            application_name: application_name.into(),
            version_label: None,
            environment_name: names.generate(),
            environment_name_explicit: false,
            cname_prefix: names.generate(),
            source: None,
            solution_stack: None,
            options: Vec::new(),
            configuration_template: None,
            state: LifecycleState::Present,
            redeploy: false,
            region: None,
            polling: PollingConfig::default(),
        }
    }

    /// Resolves a deployment file, generating any missing names.
    #[must_use]
    pub fn from_file(file: DeployFile, names: &mut dyn NameGenerator) -> Self {
        let environment_name_explicit = file.environment.name.is_some();
        let environment_name = file
            .environment
            .name
            .unwrap_or_else(|| names.generate());
        let cname_prefix = file.environment.cname.unwrap_or_else(|| names.generate());

        Self {
            application_name: file.application.name,
            version_label: file.application.version,
            environment_name,
            environment_name_explicit,
            cname_prefix,
            source: file.application.source,
            solution_stack: file.environment.solution_stack,
            options: file.environment.options,
            configuration_template: file.environment.configuration_template,
            state: file.state,
            redeploy: file.redeploy,
            region: file.region,
            polling: file.polling,
        }
    }

    /// Sets the environment name.
    #[must_use]
    pub fn with_environment_name(mut self, name: impl Into<String>) -> Self {
        self.environment_name = name.into();
        self.environment_name_explicit = true;
        self
    }

    /// Sets the CNAME prefix.
    #[must_use]
    pub fn with_cname_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cname_prefix = prefix.into();
        self
    }

    /// Sets the version label and its source object.
    #[must_use]
    pub fn with_version(mut self, label: impl Into<String>, source: SourceBundle) -> Self {
        self.version_label = Some(label.into());
        self.source = Some(source);
        self
    }

    /// Sets the solution stack.
    #[must_use]
    pub fn with_solution_stack(mut self, stack: impl Into<String>) -> Self {
        self.solution_stack = Some(stack.into());
        self
    }

    /// Adds an option setting.
    #[must_use]
    pub fn with_option(mut self, option: OptionSetting) -> Self {
        self.options.push(option);
        self
    }

    /// Sets the desired lifecycle state.
    #[must_use]
    pub const fn with_state(mut self, state: LifecycleState) -> Self {
        self.state = state;
        self
    }

    /// Sets the redeploy flag.
    #[must_use]
    pub const fn with_redeploy(mut self, redeploy: bool) -> Self {
        self.redeploy = redeploy;
        self
    }

    /// Sets the polling configuration.
    #[must_use]
    pub const fn with_polling(mut self, polling: PollingConfig) -> Self {
        self.polling = polling;
        self
    }
}
