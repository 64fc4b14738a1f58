//! Control-plane types and data structures.
//!
//! These are the records exchanged with the Elastic Beanstalk control plane,
//! independent of any particular client implementation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of an environment as reported by the control plane.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum EnvironmentStatus {
    /// Environment is being provisioned.
    Launching,
    /// Environment is applying a change.
    Updating,
    /// Environment is ready to serve traffic.
    Ready,
    /// Environment is being torn down.
    Terminating,
    /// Environment no longer exists.
    Terminated,
    /// An in-progress operation is being aborted.
    Aborting,
    /// Environment is being linked from another environment.
    LinkingFrom,
    /// Environment is being linked to another environment.
    LinkingTo,
    /// Status not recognised.
    #[default]
    Unknown,
}

/// The source object a version is built from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SourceBundle {
    /// Object store bucket.
    pub bucket: String,
    /// Object key within the bucket.
    pub key: String,
}

/// A single (namespace, option name, value) configuration triple.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OptionSetting {
    /// Option namespace, e.g. `aws:autoscaling:launchconfiguration`.
    #[serde(alias = "Namespace")]
    pub namespace: String,
    /// Option name within the namespace.
    #[serde(alias = "OptionName")]
    pub option_name: String,
    /// Option value.
    #[serde(alias = "Value")]
    pub value: String,
}

/// An environment as observed on the control plane.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnvironmentRecord {
    /// Platform-assigned identifier.
    pub environment_id: String,
    /// Environment name.
    pub environment_name: String,
    /// Owning application.
    pub application_name: String,
    /// Deployed version label.
    #[serde(default)]
    pub version_label: Option<String>,
    /// Solution stack the environment runs on.
    #[serde(default)]
    pub solution_stack: Option<String>,
    /// Current lifecycle status.
    pub status: EnvironmentStatus,
    /// Bound hostname, e.g. `my_cname.us-east-1.elasticbeanstalk.com`.
    #[serde(default)]
    pub cname: Option<String>,
    /// Health color reported by the platform.
    #[serde(default)]
    pub health: Option<String>,
    /// Load balancer or instance endpoint.
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// Last time the platform updated the record.
    #[serde(default)]
    pub date_updated: Option<DateTime<Utc>>,
}

/// An application version as observed on the control plane.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionRecord {
    /// Owning application.
    pub application_name: String,
    /// Version label.
    pub version_label: String,
    /// Source bundle the version was created from.
    #[serde(default)]
    pub source_bundle: Option<SourceBundle>,
}

/// Filter for environment descriptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentQuery {
    /// Application to list environments for.
    pub application_name: String,
    /// Restrict to a single environment name.
    pub environment_name: Option<String>,
}

/// Request to create an application version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateVersionRequest {
    /// Owning application.
    pub application_name: String,
    /// Version label.
    pub version_label: String,
    /// Source object for the version.
    pub source_bundle: SourceBundle,
}

/// Request to create an environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateEnvironmentRequest {
    /// Owning application.
    pub application_name: String,
    /// Environment name.
    pub environment_name: String,
    /// Version to deploy.
    pub version_label: Option<String>,
    /// Solution stack to launch on.
    pub solution_stack: String,
    /// CNAME prefix to bind; `None` lets the platform assign one.
    pub cname_prefix: Option<String>,
    /// Option settings, passed through in order.
    pub options: Vec<OptionSetting>,
}

/// Request to swap CNAMEs between two environments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapCnamesRequest {
    /// Identifier of the environment currently holding the alias.
    pub source_environment_id: String,
    /// Name of the environment currently holding the alias.
    pub source_environment_name: String,
    /// Identifier of the environment receiving the alias.
    pub destination_environment_id: String,
    /// Name of the environment receiving the alias.
    pub destination_environment_name: String,
}

impl EnvironmentStatus {
    /// Returns the status string used by the control plane.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Launching => "Launching",
            Self::Updating => "Updating",
            Self::Ready => "Ready",
            Self::Terminating => "Terminating",
            Self::Terminated => "Terminated",
            Self::Aborting => "Aborting",
            Self::LinkingFrom => "LinkingFrom",
            Self::LinkingTo => "LinkingTo",
            Self::Unknown => "Unknown",
        }
    }

    /// Parses a control-plane status string; unrecognised values map to `Unknown`.
    #[must_use]
    pub fn parse(status: &str) -> Self {
        match status {
            "Launching" => Self::Launching,
            "Updating" => Self::Updating,
            "Ready" => Self::Ready,
            "Terminating" => Self::Terminating,
            "Terminated" => Self::Terminated,
            "Aborting" => Self::Aborting,
            "LinkingFrom" => Self::LinkingFrom,
            "LinkingTo" => Self::LinkingTo,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for EnvironmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SourceBundle {
    /// Creates a source bundle reference.
    #[must_use]
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl std::fmt::Display for SourceBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

impl OptionSetting {
    /// Creates an option triple.
    #[must_use]
    pub fn new(
        namespace: impl Into<String>,
        option_name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            option_name: option_name.into(),
            value: value.into(),
        }
    }
}

impl EnvironmentRecord {
    /// Returns true if the environment has been terminated.
    #[must_use]
    pub const fn is_terminated(&self) -> bool {
        matches!(self.status, EnvironmentStatus::Terminated)
    }

    /// Returns true if the environment is ready.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self.status, EnvironmentStatus::Ready)
    }

    /// Returns the leading label of the bound hostname.
    ///
    /// `my_cname.us-east-1.elasticbeanstalk.com` yields `my_cname`.
    #[must_use]
    pub fn cname_prefix(&self) -> Option<&str> {
        self.cname
            .as_deref()
            .and_then(|cname| cname.split('.').next())
            .filter(|label| !label.is_empty())
    }
}

impl EnvironmentQuery {
    /// Queries a single environment of an application.
    #[must_use]
    pub fn environment(application: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            application_name: application.into(),
            environment_name: Some(environment.into()),
        }
    }

    /// Queries every environment of an application.
    #[must_use]
    pub fn application(application: impl Into<String>) -> Self {
        Self {
            application_name: application.into(),
            environment_name: None,
        }
    }
}
