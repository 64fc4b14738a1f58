//! Error types for the Beanstalk deployment system.
//!
//! This module provides the error hierarchy for every stage of a
//! reconciliation run: configuration, the control-plane boundary, and the
//! reconciliation state machine itself.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the Beanstalk deployment system.
#[derive(Debug, Error)]
pub enum DeployError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Reconciliation errors.
    #[error("{0}")]
    Reconcile(#[from] ReconcileError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Two options that cannot be combined were both set.
    #[error("Options '{first}' and '{second}' are mutually exclusive")]
    MutuallyExclusive {
        /// First option name.
        first: String,
        /// Second option name.
        second: String,
    },
}

/// Tagged failure kinds reported by the control-plane client.
///
/// The reconciler switches on these tags; only a client adapter ever looks at
/// raw error codes or message text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlatformError {
    /// The resource being created already exists.
    #[error("{resource} already exists")]
    AlreadyExists {
        /// Description of the existing resource.
        resource: String,
    },

    /// An account limit was reached.
    #[error("quota exceeded: {message}")]
    QuotaExceeded {
        /// Message from the control plane.
        message: String,
    },

    /// The caller lacks the privileges for the operation.
    #[error("insufficient privileges: {message}")]
    InsufficientPrivilege {
        /// Message from the control plane.
        message: String,
    },

    /// Any other error returned by the service.
    #[error("{code}: {message}")]
    Service {
        /// Service error code.
        code: String,
        /// Service error message.
        message: String,
    },

    /// The request never reached the service or timed out.
    #[error("network error: {message}")]
    Network {
        /// Description of the transport failure.
        message: String,
    },

    /// The service answered with a shape we could not interpret.
    #[error("invalid response: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },

    /// The client itself failed.
    #[error("internal client error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },
}

/// Reconciliation errors.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Reading the current environment failed.
    #[error("Unable to retrieve environment information: '{source}'")]
    Retrieval {
        /// Underlying platform error.
        #[source]
        source: PlatformError,
    },

    /// No solution stack was supplied for an operation that creates an environment.
    #[error("A solution stack must be provided.")]
    MissingTemplate,

    /// The requested solution stack is not offered by the platform.
    #[error("Solution stack '{solution_stack}' is not in the list of available solution stacks.")]
    UnknownTemplate {
        /// The requested solution stack.
        solution_stack: String,
    },

    /// The application could not be created.
    #[error("Unable to create Application '{application}': {source}")]
    ApplicationCreation {
        /// Application name.
        application: String,
        /// Underlying platform error.
        #[source]
        source: PlatformError,
    },

    /// The application version could not be created.
    #[error("Unable to create Application version '{version_label}': {source}")]
    VersionCreation {
        /// Version label.
        version_label: String,
        /// Underlying platform error.
        #[source]
        source: PlatformError,
    },

    /// An existing version is bound to a different source bundle.
    #[error(
        "S3 path for existing Application version '{version_label}' does not match arguments supplied \
         (existing s3://{existing_bucket}/{existing_key}, requested s3://{requested_bucket}/{requested_key})"
    )]
    ConfigurationConflict {
        /// Version label.
        version_label: String,
        /// Bucket recorded on the platform.
        existing_bucket: String,
        /// Key recorded on the platform.
        existing_key: String,
        /// Bucket requested by the configuration.
        requested_bucket: String,
        /// Key requested by the configuration.
        requested_key: String,
    },

    /// The alias is bound to another environment and no swap was authorized.
    #[error("CNAME '{cname_prefix}' already in use and 'redeploy' parameter not specified.")]
    AliasConflict {
        /// The requested CNAME prefix.
        cname_prefix: String,
    },

    /// The environment currently holding the alias could not be determined.
    #[error("Unable to derive CNAME prefix from environment: {message}")]
    SourceLookup {
        /// Description of the lookup failure.
        message: String,
    },

    /// The environment could not be created.
    #[error("Unable to create Environment '{environment}': {source}")]
    EnvironmentCreation {
        /// Environment name.
        environment: String,
        /// Underlying platform error.
        #[source]
        source: PlatformError,
    },

    /// The CNAME swap failed; both environments keep their previous aliases.
    #[error("Unable to swap CNAMEs: {source}")]
    SwapFailed {
        /// Underlying platform error.
        #[source]
        source: PlatformError,
    },

    /// The environment does not exist.
    #[error("Environment '{environment}' not found for Application '{application}'.")]
    NotFound {
        /// Application name.
        application: String,
        /// Environment name.
        environment: String,
    },

    /// The environment could not be terminated.
    #[error("Unable to terminate Environment '{environment}': {source}")]
    TerminationFailed {
        /// Environment name.
        environment: String,
        /// Underlying platform error.
        #[source]
        source: PlatformError,
    },

    /// The application server could not be restarted.
    #[error("Unable to restart application server: '{source}'")]
    RestartFailed {
        /// Underlying platform error.
        #[source]
        source: PlatformError,
    },

    /// The environment disappeared while waiting for it to become ready.
    #[error("Environment '{environment}' disappeared while waiting for it to become Ready")]
    EnvironmentVanished {
        /// Environment name.
        environment: String,
    },

    /// A wait loop gave up.
    #[error("Timed out after {attempts} polls waiting for environment '{environment}' to {expected}")]
    PollTimeout {
        /// Environment name.
        environment: String,
        /// Condition that was not reached.
        expected: String,
        /// Number of polls performed.
        attempts: u32,
    },
}

/// Result type alias for deployment operations.
pub type Result<T> = std::result::Result<T, DeployError>;

/// Result type alias for control-plane calls.
pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

impl DeployError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if the failure was detected before any remote mutation.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::Reconcile(
                    ReconcileError::MissingTemplate
                        | ReconcileError::UnknownTemplate { .. }
                        | ReconcileError::NotFound { .. }
                        | ReconcileError::AliasConflict { .. }
                )
        )
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl PlatformError {
    /// Creates a generic service error.
    #[must_use]
    pub fn service(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Service {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Creates an already-exists error.
    #[must_use]
    pub fn already_exists(resource: impl Into<String>) -> Self {
        Self::AlreadyExists {
            resource: resource.into(),
        }
    }

    /// Creates an invalid-response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Returns true if the control plane reported an existing resource.
    #[must_use]
    pub const fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

impl ReconcileError {
    /// Wraps a failed read of remote state.
    #[must_use]
    pub const fn retrieval(source: PlatformError) -> Self {
        Self::Retrieval { source }
    }

    /// Creates a swap-source lookup error.
    #[must_use]
    pub fn source_lookup(message: impl Into<String>) -> Self {
        Self::SourceLookup {
            message: message.into(),
        }
    }
}
