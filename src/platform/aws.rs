//! Elastic Beanstalk control-plane client.
//!
//! This module adapts `aws-sdk-elasticbeanstalk` to the [`Platform`] trait.
//! It is the only place that inspects service error codes and messages.

use async_trait::async_trait;
use aws_sdk_elasticbeanstalk::Client;
use aws_sdk_elasticbeanstalk::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_elasticbeanstalk::types::{
    ApplicationVersionDescription, ConfigurationOptionSetting, EnvironmentDescription, S3Location,
};
use tracing::{debug, trace};

use crate::error::{PlatformError, PlatformResult};

use super::client::Platform;
use super::types::{
    CreateEnvironmentRequest, CreateVersionRequest, EnvironmentQuery, EnvironmentRecord,
    EnvironmentStatus, SourceBundle, SwapCnamesRequest, VersionRecord,
};

/// Error codes the service uses for account limits.
const QUOTA_ERROR_CODES: &[&str] = &[
    "TooManyApplicationsException",
    "TooManyApplicationVersionsException",
    "TooManyEnvironmentsException",
    "TooManyBucketsException",
    "TooManyConfigurationTemplatesException",
];

/// Error code the service uses for missing IAM permissions.
const PRIVILEGE_ERROR_CODE: &str = "InsufficientPrivilegesException";

/// Elastic Beanstalk client.
#[derive(Debug, Clone)]
pub struct AwsPlatform {
    /// SDK client.
    client: Client,
}

impl AwsPlatform {
    /// Creates a client from the ambient AWS configuration.
    ///
    /// Credentials come from the default provider chain; the region falls
    /// back to the environment when not given.
    pub async fn new(region: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region_str) = region {
            loader = loader.region(aws_config::Region::new(region_str.to_string()));
        }
        let config = loader.load().await;

        Self {
            client: Client::new(&config),
        }
    }

    /// Creates a platform from an existing SDK client.
    #[must_use]
    pub const fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Platform for AwsPlatform {
    async fn describe_environments(
        &self,
        query: &EnvironmentQuery,
    ) -> PlatformResult<Vec<EnvironmentRecord>> {
        trace!("DescribeEnvironments {:?}", query);

        let mut request = self
            .client
            .describe_environments()
            .application_name(&query.application_name);
        if let Some(name) = &query.environment_name {
            request = request.environment_names(name);
        }

        let output = request.send().await.map_err(classify)?;

        output
            .environments()
            .iter()
            .map(|env| to_environment_record(env, &query.application_name))
            .collect()
    }

    async fn list_available_solution_stacks(&self) -> PlatformResult<Vec<String>> {
        let output = self
            .client
            .list_available_solution_stacks()
            .send()
            .await
            .map_err(classify)?;

        debug!("Platform offers {} solution stacks", output.solution_stacks().len());
        Ok(output.solution_stacks().to_vec())
    }

    async fn check_cname_availability(&self, cname_prefix: &str) -> PlatformResult<bool> {
        let output = self
            .client
            .check_dns_availability()
            .cname_prefix(cname_prefix)
            .send()
            .await
            .map_err(classify)?;

        output.available().ok_or_else(|| {
            PlatformError::invalid_response("CheckDNSAvailability returned no availability flag")
        })
    }

    async fn create_application(&self, application_name: &str) -> PlatformResult<()> {
        self.client
            .create_application()
            .application_name(application_name)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn create_application_version(
        &self,
        request: &CreateVersionRequest,
    ) -> PlatformResult<()> {
        let source = S3Location::builder()
            .s3_bucket(&request.source_bundle.bucket)
            .s3_key(&request.source_bundle.key)
            .build();

        self.client
            .create_application_version()
            .application_name(&request.application_name)
            .version_label(&request.version_label)
            .source_bundle(source)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn describe_application_versions(
        &self,
        application_name: &str,
        version_label: &str,
    ) -> PlatformResult<Vec<VersionRecord>> {
        let output = self
            .client
            .describe_application_versions()
            .application_name(application_name)
            .version_labels(version_label)
            .send()
            .await
            .map_err(classify)?;

        output
            .application_versions()
            .iter()
            .map(|version| to_version_record(version, application_name))
            .collect()
    }

    async fn create_environment(&self, request: &CreateEnvironmentRequest) -> PlatformResult<()> {
        let options: Vec<ConfigurationOptionSetting> = request
            .options
            .iter()
            .map(|option| {
                ConfigurationOptionSetting::builder()
                    .namespace(&option.namespace)
                    .option_name(&option.option_name)
                    .value(&option.value)
                    .build()
            })
            .collect();

        self.client
            .create_environment()
            .application_name(&request.application_name)
            .environment_name(&request.environment_name)
            .set_version_label(request.version_label.clone())
            .solution_stack_name(&request.solution_stack)
            .set_cname_prefix(request.cname_prefix.clone())
            .set_option_settings(Some(options))
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn terminate_environment(&self, environment_name: &str) -> PlatformResult<()> {
        self.client
            .terminate_environment()
            .environment_name(environment_name)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn restart_app_server(&self, environment_name: &str) -> PlatformResult<()> {
        self.client
            .restart_app_server()
            .environment_name(environment_name)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn swap_environment_cnames(&self, request: &SwapCnamesRequest) -> PlatformResult<()> {
        self.client
            .swap_environment_cnames()
            .source_environment_id(&request.source_environment_id)
            .source_environment_name(&request.source_environment_name)
            .destination_environment_id(&request.destination_environment_id)
            .destination_environment_name(&request.destination_environment_name)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "elasticbeanstalk"
    }
}

/// Maps an SDK failure to a tagged platform error.
fn classify<E>(err: SdkError<E>) -> PlatformError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    match &err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => PlatformError::Network {
            message: DisplayErrorContext(&err).to_string(),
        },
        SdkError::ServiceError(context) => {
            let service_err = context.err();
            classify_code(
                service_err.code().unwrap_or("Unknown"),
                service_err.message().unwrap_or_default(),
            )
        }
        _ => PlatformError::Internal {
            message: DisplayErrorContext(&err).to_string(),
        },
    }
}

/// Maps a service error code and message to a tagged platform error.
///
/// The service reports duplicate resources as a generic
/// `InvalidParameterValue` whose message ends in "already exists."; that
/// message is the only signal available.
fn classify_code(code: &str, message: &str) -> PlatformError {
    if QUOTA_ERROR_CODES.contains(&code) {
        return PlatformError::QuotaExceeded {
            message: message.to_string(),
        };
    }

    if code == PRIVILEGE_ERROR_CODE {
        return PlatformError::InsufficientPrivilege {
            message: message.to_string(),
        };
    }

    if let Some(resource) = message.trim_end().trim_end_matches('.').strip_suffix(" already exists") {
        return PlatformError::already_exists(resource);
    }

    PlatformError::service(code, message)
}

/// Converts an SDK environment description.
fn to_environment_record(
    env: &EnvironmentDescription,
    application_name: &str,
) -> PlatformResult<EnvironmentRecord> {
    let environment_id = env
        .environment_id()
        .ok_or_else(|| PlatformError::invalid_response("environment without EnvironmentId"))?;
    let environment_name = env
        .environment_name()
        .ok_or_else(|| PlatformError::invalid_response("environment without EnvironmentName"))?;

    Ok(EnvironmentRecord {
        environment_id: environment_id.to_string(),
        environment_name: environment_name.to_string(),
        application_name: env
            .application_name()
            .unwrap_or(application_name)
            .to_string(),
        version_label: env.version_label().map(String::from),
        solution_stack: env.solution_stack_name().map(String::from),
        status: env
            .status()
            .map_or(EnvironmentStatus::Unknown, |status| {
                EnvironmentStatus::parse(status.as_str())
            }),
        cname: env.cname().map(String::from),
        health: env.health().map(|health| health.as_str().to_string()),
        endpoint_url: env.endpoint_url().map(String::from),
        date_updated: env
            .date_updated()
            .and_then(|date| chrono::DateTime::from_timestamp(date.secs(), date.subsec_nanos())),
    })
}

/// Converts an SDK application version description.
fn to_version_record(
    version: &ApplicationVersionDescription,
    application_name: &str,
) -> PlatformResult<VersionRecord> {
    let version_label = version
        .version_label()
        .ok_or_else(|| PlatformError::invalid_response("application version without VersionLabel"))?;

    let source_bundle = version.source_bundle().map(|location| {
        SourceBundle::new(
            location.s3_bucket().unwrap_or_default(),
            location.s3_key().unwrap_or_default(),
        )
    });

    Ok(VersionRecord {
        application_name: version
            .application_name()
            .unwrap_or(application_name)
            .to_string(),
        version_label: version_label.to_string(),
        source_bundle,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_already_exists() {
        let err = classify_code("InvalidParameterValue", "Application my_application already exists.");
        assert_eq!(err, PlatformError::already_exists("Application my_application"));

        let err = classify_code("InvalidParameterValue", "Environment web-green already exists.");
        assert!(err.is_already_exists());
    }

    #[test]
    fn test_classify_quota_and_privilege() {
        assert!(matches!(
            classify_code("TooManyEnvironmentsException", "limit reached"),
            PlatformError::QuotaExceeded { .. }
        ));
        assert!(matches!(
            classify_code("InsufficientPrivilegesException", "not allowed"),
            PlatformError::InsufficientPrivilege { .. }
        ));
    }

    #[test]
    fn test_classify_generic() {
        let err = classify_code("InvalidParameterValue", "DNS name (my_cname) is not available.");
        assert_eq!(
            err,
            PlatformError::service("InvalidParameterValue", "DNS name (my_cname) is not available.")
        );
    }

    #[test]
    fn test_environment_record_requires_id() {
        let env = EnvironmentDescription::builder()
            .environment_name("web-blue")
            .build();
        assert!(matches!(
            to_environment_record(&env, "shop"),
            Err(PlatformError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn test_environment_record_conversion() {
        let env = EnvironmentDescription::builder()
            .environment_id("e-1234")
            .environment_name("web-blue")
            .status(aws_sdk_elasticbeanstalk::types::EnvironmentStatus::Ready)
            .cname("my_cname.us-east-1.elasticbeanstalk.com")
            .build();

        let record = to_environment_record(&env, "shop").unwrap();
        assert_eq!(record.application_name, "shop");
        assert_eq!(record.status, EnvironmentStatus::Ready);
        assert_eq!(record.cname_prefix(), Some("my_cname"));
    }
}
