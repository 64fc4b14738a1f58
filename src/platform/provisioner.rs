//! Resource provisioner for applications and application versions.
//!
//! Both resources are created idempotently: an "already exists" answer is a
//! benign race, except when an existing version points at a different
//! source object.

use tracing::{info, warn};

use crate::error::{PlatformError, ReconcileError, Result};

use super::client::Platform;
use super::types::{CreateVersionRequest, SourceBundle};

/// Provisioner for the resources an environment depends on.
#[derive(Clone, Copy)]
pub struct ResourceProvisioner<'a> {
    /// Control-plane client.
    platform: &'a dyn Platform,
}

impl<'a> ResourceProvisioner<'a> {
    /// Creates a new provisioner.
    #[must_use]
    pub const fn new(platform: &'a dyn Platform) -> Self {
        Self { platform }
    }

    /// Ensures the application exists. Returns true if it was created.
    ///
    /// # Errors
    ///
    /// Returns an error for any failure other than "already exists".
    pub async fn ensure_application(&self, application_name: &str) -> Result<bool> {
        match self.platform.create_application(application_name).await {
            Ok(()) => {
                info!("Created application {application_name}");
                Ok(true)
            }
            Err(err) if err.is_already_exists() => {
                info!("Application {application_name} already exists");
                Ok(false)
            }
            Err(source) => Err(ReconcileError::ApplicationCreation {
                application: application_name.to_string(),
                source,
            }
            .into()),
        }
    }

    /// Ensures the application version exists and is bound to `source`.
    /// Returns true if it was created.
    ///
    /// Versions are immutable: an existing label bound to another source
    /// object is a conflict, never an update.
    ///
    /// # Errors
    ///
    /// Returns a configuration conflict if the existing version points at a
    /// different bucket or key, or an error for any other failure.
    pub async fn ensure_application_version(
        &self,
        application_name: &str,
        version_label: &str,
        source: &SourceBundle,
    ) -> Result<bool> {
        let request = CreateVersionRequest {
            application_name: application_name.to_string(),
            version_label: version_label.to_string(),
            source_bundle: source.clone(),
        };

        match self.platform.create_application_version(&request).await {
            Ok(()) => {
                info!("Created application version {version_label} from {source}");
                Ok(true)
            }
            Err(err) if err.is_already_exists() => {
                self.verify_existing_version(application_name, version_label, source)
                    .await?;
                info!("Application version {version_label} already exists with the same source");
                Ok(false)
            }
            Err(err) => Err(ReconcileError::VersionCreation {
                version_label: version_label.to_string(),
                source: err,
            }
            .into()),
        }
    }

    /// Compares the recorded source of an existing version with the request.
    async fn verify_existing_version(
        &self,
        application_name: &str,
        version_label: &str,
        requested: &SourceBundle,
    ) -> Result<()> {
        let versions = self
            .platform
            .describe_application_versions(application_name, version_label)
            .await
            .map_err(ReconcileError::retrieval)?;

        let existing = versions
            .into_iter()
            .find(|version| version.version_label == version_label)
            .ok_or_else(|| {
                ReconcileError::retrieval(PlatformError::invalid_response(format!(
                    "application version {version_label} reported as existing but not described"
                )))
            })?;

        let (existing_bucket, existing_key) = existing
            .source_bundle
            .map(|bundle| (bundle.bucket, bundle.key))
            .unwrap_or_default();

        if existing_bucket != requested.bucket || existing_key != requested.key {
            warn!(
                "Application version {version_label} is bound to s3://{existing_bucket}/{existing_key}, not {requested}"
            );
            return Err(ReconcileError::ConfigurationConflict {
                version_label: version_label.to_string(),
                existing_bucket,
                existing_key,
                requested_bucket: requested.bucket.clone(),
                requested_key: requested.key.clone(),
            }
            .into());
        }

        Ok(())
    }
}
