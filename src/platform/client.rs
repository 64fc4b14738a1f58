//! Control-plane client contract.
//!
//! Everything the reconciler needs from the platform goes through
//! [`Platform`]. Implementations translate their native failures into the
//! tagged [`PlatformError`](crate::error::PlatformError) kinds.

use async_trait::async_trait;

use crate::error::PlatformResult;

use super::types::{
    CreateEnvironmentRequest, CreateVersionRequest, EnvironmentQuery, EnvironmentRecord,
    SwapCnamesRequest, VersionRecord,
};

/// Operations exposed by the application-hosting control plane.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Platform: Send + Sync {
    /// Describes environments matching the query, including terminated ones.
    async fn describe_environments(
        &self,
        query: &EnvironmentQuery,
    ) -> PlatformResult<Vec<EnvironmentRecord>>;

    /// Lists the solution stacks the platform currently offers.
    async fn list_available_solution_stacks(&self) -> PlatformResult<Vec<String>>;

    /// Returns true if the CNAME prefix is not bound to any live environment.
    async fn check_cname_availability(&self, cname_prefix: &str) -> PlatformResult<bool>;

    /// Creates an application.
    async fn create_application(&self, application_name: &str) -> PlatformResult<()>;

    /// Creates an application version.
    async fn create_application_version(
        &self,
        request: &CreateVersionRequest,
    ) -> PlatformResult<()>;

    /// Describes a single version of an application.
    async fn describe_application_versions(
        &self,
        application_name: &str,
        version_label: &str,
    ) -> PlatformResult<Vec<VersionRecord>>;

    /// Requests creation of an environment. Provisioning continues asynchronously.
    async fn create_environment(&self, request: &CreateEnvironmentRequest) -> PlatformResult<()>;

    /// Requests termination of an environment.
    async fn terminate_environment(&self, environment_name: &str) -> PlatformResult<()>;

    /// Restarts the application server of every instance in an environment.
    async fn restart_app_server(&self, environment_name: &str) -> PlatformResult<()>;

    /// Swaps the CNAMEs of two environments.
    async fn swap_environment_cnames(&self, request: &SwapCnamesRequest) -> PlatformResult<()>;

    /// Short name of the backend, for logs.
    fn backend_type(&self) -> &'static str;
}
