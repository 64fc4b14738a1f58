//! Environment observer for reading remote state.
//!
//! Every read of control-plane truth goes through here, so each re-read in
//! the reconciliation flow is an explicit, named call.

use tracing::{debug, info};

use crate::error::{ReconcileError, Result};

use super::client::Platform;
use super::types::{EnvironmentQuery, EnvironmentRecord};

/// Reader for environments and CNAME availability.
#[derive(Clone, Copy)]
pub struct EnvironmentObserver<'a> {
    /// Control-plane client.
    platform: &'a dyn Platform,
}

impl<'a> EnvironmentObserver<'a> {
    /// Creates a new observer.
    #[must_use]
    pub const fn new(platform: &'a dyn Platform) -> Self {
        Self { platform }
    }

    /// Retrieves the environment with the given name.
    ///
    /// A terminated environment is not a usable handle and is reported as
    /// absent.
    ///
    /// # Errors
    ///
    /// Returns a retrieval error if the describe call fails or returns a
    /// malformed record.
    pub async fn retrieve_environment(
        &self,
        application_name: &str,
        environment_name: &str,
    ) -> Result<Option<EnvironmentRecord>> {
        let query = EnvironmentQuery::environment(application_name, environment_name);
        let environments = self
            .platform
            .describe_environments(&query)
            .await
            .map_err(ReconcileError::retrieval)?;

        let environment = environments
            .into_iter()
            .find(|env| !env.is_terminated());

        match &environment {
            Some(env) => debug!(
                "Environment {} ({}) is {}",
                env.environment_name, env.environment_id, env.status
            ),
            None => debug!("Environment {environment_name} not found for {application_name}"),
        }

        Ok(environment)
    }

    /// Lists every environment of an application, terminated ones included.
    ///
    /// # Errors
    ///
    /// Returns a retrieval error if the describe call fails.
    pub async fn list_application_environments(
        &self,
        application_name: &str,
    ) -> Result<Vec<EnvironmentRecord>> {
        let query = EnvironmentQuery::application(application_name);
        let environments = self
            .platform
            .describe_environments(&query)
            .await
            .map_err(ReconcileError::retrieval)?;

        debug!(
            "Found {} environments for application {application_name}",
            environments.len()
        );
        Ok(environments)
    }

    /// Returns true if no live environment holds the CNAME prefix.
    ///
    /// # Errors
    ///
    /// Returns a retrieval error if the availability check fails.
    pub async fn is_cname_available(&self, cname_prefix: &str) -> Result<bool> {
        let available = self
            .platform
            .check_cname_availability(cname_prefix)
            .await
            .map_err(ReconcileError::retrieval)?;

        info!(
            "CNAME prefix {cname_prefix} is {}",
            if available { "available" } else { "in use" }
        );
        Ok(available)
    }

    /// Lists the solution stacks the platform currently advertises.
    ///
    /// # Errors
    ///
    /// Returns a retrieval error if the catalog cannot be read.
    pub async fn available_solution_stacks(&self) -> Result<Vec<String>> {
        let stacks = self
            .platform
            .list_available_solution_stacks()
            .await
            .map_err(ReconcileError::retrieval)?;

        debug!("Platform advertises {} solution stacks", stacks.len());
        Ok(stacks)
    }

    /// Finds the environment currently serving the CNAME prefix.
    ///
    /// # Errors
    ///
    /// Returns a retrieval error if the listing fails, or a source-lookup
    /// error if no environment or more than one holds the prefix.
    pub async fn find_cname_holder(
        &self,
        application_name: &str,
        cname_prefix: &str,
    ) -> Result<EnvironmentRecord> {
        let environments = self.list_application_environments(application_name).await?;
        let holder = select_cname_holder(&environments, cname_prefix)?;

        info!(
            "CNAME prefix {cname_prefix} is served by {} ({})",
            holder.environment_name, holder.environment_id
        );
        Ok(holder.clone())
    }
}

/// Picks the single live environment whose hostname starts with the prefix.
///
/// Only the first label of the hostname is compared.
///
/// # Errors
///
/// Returns a source-lookup error if there is no match or the match is
/// ambiguous.
pub fn select_cname_holder<'e>(
    environments: &'e [EnvironmentRecord],
    cname_prefix: &str,
) -> std::result::Result<&'e EnvironmentRecord, ReconcileError> {
    let mut holders = environments
        .iter()
        .filter(|env| !env.is_terminated() && env.cname_prefix() == Some(cname_prefix));

    let holder = holders.next().ok_or_else(|| {
        ReconcileError::source_lookup(format!(
            "no environment of the application is bound to CNAME prefix '{cname_prefix}'"
        ))
    })?;

    if let Some(other) = holders.next() {
        return Err(ReconcileError::source_lookup(format!(
            "CNAME prefix '{cname_prefix}' matches both '{}' and '{}'",
            holder.environment_name, other.environment_name
        )));
    }

    Ok(holder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{EnvironmentStatus, InMemoryPlatform};

    fn record(name: &str, cname: &str, status: EnvironmentStatus) -> EnvironmentRecord {
        EnvironmentRecord {
            environment_id: format!("e-{name}"),
            environment_name: name.to_string(),
            application_name: String::from("shop"),
            version_label: None,
            solution_stack: None,
            status,
            cname: Some(cname.to_string()),
            health: None,
            endpoint_url: None,
            date_updated: None,
        }
    }

    #[test]
    fn test_select_holder_by_first_label() {
        let environments = vec![
            record("web-blue", "my_cname.us-east-1.elasticbeanstalk.com", EnvironmentStatus::Ready),
            record("web-green", "my_cname-2.us-east-1.elasticbeanstalk.com", EnvironmentStatus::Ready),
        ];

        let holder = select_cname_holder(&environments, "my_cname").unwrap();
        assert_eq!(holder.environment_name, "web-blue");
    }

    #[test]
    fn test_select_holder_ignores_terminated() {
        let environments = vec![
            record("web-old", "my_cname.us-east-1.elasticbeanstalk.com", EnvironmentStatus::Terminated),
            record("web-blue", "my_cname.us-east-1.elasticbeanstalk.com", EnvironmentStatus::Ready),
        ];

        let holder = select_cname_holder(&environments, "my_cname").unwrap();
        assert_eq!(holder.environment_name, "web-blue");
    }

    #[test]
    fn test_select_holder_missing_or_ambiguous() {
        let environments = vec![
            record("web-blue", "my_cname.us-east-1.elasticbeanstalk.com", EnvironmentStatus::Ready),
            record("web-green", "my_cname.eu-west-1.elasticbeanstalk.com", EnvironmentStatus::Ready),
        ];

        assert!(matches!(
            select_cname_holder(&environments, "other"),
            Err(ReconcileError::SourceLookup { .. })
        ));
        assert!(matches!(
            select_cname_holder(&environments, "my_cname"),
            Err(ReconcileError::SourceLookup { .. })
        ));
    }

    #[tokio::test]
    async fn test_terminated_environment_is_absent() {
        let platform = InMemoryPlatform::new().with_settle_reads(0);
        platform.seed_environment("shop", "web-blue", Some("my_cname"), None);
        platform
            .terminate_environment("web-blue")
            .await
            .expect("terminate failed");

        let observer = EnvironmentObserver::new(&platform);
        let environment = observer
            .retrieve_environment("shop", "web-blue")
            .await
            .expect("retrieve failed");
        assert!(environment.is_none());
    }

    #[tokio::test]
    async fn test_missing_environment_is_absent() {
        let platform = InMemoryPlatform::new();
        let observer = EnvironmentObserver::new(&platform);

        let environment = observer
            .retrieve_environment("shop", "web-blue")
            .await
            .expect("retrieve failed");
        assert!(environment.is_none());
    }
}
