//! Environment creation and blue-green CNAME swaps.
//!
//! The deployer carries out the environment half of a present run once the
//! planner has picked a branch and the provisioner has ensured the
//! application and version.

use tracing::{info, warn};

use crate::config::DesiredConfig;
use crate::error::{ReconcileError, Result};
use crate::platform::{
    CreateEnvironmentRequest, EnvironmentRecord, LifecyclePoller, Platform, SwapCnamesRequest,
};

/// Creates environments and moves CNAMEs between them.
pub struct BlueGreenDeployer<'a> {
    /// Control-plane client.
    platform: &'a dyn Platform,
    /// Waits for transitions to settle.
    poller: LifecyclePoller<'a>,
    /// Desired state being deployed.
    desired: &'a DesiredConfig,
}

impl<'a> BlueGreenDeployer<'a> {
    /// Creates a new deployer.
    #[must_use]
    pub const fn new(
        platform: &'a dyn Platform,
        poller: LifecyclePoller<'a>,
        desired: &'a DesiredConfig,
    ) -> Self {
        Self {
            platform,
            poller,
            desired,
        }
    }

    /// Creates the environment bound to the desired CNAME prefix and waits
    /// until it is Ready.
    ///
    /// # Errors
    ///
    /// Returns an error if creation fails for any reason or the wait fails.
    pub async fn create_direct(&self, solution_stack: &str) -> Result<(bool, EnvironmentRecord)> {
        let request = self.create_request(solution_stack, Some(self.desired.cname_prefix.clone()));

        self.platform
            .create_environment(&request)
            .await
            .map_err(|source| ReconcileError::EnvironmentCreation {
                environment: request.environment_name.clone(),
                source,
            })?;
        info!(
            "Created environment {} on CNAME prefix {}",
            request.environment_name, self.desired.cname_prefix
        );

        let environment = self.wait_for_desired().await?;
        Ok((true, environment))
    }

    /// Creates a parallel environment, waits for it, then swaps CNAMEs with
    /// `source` so the new environment serves the desired prefix.
    ///
    /// An "already exists" answer on creation is a benign race: the existing
    /// environment becomes the swap destination and no change is recorded
    /// for the creation step.
    ///
    /// # Errors
    ///
    /// Returns an error if creation fails for another reason, a wait fails,
    /// or the swap is rejected. A rejected swap is not rolled back.
    pub async fn swap_deploy(
        &self,
        source: &EnvironmentRecord,
        solution_stack: &str,
    ) -> Result<(bool, EnvironmentRecord)> {
        let request = self.create_request(solution_stack, None);
        let mut changed = false;

        match self.platform.create_environment(&request).await {
            Ok(()) => {
                info!(
                    "Created environment {} for a CNAME swap",
                    request.environment_name
                );
                changed = true;
            }
            Err(err) if err.is_already_exists() => {
                warn!(
                    "Environment {} already exists, using it as the swap destination",
                    request.environment_name
                );
            }
            Err(source) => {
                return Err(ReconcileError::EnvironmentCreation {
                    environment: request.environment_name.clone(),
                    source,
                }
                .into());
            }
        }

        let destination = self.wait_for_desired().await?;

        if destination.environment_id == source.environment_id {
            info!(
                "Environment {} already serves {}, skipping swap",
                destination.environment_name, self.desired.cname_prefix
            );
            return Ok((changed, destination));
        }

        let swap = SwapCnamesRequest {
            source_environment_id: source.environment_id.clone(),
            source_environment_name: source.environment_name.clone(),
            destination_environment_id: destination.environment_id.clone(),
            destination_environment_name: destination.environment_name.clone(),
        };
        self.platform
            .swap_environment_cnames(&swap)
            .await
            .map_err(|source| ReconcileError::SwapFailed { source })?;
        info!(
            "Swapped CNAMEs of {} and {}",
            swap.source_environment_name, swap.destination_environment_name
        );

        let environment = self.wait_for_desired().await?;
        Ok((true, environment))
    }

    async fn wait_for_desired(&self) -> Result<EnvironmentRecord> {
        self.poller
            .wait_until_ready(
                &self.desired.application_name,
                &self.desired.environment_name,
            )
            .await
    }

    fn create_request(
        &self,
        solution_stack: &str,
        cname_prefix: Option<String>,
    ) -> CreateEnvironmentRequest {
        CreateEnvironmentRequest {
            application_name: self.desired.application_name.clone(),
            environment_name: self.desired.environment_name.clone(),
            version_label: self.desired.version_label.clone(),
            solution_stack: solution_stack.to_string(),
            cname_prefix,
            options: self.desired.options.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PollingConfig, UuidNameGenerator};
    use crate::error::{DeployError, PlatformError};
    use crate::platform::{
        DEFAULT_SOLUTION_STACK, EnvironmentObserver, EnvironmentStatus, ImmediateSleeper,
        InMemoryPlatform, MockPlatform, SourceBundle,
    };

    fn desired() -> DesiredConfig {
        DesiredConfig::new("shop", &mut UuidNameGenerator)
            .with_environment_name("web-green")
            .with_cname_prefix("my_cname")
            .with_version("2.0", SourceBundle::new("my_bucket", "my_war_file"))
            .with_solution_stack(DEFAULT_SOLUTION_STACK)
    }

    fn poller(platform: &dyn Platform) -> LifecyclePoller<'_> {
        LifecyclePoller::new(
            EnvironmentObserver::new(platform),
            &ImmediateSleeper,
            &PollingConfig::default(),
        )
    }

    fn ready(name: &str, id: &str) -> EnvironmentRecord {
        EnvironmentRecord {
            environment_id: id.to_string(),
            environment_name: name.to_string(),
            application_name: String::from("shop"),
            version_label: Some(String::from("2.0")),
            solution_stack: Some(DEFAULT_SOLUTION_STACK.to_string()),
            status: EnvironmentStatus::Ready,
            cname: Some(format!("{name}.us-east-1.elasticbeanstalk.com")),
            health: None,
            endpoint_url: None,
            date_updated: None,
        }
    }

    #[tokio::test]
    async fn test_create_direct_binds_cname() {
        let platform = InMemoryPlatform::new();
        platform.seed_version("shop", "2.0", SourceBundle::new("my_bucket", "my_war_file"));
        let config = desired();
        let deployer = BlueGreenDeployer::new(&platform, poller(&platform), &config);

        let (changed, environment) = deployer
            .create_direct(DEFAULT_SOLUTION_STACK)
            .await
            .unwrap();

        assert!(changed);
        assert!(environment.is_ready());
        assert_eq!(environment.cname_prefix(), Some("my_cname"));
    }

    #[tokio::test]
    async fn test_create_direct_reports_quota() {
        let mut platform = MockPlatform::new();
        platform.expect_create_environment().returning(|_| {
            Err(PlatformError::QuotaExceeded {
                message: String::from("You cannot have more than 200 Environments."),
            })
        });
        platform.expect_describe_environments().never();
        let config = desired();
        let deployer = BlueGreenDeployer::new(&platform, poller(&platform), &config);

        let err = deployer.create_direct(DEFAULT_SOLUTION_STACK).await.unwrap_err();
        assert!(matches!(
            err,
            DeployError::Reconcile(ReconcileError::EnvironmentCreation { .. })
        ));
    }

    #[tokio::test]
    async fn test_swap_deploy_moves_cname() {
        let platform = InMemoryPlatform::new();
        platform.seed_version("shop", "2.0", SourceBundle::new("my_bucket", "my_war_file"));
        let blue = platform.seed_environment("shop", "web-blue", Some("my_cname"), Some("1.0"));
        let config = desired();
        let deployer = BlueGreenDeployer::new(&platform, poller(&platform), &config);

        let (changed, environment) = deployer
            .swap_deploy(&blue, DEFAULT_SOLUTION_STACK)
            .await
            .unwrap();

        assert!(changed);
        assert_eq!(environment.environment_name, "web-green");
        assert_eq!(environment.cname_prefix(), Some("my_cname"));
        let holder = platform.cname_holder("my_cname").unwrap();
        assert_eq!(holder.environment_name, "web-green");
    }

    #[tokio::test]
    async fn test_swap_failure_is_fatal() {
        let mut platform = MockPlatform::new();
        platform.expect_create_environment().returning(|_| Ok(()));
        platform
            .expect_describe_environments()
            .returning(|_| Ok(vec![ready("web-green", "e-green")]));
        platform.expect_swap_environment_cnames().returning(|_| {
            Err(PlatformError::service(
                "InvalidParameterValue",
                "Environment named web-blue is in an invalid state for this operation. Must be Ready.",
            ))
        });
        let config = desired();
        let deployer = BlueGreenDeployer::new(&platform, poller(&platform), &config);

        let err = deployer
            .swap_deploy(&ready("web-blue", "e-blue"), DEFAULT_SOLUTION_STACK)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DeployError::Reconcile(ReconcileError::SwapFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_swap_deploy_absorbs_creation_race() {
        let mut platform = MockPlatform::new();
        platform
            .expect_create_environment()
            .returning(|_| Err(PlatformError::already_exists("Environment web-green")));
        platform
            .expect_describe_environments()
            .returning(|_| Ok(vec![ready("web-green", "e-green")]));
        platform
            .expect_swap_environment_cnames()
            .withf(|request| {
                request.source_environment_id == "e-blue"
                    && request.destination_environment_id == "e-green"
            })
            .times(1)
            .returning(|_| Ok(()));
        let config = desired();
        let deployer = BlueGreenDeployer::new(&platform, poller(&platform), &config);

        let (changed, environment) = deployer
            .swap_deploy(&ready("web-blue", "e-blue"), DEFAULT_SOLUTION_STACK)
            .await
            .unwrap();
        assert!(changed);
        assert_eq!(environment.environment_id, "e-green");
    }
}
