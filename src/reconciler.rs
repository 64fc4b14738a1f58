//! Reconciler for converging an environment on its desired state.
//!
//! This module drives one run: validate the desired state, plan against
//! the observed control plane, then provision, create, swap, terminate or
//! restart as the plan dictates and wait for the result to settle.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{ConfigValidator, DesiredConfig, LifecycleState};
use crate::error::{ConfigError, DeployError, ReconcileError, Result};
use crate::planner::{BlueGreenDeployer, DeploymentAction, DeploymentPlan, DeploymentPlanner};
use crate::platform::{
    EnvironmentObserver, EnvironmentRecord, LifecyclePoller, Platform, ResourceProvisioner,
    Sleeper, TokioSleeper,
};

/// Drives the reconciliation of one environment.
pub struct Reconciler<'a> {
    /// Control-plane client.
    platform: &'a dyn Platform,
    /// Desired state.
    desired: &'a DesiredConfig,
    /// Delay primitive for polling.
    sleeper: &'a dyn Sleeper,
}

/// Result of a reconciliation run.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileOutcome {
    /// Whether any remote resource was created or transitioned.
    pub changed: bool,
    /// Desired state that was applied.
    pub state: LifecycleState,
    /// The environment after the run; `None` once terminated.
    pub environment: Option<EnvironmentRecord>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
}

impl<'a> Reconciler<'a> {
    /// Creates a reconciler that polls on the tokio timer.
    #[must_use]
    pub const fn new(platform: &'a dyn Platform, desired: &'a DesiredConfig) -> Self {
        Self {
            platform,
            desired,
            sleeper: &TokioSleeper,
        }
    }

    /// Replaces the delay primitive used between polls.
    #[must_use]
    pub const fn with_sleeper(mut self, sleeper: &'a dyn Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Performs a full reconciliation.
    ///
    /// # Errors
    ///
    /// Returns an error if the desired state is invalid or refused, or if
    /// any remote step fails. Nothing is retried beyond status polls.
    pub async fn reconcile(&self) -> Result<ReconcileOutcome> {
        info!(
            "Reconciling {}/{} to state {} on {}",
            self.desired.application_name,
            self.desired.environment_name,
            self.desired.state,
            self.platform.backend_type()
        );

        let plan = self.plan().await?;

        let outcome = match plan.action {
            DeploymentAction::Unchanged => {
                info!("No changes required");
                self.outcome(false, plan.current)
            }
            DeploymentAction::Terminate => self.make_absent().await?,
            DeploymentAction::Restart => self.make_restarted().await?,
            DeploymentAction::CreateEnvironment { .. } | DeploymentAction::BlueGreenSwap { .. } => {
                self.make_present(plan).await?
            }
        };

        info!(
            "Reconciliation finished: changed={} environment={}",
            outcome.changed,
            outcome
                .environment
                .as_ref()
                .map_or("none", |env| env.environment_name.as_str())
        );
        Ok(outcome)
    }

    /// Validates the desired state and plans a run without mutating anything.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails, a read fails or the desired
    /// state is refused.
    pub async fn plan(&self) -> Result<DeploymentPlan> {
        let validation = ConfigValidator::new().validate(self.desired)?;
        for warning in &validation.warnings {
            warn!("{warning}");
        }

        DeploymentPlanner::new(self.observer()).plan(self.desired).await
    }

    /// Reads the current environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub async fn status(&self) -> Result<Option<EnvironmentRecord>> {
        self.observer()
            .retrieve_environment(
                &self.desired.application_name,
                &self.desired.environment_name,
            )
            .await
    }

    /// Provisions the application and version, then creates or swaps.
    async fn make_present(&self, plan: DeploymentPlan) -> Result<ReconcileOutcome> {
        let (solution_stack, swap_source) = match plan.action {
            DeploymentAction::CreateEnvironment { solution_stack } => (solution_stack, None),
            DeploymentAction::BlueGreenSwap {
                source,
                solution_stack,
            } => (solution_stack, Some(source)),
            other => {
                return Err(DeployError::internal(format!(
                    "action '{other}' does not create an environment"
                )));
            }
        };

        let mut changed = self.provision().await?;

        let deployer = BlueGreenDeployer::new(self.platform, self.poller(), self.desired);
        let (deployed, environment) = match &swap_source {
            None => deployer.create_direct(&solution_stack).await?,
            Some(source) => deployer.swap_deploy(source, &solution_stack).await?,
        };
        changed |= deployed;

        Ok(self.outcome(changed, Some(environment)))
    }

    /// Ensures the application and version. Returns true if either was created.
    async fn provision(&self) -> Result<bool> {
        let version_label = self.desired.version_label.as_deref().ok_or_else(|| {
            ConfigError::validation(
                "A version label is required for state 'present'",
                "application.version",
            )
        })?;
        let source = self.desired.source.as_ref().ok_or_else(|| {
            ConfigError::validation(
                "A source bucket and key are required for state 'present'",
                "application.source",
            )
        })?;

        let provisioner = ResourceProvisioner::new(self.platform);
        let application_created = provisioner
            .ensure_application(&self.desired.application_name)
            .await?;
        let version_created = provisioner
            .ensure_application_version(&self.desired.application_name, version_label, source)
            .await?;

        debug!(
            "Provisioning done: application created={application_created}, version created={version_created}"
        );
        Ok(application_created || version_created)
    }

    /// Terminates the environment and waits until it is gone.
    async fn make_absent(&self) -> Result<ReconcileOutcome> {
        let name = &self.desired.environment_name;

        self.platform
            .terminate_environment(name)
            .await
            .map_err(|source| ReconcileError::TerminationFailed {
                environment: name.clone(),
                source,
            })?;
        info!("Requested termination of environment {name}");

        self.poller()
            .wait_until_absent(&self.desired.application_name, name)
            .await?;

        Ok(self.outcome(true, None))
    }

    /// Restarts the application servers and waits until Ready again.
    async fn make_restarted(&self) -> Result<ReconcileOutcome> {
        let name = &self.desired.environment_name;

        self.platform
            .restart_app_server(name)
            .await
            .map_err(|source| ReconcileError::RestartFailed { source })?;
        info!("Requested application server restart of environment {name}");

        let environment = self
            .poller()
            .wait_until_ready(&self.desired.application_name, name)
            .await?;

        Ok(self.outcome(true, Some(environment)))
    }

    const fn observer(&self) -> EnvironmentObserver<'a> {
        EnvironmentObserver::new(self.platform)
    }

    const fn poller(&self) -> LifecyclePoller<'a> {
        LifecyclePoller::new(self.observer(), self.sleeper, &self.desired.polling)
    }

    fn outcome(&self, changed: bool, environment: Option<EnvironmentRecord>) -> ReconcileOutcome {
        ReconcileOutcome {
            changed,
            state: self.desired.state,
            environment,
            finished_at: Utc::now(),
        }
    }
}

impl std::fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = if self.changed { "changed" } else { "unchanged" };
        writeln!(f, "Reconciliation to '{}' {status}", self.state)?;

        match &self.environment {
            Some(env) => {
                writeln!(f, "  Environment: {} ({})", env.environment_name, env.environment_id)?;
                writeln!(f, "  Status: {}", env.status)?;
                if let Some(cname) = &env.cname {
                    writeln!(f, "  CNAME: {cname}")?;
                }
                if let Some(version) = &env.version_label {
                    writeln!(f, "  Version: {version}")?;
                }
            }
            None => writeln!(f, "  Environment: none")?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UuidNameGenerator;
    use crate::error::PlatformError;
    use crate::platform::{
        DEFAULT_SOLUTION_STACK, EnvironmentStatus, ImmediateSleeper, InMemoryPlatform,
        MockPlatform, SourceBundle,
    };

    fn desired(state: LifecycleState) -> DesiredConfig {
        DesiredConfig::new("shop", &mut UuidNameGenerator)
            .with_environment_name("web-green")
            .with_cname_prefix("my_cname")
            .with_version("2.0", SourceBundle::new("my_bucket", "my_war_file"))
            .with_solution_stack(DEFAULT_SOLUTION_STACK)
            .with_state(state)
    }

    fn record(status: EnvironmentStatus) -> EnvironmentRecord {
        EnvironmentRecord {
            environment_id: String::from("e-green"),
            environment_name: String::from("web-green"),
            application_name: String::from("shop"),
            version_label: Some(String::from("2.0")),
            solution_stack: None,
            status,
            cname: Some(String::from("my_cname.us-east-1.elasticbeanstalk.com")),
            health: None,
            endpoint_url: None,
            date_updated: None,
        }
    }

    #[tokio::test]
    async fn test_restart_waits_for_ready() {
        let platform = InMemoryPlatform::new();
        platform.seed_environment("shop", "web-green", Some("my_cname"), Some("2.0"));
        let config = desired(LifecycleState::Restarted);

        let outcome = Reconciler::new(&platform, &config)
            .with_sleeper(&ImmediateSleeper)
            .reconcile()
            .await
            .unwrap();

        assert!(outcome.changed);
        assert!(outcome.environment.unwrap().is_ready());
        assert_eq!(platform.mutations(), vec!["RestartAppServer web-green"]);
    }

    #[tokio::test]
    async fn test_restart_failure() {
        let mut platform = MockPlatform::new();
        platform
            .expect_describe_environments()
            .returning(|_| Ok(vec![record(EnvironmentStatus::Updating)]));
        platform.expect_backend_type().return_const("mock");
        platform.expect_restart_app_server().returning(|_| {
            Err(PlatformError::service(
                "InvalidParameterValue",
                "Environment named web-green is in an invalid state for this operation. Must be Ready.",
            ))
        });
        let config = desired(LifecycleState::Restarted);

        let err = Reconciler::new(&platform, &config)
            .with_sleeper(&ImmediateSleeper)
            .reconcile()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DeployError::Reconcile(ReconcileError::RestartFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_termination_privilege_error() {
        let mut platform = MockPlatform::new();
        platform
            .expect_describe_environments()
            .returning(|_| Ok(vec![record(EnvironmentStatus::Ready)]));
        platform.expect_backend_type().return_const("mock");
        platform.expect_terminate_environment().returning(|_| {
            Err(PlatformError::InsufficientPrivilege {
                message: String::from("not authorized to perform elasticbeanstalk:TerminateEnvironment"),
            })
        });
        let config = desired(LifecycleState::Absent);

        let err = Reconciler::new(&platform, &config)
            .with_sleeper(&ImmediateSleeper)
            .reconcile()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DeployError::Reconcile(ReconcileError::TerminationFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected_before_reads() {
        let mut platform = MockPlatform::new();
        platform.expect_describe_environments().never();
        platform.expect_backend_type().return_const("mock");
        let mut config = desired(LifecycleState::Present);
        config.environment_name = String::from("web_green");

        let err = Reconciler::new(&platform, &config)
            .with_sleeper(&ImmediateSleeper)
            .reconcile()
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_status_reads_without_mutation() {
        let platform = InMemoryPlatform::new();
        platform.seed_environment("shop", "web-green", Some("my_cname"), None);
        let config = desired(LifecycleState::Present);

        let environment = Reconciler::new(&platform, &config).status().await.unwrap();
        assert_eq!(environment.unwrap().cname_prefix(), Some("my_cname"));
        assert!(platform.mutations().is_empty());
    }

    #[test]
    fn test_outcome_display() {
        let outcome = ReconcileOutcome {
            changed: true,
            state: LifecycleState::Present,
            environment: Some(record(EnvironmentStatus::Ready)),
            finished_at: Utc::now(),
        };

        let text = outcome.to_string();
        assert!(text.contains("changed"));
        assert!(text.contains("my_cname.us-east-1.elasticbeanstalk.com"));
    }
}
