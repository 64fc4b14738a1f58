//! Deployment plan types and construction.
//!
//! Planning runs every read-only check before anything is mutated: the
//! short-circuit on an existing environment, solution stack validation, the
//! CNAME availability check and the lookup of the environment to swap from.
//! A refused deployment therefore leaves the control plane untouched.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{DesiredConfig, LifecycleState};
use crate::error::{ReconcileError, Result};
use crate::platform::{EnvironmentObserver, EnvironmentRecord};

/// The decision for one reconciliation run.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentPlan {
    /// When the plan was created.
    pub created_at: DateTime<Utc>,
    /// Application name.
    pub application_name: String,
    /// Environment name.
    pub environment_name: String,
    /// CNAME prefix the environment should answer on.
    pub cname_prefix: String,
    /// Desired lifecycle state.
    pub state: LifecycleState,
    /// What the run will do.
    pub action: DeploymentAction,
    /// The environment as observed while planning.
    pub current: Option<EnvironmentRecord>,
    /// Why this action was chosen.
    pub reason: String,
}

/// Action selected by the planner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeploymentAction {
    /// Nothing to do.
    Unchanged,
    /// Create the environment bound directly to the free CNAME prefix.
    CreateEnvironment {
        /// Validated solution stack.
        solution_stack: String,
    },
    /// Create a parallel environment and swap CNAMEs with the current holder.
    BlueGreenSwap {
        /// Environment currently serving the CNAME prefix.
        source: EnvironmentRecord,
        /// Validated solution stack.
        solution_stack: String,
    },
    /// Terminate the environment.
    Terminate,
    /// Restart the environment's application servers.
    Restart,
}

impl DeploymentPlan {
    fn new(
        desired: &DesiredConfig,
        action: DeploymentAction,
        current: Option<EnvironmentRecord>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            created_at: Utc::now(),
            application_name: desired.application_name.clone(),
            environment_name: desired.environment_name.clone(),
            cname_prefix: desired.cname_prefix.clone(),
            state: desired.state,
            action,
            current,
            reason: reason.into(),
        }
    }

    /// Returns true if the run will not mutate anything.
    #[must_use]
    pub const fn is_unchanged(&self) -> bool {
        matches!(self.action, DeploymentAction::Unchanged)
    }

    /// Returns true if the run creates an environment and needs provisioning.
    #[must_use]
    pub const fn creates_environment(&self) -> bool {
        matches!(
            self.action,
            DeploymentAction::CreateEnvironment { .. } | DeploymentAction::BlueGreenSwap { .. }
        )
    }
}

impl DeploymentAction {
    /// Returns a human-readable description of the action.
    #[must_use]
    pub fn description(&self, environment_name: &str, cname_prefix: &str) -> String {
        match self {
            Self::Unchanged => format!("No change for '{environment_name}'"),
            Self::CreateEnvironment { solution_stack } => format!(
                "Create environment '{environment_name}' on '{cname_prefix}' ({solution_stack})"
            ),
            Self::BlueGreenSwap { source, .. } => format!(
                "Create environment '{environment_name}' and swap '{cname_prefix}' from '{}'",
                source.environment_name
            ),
            Self::Terminate => format!("Terminate environment '{environment_name}'"),
            Self::Restart => format!("Restart application servers of '{environment_name}'"),
        }
    }
}

impl std::fmt::Display for DeploymentAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unchanged => "unchanged",
            Self::CreateEnvironment { .. } => "create",
            Self::BlueGreenSwap { .. } => "blue-green swap",
            Self::Terminate => "terminate",
            Self::Restart => "restart",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for DeploymentPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({})",
            self.action
                .description(&self.environment_name, &self.cname_prefix),
            self.reason
        )
    }
}

/// Derives a [`DeploymentPlan`] from the observed control-plane state.
#[derive(Clone, Copy)]
pub struct DeploymentPlanner<'a> {
    /// Reader for remote state.
    observer: EnvironmentObserver<'a>,
}

impl<'a> DeploymentPlanner<'a> {
    /// Creates a new planner.
    #[must_use]
    pub const fn new(observer: EnvironmentObserver<'a>) -> Self {
        Self { observer }
    }

    /// Plans a run for the desired state.
    ///
    /// # Errors
    ///
    /// Returns an error if a read fails or the desired state is refused
    /// (missing or unknown stack, CNAME conflict, environment not found).
    pub async fn plan(&self, desired: &DesiredConfig) -> Result<DeploymentPlan> {
        let current = self
            .observer
            .retrieve_environment(&desired.application_name, &desired.environment_name)
            .await?;

        let plan = match desired.state {
            LifecycleState::Present => self.plan_present(desired, current).await?,
            LifecycleState::Absent => {
                let current = Self::require_existing(desired, current)?;
                DeploymentPlan::new(
                    desired,
                    DeploymentAction::Terminate,
                    Some(current),
                    "environment exists and should be absent",
                )
            }
            LifecycleState::Restarted => {
                let current = Self::require_existing(desired, current)?;
                DeploymentPlan::new(
                    desired,
                    DeploymentAction::Restart,
                    Some(current),
                    "restart requested",
                )
            }
        };

        info!("Plan for {}: {plan}", desired.environment_name);
        Ok(plan)
    }

    async fn plan_present(
        &self,
        desired: &DesiredConfig,
        current: Option<EnvironmentRecord>,
    ) -> Result<DeploymentPlan> {
        if current.is_some() && !desired.redeploy {
            return Ok(DeploymentPlan::new(
                desired,
                DeploymentAction::Unchanged,
                current,
                "environment already exists",
            ));
        }

        let solution_stack = self.validate_solution_stack(desired).await?;

        if self.observer.is_cname_available(&desired.cname_prefix).await? {
            return Ok(DeploymentPlan::new(
                desired,
                DeploymentAction::CreateEnvironment { solution_stack },
                current,
                "CNAME prefix is free",
            ));
        }

        if !desired.redeploy {
            return Err(ReconcileError::AliasConflict {
                cname_prefix: desired.cname_prefix.clone(),
            }
            .into());
        }

        let source = self
            .observer
            .find_cname_holder(&desired.application_name, &desired.cname_prefix)
            .await?;

        let already_serving = current
            .as_ref()
            .is_some_and(|env| env.environment_id == source.environment_id);
        if already_serving {
            return Ok(DeploymentPlan::new(
                desired,
                DeploymentAction::Unchanged,
                current,
                "environment already serves the CNAME prefix",
            ));
        }

        Ok(DeploymentPlan::new(
            desired,
            DeploymentAction::BlueGreenSwap {
                source,
                solution_stack,
            },
            current,
            "CNAME prefix is taken and redeploy is set",
        ))
    }

    /// Checks the requested stack against the advertised catalog.
    async fn validate_solution_stack(&self, desired: &DesiredConfig) -> Result<String> {
        let solution_stack = desired
            .solution_stack
            .clone()
            .ok_or(ReconcileError::MissingTemplate)?;

        let available = self.observer.available_solution_stacks().await?;
        if !available.contains(&solution_stack) {
            return Err(ReconcileError::UnknownTemplate { solution_stack }.into());
        }

        debug!("Solution stack '{solution_stack}' is available");
        Ok(solution_stack)
    }

    fn require_existing(
        desired: &DesiredConfig,
        current: Option<EnvironmentRecord>,
    ) -> Result<EnvironmentRecord> {
        current.ok_or_else(|| {
            ReconcileError::NotFound {
                application: desired.application_name.clone(),
                environment: desired.environment_name.clone(),
            }
            .into()
        })
    }
}
