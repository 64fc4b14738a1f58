//! Planning module for deployment operations.
//!
//! This module compares the desired state with what the control plane
//! reports, picks one action, and carries out the environment side of a
//! present run.

mod deployer;
mod plan;

pub use deployer::BlueGreenDeployer;
pub use plan::{DeploymentAction, DeploymentPlan, DeploymentPlanner};
