//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::{DesiredConfig, ValidationResult};
use crate::planner::{DeploymentAction, DeploymentPlan};
use crate::platform::{EnvironmentRecord, EnvironmentStatus};
use crate::reconciler::ReconcileOutcome;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Environment row for table display.
#[derive(Tabled)]
struct EnvironmentRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Health")]
    health: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "CNAME")]
    cname: String,
}

impl From<&EnvironmentRecord> for EnvironmentRow {
    fn from(env: &EnvironmentRecord) -> Self {
        Self {
            name: env.environment_name.clone(),
            id: env.environment_id.clone(),
            status: OutputFormatter::format_status(env.status),
            health: env.health.clone().unwrap_or_else(|| String::from("-")),
            version: env.version_label.clone().unwrap_or_else(|| String::from("-")),
            cname: env.cname.clone().unwrap_or_else(|| String::from("-")),
        }
    }
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a deployment plan for display.
    #[must_use]
    pub fn format_plan(&self, plan: &DeploymentPlan) -> String {
        match self.format {
            OutputFormat::Json => to_json(plan),
            OutputFormat::Text => Self::format_plan_text(plan),
        }
    }

    fn format_plan_text(plan: &DeploymentPlan) -> String {
        if plan.is_unchanged() {
            return format!(
                "{} No changes required for '{}' ({}).\n",
                "✓".green(),
                plan.environment_name,
                plan.reason
            );
        }

        let mut output = String::new();
        let _ = writeln!(
            output,
            "\nDeployment plan for {}/{}\n",
            plan.application_name, plan.environment_name
        );
        let _ = writeln!(
            output,
            "   {} {}",
            Self::format_action(&plan.action),
            plan.action
                .description(&plan.environment_name, &plan.cname_prefix)
        );
        let _ = writeln!(output, "   Reason: {}", plan.reason);

        if let DeploymentAction::BlueGreenSwap { source, .. } = &plan.action {
            let _ = writeln!(output, "\n   Currently serving '{}':", plan.cname_prefix);
            output.push_str(&Table::new([EnvironmentRow::from(source)]).to_string());
            output.push('\n');
        }

        output
    }

    /// Formats the current environment for display.
    #[must_use]
    pub fn format_environment(
        &self,
        desired: &DesiredConfig,
        environment: Option<&EnvironmentRecord>,
    ) -> String {
        match self.format {
            OutputFormat::Json => to_json(&environment),
            OutputFormat::Text => {
                let mut output = format!(
                    "\nEnvironment: {}/{}\n\n",
                    desired.application_name, desired.environment_name
                );
                match environment {
                    Some(env) => {
                        output.push_str(&Table::new([EnvironmentRow::from(env)]).to_string());
                        output.push('\n');
                        if let Some(url) = &env.endpoint_url {
                            let _ = writeln!(output, "\nEndpoint: {url}");
                        }
                    }
                    None => output.push_str("   Not deployed.\n"),
                }
                output
            }
        }
    }

    /// Formats a reconciliation outcome.
    #[must_use]
    pub fn format_outcome(&self, outcome: &ReconcileOutcome) -> String {
        match self.format {
            OutputFormat::Json => to_json(outcome),
            OutputFormat::Text => {
                let status = if outcome.changed {
                    format!("{} Environment reconciled to '{}' (changed)", "✓".green(), outcome.state)
                } else {
                    format!("{} Environment already '{}' (unchanged)", "✓".green(), outcome.state)
                };

                let mut output = format!("{status}\n\n");
                match &outcome.environment {
                    Some(env) => {
                        output.push_str(&Table::new([EnvironmentRow::from(env)]).to_string());
                        output.push('\n');
                    }
                    None => output.push_str("   Environment terminated.\n"),
                }
                output
            }
        }
    }

    /// Formats a validation result.
    #[must_use]
    pub fn format_validation(
        &self,
        desired: &DesiredConfig,
        result: &ValidationResult,
        show_warnings: bool,
    ) -> String {
        match self.format {
            OutputFormat::Json => to_json(&serde_json::json!({
                "valid": result.is_valid(),
                "application": desired.application_name,
                "environment": desired.environment_name,
                "state": desired.state,
                "warnings": result.warnings,
            })),
            OutputFormat::Text => {
                let mut output = format!("{} Configuration is valid.\n", "✓".green());

                if show_warnings && !result.warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }

                let _ = writeln!(output, "\nConfiguration summary:");
                let _ = writeln!(output, "   Application: {}", desired.application_name);
                let _ = writeln!(output, "   Environment: {}", desired.environment_name);
                let _ = writeln!(output, "   CNAME prefix: {}", desired.cname_prefix);
                let _ = writeln!(output, "   State: {}", desired.state);
                if let Some(version) = &desired.version_label {
                    let _ = writeln!(output, "   Version: {version}");
                }
                output
            }
        }
    }

    /// Formats an error message.
    #[must_use]
    pub fn format_error(&self, message: &str) -> String {
        match self.format {
            OutputFormat::Json => to_json(&serde_json::json!({ "status": "error", "message": message })),
            OutputFormat::Text => format!("{} {message}", "✗".red()),
        }
    }

    fn format_action(action: &DeploymentAction) -> String {
        match action {
            DeploymentAction::Unchanged => "=unchanged".dimmed().to_string(),
            DeploymentAction::CreateEnvironment { .. } => "+create".green().to_string(),
            DeploymentAction::BlueGreenSwap { .. } => "~swap".yellow().to_string(),
            DeploymentAction::Terminate => "-terminate".red().to_string(),
            DeploymentAction::Restart => "~restart".yellow().to_string(),
        }
    }

    fn format_status(status: EnvironmentStatus) -> String {
        match status {
            EnvironmentStatus::Ready => "Ready".green().to_string(),
            EnvironmentStatus::Launching
            | EnvironmentStatus::Updating
            | EnvironmentStatus::LinkingFrom
            | EnvironmentStatus::LinkingTo => status.as_str().yellow().to_string(),
            EnvironmentStatus::Terminating
            | EnvironmentStatus::Terminated
            | EnvironmentStatus::Aborting => status.as_str().red().to_string(),
            EnvironmentStatus::Unknown => status.as_str().dimmed().to_string(),
        }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LifecycleState, UuidNameGenerator};
    use chrono::Utc;

    fn record() -> EnvironmentRecord {
        EnvironmentRecord {
            environment_id: String::from("e-green"),
            environment_name: String::from("web-green"),
            application_name: String::from("shop"),
            version_label: Some(String::from("2.0")),
            solution_stack: None,
            status: EnvironmentStatus::Ready,
            cname: Some(String::from("my_cname.us-east-1.elasticbeanstalk.com")),
            health: Some(String::from("Green")),
            endpoint_url: None,
            date_updated: None,
        }
    }

    #[test]
    fn test_outcome_json() {
        let outcome = ReconcileOutcome {
            changed: true,
            state: LifecycleState::Present,
            environment: Some(record()),
            finished_at: Utc::now(),
        };

        let json = OutputFormatter::new(OutputFormat::Json).format_outcome(&outcome);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["changed"], true);
        assert_eq!(value["state"], "present");
        assert_eq!(value["environment"]["status"], "Ready");
    }

    #[test]
    fn test_environment_text_lists_cname() {
        let desired = DesiredConfig::new("shop", &mut UuidNameGenerator).with_environment_name("web-green");
        let env = record();

        let text = OutputFormatter::new(OutputFormat::Text).format_environment(&desired, Some(&env));
        assert!(text.contains("web-green"));
        assert!(text.contains("my_cname.us-east-1.elasticbeanstalk.com"));

        let text = OutputFormatter::new(OutputFormat::Text).format_environment(&desired, None);
        assert!(text.contains("Not deployed"));
    }
}
