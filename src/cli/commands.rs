//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{DesiredConfig, LifecycleState};

/// Declarative Elastic Beanstalk environment reconciler.
#[derive(Parser, Debug)]
#[command(name = "beanstalk-deploy")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "BEANSTALK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Run against a simulated in-memory control plane.
    #[arg(long, global = true)]
    pub simulate: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reconcile the environment to the desired state.
    Apply {
        /// Desired state overrides.
        #[command(flatten)]
        overrides: Overrides,
    },

    /// Show what `apply` would do, without changing anything.
    Plan {
        /// Desired state overrides.
        #[command(flatten)]
        overrides: Overrides,
    },

    /// Show the current environment.
    Status,

    /// Validate the deployment configuration.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },
}

/// Command-line overrides of the deployment file.
#[derive(Args, Debug, Clone, Default)]
pub struct Overrides {
    /// Desired lifecycle state.
    #[arg(long, value_enum)]
    pub state: Option<LifecycleState>,

    /// Create a parallel environment and swap CNAMEs if the prefix is taken.
    #[arg(long)]
    pub redeploy: bool,

    /// Seconds between status polls.
    #[arg(long)]
    pub poll_interval: Option<u64>,

    /// Give up after this many status polls.
    #[arg(long)]
    pub max_poll_attempts: Option<u32>,
}

impl Overrides {
    /// Applies the overrides to a resolved desired state.
    #[must_use]
    pub fn apply_to(&self, mut desired: DesiredConfig) -> DesiredConfig {
        if let Some(state) = self.state {
            desired.state = state;
        }
        if self.redeploy {
            desired.redeploy = true;
        }
        if let Some(interval) = self.poll_interval {
            desired.polling.interval_secs = interval;
        }
        if self.max_poll_attempts.is_some() {
            desired.polling.max_attempts = self.max_poll_attempts;
        }
        desired
    }
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}
