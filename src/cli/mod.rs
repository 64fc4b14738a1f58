//! CLI module for the Beanstalk deployment tool.
//!
//! This module provides the command-line interface for reconciling
//! Elastic Beanstalk environments.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat, Overrides};
pub use output::OutputFormatter;
