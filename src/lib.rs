// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Beanstalk Deploy
//!
//! A declarative, idempotent reconciler for AWS Elastic Beanstalk environments.
//!
//! ## Overview
//!
//! Given a desired environment (application, version, environment name,
//! CNAME prefix, solution stack and option settings) the reconciler works
//! out what already exists on the control plane and converges on one of
//! three states:
//!
//! - **present**: the application, version and environment exist, and the
//!   environment answers on the CNAME prefix. With `redeploy`, a taken prefix
//!   is moved to a freshly created environment by a blue-green CNAME swap.
//! - **absent**: the environment has been terminated.
//! - **restarted**: the environment's application servers were restarted.
//!
//! "Already exists" answers are absorbed as benign races, and every
//! asynchronous transition is polled until it settles.
//!
//! ## Modules
//!
//! - [`config`]: Deployment file parsing, resolution and validation
//! - [`platform`]: Control-plane client, observer, provisioner and poller
//! - [`planner`]: Read-only planning and the blue-green deployer
//! - [`reconciler`]: The reconciliation driver
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! application:
//!   name: shop
//!   version: "2.0"
//!   source:
//!     bucket: my_bucket
//!     key: my_war_file
//! environment:
//!   name: web-green
//!   cname: my_cname
//!   solution_stack: 64bit Amazon Linux 2023 v5.1.0 running Tomcat 10 Corretto 17
//! state: present
//! redeploy: true
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod error;
pub mod planner;
pub mod platform;
pub mod reconciler;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, DesiredConfig, LifecycleState};
pub use error::{DeployError, Result};
pub use planner::{DeploymentAction, DeploymentPlan, DeploymentPlanner};
pub use platform::{AwsPlatform, InMemoryPlatform, Platform};
pub use reconciler::{ReconcileOutcome, Reconciler};
