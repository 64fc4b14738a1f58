//! Elastic Beanstalk control-plane integration module.
//!
//! This module provides everything that talks to the control plane: the
//! [`Platform`] client contract with its AWS and in-memory backends, and the
//! observer, provisioner and poller built on top of it.

mod aws;
mod client;
mod memory;
mod observer;
mod poller;
mod provisioner;
mod types;

pub use aws::AwsPlatform;
pub use client::Platform;
pub use memory::{DEFAULT_SOLUTION_STACK, InMemoryPlatform};
pub use observer::{EnvironmentObserver, select_cname_holder};
pub use poller::{ImmediateSleeper, LifecyclePoller, Sleeper, TokioSleeper};
pub use provisioner::ResourceProvisioner;
pub use types::{
    CreateEnvironmentRequest, CreateVersionRequest, EnvironmentQuery, EnvironmentRecord,
    EnvironmentStatus, OptionSetting, SourceBundle, SwapCnamesRequest, VersionRecord,
};

#[cfg(test)]
pub use client::MockPlatform;
