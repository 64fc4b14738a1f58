//! Lifecycle poller for asynchronous environment transitions.
//!
//! After every mutating call the control plane keeps working in the
//! background. The poller re-reads the environment at a fixed interval until
//! it reaches the expected condition.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::PollingConfig;
use crate::error::{ReconcileError, Result};

use super::observer::EnvironmentObserver;
use super::types::EnvironmentRecord;

/// Delay primitive used between polls.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Waits for the given duration.
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

/// Sleeper that returns immediately.
///
/// Used by simulated runs and tests, where the control plane settles on
/// reads rather than on wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[async_trait]
impl Sleeper for ImmediateSleeper {
    async fn sleep(&self, _duration: Duration) {}
}

/// Waits for environments to reach a stable status.
#[derive(Clone, Copy)]
pub struct LifecyclePoller<'a> {
    /// Reader for environment status.
    observer: EnvironmentObserver<'a>,
    /// Delay between polls.
    sleeper: &'a dyn Sleeper,
    /// Interval between polls.
    interval: Duration,
    /// Optional bound on the number of polls.
    max_attempts: Option<u32>,
}

impl<'a> LifecyclePoller<'a> {
    /// Creates a poller with the given polling settings.
    #[must_use]
    pub const fn new(
        observer: EnvironmentObserver<'a>,
        sleeper: &'a dyn Sleeper,
        polling: &PollingConfig,
    ) -> Self {
        Self {
            observer,
            sleeper,
            interval: Duration::from_secs(polling.interval_secs),
            max_attempts: polling.max_attempts,
        }
    }

    /// Blocks until the environment reports `Ready` and returns it.
    ///
    /// # Errors
    ///
    /// Returns an error if a read fails, the environment disappears, or the
    /// attempt bound is reached.
    pub async fn wait_until_ready(
        &self,
        application_name: &str,
        environment_name: &str,
    ) -> Result<EnvironmentRecord> {
        info!("Waiting for environment {environment_name} to become Ready");

        let mut attempts = 0;
        loop {
            self.check_budget(attempts, environment_name, "become Ready")?;
            self.sleeper.sleep(self.interval).await;
            attempts += 1;

            let environment = self
                .observer
                .retrieve_environment(application_name, environment_name)
                .await?
                .ok_or_else(|| ReconcileError::EnvironmentVanished {
                    environment: environment_name.to_string(),
                })?;

            if environment.is_ready() {
                info!(
                    "Environment {environment_name} is Ready after {attempts} polls"
                );
                return Ok(environment);
            }

            debug!(
                "Environment {environment_name} is {} (poll {attempts})",
                environment.status
            );
        }
    }

    /// Blocks until the environment can no longer be retrieved.
    ///
    /// # Errors
    ///
    /// Returns an error if a read fails or the attempt bound is reached.
    pub async fn wait_until_absent(
        &self,
        application_name: &str,
        environment_name: &str,
    ) -> Result<()> {
        info!("Waiting for environment {environment_name} to terminate");

        let mut attempts = 0;
        loop {
            self.check_budget(attempts, environment_name, "terminate")?;
            self.sleeper.sleep(self.interval).await;
            attempts += 1;

            match self
                .observer
                .retrieve_environment(application_name, environment_name)
                .await?
            {
                None => {
                    info!("Environment {environment_name} is gone after {attempts} polls");
                    return Ok(());
                }
                Some(environment) => debug!(
                    "Environment {environment_name} is {} (poll {attempts})",
                    environment.status
                ),
            }
        }
    }

    fn check_budget(&self, attempts: u32, environment_name: &str, expected: &str) -> Result<()> {
        match self.max_attempts {
            Some(max) if attempts >= max => Err(ReconcileError::PollTimeout {
                environment: environment_name.to_string(),
                expected: expected.to_string(),
                attempts,
            }
            .into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::error::DeployError;
    use crate::platform::{InMemoryPlatform, Platform};

    /// Records requested delays instead of sleeping.
    #[derive(Default)]
    struct RecordingSleeper {
        delays: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.delays.lock().unwrap().push(duration);
        }
    }

    fn polling(max_attempts: Option<u32>) -> PollingConfig {
        PollingConfig {
            interval_secs: 10,
            max_attempts,
        }
    }

    #[tokio::test]
    async fn test_wait_until_ready_sleeps_between_reads() {
        let platform = InMemoryPlatform::new().with_settle_reads(2);
        platform.seed_environment("shop", "web-blue", Some("my_cname"), None);
        platform.restart_app_server("web-blue").await.expect("restart failed");

        let sleeper = RecordingSleeper::default();
        let poller = LifecyclePoller::new(EnvironmentObserver::new(&platform), &sleeper, &polling(None));

        let environment = poller
            .wait_until_ready("shop", "web-blue")
            .await
            .expect("wait failed");

        assert!(environment.is_ready());
        let delays = sleeper.delays.lock().unwrap().clone();
        assert_eq!(delays, vec![Duration::from_secs(10); 3]);
    }

    #[tokio::test]
    async fn test_wait_until_ready_times_out() {
        let platform = InMemoryPlatform::new().with_settle_reads(5);
        platform.seed_environment("shop", "web-blue", None, None);
        platform.restart_app_server("web-blue").await.expect("restart failed");

        let poller = LifecyclePoller::new(
            EnvironmentObserver::new(&platform),
            &ImmediateSleeper,
            &polling(Some(2)),
        );

        let err = poller.wait_until_ready("shop", "web-blue").await.unwrap_err();
        assert!(matches!(
            err,
            DeployError::Reconcile(ReconcileError::PollTimeout { attempts: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_wait_until_ready_fails_when_environment_vanishes() {
        let platform = InMemoryPlatform::new();
        let poller = LifecyclePoller::new(
            EnvironmentObserver::new(&platform),
            &ImmediateSleeper,
            &polling(None),
        );

        let err = poller.wait_until_ready("shop", "web-blue").await.unwrap_err();
        assert!(matches!(
            err,
            DeployError::Reconcile(ReconcileError::EnvironmentVanished { .. })
        ));
    }

    #[tokio::test]
    async fn test_wait_until_absent() {
        let platform = InMemoryPlatform::new().with_settle_reads(1);
        platform.seed_environment("shop", "web-blue", None, None);
        platform.terminate_environment("web-blue").await.expect("terminate failed");

        let poller = LifecyclePoller::new(
            EnvironmentObserver::new(&platform),
            &ImmediateSleeper,
            &polling(None),
        );

        poller
            .wait_until_absent("shop", "web-blue")
            .await
            .expect("wait failed");
        assert!(platform.peek_environment("web-blue").is_none());
    }
}
