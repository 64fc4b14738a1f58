//! End-to-end reconciliation scenarios against the simulated control plane.

use beanstalk_deploy::config::{DesiredConfig, LifecycleState, NameGenerator, PollingConfig};
use beanstalk_deploy::error::{DeployError, ReconcileError};
use beanstalk_deploy::platform::{
    DEFAULT_SOLUTION_STACK, EnvironmentStatus, ImmediateSleeper, InMemoryPlatform, SourceBundle,
};
use beanstalk_deploy::reconciler::{ReconcileOutcome, Reconciler};

/// Yields `gen-0000`, `gen-0001`, ...
struct SequentialNames(u32);

impl NameGenerator for SequentialNames {
    fn generate(&mut self) -> String {
        let name = format!("gen-{:04}", self.0);
        self.0 += 1;
        name
    }
}

fn bundle() -> SourceBundle {
    SourceBundle::new("my_bucket", "my_war_file")
}

fn desired(environment_name: &str) -> DesiredConfig {
    DesiredConfig::new("shop", &mut SequentialNames(0))
        .with_environment_name(environment_name)
        .with_cname_prefix("my_cname")
        .with_version("2.0", bundle())
        .with_solution_stack(DEFAULT_SOLUTION_STACK)
}

async fn run(
    platform: &InMemoryPlatform,
    desired: &DesiredConfig,
) -> Result<ReconcileOutcome, DeployError> {
    Reconciler::new(platform, desired)
        .with_sleeper(&ImmediateSleeper)
        .reconcile()
        .await
}

#[tokio::test]
async fn existing_environment_is_returned_unchanged() {
    let platform = InMemoryPlatform::new();
    let existing = platform.seed_environment("shop", "web-green", Some("other"), Some("1.0"));

    let outcome = run(&platform, &desired("web-green")).await.unwrap();

    assert!(!outcome.changed);
    assert_eq!(outcome.environment, Some(existing));
    assert!(platform.mutations().is_empty());
}

#[tokio::test]
async fn existing_environment_needs_no_version() {
    let platform = InMemoryPlatform::new();
    let existing = platform.seed_environment("shop", "web-green", Some("my_cname"), Some("1.0"));
    let config = DesiredConfig::new("shop", &mut SequentialNames(0)).with_environment_name("web-green");

    let outcome = run(&platform, &config).await.unwrap();

    assert!(!outcome.changed);
    assert_eq!(outcome.environment, Some(existing));
    assert!(platform.mutations().is_empty());
}

#[tokio::test]
async fn creation_without_version_mutates_nothing() {
    let platform = InMemoryPlatform::new();
    let config = DesiredConfig::new("shop", &mut SequentialNames(0))
        .with_environment_name("web-green")
        .with_solution_stack(DEFAULT_SOLUTION_STACK);

    let err = run(&platform, &config).await.unwrap_err();

    assert!(err.is_validation());
    assert!(platform.mutations().is_empty());
}

#[tokio::test]
async fn free_cname_creates_ready_environment() {
    let platform = InMemoryPlatform::new();

    let outcome = run(&platform, &desired("web-green")).await.unwrap();

    assert!(outcome.changed);
    let environment = outcome.environment.unwrap();
    assert_eq!(environment.status, EnvironmentStatus::Ready);
    assert_eq!(environment.cname_prefix(), Some("my_cname"));
    assert_eq!(environment.version_label.as_deref(), Some("2.0"));
    assert_eq!(
        platform.mutations(),
        vec![
            "CreateApplication shop",
            "CreateApplicationVersion shop 2.0",
            "CreateEnvironment web-green",
        ]
    );
}

#[tokio::test]
async fn redeploy_swaps_cname_to_new_environment() {
    let platform = InMemoryPlatform::new();
    platform.seed_version("shop", "1.0", SourceBundle::new("my_bucket", "older_war_file"));
    platform.seed_environment("shop", "web-blue", Some("my_cname"), Some("1.0"));

    let outcome = run(&platform, &desired("web-green").with_redeploy(true))
        .await
        .unwrap();

    assert!(outcome.changed);
    let green = outcome.environment.unwrap();
    assert_eq!(green.environment_name, "web-green");
    assert_eq!(green.cname_prefix(), Some("my_cname"));
    assert!(green.is_ready());

    let blue = platform.peek_environment("web-blue").unwrap();
    assert!(blue.cname_prefix().unwrap().starts_with("web-green-"));
    assert_eq!(
        platform.cname_holder("my_cname").unwrap().environment_name,
        "web-green"
    );
    assert!(
        platform
            .mutations()
            .contains(&String::from("SwapEnvironmentCNAMEs web-blue web-green"))
    );
}

#[tokio::test]
async fn taken_cname_without_redeploy_mutates_nothing() {
    let platform = InMemoryPlatform::new();
    platform.seed_environment("shop", "web-blue", Some("my_cname"), None);

    let err = run(&platform, &desired("web-green")).await.unwrap_err();

    assert!(matches!(
        err,
        DeployError::Reconcile(ReconcileError::AliasConflict { ref cname_prefix })
            if cname_prefix == "my_cname"
    ));
    assert!(err.is_validation());
    assert!(platform.mutations().is_empty());
    assert!(platform.peek_environment("web-green").is_none());
}

#[tokio::test]
async fn version_bound_to_other_source_is_a_conflict() {
    let platform = InMemoryPlatform::new();
    platform.seed_version("shop", "2.0", SourceBundle::new("my_bucket", "older_war_file"));

    let err = run(&platform, &desired("web-green")).await.unwrap_err();

    assert!(matches!(
        err,
        DeployError::Reconcile(ReconcileError::ConfigurationConflict { .. })
    ));
    assert!(platform.peek_environment("web-green").is_none());
}

#[tokio::test]
async fn version_with_same_source_is_reused() {
    let platform = InMemoryPlatform::new();
    platform.seed_version("shop", "2.0", bundle());

    let outcome = run(&platform, &desired("web-green")).await.unwrap();

    assert!(outcome.changed);
    assert_eq!(platform.mutations(), vec!["CreateEnvironment web-green"]);
}

#[tokio::test]
async fn absent_requires_existing_environment() {
    let platform = InMemoryPlatform::new();

    let err = run(&platform, &desired("web-green").with_state(LifecycleState::Absent))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DeployError::Reconcile(ReconcileError::NotFound { .. })
    ));
}

#[tokio::test]
async fn absent_terminates_environment() {
    let platform = InMemoryPlatform::new();
    platform.seed_environment("shop", "web-green", Some("my_cname"), None);

    let outcome = run(&platform, &desired("web-green").with_state(LifecycleState::Absent))
        .await
        .unwrap();

    assert!(outcome.changed);
    assert!(outcome.environment.is_none());
    assert!(platform.peek_environment("web-green").is_none());
    assert!(platform.cname_holder("my_cname").is_none());
}

#[tokio::test]
async fn present_is_idempotent() {
    let platform = InMemoryPlatform::new();
    let config = desired("web-green");

    let first = run(&platform, &config).await.unwrap();
    let second = run(&platform, &config).await.unwrap();

    assert!(first.changed);
    assert!(!second.changed);
    assert_eq!(
        first.environment.unwrap().environment_id,
        second.environment.unwrap().environment_id
    );
}

#[tokio::test]
async fn redeploy_is_idempotent_once_swapped() {
    let platform = InMemoryPlatform::new();
    platform.seed_environment("shop", "web-blue", Some("my_cname"), None);
    let config = desired("web-green").with_redeploy(true);

    assert!(run(&platform, &config).await.unwrap().changed);
    let mutations = platform.mutations().len();

    let second = run(&platform, &config).await.unwrap();
    assert!(!second.changed);
    assert_eq!(platform.mutations().len(), mutations);
}

#[tokio::test]
async fn generated_names_are_used_for_creation() {
    let platform = InMemoryPlatform::new();
    let config = DesiredConfig::new("shop", &mut SequentialNames(7))
        .with_version("2.0", bundle())
        .with_solution_stack(DEFAULT_SOLUTION_STACK);

    let outcome = run(&platform, &config).await.unwrap();

    let environment = outcome.environment.unwrap();
    assert_eq!(environment.environment_name, "gen-0007");
    assert_eq!(environment.cname_prefix(), Some("gen-0008"));
}

#[tokio::test]
async fn stuck_environment_times_out() {
    let platform = InMemoryPlatform::new().with_settle_reads(50);
    let config = desired("web-green").with_polling(PollingConfig {
        interval_secs: 10,
        max_attempts: Some(5),
    });

    let err = run(&platform, &config).await.unwrap_err();

    assert!(matches!(
        err,
        DeployError::Reconcile(ReconcileError::PollTimeout { attempts: 5, .. })
    ));
}
