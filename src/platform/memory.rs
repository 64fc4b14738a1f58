//! In-memory control plane.
//!
//! A simulated Elastic Beanstalk that keeps applications, versions and
//! environments in process. Mutating calls put environments into a
//! transitional status that only settles after a configurable number of
//! describe calls, so callers see the same asynchronous convergence they
//! would against the real service.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use crate::error::{PlatformError, PlatformResult};

use super::client::Platform;
use super::types::{
    CreateEnvironmentRequest, CreateVersionRequest, EnvironmentQuery, EnvironmentRecord,
    EnvironmentStatus, SourceBundle, SwapCnamesRequest, VersionRecord,
};

/// Solution stack advertised when none is configured.
pub const DEFAULT_SOLUTION_STACK: &str =
    "64bit Amazon Linux 2023 v5.1.0 running Tomcat 10 Corretto 17";

/// Default number of describe calls before a transition settles.
const DEFAULT_SETTLE_READS: u32 = 2;

/// Simulated control plane.
#[derive(Debug)]
pub struct InMemoryPlatform {
    /// Mutable simulated state.
    state: Mutex<SimulatedState>,
    /// Describe calls an environment stays in a transitional status.
    settle_reads: u32,
    /// Region used to build hostnames.
    region: String,
}

#[derive(Debug, Default)]
struct SimulatedState {
    applications: BTreeSet<String>,
    versions: BTreeMap<(String, String), SourceBundle>,
    environments: Vec<SimulatedEnvironment>,
    solution_stacks: Vec<String>,
    mutations: Vec<String>,
    next_id: u32,
}

#[derive(Debug)]
struct SimulatedEnvironment {
    record: EnvironmentRecord,
    /// Statuses reported by successive describe calls.
    pending: VecDeque<EnvironmentStatus>,
}

impl Default for InMemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryPlatform {
    /// Creates an empty control plane advertising [`DEFAULT_SOLUTION_STACK`].
    #[must_use]
    pub fn new() -> Self {
        let state = SimulatedState {
            solution_stacks: vec![DEFAULT_SOLUTION_STACK.to_string()],
            ..SimulatedState::default()
        };

        Self {
            state: Mutex::new(state),
            settle_reads: DEFAULT_SETTLE_READS,
            region: String::from("us-east-1"),
        }
    }

    /// Replaces the advertised solution stack catalog.
    #[must_use]
    pub fn with_solution_stacks<I, S>(self, stacks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock().solution_stacks = stacks.into_iter().map(Into::into).collect();
        self
    }

    /// Sets how many describe calls a transition takes to settle.
    #[must_use]
    pub const fn with_settle_reads(mut self, settle_reads: u32) -> Self {
        self.settle_reads = settle_reads;
        self
    }

    /// Sets the region used in generated hostnames.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Registers an existing application.
    pub fn seed_application(&self, application_name: &str) {
        self.lock().applications.insert(application_name.to_string());
    }

    /// Registers an existing application version.
    pub fn seed_version(&self, application_name: &str, version_label: &str, source: SourceBundle) {
        let mut state = self.lock();
        state.applications.insert(application_name.to_string());
        state.versions.insert(
            (application_name.to_string(), version_label.to_string()),
            source,
        );
    }

    /// Registers a ready environment, optionally bound to a CNAME prefix.
    pub fn seed_environment(
        &self,
        application_name: &str,
        environment_name: &str,
        cname_prefix: Option<&str>,
        version_label: Option<&str>,
    ) -> EnvironmentRecord {
        let mut state = self.lock();
        state.applications.insert(application_name.to_string());
        let stack = state.solution_stacks.first().cloned();
        let mut record = self.new_record(
            &mut state,
            application_name,
            environment_name,
            cname_prefix,
            version_label.map(String::from),
            stack,
        );
        record.status = EnvironmentStatus::Ready;
        record.health = Some(String::from("Green"));
        state.environments.push(SimulatedEnvironment {
            record: record.clone(),
            pending: VecDeque::new(),
        });
        record
    }

    /// Returns the mutating calls received so far, in order.
    #[must_use]
    pub fn mutations(&self) -> Vec<String> {
        self.lock().mutations.clone()
    }

    /// Returns the current record of a live environment without advancing it.
    #[must_use]
    pub fn peek_environment(&self, environment_name: &str) -> Option<EnvironmentRecord> {
        self.lock()
            .environments
            .iter()
            .find(|env| env.record.environment_name == environment_name && !env.record.is_terminated())
            .map(|env| env.record.clone())
    }

    /// Returns the live environment bound to a CNAME prefix, if any.
    #[must_use]
    pub fn cname_holder(&self, cname_prefix: &str) -> Option<EnvironmentRecord> {
        self.lock()
            .environments
            .iter()
            .find(|env| !env.record.is_terminated() && env.record.cname_prefix() == Some(cname_prefix))
            .map(|env| env.record.clone())
    }

    fn lock(&self) -> MutexGuard<'_, SimulatedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn hostname(&self, label: &str) -> String {
        format!("{label}.{}.elasticbeanstalk.com", self.region)
    }

    fn new_record(
        &self,
        state: &mut SimulatedState,
        application_name: &str,
        environment_name: &str,
        cname_prefix: Option<&str>,
        version_label: Option<String>,
        solution_stack: Option<String>,
    ) -> EnvironmentRecord {
        state.next_id += 1;
        let environment_id = format!("e-{:08x}", state.next_id);
        let label = cname_prefix.map_or_else(
            || format!("{environment_name}-{:04}", state.next_id),
            String::from,
        );
        let cname = self.hostname(&label);

        EnvironmentRecord {
            endpoint_url: Some(format!("awseb-{environment_id}.elb.amazonaws.com")),
            environment_id,
            environment_name: environment_name.to_string(),
            application_name: application_name.to_string(),
            version_label,
            solution_stack,
            status: EnvironmentStatus::Launching,
            cname: Some(cname),
            health: Some(String::from("Grey")),
            date_updated: Some(Utc::now()),
        }
    }

    /// Schedules `through` for the next settle window, then `to`.
    fn schedule(&self, env: &mut SimulatedEnvironment, through: EnvironmentStatus, to: EnvironmentStatus) {
        env.record.status = through;
        env.record.date_updated = Some(Utc::now());
        env.pending = std::iter::repeat_n(through, self.settle_reads as usize)
            .chain(std::iter::once(to))
            .collect();
    }

    fn cname_taken(state: &SimulatedState, cname_prefix: &str) -> bool {
        state
            .environments
            .iter()
            .any(|env| !env.record.is_terminated() && env.record.cname_prefix() == Some(cname_prefix))
    }

    fn live_index(state: &SimulatedState, environment_name: &str) -> Option<usize> {
        state.environments.iter().position(|env| {
            env.record.environment_name == environment_name && !env.record.is_terminated()
        })
    }

    fn live_position(state: &SimulatedState, environment_id: &str, environment_name: &str) -> Option<usize> {
        state.environments.iter().position(|env| {
            env.record.environment_id == environment_id
                && env.record.environment_name == environment_name
                && !env.record.is_terminated()
        })
    }

    fn not_found(environment_name: &str) -> PlatformError {
        PlatformError::service(
            "InvalidParameterValue",
            format!("No Environment found for EnvironmentName = '{environment_name}'."),
        )
    }

    fn require_ready(env: &SimulatedEnvironment) -> PlatformResult<()> {
        if env.record.is_ready() {
            Ok(())
        } else {
            Err(PlatformError::service(
                "InvalidParameterValue",
                format!(
                    "Environment named {} is in an invalid state for this operation. Must be Ready.",
                    env.record.environment_name
                ),
            ))
        }
    }
}

#[async_trait]
impl Platform for InMemoryPlatform {
    async fn describe_environments(
        &self,
        query: &EnvironmentQuery,
    ) -> PlatformResult<Vec<EnvironmentRecord>> {
        let mut state = self.lock();

        let records = state
            .environments
            .iter_mut()
            .filter(|env| env.record.application_name == query.application_name)
            .filter(|env| {
                query
                    .environment_name
                    .as_ref()
                    .is_none_or(|name| &env.record.environment_name == name)
            })
            .map(|env| {
                if let Some(status) = env.pending.pop_front() {
                    env.record.status = status;
                    if status == EnvironmentStatus::Ready {
                        env.record.health = Some(String::from("Green"));
                    }
                }
                env.record.clone()
            })
            .collect();

        Ok(records)
    }

    async fn list_available_solution_stacks(&self) -> PlatformResult<Vec<String>> {
        Ok(self.lock().solution_stacks.clone())
    }

    async fn check_cname_availability(&self, cname_prefix: &str) -> PlatformResult<bool> {
        Ok(!Self::cname_taken(&self.lock(), cname_prefix))
    }

    async fn create_application(&self, application_name: &str) -> PlatformResult<()> {
        let mut state = self.lock();
        if !state.applications.insert(application_name.to_string()) {
            return Err(PlatformError::already_exists(format!(
                "Application {application_name}"
            )));
        }
        state.mutations.push(format!("CreateApplication {application_name}"));
        Ok(())
    }

    async fn create_application_version(
        &self,
        request: &CreateVersionRequest,
    ) -> PlatformResult<()> {
        let mut state = self.lock();
        if !state.applications.contains(&request.application_name) {
            return Err(PlatformError::service(
                "InvalidParameterValue",
                format!("No Application named '{}' found.", request.application_name),
            ));
        }

        let key = (request.application_name.clone(), request.version_label.clone());
        if state.versions.contains_key(&key) {
            return Err(PlatformError::already_exists(format!(
                "Application Version {}",
                request.version_label
            )));
        }

        state.versions.insert(key, request.source_bundle.clone());
        state.mutations.push(format!(
            "CreateApplicationVersion {} {}",
            request.application_name, request.version_label
        ));
        Ok(())
    }

    async fn describe_application_versions(
        &self,
        application_name: &str,
        version_label: &str,
    ) -> PlatformResult<Vec<VersionRecord>> {
        let state = self.lock();
        let key = (application_name.to_string(), version_label.to_string());

        Ok(state
            .versions
            .get(&key)
            .map(|source| VersionRecord {
                application_name: application_name.to_string(),
                version_label: version_label.to_string(),
                source_bundle: Some(source.clone()),
            })
            .into_iter()
            .collect())
    }

    async fn create_environment(&self, request: &CreateEnvironmentRequest) -> PlatformResult<()> {
        let mut state = self.lock();

        if !state.applications.contains(&request.application_name) {
            return Err(PlatformError::service(
                "InvalidParameterValue",
                format!("No Application named '{}' found.", request.application_name),
            ));
        }
        if !state.solution_stacks.contains(&request.solution_stack) {
            return Err(PlatformError::service(
                "InvalidParameterValue",
                format!("No Solution Stack named '{}' found.", request.solution_stack),
            ));
        }
        if let Some(label) = &request.version_label {
            let key = (request.application_name.clone(), label.clone());
            if !state.versions.contains_key(&key) {
                return Err(PlatformError::service(
                    "InvalidParameterValue",
                    format!("No Application Version named '{label}' found."),
                ));
            }
        }
        if Self::live_index(&state, &request.environment_name).is_some() {
            return Err(PlatformError::already_exists(format!(
                "Environment {}",
                request.environment_name
            )));
        }
        if let Some(prefix) = &request.cname_prefix {
            if Self::cname_taken(&state, prefix) {
                return Err(PlatformError::service(
                    "InvalidParameterValue",
                    format!("DNS name ({prefix}) is not available."),
                ));
            }
        }

        let record = self.new_record(
            &mut state,
            &request.application_name,
            &request.environment_name,
            request.cname_prefix.as_deref(),
            request.version_label.clone(),
            Some(request.solution_stack.clone()),
        );
        debug!(
            "Simulated environment {} ({}) launching with {} option settings",
            record.environment_name,
            record.environment_id,
            request.options.len()
        );

        let mut env = SimulatedEnvironment {
            record,
            pending: VecDeque::new(),
        };
        self.schedule(&mut env, EnvironmentStatus::Launching, EnvironmentStatus::Ready);
        state.environments.push(env);
        state
            .mutations
            .push(format!("CreateEnvironment {}", request.environment_name));
        Ok(())
    }

    async fn terminate_environment(&self, environment_name: &str) -> PlatformResult<()> {
        let mut state = self.lock();
        let index =
            Self::live_index(&state, environment_name).ok_or_else(|| Self::not_found(environment_name))?;

        let env = &mut state.environments[index];
        self.schedule(env, EnvironmentStatus::Terminating, EnvironmentStatus::Terminated);
        state
            .mutations
            .push(format!("TerminateEnvironment {environment_name}"));
        Ok(())
    }

    async fn restart_app_server(&self, environment_name: &str) -> PlatformResult<()> {
        let mut state = self.lock();
        let index =
            Self::live_index(&state, environment_name).ok_or_else(|| Self::not_found(environment_name))?;

        let env = &mut state.environments[index];
        Self::require_ready(env)?;
        self.schedule(env, EnvironmentStatus::Updating, EnvironmentStatus::Ready);
        state
            .mutations
            .push(format!("RestartAppServer {environment_name}"));
        Ok(())
    }

    async fn swap_environment_cnames(&self, request: &SwapCnamesRequest) -> PlatformResult<()> {
        let mut state = self.lock();

        let source = Self::live_position(
            &state,
            &request.source_environment_id,
            &request.source_environment_name,
        )
        .ok_or_else(|| Self::not_found(&request.source_environment_name))?;
        let destination = Self::live_position(
            &state,
            &request.destination_environment_id,
            &request.destination_environment_name,
        )
        .ok_or_else(|| Self::not_found(&request.destination_environment_name))?;

        if source == destination {
            return Err(PlatformError::service(
                "InvalidParameterValue",
                "Source and destination environments must be different.",
            ));
        }
        Self::require_ready(&state.environments[source])?;
        Self::require_ready(&state.environments[destination])?;

        let source_cname = state.environments[source].record.cname.take();
        let destination_cname = state.environments[destination].record.cname.take();
        state.environments[source].record.cname = destination_cname;
        state.environments[destination].record.cname = source_cname;

        for index in [source, destination] {
            let env = &mut state.environments[index];
            self.schedule(env, EnvironmentStatus::Updating, EnvironmentStatus::Ready);
        }
        state.mutations.push(format!(
            "SwapEnvironmentCNAMEs {} {}",
            request.source_environment_name, request.destination_environment_name
        ));
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
