//! Beanstalk deploy CLI entrypoint.
//!
//! This is the main entrypoint for the beanstalk-deploy command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use beanstalk_deploy::cli::{Cli, Commands, OutputFormatter, Overrides};
use beanstalk_deploy::config::{
    ConfigParser, ConfigValidator, DesiredConfig, UuidNameGenerator, find_config_file,
};
use beanstalk_deploy::error::{DeployError, Result};
use beanstalk_deploy::platform::{
    AwsPlatform, DEFAULT_SOLUTION_STACK, ImmediateSleeper, InMemoryPlatform, Platform, Sleeper,
    TokioSleeper,
};
use beanstalk_deploy::reconciler::Reconciler;

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_json);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let formatter = OutputFormatter::new(cli.output);
    let result = runtime.block_on(async {
        tokio::select! {
            result = run(&cli, &formatter) => result,
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, remote operations already requested keep running");
                Err(DeployError::internal("interrupted"))
            }
        }
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", formatter.format_error(&e.to_string()));
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool, json: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Main async entry point.
async fn run(cli: &Cli, formatter: &OutputFormatter) -> Result<()> {
    match &cli.command {
        Commands::Validate { warnings } => cmd_validate(cli.config.as_ref(), *warnings, formatter),
        Commands::Plan { overrides } => cmd_plan(cli, overrides, formatter).await,
        Commands::Apply { overrides } => cmd_apply(cli, overrides, formatter).await,
        Commands::Status => cmd_status(cli, formatter).await,
    }
}

/// Validate configuration.
fn cmd_validate(
    config_path: Option<&PathBuf>,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let desired = load_desired(config_path)?;
    let result = ConfigValidator::new().validate(&desired)?;

    emit(&formatter.format_validation(&desired, &result, show_warnings))
}

/// Show the deployment plan.
async fn cmd_plan(cli: &Cli, overrides: &Overrides, formatter: &OutputFormatter) -> Result<()> {
    let desired = overrides.apply_to(load_desired(cli.config.as_ref())?);
    let platform = connect(cli.simulate, &desired).await;

    let plan = Reconciler::new(platform.as_ref(), &desired).plan().await?;

    emit(&formatter.format_plan(&plan))
}

/// Reconcile the environment.
async fn cmd_apply(cli: &Cli, overrides: &Overrides, formatter: &OutputFormatter) -> Result<()> {
    let desired = overrides.apply_to(load_desired(cli.config.as_ref())?);
    let platform = connect(cli.simulate, &desired).await;
    let sleeper: &dyn Sleeper = if cli.simulate {
        &ImmediateSleeper
    } else {
        &TokioSleeper
    };

    let outcome = Reconciler::new(platform.as_ref(), &desired)
        .with_sleeper(sleeper)
        .reconcile()
        .await?;

    emit(&formatter.format_outcome(&outcome))
}

/// Show the current environment.
async fn cmd_status(cli: &Cli, formatter: &OutputFormatter) -> Result<()> {
    let desired = load_desired(cli.config.as_ref())?;
    let platform = connect(cli.simulate, &desired).await;

    let environment = Reconciler::new(platform.as_ref(), &desired).status().await?;

    emit(&formatter.format_environment(&desired, environment.as_ref()))
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Resolves the configuration file path.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<PathBuf> {
    config_path.map_or_else(|| find_config_file("."), |path| Ok(path.clone()))
}

/// Loads, overrides and resolves the deployment file.
fn load_desired(config_path: Option<&PathBuf>) -> Result<DesiredConfig> {
    let config_file = resolve_config_path(config_path)?;
    debug!("Loading configuration from: {}", config_file.display());

    let parser =
        ConfigParser::new().with_base_path(config_file.parent().unwrap_or_else(|| Path::new(".")));
    parser.load_dotenv()?;

    let file = parser.load_with_env(&config_file)?;
    ConfigValidator::new().validate_file(&file)?;

    Ok(DesiredConfig::from_file(file, &mut UuidNameGenerator))
}

/// Creates the control-plane client.
async fn connect(simulate: bool, desired: &DesiredConfig) -> Box<dyn Platform> {
    if simulate {
        info!("Using the simulated control plane");
        let mut stacks = vec![DEFAULT_SOLUTION_STACK.to_string()];
        stacks.extend(desired.solution_stack.clone());
        let mut platform = InMemoryPlatform::new().with_solution_stacks(stacks);
        if let Some(region) = &desired.region {
            platform = platform.with_region(region.as_str());
        }
        Box::new(platform)
    } else {
        Box::new(AwsPlatform::new(desired.region.as_deref()).await)
    }
}

/// Writes command output to stdout.
fn emit(text: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{text}")?;
    Ok(())
}
