//! Agent Warden CLI
//!
//! Evaluates access requests against a configuration file.

use agent_warden::{
    access_control::{OperationKind, PermissionEvaluator},
    config::{LogFormat, LoggingConfig, load_config},
};
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Exit code for a denied `check`
const DENIED_EXIT_CODE: u8 = 2;

/// Agent Warden - access-pattern and permission evaluation for agents
#[derive(Parser, Debug)]
#[command(name = "agent-warden")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "AGENT_WARDEN_CONFIG")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, env = "AGENT_WARDEN_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate one request and print the decision as JSON
    Check {
        /// Requesting agent id
        #[arg(short, long)]
        agent: String,

        /// Operation (read, edit, write, delete, question, execute)
        #[arg(short, long, value_parser = parse_operation)]
        operation: OperationKind,

        /// Target resource; omit for a capability check
        #[arg(short, long)]
        resource: Option<String>,
    },

    /// List configured rules as JSON, highest priority first
    Rules {
        /// Only rules that apply to this agent
        #[arg(short, long)]
        agent: Option<String>,
    },

    /// Load and validate the configuration, then exit
    Validate,
}

fn parse_operation(value: &str) -> Result<OperationKind, String> {
    OperationKind::try_parse(value).ok_or_else(|| {
        let known: Vec<&str> = OperationKind::all().iter().map(|op| op.as_str()).collect();
        format!("unknown operation '{}' (expected one of: {})", value, known.join(", "))
    })
}

fn init_logging(config: &LoggingConfig, level_override: Option<&str>) {
    let level = level_override.unwrap_or(&config.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match config.format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration before logging; the format comes from it
    let config = load_config(args.config.as_deref())?;
    init_logging(&config.logging, args.log_level.as_deref());

    debug!(
        version = env!("CARGO_PKG_VERSION"),
        agents = config.agents.len(),
        rules = config.rules.len(),
        "Configuration loaded"
    );

    let evaluator = PermissionEvaluator::from_config(&config)
        .inspect_err(|e| error!(error = %e, "Failed to build permission evaluator"))?;

    match args.command {
        Command::Check {
            agent,
            operation,
            resource,
        } => {
            let decision = evaluator
                .evaluate(&agent, operation, resource.as_deref())
                .await;
            println!("{}", serde_json::to_string_pretty(&decision)?);
            if decision.is_allowed() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(DENIED_EXIT_CODE))
            }
        }
        Command::Rules { agent } => {
            let rules: Vec<_> = evaluator
                .rules()
                .list()
                .into_iter()
                .filter(|rule| agent.as_deref().is_none_or(|id| rule.applies_to_agent(id)))
                .collect();
            println!("{}", serde_json::to_string_pretty(&rules)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Validate => {
            info!("Configuration is valid");
            println!(
                "Configuration OK: {} agents, {} rules",
                evaluator.agent_ids().len(),
                evaluator.rules().len()
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}
