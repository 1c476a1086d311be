//! CLI entry point for meetflow.
//!
//! This binary provides the `meetflow` command with subcommands for
//! validating a configuration and running an offline scenario through
//! the full scheduling workflow.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use meetflow_engine::{ItemOutcome, PollingDriver};
use meetflow_scheduler::{MailWorkspace, MailboxSource, SchedulerConfig, build_graph};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod offline;

use offline::{Scenario, build_offline};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// meetflow — meeting scheduling from inbound email.
#[derive(Parser)]
#[command(
    name = "meetflow",
    version,
    about = "Automated meeting scheduling from inbound email",
    long_about = "Watches a mailbox for scheduling requests, checks calendar \
                  availability, books meetings, and replies to the thread."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a configuration file and verify the workflow graph builds.
    Validate {
        /// Path to the TOML configuration file.
        #[arg(long, default_value = "config/meetflow.toml")]
        config: PathBuf,
    },

    /// Run one offline mailbox pass from a scenario file.
    Run {
        /// Path to the TOML configuration file.
        #[arg(long, default_value = "config/meetflow.toml")]
        config: PathBuf,

        /// Path to the JSON scenario describing mailbox and calendar state.
        #[arg(long)]
        scenario: PathBuf,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // Environment files are optional; a missing one is not an error.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    match cli.command {
        Commands::Validate { config } => cmd_validate(config),
        Commands::Run { config, scenario } => cmd_run(config, scenario).await,
    }
}

// ---------------------------------------------------------------------------
// Subcommand: validate
// ---------------------------------------------------------------------------

fn cmd_validate(config_path: PathBuf) -> Result<()> {
    init_tracing("warn");

    let config = SchedulerConfig::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    let hours = config.working_hours()?;

    // Build against inert offline collaborators; only the wiring is under
    // test here.
    let bundle = build_offline(Scenario::default(), config.calendar.calendar_id.clone());
    let graph = build_graph(bundle.collaborators, hours).context("workflow graph is invalid")?;

    println!();
    println!("  Configuration OK ({})", config_path.display());
    println!("  Authorized user:  {}", config.normalized_user()?);
    println!("  Mailbox:          {}", config.mailbox.username);
    println!("  Calendar:         {}", config.calendar.calendar_id);
    println!(
        "  Working hours:    {:02}:00 to {:02}:00 UTC",
        hours.start_hour(),
        hours.end_hour()
    );
    println!("  Poll interval:    {}s", config.poll_interval_secs);
    println!(
        "  Workflow graph:   {} nodes, {} routes, entry `{}`",
        graph.node_count(),
        graph.route_count(),
        graph.entry()
    );
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: run
// ---------------------------------------------------------------------------

async fn cmd_run(config_path: PathBuf, scenario_path: PathBuf) -> Result<()> {
    init_tracing("info");

    let config = SchedulerConfig::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    let scenario = Scenario::load(&scenario_path)
        .with_context(|| format!("failed to load {}", scenario_path.display()))?;
    info!(
        messages = scenario.entries.len(),
        busy = scenario.busy.len(),
        "scenario loaded"
    );

    let bundle = build_offline(scenario, config.calendar.calendar_id.clone());
    let graph = build_graph(bundle.collaborators, config.working_hours()?)?;

    let workspace = Arc::new(MailWorkspace::new());
    let source = Arc::new(MailboxSource::new(
        bundle.fetcher.clone(),
        config.normalized_user()?,
    ));
    let driver = PollingDriver::new(graph, Arc::clone(&workspace), source, config.poll_interval());

    // One full fetch-and-dispatch cycle; the scenario fetcher is empty
    // afterwards, so there is nothing to keep looping for.
    let report = driver.poll_once().await?;

    println!();
    println!("  Scenario pass complete");
    println!(
        "  Processed: {} ({} completed, {} failed)",
        report.outcomes().len(),
        report.completed(),
        report.failed()
    );
    for (key, outcome) in report.outcomes() {
        match outcome {
            ItemOutcome::Completed { action } => {
                println!("    {key}: completed ({action})");
            }
            ItemOutcome::Failed { error } => {
                println!("    {key}: FAILED: {error}");
            }
        }
    }
    println!("  Replies sent: {}", bundle.mailer.sent().len());
    if !workspace.is_empty() {
        println!(
            "  {} item(s) left in the workspace after failures",
            workspace.len()
        );
    }
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber with the given default log level.
fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
