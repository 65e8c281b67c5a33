//! pickbot - a Slack bot that picks a random channel or group member.

mod config;
mod jobs;
mod parser;
mod picker;
mod server;
mod slack;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::config::loader::{get_config_path, get_data_dir, load_config, save_config};
use crate::config::schema::Config;
use crate::jobs::runner::JobRunner;
use crate::jobs::service::JobService;
use crate::server::{router, AppState};
use crate::slack::client::{SlackApi, SlackClient};
use crate::slack::format::describe_trigger;

const VERSION: &str = "0.1.0";
const LOGO: &str = "\u{1F3B2}"; // game die emoji

#[derive(Parser)]
#[command(name = "pickbot", about = "pickbot - Slack random picker", version = VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize pickbot configuration.
    Onboard,
    /// Start the webhook server and job runner.
    Serve {
        /// Override the configured port.
        #[arg(short, long)]
        port: Option<u16>,
        /// Verbose logging.
        #[arg(short, long)]
        verbose: bool,
    },
    /// Show pickbot status.
    Status,
    /// Inspect scheduled picks.
    Jobs {
        #[command(subcommand)]
        action: JobsAction,
    },
}

#[derive(Subcommand)]
enum JobsAction {
    /// List scheduled picks.
    List,
    /// Remove a scheduled pick.
    Remove {
        /// Job ID to remove.
        job_id: String,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Onboard => cmd_onboard(),
        Commands::Serve { port, verbose } => cmd_serve(port, verbose),
        Commands::Status => cmd_status(),
        Commands::Jobs { action } => match action {
            JobsAction::List => cmd_jobs_list(),
            JobsAction::Remove { job_id } => cmd_jobs_remove(job_id),
        },
    }
}

// ============================================================================
// Onboard
// ============================================================================

fn cmd_onboard() {
    let config_path = get_config_path();

    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
        return;
    }

    let config = Config::default();
    save_config(&config, None);
    println!("  Created config at {}", config_path.display());

    println!("\n{} pickbot is ready!", LOGO);
    println!("\nNext steps:");
    println!(
        "  1. Add your Slack bot token and signing secret to {}",
        config_path.display()
    );
    println!("     (or export SLACK_BOT_TOKEN and SLACK_SIGNING_SECRET)");
    println!("  2. Point your Slack app's slash command at /slashcommand");
    println!("     and its interactivity request URL at /actions");
    println!("  3. Run: pickbot serve");
}

// ============================================================================
// Serve
// ============================================================================

fn cmd_serve(port: Option<u16>, verbose: bool) {
    if verbose {
        eprintln!("Verbose mode enabled");
    }

    let config = load_config(None);
    if config.slack.bot_token.is_empty() {
        eprintln!("Error: No Slack bot token configured.");
        eprintln!(
            "Set one in {} or export SLACK_BOT_TOKEN",
            get_config_path().display()
        );
        std::process::exit(1);
    }
    if config.slack.signing_secret.is_empty() {
        eprintln!("Error: No Slack signing secret configured.");
        std::process::exit(1);
    }

    let runtime = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");

    runtime.block_on(async {
        let mut service = JobService::new(job_store_path());
        service.refresh_next_runs(Utc::now());
        let job_count = service.list_jobs().len();

        let jobs = Arc::new(Mutex::new(service));
        let slack: Arc<dyn SlackApi> = Arc::new(SlackClient::new(&config.slack.bot_token));
        let runner = JobRunner::new(
            jobs.clone(),
            slack.clone(),
            Duration::from_secs(config.scheduler.tick_secs.max(1)),
        );

        let addr = format!(
            "{}:{}",
            config.server.host,
            port.unwrap_or(config.server.port)
        );
        let state = Arc::new(AppState { config, jobs, slack });
        let app = router(state);

        println!("{} Starting pickbot on {}...", LOGO, addr);
        if job_count > 0 {
            println!("  Jobs: {} scheduled", job_count);
        }

        let listener = match tokio::net::TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(e) => {
                eprintln!("Error: cannot bind {}: {}", addr, e);
                std::process::exit(1);
            }
        };

        let server = async move { axum::serve(listener, app).await };
        tokio::select! {
            result = server => {
                if let Err(e) = result {
                    error!("Server ended: {}", e);
                }
            }
            _ = runner.run() => {
                info!("Job runner ended");
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down...");
            }
        }
    });
}

// ============================================================================
// Status
// ============================================================================

fn cmd_status() {
    let config_path = get_config_path();
    let config = load_config(None);

    println!("{} pickbot Status\n", LOGO);
    println!(
        "Config: {} [{}]",
        config_path.display(),
        if config_path.exists() { "ok" } else { "missing" }
    );
    println!(
        "Bot token: {}",
        if config.slack.bot_token.is_empty() { "not set" } else { "configured" }
    );
    println!(
        "Signing secret: {}",
        if config.slack.signing_secret.is_empty() { "not set" } else { "configured" }
    );

    let service = JobService::new(job_store_path());
    println!("Scheduled picks: {}", service.list_jobs().len());
}

// ============================================================================
// Jobs
// ============================================================================

fn cmd_jobs_list() {
    let service = JobService::new(job_store_path());
    let jobs = service.list_jobs();

    if jobs.is_empty() {
        println!("No scheduled picks.");
        return;
    }

    println!("Scheduled Picks\n");
    for job in &jobs {
        let next_run = job
            .state
            .next_run_at_ms
            .and_then(|ms| chrono::DateTime::from_timestamp_millis(ms))
            .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{}", job.id);
        println!(
            "    pick from {} to {} {} ({}), next run {}",
            job.target,
            job.task,
            describe_trigger(&job.trigger),
            job.timezone,
            next_run
        );
    }
}

fn cmd_jobs_remove(job_id: String) {
    let mut service = JobService::new(job_store_path());
    if service.remove_job(&job_id) {
        println!("  Removed {}", job_id);
    } else {
        eprintln!("Job {} not found", job_id);
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn job_store_path() -> std::path::PathBuf {
    get_data_dir().join("jobs").join("jobs.json")
}
