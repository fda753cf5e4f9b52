mod subcommands;

#[cfg(test)]
mod tests;

use crate::config::{Config, load_config};
use crate::maturation::MaturationService;
use crate::schedule::ScheduleService;
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "maturation")]
#[command(about = "Conversation maturation orchestrator")]
#[command(version)]
pub struct Cli {
    /// Path to config.json (defaults to ~/.maturation/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP gateway and the schedule service
    Serve,
    /// Run one maturation in the foreground (Ctrl+C stops it)
    Run(RunArgs),
    /// List ready endpoints and their phone numbers
    Endpoints {
        /// Only servers visible to this user
        #[arg(long)]
        user: Option<String>,
    },
    /// Manage scheduled maturations
    Schedule {
        #[command(subcommand)]
        cmd: ScheduleCommands,
    },
}

#[derive(Args, Clone)]
struct RunArgs {
    /// Endpoint keys (`server:session`) or session names; comma separated or repeated.
    /// Empty selects every ready endpoint.
    #[arg(long, short = 's', value_delimiter = ',')]
    sessions: Vec<String>,
    #[arg(long, short = 'r', default_value_t = 1)]
    rounds: u32,
    #[arg(long, short = 'm', default_value_t = 30)]
    minutes: u64,
    #[arg(long, short = 'p', default_value_t = 0)]
    pause: u64,
    /// Minimum seconds between cycles
    #[arg(long, default_value_t = 0)]
    cadence: u64,
    /// Fallback message template (repeatable)
    #[arg(long = "template", short = 't')]
    templates: Vec<String>,
    #[arg(long)]
    id: Option<String>,
    #[arg(long)]
    user: Option<String>,
}

#[derive(Subcommand)]
enum ScheduleCommands {
    /// List schedules
    List,
    /// Add a schedule
    Add {
        #[arg(long, short = 'n')]
        name: String,
        /// Start time: RFC 3339 or local `YYYY-MM-DD HH:MM:SS`
        #[arg(long)]
        at: String,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Remove a schedule
    Remove {
        #[arg(long)]
        id: String,
    },
    /// Cancel a schedule (stops its run if one is active)
    Cancel {
        #[arg(long)]
        id: String,
    },
    /// Pause a scheduled maturation
    Pause {
        #[arg(long)]
        id: String,
    },
    /// Resume a paused schedule
    Resume {
        #[arg(long)]
        id: String,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve => {
            serve(config).await?;
        }
        Commands::Run(args) => {
            subcommands::run_command(&config, args).await?;
        }
        Commands::Endpoints { user } => {
            subcommands::endpoints_command(&config, user.as_deref()).await?;
        }
        Commands::Schedule { cmd } => {
            subcommands::schedule_command(&config, cmd).await?;
        }
    }

    Ok(())
}

async fn serve(config: Config) -> Result<()> {
    let maturation = MaturationService::from_config(&config);
    maturation.spawn_janitor().await;

    if config.gateway.enabled {
        crate::gateway::start(
            &config.gateway.host,
            config.gateway.port,
            maturation.clone(),
        )
        .await?;
        println!(
            "HTTP API listening on {}:{}",
            config.gateway.host, config.gateway.port
        );
    } else {
        println!("HTTP API server: disabled");
    }

    let schedules = if config.schedules.enabled {
        let service = ScheduleService::new(
            ScheduleService::default_path()?,
            maturation.clone(),
            Duration::from_secs(config.schedules.poll_secs),
        );
        service.start().await;
        Some(service)
    } else {
        None
    };

    println!(
        "Serving {} messaging server(s)",
        config.providers.enabled_servers().count()
    );
    info!("all services started");

    tokio::signal::ctrl_c().await?;
    println!("\nShutting down...");
    maturation.shutdown().await;
    if let Some(schedules) = schedules {
        schedules.stop().await;
    }
    Ok(())
}
