use super::{RunArgs, ScheduleCommands};
use crate::config::Config;
use crate::maturation::{MaturationService, RunSettings, StartRequest};
use crate::schedule::{MaturationSchedule, ScheduleService};
use crate::utils::now_ms;
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local, NaiveDateTime};
use std::time::Duration;

const PROGRESS_POLL_SECS: u64 = 5;

impl RunArgs {
    pub(super) fn settings(&self) -> RunSettings {
        RunSettings {
            number_of_rounds: self.rounds,
            minutes_per_round: self.minutes,
            pause_minutes_between_rounds: self.pause,
            cadence_seconds: self.cadence,
            message_templates: self.templates.clone(),
        }
    }

    pub(super) fn sessions(&self) -> Vec<String> {
        self.sessions
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub(super) fn start_request(&self) -> StartRequest {
        let mut req = StartRequest::new(self.sessions(), self.settings());
        req.maturation_id = self.id.clone();
        req.user_id = self.user.clone();
        req
    }
}

/// Parse an RFC 3339 timestamp or a local `YYYY-MM-DD HH:MM:SS` into epoch ms.
pub(super) fn parse_start_at(value: &str) -> Result<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.timestamp_millis());
    }
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .context("Invalid date format. Use RFC 3339 or YYYY-MM-DD HH:MM:SS")?;
    naive
        .and_local_timezone(Local)
        .earliest()
        .map(|dt| dt.timestamp_millis())
        .context("Start time does not exist in the local timezone")
}

fn format_ms(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms).map_or_else(
        || "invalid timestamp".to_string(),
        |dt| {
            dt.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        },
    )
}

pub(super) async fn run_command(config: &Config, args: RunArgs) -> Result<()> {
    let service = MaturationService::from_config(config);
    let (ack, mut done) = service.start_with_outcome(args.start_request()).await?;
    let run_id = ack.maturation_id;
    println!("Maturation {} started (Ctrl+C to stop)", run_id);

    let mut printed = 0;
    let mut poll = tokio::time::interval(Duration::from_secs(PROGRESS_POLL_SECS));
    let mut stop_sent = false;
    let outcome = loop {
        tokio::select! {
            outcome = &mut done => break outcome.context("run task ended without an outcome")?,
            _ = poll.tick() => {
                if let Some(progress) = service.progress(&run_id) {
                    for entry in progress.log.iter().skip(printed) {
                        println!(
                            "  {} [{:?}] {}",
                            entry.at.format("%H:%M:%S"),
                            entry.level,
                            entry.message
                        );
                    }
                    printed = progress.log.len();
                }
            }
            _ = tokio::signal::ctrl_c(), if !stop_sent => {
                println!("\nStopping maturation {}...", run_id);
                service.stop(&run_id);
                stop_sent = true;
            }
        }
    };

    println!(
        "Maturation {} ended: {} ({} messages, {} conversations)",
        run_id,
        outcome.status,
        outcome.stats.total_messages,
        outcome.stats.conversations_completed
    );
    if let Some(error) = outcome.error {
        bail!("{}", error);
    }
    Ok(())
}

pub(super) async fn endpoints_command(config: &Config, user: Option<&str>) -> Result<()> {
    let service = MaturationService::from_config(config);
    let endpoints = service.list_endpoints(user).await;
    if endpoints.is_empty() {
        println!("No ready endpoints found.");
        return Ok(());
    }
    println!("Ready endpoints:");
    for endpoint in endpoints {
        println!(
            "  {} [{}] {} - {} ({})",
            endpoint.key(),
            endpoint.provider_kind,
            endpoint.display_name,
            endpoint.phone_number.as_deref().unwrap_or("no phone"),
            endpoint.health_status
        );
    }
    Ok(())
}

pub(super) async fn schedule_command(config: &Config, cmd: ScheduleCommands) -> Result<()> {
    let schedules = ScheduleService::new(
        ScheduleService::default_path()?,
        MaturationService::from_config(config),
        Duration::from_secs(config.schedules.poll_secs),
    );

    match cmd {
        ScheduleCommands::List => {
            let list = schedules.list().await?;
            if list.is_empty() {
                println!("No schedules found.");
            } else {
                println!("Schedules:");
                for s in list {
                    println!(
                        "  [{}] {} - {} (start: {}, {} rounds x {} min)",
                        s.id,
                        s.name,
                        s.status,
                        format_ms(s.start_at_ms),
                        s.settings.number_of_rounds,
                        s.settings.minutes_per_round
                    );
                    if let Some(error) = &s.last_error {
                        println!("      last error: {}", error);
                    }
                }
            }
        }
        ScheduleCommands::Add { name, at, run } => {
            if run.id.is_some() {
                bail!("--id cannot be used with schedules; each launch gets a fresh id");
            }
            let mut schedule = MaturationSchedule::new(
                name,
                run.sessions(),
                run.settings(),
                parse_start_at(&at)?,
                now_ms(),
            );
            schedule.user_id = run.user.clone();
            let added = schedules.add(schedule).await?;
            println!(
                "Schedule {} added (start: {}).",
                added.id,
                format_ms(added.start_at_ms)
            );
        }
        ScheduleCommands::Remove { id } => match schedules.remove(&id).await? {
            Some(s) => println!("Removed schedule: {} ({})", s.name, s.id),
            None => println!("Schedule {} not found.", id),
        },
        ScheduleCommands::Cancel { id } => match schedules.cancel(&id).await? {
            Some(s) => println!("Schedule {} is {}", s.id, s.status),
            None => println!("Schedule {} not found.", id),
        },
        ScheduleCommands::Pause { id } => match schedules.pause(&id).await? {
            Some(s) => println!("Schedule {} is {}", s.id, s.status),
            None => println!("Schedule {} not found.", id),
        },
        ScheduleCommands::Resume { id } => match schedules.resume(&id).await? {
            Some(s) => println!("Schedule {} is {}", s.id, s.status),
            None => println!("Schedule {} not found.", id),
        },
    }
    Ok(())
}
