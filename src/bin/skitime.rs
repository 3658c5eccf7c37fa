use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use skitime::{MonitorStatus, Race, RefreshRate, Settings, Skitime, TimerView};

#[derive(Parser)]
#[command(name = "skitime")]
#[command(about = "Race timing driven by command-block chat in a game server log")]
#[command(version)]
struct Cli {
    /// YAML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Tail a local log file instead of the configured SFTP path
    #[arg(short, long)]
    local: Option<PathBuf>,

    /// Seconds between timer table prints
    #[arg(long, default_value = "5")]
    table_every: u64,

    /// Only record chat, never act on it
    #[arg(long)]
    no_auto: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(None) => ExitCode::SUCCESS,
        Ok(Some(reason)) => {
            eprintln!("monitoring stopped: {}", reason);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("error: {:#}", e);
            if let Some(timing) = e.downcast_ref::<skitime::TimingError>() {
                for hint in timing.recovery_suggestions() {
                    eprintln!("  - {}", hint);
                }
            }
            ExitCode::FAILURE
        }
    }
}

/// Returns the fatal monitor reason, if monitoring ended on its own.
async fn run(cli: Cli) -> Result<Option<String>> {
    let settings = match &cli.config {
        Some(path) => Settings::load(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => {
            let mut settings = Settings::default();
            settings.apply_env();
            settings
        }
    };

    let race = match &cli.local {
        Some(path) => Skitime::open(path, &settings)
            .await
            .with_context(|| format!("opening {}", path.display()))?,
        None => Skitime::connect(&settings)
            .await
            .with_context(|| format!("connecting to {}", settings.connection.host))?,
    };
    if cli.no_auto {
        race.session
            .send(skitime::SessionCommand::SetAutoMode(false))
            .await?;
    }

    let fatal = supervise(race, Duration::from_secs(cli.table_every.max(1))).await;
    Ok(fatal)
}

async fn supervise(mut race: Race, table_every: Duration) -> Option<String> {
    let mut table = race.session.display(RefreshRate::Hz(1));
    let mut next_table = tokio::time::Instant::now();
    let mut fatal = None;
    let mut monitor_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted, shutting down");
                break;
            }
            entry = race.session.audit.recv() => match entry {
                Ok(entry) => println!("{}", entry),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Audit output fell behind"),
                Err(RecvError::Closed) => break,
            },
            changed = race.monitor.changed(), if monitor_open => {
                if changed.is_err() {
                    monitor_open = false;
                    continue;
                }
                let status = race.monitor.borrow_and_update().clone();
                if let MonitorStatus::Failed(reason) = status {
                    error!(%reason, "Monitoring failed");
                    fatal = Some(reason);
                    break;
                }
            }
            views = table.next() => match views {
                Some(views) if tokio::time::Instant::now() >= next_table => {
                    print_table(&views);
                    next_table = tokio::time::Instant::now() + table_every;
                }
                Some(_) => {}
                None => break,
            },
        }
    }

    if let Some(session) = race.stop().await {
        let dispatcher = session.dispatcher();
        print_table(&session.snapshot().views());
        println!(
            "processed {} ignored {} accuracy {:.1}%",
            dispatcher.processed_count(),
            dispatcher.ignored_count(),
            dispatcher.accuracy()
        );
    }
    fatal
}

fn print_table(views: &[TimerView]) {
    println!("{:>3}  {:<20} {:>12}  {:>4}  {}", "#", "name", "time", "laps", "state");
    for view in views {
        println!(
            "{:>3}  {:<20} {:>12}  {:>4}  {}",
            view.number,
            view.name,
            view.formatted,
            view.laps,
            if view.running { "running" } else { "stopped" }
        );
    }
}
