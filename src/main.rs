// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use reelctl::{
    format_duration, format_size, Config, JobService, NotificationQueue, ReeldClient,
    SessionManager, SessionStatus, SessionUpdate, Severity, BEST_FORMAT,
};

/// How long to wait for the post-download history refresh signal before
/// giving up on showing the listing.
const HISTORY_WAIT_SECS: u64 = 5;

#[derive(Parser)]
#[command(
    name = "reelctl",
    version,
    about = "Terminal controller for a self-hosted video download service"
)]
struct Cli {
    /// Base URL of the download service (overrides REELD_URL and config)
    #[arg(long, global = true, value_name = "URL")]
    url: Option<String>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a video URL and list selectable formats
    Info {
        /// Video page URL
        url: String,
    },
    /// Start a download and watch it to completion
    Get {
        /// Video page URL
        url: String,

        /// Format selector from `reelctl info`
        #[arg(short, long, default_value = BEST_FORMAT)]
        format: String,
    },
    /// List completed downloads on the service
    List,
}

/// Spinner helpers for consistent progress indicators
mod spinner {
    use indicatif::{ProgressBar, ProgressStyle};
    use std::time::Duration;

    /// Create a spinner with consistent styling
    pub fn create(message: &str) -> ProgressBar {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap(),
        );
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(80));
        spinner
    }

    /// Finish spinner with success message
    pub fn finish_success(spinner: &ProgressBar, message: &str) {
        spinner.finish_and_clear();
        println!("\x1b[32m[OK]\x1b[0m {}", message);
    }

    /// Finish spinner with error message
    pub fn finish_error(spinner: &ProgressBar, message: &str) {
        spinner.finish_and_clear();
        println!("\x1b[31m[X]\x1b[0m {}", message);
    }
}

fn init_tracing(verbosity: u8) {
    let default_filter = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load();
    let base_url = config.resolve_service_url(cli.url.clone());
    let client = ReeldClient::with_url(base_url);

    let result = match cli.command {
        Command::Info { url } => cmd_info(&client, &url).await,
        Command::Get { url, format } => cmd_get(client, &url, &format).await,
        Command::List => cmd_list(&client).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "[X]".red(), e);
        std::process::exit(1);
    }
}

async fn cmd_info(client: &ReeldClient, url: &str) -> Result<()> {
    let spinner = spinner::create("Analyzing video URL...");
    let info = match client.analyze(url).await {
        Ok(info) => {
            spinner::finish_success(&spinner, "Video analyzed");
            info
        }
        Err(e) => {
            spinner::finish_error(&spinner, "Analyze failed");
            return Err(e.into());
        }
    };

    println!();
    println!("{}", info.title.bold());
    match info.duration_seconds {
        Some(seconds) => println!("Duration: {}", format_duration(seconds)),
        None => println!("Duration: unknown"),
    }
    if let Some(thumbnail) = &info.thumbnail_url {
        println!("Thumbnail: {}", thumbnail.dimmed());
    }

    println!();
    println!("{}", "Available formats:".bold());
    for choice in info.format_menu() {
        println!("  {:>8}  {}", choice.selector.cyan(), choice.label);
    }

    println!();
    println!(
        "Download with: {}",
        format!("reelctl get '{}' --format <ID>", url).cyan()
    );
    Ok(())
}

async fn cmd_get(client: ReeldClient, url: &str, format: &str) -> Result<()> {
    let notices = NotificationQueue::new();
    let manager = SessionManager::new(client.clone(), notices.clone());
    let mut updates = manager.subscribe();
    let mut history = manager.subscribe_history();

    let id = manager.start(url, format).await?;
    tracing::info!(%id, %format, "download started");

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40.cyan/blue} {pos:>3}% {msg}")
            .unwrap(),
    );
    bar.set_message("waiting for worker...");

    loop {
        updates.changed().await?;
        let update = updates.borrow_and_update().clone();

        match update {
            SessionUpdate::Idle | SessionUpdate::Starting => {}
            SessionUpdate::Failed { message } => {
                bar.abandon();
                anyhow::bail!(message);
            }
            SessionUpdate::Session(session) => match session.status {
                SessionStatus::Starting => bar.set_message("waiting for worker..."),
                SessionStatus::Downloading => {
                    bar.set_position(session.percent.round() as u64);
                    let mut message = session.speed_label.unwrap_or_default();
                    if let Some(name) = session.filename {
                        if !message.is_empty() {
                            message.push_str("  ");
                        }
                        message.push_str(&name);
                    }
                    bar.set_message(message);
                }
                SessionStatus::Finished => {
                    bar.set_position(100);
                    bar.finish_with_message("complete");
                    break;
                }
                SessionStatus::Error => {
                    bar.abandon();
                    anyhow::bail!(session
                        .error_message
                        .unwrap_or_else(|| "Download failed".to_string()));
                }
            },
        }
    }

    print_notices(&notices);

    // The manager bumps the history counter once the service's file write
    // has settled; show the fresh listing then.
    let refreshed = tokio::time::timeout(
        Duration::from_secs(HISTORY_WAIT_SECS),
        history.changed(),
    )
    .await;
    if matches!(refreshed, Ok(Ok(()))) {
        println!();
        render_listing(&client).await?;
    }

    Ok(())
}

async fn cmd_list(client: &ReeldClient) -> Result<()> {
    render_listing(client).await
}

async fn render_listing(client: &ReeldClient) -> Result<()> {
    let files = client.list_downloads().await?;

    if files.is_empty() {
        println!("No downloads yet");
        return Ok(());
    }

    println!("{}", "Downloads:".bold());
    let name_width = files.iter().map(|f| f.name.len()).max().unwrap_or(0).min(48);
    for file in files {
        println!(
            "  {:<width$}  {:>10}  {}",
            file.name,
            format_size(file.size),
            file.modified.dimmed(),
            width = name_width
        );
    }
    Ok(())
}

fn print_notices(notices: &NotificationQueue) {
    for entry in notices.drain() {
        match entry.severity {
            Severity::Success => println!("{} {}", "[OK]".green(), entry.message),
            Severity::Info => println!("{} {}", "[i]".cyan(), entry.message),
            Severity::Error => println!("{} {}", "[X]".red(), entry.message),
        }
    }
}
