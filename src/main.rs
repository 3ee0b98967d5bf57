use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use colored::Colorize;
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use podqueue::{
    Config, NoopReporter, Notifier, ProgressEvent, ProgressReporter, RunOptions,
    SharedProgressReporter, SpotifyAuth, SpotifyClient, StateStore, TOKEN_CACHE_FILENAME,
    WhatsAppClient, run_autosave,
};

const LOG_FILENAME: &str = "autosave.log";

// Emoji with fallback for terminals without Unicode support
static HEADPHONES: Emoji<'_, '_> = Emoji("🎧 ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static MESSAGE: Emoji<'_, '_> = Emoji("💬 ", "[>] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "x ");

/// Queue newly released podcast episodes into Spotify's "Your Episodes"
#[derive(Parser, Debug)]
#[command(name = "podqueue")]
#[command(about = "Queue newly released podcast episodes into Spotify's \"Your Episodes\"")]
#[command(version)]
struct Args {
    /// Directory holding the state file, token cache, and log file
    #[arg(long, env = "PODQUEUE_DATA_DIR", default_value = "spotify_autosave")]
    data_dir: PathBuf,

    /// Quiet mode - suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

/// Progress reporter using an indicatif spinner for terminal output
struct IndicatifReporter {
    main_bar: ProgressBar,
}

impl IndicatifReporter {
    fn new() -> Self {
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());

        let main_bar = ProgressBar::new_spinner();
        main_bar.set_style(style);
        main_bar.enable_steady_tick(std::time::Duration::from_millis(100));

        Self { main_bar }
    }
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::LibraryLoaded {
                show_count,
                saved_episode_count,
            } => {
                self.main_bar.println(format!(
                    "{HEADPHONES}{} followed shows, {} saved episodes",
                    show_count.to_string().cyan(),
                    saved_episode_count.to_string().cyan()
                ));
            }

            ProgressEvent::ScanningShow {
                show_name,
                show_index,
                total_shows,
            } => {
                self.main_bar.set_message(format!(
                    "{SEARCH}[{}/{}] {}",
                    (show_index + 1).to_string().cyan(),
                    total_shows.to_string().cyan(),
                    truncate_title(&show_name, 40)
                ));
            }

            ProgressEvent::ShowScanned {
                show_name,
                new_episodes,
                since,
            } => {
                if new_episodes > 0 {
                    self.main_bar.println(format!(
                        "  {} +{} new since {}",
                        show_name.bold(),
                        new_episodes.to_string().yellow(),
                        since.to_string().dimmed()
                    ));
                }
            }

            ProgressEvent::ShowFailed { show_name, error } => {
                self.main_bar.println(format!(
                    "  {FAILURE}{} - {}",
                    truncate_title(&show_name, 30).red(),
                    error.red()
                ));
            }

            ProgressEvent::EpisodeSaved {
                episode_title,
                release_date,
                ..
            } => {
                let released = release_date
                    .map(|date| format!(" ({date})"))
                    .unwrap_or_default();
                self.main_bar.println(format!(
                    "    {SUCCESS}{}{}",
                    truncate_title(&episode_title, 50).green(),
                    released.dimmed()
                ));
            }

            ProgressEvent::EpisodeSaveFailed {
                episode_title,
                error,
                ..
            } => {
                self.main_bar.println(format!(
                    "    {FAILURE}{} - {}",
                    truncate_title(&episode_title, 30).red(),
                    error.red()
                ));
            }

            ProgressEvent::NotificationSent { template } => {
                self.main_bar
                    .println(format!("{MESSAGE}Sent summary ({})", template.cyan()));
            }

            ProgressEvent::NotificationFailed { template, error } => {
                self.main_bar.println(format!(
                    "{FAILURE}Summary {} not sent - {}",
                    template.yellow(),
                    error.red()
                ));
            }

            ProgressEvent::RunCompleted {
                added_count,
                failed_shows,
                failed_saves,
            } => {
                self.main_bar.finish_and_clear();
                let failed = failed_shows + failed_saves;
                println!(
                    "\n{PARTY}{} {} added, {} failed",
                    "Run complete:".bold().green(),
                    added_count.to_string().green().bold(),
                    if failed > 0 {
                        failed.to_string().red().bold()
                    } else {
                        failed.to_string().green()
                    }
                );
            }
        }
    }
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let kept: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Log to `<data_dir>/autosave.log` and to stderr.
///
/// While the progress display is active the console only shows warnings.
fn init_logging(data_dir: &Path, progress_display: bool) -> Option<WorkerGuard> {
    let mut guard = None;
    let file_layer = match RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_FILENAME)
        .build(data_dir)
    {
        Ok(appender) => {
            let (writer, file_guard) = tracing_appender::non_blocking(appender);
            guard = Some(file_guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_filter(env_filter()),
            )
        }
        Err(err) => {
            eprintln!("Warning: failed to open log file: {err}");
            None
        }
    };

    let console_filter = if progress_display {
        EnvFilter::new("warn")
    } else {
        env_filter()
    };
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .init();

    guard
}

async fn run(args: &Args, progress_display: bool) -> Result<()> {
    let config = Config::from_env().context("Invalid configuration")?;

    let auth = SpotifyAuth::new(
        config.spotify.clone(),
        args.data_dir.join(TOKEN_CACHE_FILENAME),
    );
    let access_token = auth.access_token().await.with_context(|| {
        format!(
            "Could not obtain a Spotify access token (cache {})",
            auth.cache_path().display()
        )
    })?;

    let platform = SpotifyClient::new(access_token, config.market.clone());
    let whatsapp = config
        .messaging
        .as_ref()
        .map(|m| WhatsAppClient::new(&m.access_token, &m.phone_number_id));
    let notifier = config
        .messaging
        .as_ref()
        .zip(whatsapp.as_ref())
        .map(|(config, messenger)| Notifier { messenger, config });

    let options = RunOptions {
        lookback_days: config.lookback_days,
        episodes_per_show: config.episodes_per_show,
    };

    let reporter: SharedProgressReporter = if progress_display {
        Arc::new(IndicatifReporter::new())
    } else {
        NoopReporter::shared()
    };

    let store = StateStore::in_dir(&args.data_dir);
    let state = store.load();

    let report = run_autosave(&platform, notifier, state, &options, Utc::now(), reporter)
        .await
        .context("Run aborted")?;

    if let Err(e) = store.save(&report.state) {
        warn!(error = %e, "failed to write state file, the next run will repeat work");
    }

    info!(
        added = report.added.len(),
        shows = report.shows_scanned,
        failed_shows = report.failed_shows.len(),
        failed_saves = report.failed_saves.len(),
        "run finished"
    );

    if progress_display {
        let failures = report.failed_shows.iter().chain(&report.failed_saves);
        if failures.clone().next().is_some() {
            println!("\n{}", "Failures:".red().bold());
            for (name, error) in failures {
                println!("  {}{} - {}", CROSS, name.yellow(), error.dimmed());
            }
        }
        println!();
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    std::fs::create_dir_all(&args.data_dir).with_context(|| {
        format!(
            "Failed to create data directory {}",
            args.data_dir.display()
        )
    })?;

    let progress_display = !args.quiet && console::user_attended();
    let _log_guard = init_logging(&args.data_dir, progress_display);

    info!(data_dir = %args.data_dir.display(), "run started");

    let result = run(&args, progress_display).await;
    if let Err(e) = &result {
        error!(error = %format!("{e:#}"), "fatal error");
    }
    result
}
