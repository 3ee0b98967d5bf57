// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;

use chrono::{DateTime, Days, NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::config::MessagingConfig;
use crate::discover::{DiscoveryWindow, discover_show_episodes};
use crate::error::{PlatformError, RunError};
use crate::notify::{MAX_LISTED_SHOWS, Messenger, format_show_list};
use crate::platform::{PodcastPlatform, Show};
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::state::State;

/// Page size used when listing followed shows and saved episodes
pub const LIBRARY_PAGE_SIZE: usize = 50;

/// Options for a single run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Oldest release still eligible, in days before today
    pub lookback_days: u32,
    /// Maximum number of recent episodes inspected per show
    pub episodes_per_show: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            lookback_days: 7,
            episodes_per_show: 20,
        }
    }
}

/// Messaging client together with the settings to address it
#[derive(Clone, Copy)]
pub struct Notifier<'a> {
    pub messenger: &'a dyn Messenger,
    pub config: &'a MessagingConfig,
}

/// An episode added during the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedEpisode {
    pub show_name: String,
    pub episode_id: String,
    pub title: String,
}

/// What happened to the summary notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    /// Messaging is not configured
    NotConfigured,
    /// Discovery failed for every show, so no summary was sent
    Skipped,
    Sent { template: String },
    Failed { template: String, error: String },
}

/// Result of a run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Updated state, to be persisted by the caller
    pub state: State,
    /// Episodes successfully added, in the order they were saved
    pub added: Vec<AddedEpisode>,
    /// Number of followed shows
    pub shows_scanned: usize,
    /// Shows whose episodes could not be listed (show name, error message)
    pub failed_shows: Vec<(String, String)>,
    /// Episodes that could not be saved (episode title, error message)
    pub failed_saves: Vec<(String, String)>,
    pub notification: NotificationOutcome,
}

/// Queue newly released episodes of all followed shows.
///
/// This is the main entry point for the library. It:
/// 1. Lists all followed shows and the current saved episodes
/// 2. Selects new episodes per show against its watermark and the lookback window
/// 3. Saves them and advances each show's watermark
/// 4. Sends a summary notification if messaging is configured
///
/// Per-show and per-episode failures are recorded in the report and do not
/// abort the run. The returned state carries the advanced watermarks and the
/// run timestamp.
pub async fn run_autosave<P: PodcastPlatform + ?Sized>(
    platform: &P,
    notifier: Option<Notifier<'_>>,
    mut state: State,
    options: &RunOptions,
    now: DateTime<Utc>,
    reporter: SharedProgressReporter,
) -> Result<RunReport, RunError> {
    let today = now.date_naive();
    let earliest = today
        .checked_sub_days(Days::new(u64::from(options.lookback_days)))
        .unwrap_or(NaiveDate::MIN);

    match state.last_run {
        Some(last_run) => info!(%last_run, lookback_start = %earliest, "incremental run"),
        None => info!(lookback_start = %earliest, "first run"),
    }

    let shows = list_all_shows(platform).await.map_err(RunError::ListShows)?;
    let mut saved = list_all_saved_episodes(platform)
        .await
        .map_err(RunError::ListSavedEpisodes)?;

    info!(
        shows = shows.len(),
        saved_episodes = saved.len(),
        tracked_shows = state.show_count(),
        "loaded library"
    );
    reporter.report(ProgressEvent::LibraryLoaded {
        show_count: shows.len(),
        saved_episode_count: saved.len(),
    });

    let mut added = Vec::new();
    let mut failed_shows = Vec::new();
    let mut failed_saves = Vec::new();

    for (show_index, show) in shows.iter().enumerate() {
        reporter.report(ProgressEvent::ScanningShow {
            show_name: show.name.clone(),
            show_index,
            total_shows: shows.len(),
        });

        let window = DiscoveryWindow {
            watermark: state.watermark(&show.id),
            earliest,
        };
        let since = state.get_watermark(&show.id, earliest);

        let discovery = match discover_show_episodes(
            platform,
            &show.id,
            window,
            options.episodes_per_show,
            &saved,
        )
        .await
        {
            Ok(discovery) => discovery,
            Err(e) => {
                warn!(
                    show = %show.name,
                    show_id = %show.id,
                    error = %e,
                    "failed to list episodes"
                );
                reporter.report(ProgressEvent::ShowFailed {
                    show_name: show.name.clone(),
                    error: e.to_string(),
                });
                failed_shows.push((show.name.clone(), e.to_string()));
                continue;
            }
        };

        info!(
            show = %show.name,
            new = discovery.new_episodes.len(),
            inspected = discovery.inspected,
            %since,
            "scanned show"
        );
        reporter.report(ProgressEvent::ShowScanned {
            show_name: show.name.clone(),
            new_episodes: discovery.new_episodes.len(),
            since,
        });

        let newest_observed = discovery.newest_observed;

        for episode in discovery.new_episodes {
            // Another show may have listed the same episode earlier in this run
            if saved.contains(&episode.id) {
                debug!(episode_id = %episode.id, "episode already saved in this run");
                continue;
            }

            match platform.save_episode(&episode.id).await {
                Ok(()) => {
                    info!(
                        show = %show.name,
                        episode = %episode.title,
                        episode_id = %episode.id,
                        "saved episode"
                    );
                    reporter.report(ProgressEvent::EpisodeSaved {
                        show_name: show.name.clone(),
                        episode_title: episode.title.clone(),
                        release_date: episode.release_date,
                    });
                    saved.insert(episode.id.clone());
                    added.push(AddedEpisode {
                        show_name: show.name.clone(),
                        episode_id: episode.id,
                        title: episode.title,
                    });
                }
                Err(e) => {
                    warn!(
                        show = %show.name,
                        episode_id = %episode.id,
                        error = %e,
                        "failed to save episode"
                    );
                    reporter.report(ProgressEvent::EpisodeSaveFailed {
                        show_name: show.name.clone(),
                        episode_title: episode.title.clone(),
                        error: e.to_string(),
                    });
                    failed_saves.push((episode.title, e.to_string()));
                }
            }
        }

        if let Some(newest) = newest_observed
            && state.advance_watermark(&show.id, newest)
        {
            debug!(show = %show.name, watermark = %newest, "advanced watermark");
        }
    }

    if added.is_empty() {
        info!("no new episodes to save");
    } else {
        info!(count = added.len(), "saved new episodes");
    }

    let discovery_failed = !shows.is_empty() && failed_shows.len() == shows.len();
    let notification = match notifier {
        Some(notifier) => send_summary(notifier, &added, discovery_failed, &reporter).await,
        None => {
            debug!("messaging not configured, skipping notification");
            NotificationOutcome::NotConfigured
        }
    };

    state.record_run(now);

    reporter.report(ProgressEvent::RunCompleted {
        added_count: added.len(),
        failed_shows: failed_shows.len(),
        failed_saves: failed_saves.len(),
    });

    Ok(RunReport {
        state,
        added,
        shows_scanned: shows.len(),
        failed_shows,
        failed_saves,
        notification,
    })
}

/// List every followed show, following pagination to the end
async fn list_all_shows<P: PodcastPlatform + ?Sized>(
    platform: &P,
) -> Result<Vec<Show>, PlatformError> {
    let mut shows = Vec::new();
    let mut offset = 0;

    loop {
        let page = platform
            .list_followed_shows(offset, LIBRARY_PAGE_SIZE)
            .await?;
        let received = page.items.len();
        shows.extend(page.items);

        if !page.has_next || received == 0 {
            break;
        }
        offset += received;
    }

    Ok(shows)
}

/// Collect the ids of every saved episode, following pagination to the end
async fn list_all_saved_episodes<P: PodcastPlatform + ?Sized>(
    platform: &P,
) -> Result<HashSet<String>, PlatformError> {
    let mut ids = HashSet::new();
    let mut offset = 0;

    loop {
        let page = platform
            .list_saved_episodes(offset, LIBRARY_PAGE_SIZE)
            .await?;
        let received = page.items.len();
        ids.extend(page.items);

        if !page.has_next || received == 0 {
            break;
        }
        offset += received;
    }

    Ok(ids)
}

async fn send_summary(
    notifier: Notifier<'_>,
    added: &[AddedEpisode],
    discovery_failed: bool,
    reporter: &SharedProgressReporter,
) -> NotificationOutcome {
    let config = notifier.config;

    let (template, parameters) = if !added.is_empty() {
        let mut show_names: Vec<&str> = Vec::new();
        for episode in added {
            if !show_names.contains(&episode.show_name.as_str()) {
                show_names.push(&episode.show_name);
            }
        }
        (
            config.template_added.as_str(),
            vec![
                added.len().to_string(),
                format_show_list(&show_names, MAX_LISTED_SHOWS),
            ],
        )
    } else if discovery_failed {
        info!("every show failed, not sending a summary");
        return NotificationOutcome::Skipped;
    } else {
        (config.template_none.as_str(), Vec::new())
    };

    match notifier
        .messenger
        .send_template(&config.recipient, template, &config.language, &parameters)
        .await
    {
        Ok(()) => {
            info!(template, "notification sent");
            reporter.report(ProgressEvent::NotificationSent {
                template: template.to_string(),
            });
            NotificationOutcome::Sent {
                template: template.to_string(),
            }
        }
        Err(e) => {
            warn!(template, error = %e, "notification failed");
            reporter.report(ProgressEvent::NotificationFailed {
                template: template.to_string(),
                error: e.to_string(),
            });
            NotificationOutcome::Failed {
                template: template.to_string(),
                error: e.to_string(),
            }
        }
    }
}
