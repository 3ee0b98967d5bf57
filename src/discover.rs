// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;

use chrono::NaiveDate;

use crate::error::PlatformError;
use crate::platform::{Episode, PodcastPlatform};

/// Bounds that decide whether an episode counts as new
#[derive(Debug, Clone, Copy)]
pub struct DiscoveryWindow {
    /// Only episodes released strictly after this date are new; `None`
    /// when the show has no stored watermark yet
    pub watermark: Option<NaiveDate>,
    /// Oldest release date still eligible (inclusive)
    pub earliest: NaiveDate,
}

/// Result of inspecting one show
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Episodes to save, newest first
    pub new_episodes: Vec<Episode>,
    /// Newest release date among all fetched episodes, qualifying or not
    pub newest_observed: Option<NaiveDate>,
    /// Number of episodes the platform returned
    pub inspected: usize,
}

/// Select the episodes to save from a newest-first listing.
///
/// Episodes without a release date are never selected and do not count
/// towards `newest_observed`.
pub fn select_new_episodes(
    episodes: Vec<Episode>,
    window: DiscoveryWindow,
    saved: &HashSet<String>,
) -> Discovery {
    let inspected = episodes.len();
    let newest_observed = episodes.iter().filter_map(|e| e.release_date).max();

    let new_episodes = episodes
        .into_iter()
        .filter(|episode| {
            episode.release_date.is_some_and(|released| {
                window.watermark.is_none_or(|watermark| released > watermark)
                    && released >= window.earliest
            }) && !saved.contains(&episode.id)
        })
        .collect();

    Discovery {
        new_episodes,
        newest_observed,
        inspected,
    }
}

/// Fetch a show's most recent episodes and select the new ones
pub async fn discover_show_episodes<P: PodcastPlatform + ?Sized>(
    platform: &P,
    show_id: &str,
    window: DiscoveryWindow,
    max_episodes: usize,
    saved: &HashSet<String>,
) -> Result<Discovery, PlatformError> {
    let episodes = platform.list_show_episodes(show_id, max_episodes).await?;
    Ok(select_new_episodes(episodes, window, saved))
}
