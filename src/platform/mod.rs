// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod spotify;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::PlatformError;

pub use spotify::{SpotifyClient, parse_release_date};

/// A followed podcast show
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Show {
    pub id: String,
    pub name: String,
}

/// A single podcast episode as listed by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Episode {
    pub id: String,
    pub show_id: String,
    pub title: String,
    /// `None` when the platform reports no parseable release date
    pub release_date: Option<NaiveDate>,
}

/// One page of a paginated listing
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Whether the platform reports a further page after this one
    pub has_next: bool,
}

/// The podcast platform operations needed to queue new episodes.
///
/// Paginated listings are driven by the caller through `offset` and `limit`.
#[async_trait]
pub trait PodcastPlatform: Send + Sync {
    /// List one page of the shows the account follows
    async fn list_followed_shows(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Page<Show>, PlatformError>;

    /// List up to `limit` of a show's most recent episodes, newest first
    async fn list_show_episodes(
        &self,
        show_id: &str,
        limit: usize,
    ) -> Result<Vec<Episode>, PlatformError>;

    /// List one page of episode ids already in the account's saved episodes
    async fn list_saved_episodes(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Page<String>, PlatformError>;

    /// Add a single episode to the account's saved episodes
    async fn save_episode(&self, episode_id: &str) -> Result<(), PlatformError>;
}
