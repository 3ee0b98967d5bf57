// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::Market;
use crate::error::PlatformError;

use super::{Episode, Page, PodcastPlatform, Show};

const DEFAULT_BASE_URL: &str = "https://api.spotify.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Largest page size the Web API accepts for show episode listings
const MAX_PAGE_SIZE: usize = 50;

#[derive(Debug, Deserialize)]
struct PagingObject<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SavedShowObject {
    show: ShowObject,
}

#[derive(Debug, Deserialize)]
struct ShowObject {
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct SavedEpisodeObject {
    episode: Option<EpisodeRef>,
}

#[derive(Debug, Deserialize)]
struct EpisodeRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct EpisodeObject {
    id: String,
    #[serde(default)]
    name: String,
    release_date: Option<String>,
}

impl EpisodeObject {
    fn into_episode(self, show_id: &str) -> Episode {
        Episode {
            release_date: self.release_date.as_deref().and_then(parse_release_date),
            id: self.id,
            show_id: show_id.to_string(),
            title: self.name,
        }
    }
}

/// Parse a Spotify release date.
///
/// The Web API reports dates at day, month, or year precision
/// (`2024-03-05`, `2024-03`, `2024`). Coarser precisions resolve to the first
/// day of the period.
pub fn parse_release_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Some(timestamp.date_naive());
    }

    match value.split('-').count() {
        1 => NaiveDate::parse_from_str(&format!("{value}-01-01"), "%Y-%m-%d").ok(),
        2 => NaiveDate::parse_from_str(&format!("{value}-01"), "%Y-%m-%d").ok(),
        _ => NaiveDate::parse_from_str(value, "%Y-%m-%d").ok(),
    }
}

/// Spotify Web API client authenticated with a bearer token
#[derive(Clone)]
pub struct SpotifyClient {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
    market: Market,
}

impl SpotifyClient {
    /// Create a client for the public Web API
    pub fn new(access_token: impl Into<String>, market: Market) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            access_token: access_token.into(),
            market,
        }
    }

    /// Point the client at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, path: &str, query: &[(&str, String)]) -> Result<Url, PlatformError> {
        let mut url = Url::parse(&format!("{}/{}", self.base_url, path))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        url: &Url,
    ) -> Result<reqwest::Response, PlatformError> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| PlatformError::RequestFailed {
                url: url.to_string(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, PlatformError> {
        let response = self.send(self.client.get(url.clone()), &url).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| PlatformError::InvalidResponse {
                url: url.to_string(),
                source: e,
            })
    }
}

#[async_trait]
impl PodcastPlatform for SpotifyClient {
    async fn list_followed_shows(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Page<Show>, PlatformError> {
        let url = self.endpoint(
            "me/shows",
            &[
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
                ("market", self.market.as_query_value().to_string()),
            ],
        )?;
        let page: PagingObject<SavedShowObject> = self.get_json(url).await?;

        Ok(Page {
            has_next: page.next.is_some(),
            items: page
                .items
                .into_iter()
                .map(|saved| {
                    let name = if saved.show.name.is_empty() {
                        saved.show.id.clone()
                    } else {
                        saved.show.name
                    };
                    Show {
                        id: saved.show.id,
                        name,
                    }
                })
                .collect(),
        })
    }

    async fn list_show_episodes(
        &self,
        show_id: &str,
        limit: usize,
    ) -> Result<Vec<Episode>, PlatformError> {
        let mut episodes = Vec::new();
        let mut offset = 0;

        while offset < limit {
            let page_size = (limit - offset).min(MAX_PAGE_SIZE);
            let url = self.endpoint(
                &format!("shows/{show_id}/episodes"),
                &[
                    ("market", self.market.as_query_value().to_string()),
                    ("limit", page_size.to_string()),
                    ("offset", offset.to_string()),
                ],
            )?;
            // Unavailable episodes are reported as `null` entries
            let page: PagingObject<Option<EpisodeObject>> = self.get_json(url).await?;
            let received = page.items.len();

            episodes.extend(
                page.items
                    .into_iter()
                    .flatten()
                    .map(|episode| episode.into_episode(show_id)),
            );

            if received < page_size || page.next.is_none() {
                break;
            }
            offset += received;
        }

        Ok(episodes)
    }

    async fn list_saved_episodes(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Page<String>, PlatformError> {
        let url = self.endpoint(
            "me/episodes",
            &[("limit", limit.to_string()), ("offset", offset.to_string())],
        )?;
        let page: PagingObject<SavedEpisodeObject> = self.get_json(url).await?;

        Ok(Page {
            has_next: page.next.is_some(),
            items: page
                .items
                .into_iter()
                .filter_map(|saved| saved.episode.map(|episode| episode.id))
                .collect(),
        })
    }

    async fn save_episode(&self, episode_id: &str) -> Result<(), PlatformError> {
        let url = self.endpoint("me/episodes", &[("ids", episode_id.to_string())])?;
        self.send(self.client.put(url.clone()), &url).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client_for(server: &mockito::Server) -> SpotifyClient {
        SpotifyClient::new("test-token", Market::FromToken).with_base_url(server.url())
    }

    #[test]
    fn parses_all_release_date_precisions() {
        assert_eq!(
            parse_release_date("2024-03-05"),
            NaiveDate::from_ymd_opt(2024, 3, 5)
        );
        assert_eq!(
            parse_release_date("2024-03"),
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
        assert_eq!(
            parse_release_date("2024"),
            NaiveDate::from_ymd_opt(2024, 1, 1)
        );
        assert_eq!(
            parse_release_date("2024-03-05T22:30:00Z"),
            NaiveDate::from_ymd_opt(2024, 3, 5)
        );
    }

    #[test]
    fn rejects_unparseable_release_dates() {
        assert_eq!(parse_release_date(""), None);
        assert_eq!(parse_release_date("soon"), None);
        assert_eq!(parse_release_date("2024-13-40"), None);
    }

    #[tokio::test]
    async fn list_followed_shows_maps_page() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/me/shows")
            .match_header("authorization", "Bearer test-token")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("limit".into(), "50".into()),
                Matcher::UrlEncoded("offset".into(), "0".into()),
                Matcher::UrlEncoded("market".into(), "from_token".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "items": [
                        {"added_at": "2024-01-01T00:00:00Z", "show": {"id": "show-1", "name": "TechTalk"}},
                        {"added_at": "2024-01-01T00:00:00Z", "show": {"id": "show-2", "name": ""}}
                    ],
                    "next": "https://api.spotify.com/v1/me/shows?offset=50&limit=50"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let page = client_for(&server).list_followed_shows(0, 50).await.unwrap();

        assert!(page.has_next);
        assert_eq!(
            page.items,
            vec![
                Show {
                    id: "show-1".to_string(),
                    name: "TechTalk".to_string()
                },
                Show {
                    id: "show-2".to_string(),
                    name: "show-2".to_string()
                },
            ]
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn list_show_episodes_skips_unavailable_entries() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/shows/show-1/episodes")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "items": [
                        {"id": "ep-2", "name": "Second", "release_date": "2024-01-09", "release_date_precision": "day"},
                        null,
                        {"id": "ep-1", "name": "First", "release_date": "2024-01", "release_date_precision": "month"}
                    ],
                    "next": null
                })
                .to_string(),
            )
            .create_async()
            .await;

        let episodes = client_for(&server)
            .list_show_episodes("show-1", 20)
            .await
            .unwrap();

        assert_eq!(episodes.len(), 2);
        assert_eq!(episodes[0].id, "ep-2");
        assert_eq!(episodes[0].show_id, "show-1");
        assert_eq!(episodes[0].release_date, NaiveDate::from_ymd_opt(2024, 1, 9));
        assert_eq!(episodes[1].release_date, NaiveDate::from_ymd_opt(2024, 1, 1));
    }

    #[tokio::test]
    async fn list_show_episodes_pages_up_to_the_cap() {
        let mut server = mockito::Server::new_async().await;
        let items: Vec<_> = (0..50)
            .map(|i| {
                serde_json::json!({
                    "id": format!("ep-{i}"),
                    "name": "x",
                    "release_date": "2024-01-01"
                })
            })
            .collect();
        let first = server
            .mock("GET", "/shows/show-1/episodes")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("limit".into(), "50".into()),
                Matcher::UrlEncoded("offset".into(), "0".into()),
            ]))
            .with_status(200)
            .with_body(serde_json::json!({"items": items, "next": "more"}).to_string())
            .create_async()
            .await;
        let second = server
            .mock("GET", "/shows/show-1/episodes")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("limit".into(), "10".into()),
                Matcher::UrlEncoded("offset".into(), "50".into()),
            ]))
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "items": [{"id": "ep-50", "name": "x", "release_date": "2023-12-31"}],
                    "next": null
                })
                .to_string(),
            )
            .create_async()
            .await;

        let episodes = client_for(&server)
            .list_show_episodes("show-1", 60)
            .await
            .unwrap();

        assert_eq!(episodes.len(), 51);
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn list_saved_episodes_returns_ids() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/me/episodes")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "items": [
                        {"added_at": "2024-01-02T00:00:00Z", "episode": {"id": "ep-a"}},
                        {"added_at": "2024-01-02T00:00:00Z", "episode": null}
                    ],
                    "next": null
                })
                .to_string(),
            )
            .create_async()
            .await;

        let page = client_for(&server).list_saved_episodes(0, 50).await.unwrap();

        assert!(!page.has_next);
        assert_eq!(page.items, vec!["ep-a".to_string()]);
    }

    #[tokio::test]
    async fn page_without_items_is_empty() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/me/shows")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"next": null}"#)
            .create_async()
            .await;

        let page = client_for(&server).list_followed_shows(0, 50).await.unwrap();

        assert!(page.items.is_empty());
        assert!(!page.has_next);
    }

    #[tokio::test]
    async fn save_episode_puts_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/me/episodes")
            .match_query(Matcher::UrlEncoded("ids".into(), "ep-9".into()))
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .create_async()
            .await;

        client_for(&server).save_episode("ep-9").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn http_errors_carry_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/shows/gone/episodes")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body("non existing id")
            .create_async()
            .await;

        let err = client_for(&server)
            .list_show_episodes("gone", 20)
            .await
            .unwrap_err();

        match err {
            PlatformError::HttpStatus { status, body, .. } => {
                assert_eq!(status, 404);
                assert_eq!(body, "non existing id");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
