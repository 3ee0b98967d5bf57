// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::{BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::SpotifyCredentials;
use crate::error::AuthError;

pub const TOKEN_CACHE_FILENAME: &str = "spotify_cache.json";
pub const SCOPES: [&str; 2] = ["user-library-read", "user-library-modify"];

const DEFAULT_ACCOUNTS_URL: &str = "https://accounts.spotify.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Tokens expiring sooner than this are refreshed before use
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Token cache entry as stored in the cache file
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedToken {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Unix timestamp when the access token expires
    pub expires_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl std::fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedToken")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field("expires_at", &self.expires_at)
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl CachedToken {
    pub fn is_fresh(&self, now: i64) -> bool {
        self.expires_at - EXPIRY_MARGIN_SECS > now
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    #[serde(default)]
    scope: Option<String>,
    expires_in: i64,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl TokenResponse {
    fn into_cached(self, now: i64, previous_refresh: Option<String>) -> CachedToken {
        CachedToken {
            access_token: self.access_token,
            token_type: self.token_type,
            scope: self.scope,
            expires_at: now + self.expires_in,
            refresh_token: self.refresh_token.or(previous_refresh),
        }
    }
}

/// Provides Spotify access tokens using the authorization-code flow.
///
/// Tokens are cached on disk and refreshed when close to expiry. Without a
/// cached token the user is asked to authorize once through the browser,
/// which requires an interactive terminal.
pub struct SpotifyAuth {
    credentials: SpotifyCredentials,
    cache_path: PathBuf,
    client: reqwest::Client,
    accounts_url: String,
    interactive: bool,
}

impl SpotifyAuth {
    pub fn new(credentials: SpotifyCredentials, cache_path: PathBuf) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            credentials,
            cache_path,
            client,
            accounts_url: DEFAULT_ACCOUNTS_URL.to_string(),
            interactive: std::io::stdin().is_terminal(),
        }
    }

    /// Point the provider at a different accounts service root
    pub fn with_accounts_url(mut self, accounts_url: impl Into<String>) -> Self {
        self.accounts_url = accounts_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override whether the interactive authorization step may run
    pub fn with_interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Return a usable access token, refreshing or authorizing as needed
    pub async fn access_token(&self) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();

        if let Some(cached) = self.load_cache() {
            if cached.is_fresh(now) {
                debug!("using cached Spotify access token");
                return Ok(cached.access_token);
            }

            if let Some(refresh_token) = cached.refresh_token {
                info!("refreshing Spotify access token");
                let token = self.refresh(&refresh_token).await?;
                self.store_cache(&token)?;
                return Ok(token.access_token);
            }
        }

        if !self.interactive {
            return Err(AuthError::NoCachedToken {
                path: self.cache_path.clone(),
            });
        }

        let redirect = self.prompt_for_redirect()?;
        let code = extract_authorization_code(&redirect)?;
        let token = self.exchange_code(&code).await?;
        self.store_cache(&token)?;
        info!(path = %self.cache_path.display(), "Spotify authorization stored");
        Ok(token.access_token)
    }

    /// URL the user opens to grant access
    pub fn authorize_url(&self) -> Result<Url, AuthError> {
        let mut url = Url::parse(&format!("{}/authorize", self.accounts_url))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.credentials.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.credentials.redirect_uri)
            .append_pair("scope", &SCOPES.join(" "));
        Ok(url)
    }

    fn load_cache(&self) -> Option<CachedToken> {
        let content = match std::fs::read_to_string(&self.cache_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.cache_path.display(), "token cache not found");
                return None;
            }
            Err(e) => {
                warn!(path = %self.cache_path.display(), error = %e, "token cache read failed");
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!(path = %self.cache_path.display(), error = %e, "token cache parse failed");
                None
            }
        }
    }

    fn store_cache(&self, token: &CachedToken) -> Result<(), AuthError> {
        let write_failed = |source: std::io::Error| AuthError::CacheWriteFailed {
            path: self.cache_path.clone(),
            source,
        };

        if let Some(parent) = self.cache_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(write_failed)?;
        }

        let json = serde_json::to_string_pretty(token).map_err(|e| write_failed(e.into()))?;
        std::fs::write(&self.cache_path, json).map_err(write_failed)
    }

    fn prompt_for_redirect(&self) -> Result<String, AuthError> {
        let url = self.authorize_url()?;
        let mut stdout = std::io::stdout();
        writeln!(stdout, "\nOpen this URL in your browser and approve access:\n\n  {url}\n")
            .map_err(AuthError::PromptFailed)?;
        write!(stdout, "Paste the URL you were redirected to: ").map_err(AuthError::PromptFailed)?;
        stdout.flush().map_err(AuthError::PromptFailed)?;

        let mut line = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(AuthError::PromptFailed)?;
        Ok(line.trim().to_string())
    }

    async fn exchange_code(&self, code: &str) -> Result<CachedToken, AuthError> {
        let response = self
            .request_token(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", &self.credentials.redirect_uri),
            ])
            .await?;
        Ok(response.into_cached(Utc::now().timestamp(), None))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<CachedToken, AuthError> {
        let response = self
            .request_token(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .await?;
        Ok(response.into_cached(Utc::now().timestamp(), Some(refresh_token.to_string())))
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse, AuthError> {
        let url = format!("{}/api/token", self.accounts_url);
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(form)
            .finish();

        let response = self
            .client
            .post(&url)
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(body)
            .send()
            .await
            .map_err(|e| AuthError::RequestFailed {
                url: url.clone(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::HttpStatus {
                url,
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| AuthError::RequestFailed { url, source: e })
    }
}

/// Pull the authorization code out of the redirect URL pasted by the user
pub fn extract_authorization_code(redirect: &str) -> Result<String, AuthError> {
    let url = Url::parse(redirect.trim())
        .map_err(|_| AuthError::MissingAuthorizationCode(redirect.to_string()))?;

    let mut code = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "error" => return Err(AuthError::AuthorizationDenied(value.into_owned())),
            _ => {}
        }
    }

    code.filter(|c| !c.is_empty())
        .ok_or_else(|| AuthError::MissingAuthorizationCode(redirect.to_string()))
}
