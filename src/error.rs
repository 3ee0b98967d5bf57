// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading configuration from the environment
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variables: {}", .0.join(", "))]
    MissingVariables(Vec<String>),

    #[error("Invalid value '{value}' for {key}: expected a positive integer")]
    InvalidNumber { key: String, value: String },
}

/// Errors that prevent obtaining a usable access token
#[derive(Error, Debug)]
pub enum AuthError {
    #[error(
        "No cached Spotify token at {path} and no terminal to authorize interactively; run once from a terminal first"
    )]
    NoCachedToken { path: PathBuf },

    #[error("Token request to {url} failed: {source}")]
    RequestFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Token endpoint {url} returned HTTP {status}: {body}")]
    HttpStatus {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Failed to write token cache {path}: {source}")]
    CacheWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Redirect URL does not contain an authorization code: {0}")]
    MissingAuthorizationCode(String),

    #[error("Authorization was denied: {0}")]
    AuthorizationDenied(String),

    #[error("Failed to read redirect URL from terminal: {0}")]
    PromptFailed(#[source] std::io::Error),

    #[error("Invalid authorization endpoint: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Errors returned by the podcast platform API
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Request to {url} failed: {source}")]
    RequestFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for {url}: {body}")]
    HttpStatus {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Unexpected response from {url}: {source}")]
    InvalidResponse {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid API URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Errors returned when sending a notification
#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("Message request to {url} failed: {source}")]
    RequestFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Messaging API returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },
}

/// Errors that can occur when persisting the state file
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write state file {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize state: {0}")]
    SerializeFailed(#[from] serde_json::Error),
}

/// Errors that abort a run before discovery completes
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Failed to list followed shows: {0}")]
    ListShows(#[source] PlatformError),

    #[error("Failed to list saved episodes: {0}")]
    ListSavedEpisodes(#[source] PlatformError),
}
