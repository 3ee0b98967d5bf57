// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::error::ConfigError;

const DEFAULT_LANGUAGE: &str = "en";
const DEFAULT_TEMPLATE_ADDED: &str = "autosave_added";
const DEFAULT_TEMPLATE_NONE: &str = "autosave_none";
const DEFAULT_LOOKBACK_DAYS: u32 = 7;
const DEFAULT_EPISODES_PER_SHOW: usize = 20;

/// Spotify application credentials used for the authorization-code flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// WhatsApp Cloud API settings. Only constructed when all required values are present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagingConfig {
    pub access_token: String,
    pub phone_number_id: String,
    pub recipient: String,
    pub language: String,
    pub template_added: String,
    pub template_none: String,
}

/// Market used when listing shows and episodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Market {
    /// Use the country of the authenticated account
    FromToken,
    /// An explicit ISO 3166-1 alpha-2 country code
    Country(String),
}

impl Market {
    pub fn as_query_value(&self) -> &str {
        match self {
            Market::FromToken => "from_token",
            Market::Country(code) => code,
        }
    }
}

/// Complete runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub spotify: SpotifyCredentials,
    /// `None` disables notifications entirely
    pub messaging: Option<MessagingConfig>,
    pub lookback_days: u32,
    pub episodes_per_show: usize,
    pub market: Market,
}

impl Config {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    ///
    /// Values are trimmed and blank values count as absent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let required = [
            "SPOTIPY_CLIENT_ID",
            "SPOTIPY_CLIENT_SECRET",
            "SPOTIPY_REDIRECT_URI",
        ];
        let missing: Vec<String> = required
            .iter()
            .filter(|key| get(key).is_none())
            .map(|key| key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingVariables(missing));
        }

        let spotify = SpotifyCredentials {
            client_id: get("SPOTIPY_CLIENT_ID").unwrap_or_default(),
            client_secret: get("SPOTIPY_CLIENT_SECRET").unwrap_or_default(),
            redirect_uri: get("SPOTIPY_REDIRECT_URI").unwrap_or_default(),
        };

        let messaging = match (
            get("WA_ACCESS_TOKEN"),
            get("WA_PHONE_NUMBER_ID"),
            get("WA_TO"),
        ) {
            (Some(access_token), Some(phone_number_id), Some(recipient)) => {
                Some(MessagingConfig {
                    access_token,
                    phone_number_id,
                    recipient,
                    language: get("WA_LANG").unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
                    template_added: get("WA_TPL_ADDED")
                        .unwrap_or_else(|| DEFAULT_TEMPLATE_ADDED.to_string()),
                    template_none: get("WA_TPL_NONE")
                        .unwrap_or_else(|| DEFAULT_TEMPLATE_NONE.to_string()),
                })
            }
            _ => None,
        };

        let lookback_days = parse_positive(
            "LOOKBACK_DAYS",
            get("LOOKBACK_DAYS"),
            DEFAULT_LOOKBACK_DAYS as usize,
        )? as u32;
        let episodes_per_show = parse_positive(
            "EPISODES_PER_SHOW",
            get("EPISODES_PER_SHOW"),
            DEFAULT_EPISODES_PER_SHOW,
        )?;

        let market = match get("SPOTIFY_MARKET") {
            Some(code) if !code.eq_ignore_ascii_case("from_token") => {
                Market::Country(code.to_ascii_uppercase())
            }
            _ => Market::FromToken,
        };

        Ok(Self {
            spotify,
            messaging,
            lookback_days,
            episodes_per_show,
            market,
        })
    }
}

fn parse_positive(key: &str, value: Option<String>, default: usize) -> Result<usize, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n as usize),
        _ => Err(ConfigError::InvalidNumber {
            key: key.to_string(),
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const SPOTIFY_VARS: [(&str, &str); 3] = [
        ("SPOTIPY_CLIENT_ID", "client-id"),
        ("SPOTIPY_CLIENT_SECRET", "client-secret"),
        ("SPOTIPY_REDIRECT_URI", "http://127.0.0.1:8888/callback"),
    ];

    #[test]
    fn defaults_apply_when_only_spotify_is_configured() {
        let config = Config::from_lookup(lookup_from(&SPOTIFY_VARS)).unwrap();

        assert_eq!(config.spotify.client_id, "client-id");
        assert!(config.messaging.is_none());
        assert_eq!(config.lookback_days, 7);
        assert_eq!(config.episodes_per_show, 20);
        assert_eq!(config.market, Market::FromToken);
        assert_eq!(config.market.as_query_value(), "from_token");
    }

    #[test]
    fn missing_spotify_credentials_are_reported_together() {
        let err = Config::from_lookup(lookup_from(&[("SPOTIPY_CLIENT_ID", "id")])).unwrap_err();

        match err {
            ConfigError::MissingVariables(vars) => {
                assert_eq!(vars, vec!["SPOTIPY_CLIENT_SECRET", "SPOTIPY_REDIRECT_URI"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn messaging_requires_all_three_values() {
        let mut vars = SPOTIFY_VARS.to_vec();
        vars.push(("WA_ACCESS_TOKEN", "token"));
        vars.push(("WA_PHONE_NUMBER_ID", "12345"));
        vars.push(("WA_TO", "   "));

        let config = Config::from_lookup(lookup_from(&vars)).unwrap();
        assert!(config.messaging.is_none());
    }

    #[test]
    fn messaging_uses_template_defaults() {
        let mut vars = SPOTIFY_VARS.to_vec();
        vars.push(("WA_ACCESS_TOKEN", " token "));
        vars.push(("WA_PHONE_NUMBER_ID", "12345"));
        vars.push(("WA_TO", "+15550001111"));
        vars.push(("WA_LANG", "de"));

        let messaging = Config::from_lookup(lookup_from(&vars))
            .unwrap()
            .messaging
            .unwrap();

        assert_eq!(messaging.access_token, "token");
        assert_eq!(messaging.recipient, "+15550001111");
        assert_eq!(messaging.language, "de");
        assert_eq!(messaging.template_added, "autosave_added");
        assert_eq!(messaging.template_none, "autosave_none");
    }

    #[test]
    fn numeric_overrides_and_market_are_parsed() {
        let mut vars = SPOTIFY_VARS.to_vec();
        vars.push(("LOOKBACK_DAYS", "14"));
        vars.push(("EPISODES_PER_SHOW", "50"));
        vars.push(("SPOTIFY_MARKET", "de"));

        let config = Config::from_lookup(lookup_from(&vars)).unwrap();

        assert_eq!(config.lookback_days, 14);
        assert_eq!(config.episodes_per_show, 50);
        assert_eq!(config.market, Market::Country("DE".to_string()));
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        for bad in ["abc", "0", "-3"] {
            let mut vars = SPOTIFY_VARS.to_vec();
            vars.push(("LOOKBACK_DAYS", bad));

            let err = Config::from_lookup(lookup_from(&vars)).unwrap_err();
            assert!(matches!(
                err,
                ConfigError::InvalidNumber { ref key, .. } if key == "LOOKBACK_DAYS"
            ));
        }
    }
}
