// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::MessagingError;

const DEFAULT_GRAPH_URL: &str = "https://graph.facebook.com/v20.0";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Show names listed in a summary before it is cut off with "and more"
pub const MAX_LISTED_SHOWS: usize = 3;

/// Sends pre-approved template messages
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_template(
        &self,
        recipient: &str,
        template: &str,
        language: &str,
        parameters: &[String],
    ) -> Result<(), MessagingError>;
}

#[derive(Debug, Serialize)]
struct TemplateMessage<'a> {
    messaging_product: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    template: Template<'a>,
}

#[derive(Debug, Serialize)]
struct Template<'a> {
    name: &'a str,
    language: Language<'a>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    components: Vec<Component<'a>>,
}

#[derive(Debug, Serialize)]
struct Language<'a> {
    code: &'a str,
}

#[derive(Debug, Serialize)]
struct Component<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    parameters: Vec<TextParameter<'a>>,
}

#[derive(Debug, Serialize)]
struct TextParameter<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

/// WhatsApp Cloud API client for one business phone number
#[derive(Clone)]
pub struct WhatsAppClient {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
    phone_number_id: String,
}

impl WhatsAppClient {
    pub fn new(access_token: impl Into<String>, phone_number_id: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: DEFAULT_GRAPH_URL.to_string(),
            access_token: access_token.into(),
            phone_number_id: phone_number_id.into(),
        }
    }

    /// Point the client at a different Graph API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Messenger for WhatsAppClient {
    async fn send_template(
        &self,
        recipient: &str,
        template: &str,
        language: &str,
        parameters: &[String],
    ) -> Result<(), MessagingError> {
        let url = format!("{}/{}/messages", self.base_url, self.phone_number_id);

        let components = if parameters.is_empty() {
            Vec::new()
        } else {
            vec![Component {
                kind: "body",
                parameters: parameters
                    .iter()
                    .map(|text| TextParameter {
                        kind: "text",
                        text: text.as_str(),
                    })
                    .collect(),
            }]
        };

        let message = TemplateMessage {
            messaging_product: "whatsapp",
            to: recipient,
            kind: "template",
            template: Template {
                name: template,
                language: Language { code: language },
                components,
            },
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&message)
            .send()
            .await
            .map_err(|e| MessagingError::RequestFailed {
                url: url.clone(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(MessagingError::HttpStatus {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        Ok(())
    }
}

/// Join show names for a summary message.
///
/// Blank names are dropped; more than `max_names` names are cut off with
/// ", and more".
pub fn format_show_list<S: AsRef<str>>(names: &[S], max_names: usize) -> String {
    let names: Vec<&str> = names
        .iter()
        .map(|n| n.as_ref())
        .filter(|n| !n.trim().is_empty())
        .collect();

    if names.is_empty() {
        return "your podcasts".to_string();
    }

    if names.len() > max_names {
        format!("{}, and more", names[..max_names].join(", "))
    } else {
        names.join(", ")
    }
}
