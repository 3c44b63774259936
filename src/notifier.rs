use std::future::Future;

use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::DISCORD_API_BASE;
use crate::error::TrackerError;
use crate::types::{Event, EventKind};

/// File name the thumbnail is attached under.
pub const THUMBNAIL_FILE_NAME: &str = "thumbnail.png";

/// Delivers event notifications to a chat channel.
pub trait Notifier {
    /// Resolve once the chat session is usable.
    fn wait_until_ready(&self) -> impl Future<Output = Result<(), TrackerError>> + Send;

    /// Send one message for `event`.
    fn notify(
        &self,
        kind: EventKind,
        event: &Event,
    ) -> impl Future<Output = Result<(), TrackerError>> + Send;
}

/// Chat message body: the event line inside a code block.
pub fn format_message(kind: EventKind, event: &Event) -> String {
    format!("```{}\n```", event.format_line(kind))
}

/// Posts messages to one Discord channel through the REST API.
#[derive(Debug, Clone)]
pub struct DiscordNotifier {
    http: reqwest::Client,
    api_base: String,
    token: String,
    channel_id: u64,
}

#[derive(Debug, Deserialize)]
struct CurrentUser {
    username: String,
}

impl DiscordNotifier {
    pub fn new(http: reqwest::Client, token: impl Into<String>, channel_id: u64) -> Self {
        Self {
            http,
            api_base: DISCORD_API_BASE.to_string(),
            token: token.into(),
            channel_id,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.token)
    }

    fn messages_url(&self) -> String {
        format!("{}/channels/{}/messages", self.api_base, self.channel_id)
    }

    /// Download a thumbnail, following redirects.
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, TrackerError> {
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TrackerError::Status {
                url: url.to_string(),
                status,
            });
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, TrackerError> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        Err(TrackerError::Status {
            url: resp.url().to_string(),
            status,
        })
    }
}

impl Notifier for DiscordNotifier {
    async fn wait_until_ready(&self) -> Result<(), TrackerError> {
        let resp = self
            .http
            .get(format!("{}/users/@me", self.api_base))
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .send()
            .await?;
        let user: CurrentUser = check_status(resp)?.json().await?;
        info!("Logged in as {}", user.username);
        Ok(())
    }

    /// A thumbnail that cannot be downloaded is dropped; the text still goes out.
    async fn notify(&self, kind: EventKind, event: &Event) -> Result<(), TrackerError> {
        let image = match &event.image_url {
            Some(url) => match self.fetch_image(url).await {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!("Thumbnail download failed for {}: {e}", event.asset_name);
                    None
                }
            },
            None => None,
        };

        let payload = json!({ "content": format_message(kind, event) });
        let mut form = Form::new().text("payload_json", payload.to_string());
        if let Some(bytes) = image {
            let part = Part::bytes(bytes)
                .file_name(THUMBNAIL_FILE_NAME)
                .mime_str("image/png")?;
            form = form.part("files[0]", part);
        }

        let resp = self
            .http
            .post(self.messages_url())
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .multipart(form)
            .send()
            .await?;
        check_status(resp)?;
        debug!("Sent {kind} notification for {}", event.asset_name);
        Ok(())
    }
}
