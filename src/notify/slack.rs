use std::time::Duration;

use async_trait::async_trait;
use eyre::Result;
use log::info;
use reqwest::Client;
use serde_json::json;

use super::{format, NotificationSink};
use crate::engine::types::CycleOutcome;

const POST_MESSAGE_URL: &str = "https://slack.com/api/chat.postMessage";

/// Channels the notifier posts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlackChannels {
    /// Confirmed spreads
    pub alerts: String,
    /// Batched tier logs
    pub logs: String,
    /// Operator errors
    pub errors: String,
}

impl Default for SlackChannels {
    fn default() -> Self {
        Self {
            alerts: "#spreads".to_string(),
            logs: "#spreads-log".to_string(),
            errors: "#spreads-errors".to_string(),
        }
    }
}

/// Slack notifier
#[derive(Debug)]
pub struct SlackNotifier {
    /// The Slack OAuth token
    token: String,
    /// Target channels
    channels: SlackChannels,
    /// The HTTP client
    client: Client,
}

impl SlackNotifier {
    /// Create a new Slack notifier
    ///
    /// # Errors
    /// If the HTTP client cannot be built
    pub fn new(token: String, channels: SlackChannels) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            token,
            channels,
            client,
        })
    }

    /// Send a message to a specific channel
    ///
    /// # Errors
    /// If the request fails or Slack answers with `ok: false`
    pub async fn send_to(&self, msg: &str, channel: &str) -> Result<()> {
        let payload = json!({
            "channel": channel,
            "text": msg,
            "username": "Spreadwatch",
            "icon_emoji": ":chart_with_upwards_trend:"
        });

        let response = self
            .client
            .post(POST_MESSAGE_URL)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await?
            .json::<serde_json::Value>()
            .await?;

        if !response["ok"].as_bool().unwrap_or(false) {
            return Err(eyre::eyre!(
                "Slack API error: {}",
                response["error"].as_str().unwrap_or("unknown error")
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl NotificationSink for SlackNotifier {
    async fn report_cycle(&self, outcome: &CycleOutcome) -> Result<()> {
        info!("notify::slack: sending alert for {}", outcome.scenario);
        self.send_to(&format::alert(outcome), &self.channels.alerts).await
    }

    async fn report_log(&self, text: &str) -> Result<()> {
        self.send_to(text, &self.channels.logs).await
    }

    async fn report_error(&self, text: &str) -> Result<()> {
        self.send_to(&format!(":warning: Error: {text}"), &self.channels.errors)
            .await
    }
}
