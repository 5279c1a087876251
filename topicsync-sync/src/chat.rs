//! Chat service client (Slack Web API).

use async_trait::async_trait;
use serde::Deserialize;

use topicsync_core::ChannelId;

use crate::error::SyncError;

const SERVICE: &str = "Slack";

/// Read and write access to channel topics.
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Current topic text of `channel`; empty when no topic is set.
    async fn read_topic(&self, channel: &ChannelId) -> Result<String, SyncError>;

    /// Replace the topic of `channel` with `topic`.
    async fn set_topic(&self, channel: &ChannelId, topic: &str) -> Result<(), SyncError>;
}

#[derive(Debug, Deserialize)]
struct InfoResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    channel: Option<ChannelInfo>,
}

#[derive(Debug, Deserialize)]
struct ChannelInfo {
    #[serde(default)]
    topic: Option<TopicInfo>,
}

#[derive(Debug, Deserialize)]
struct TopicInfo {
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SetTopicResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Slack client authenticated with a bot token.
#[derive(Clone)]
pub struct Slack {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl Slack {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    async fn post(&self, method: &str, form: &[(&str, &str)]) -> Result<(u16, String), SyncError> {
        let resp = self
            .client
            .post(format!("{}/{}", self.base_url, method))
            .bearer_auth(&self.token)
            .form(form)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        Ok((status, body))
    }
}

#[async_trait]
impl ChatService for Slack {
    async fn read_topic(&self, channel: &ChannelId) -> Result<String, SyncError> {
        let (status, body) = self
            .post("conversations.info", &[("channel", channel.0.as_str())])
            .await?;
        if status > 299 {
            return Err(SyncError::Http {
                service: SERVICE,
                status,
                body,
            });
        }

        let info: InfoResponse =
            serde_json::from_str(&body).map_err(|e| SyncError::MalformedResponse {
                service: SERVICE,
                detail: e.to_string(),
            })?;

        if !info.ok {
            let reason = info.error.unwrap_or_else(|| "unknown_error".to_string());
            tracing::debug!(channel = %channel, reason = %reason, "conversations.info rejected");
            return Err(match reason.as_str() {
                "channel_not_found" => SyncError::ChannelNotFound {
                    channel: channel.0.clone(),
                },
                _ => SyncError::Access {
                    channel: channel.0.clone(),
                    reason,
                },
            });
        }

        info.channel
            .and_then(|c| c.topic)
            .and_then(|t| t.value)
            .ok_or_else(|| SyncError::MalformedResponse {
                service: SERVICE,
                detail: format!("conversations.info for {channel} has no channel.topic.value"),
            })
    }

    async fn set_topic(&self, channel: &ChannelId, topic: &str) -> Result<(), SyncError> {
        let (status, body) = self
            .post(
                "conversations.setTopic",
                &[("channel", channel.0.as_str()), ("topic", topic)],
            )
            .await?;
        if status > 299 {
            return Err(SyncError::Write {
                channel: channel.0.clone(),
                body,
            });
        }

        // Slack reports most failures as HTTP 200 with `ok: false`.
        let parsed: SetTopicResponse =
            serde_json::from_str(&body).map_err(|e| SyncError::MalformedResponse {
                service: SERVICE,
                detail: e.to_string(),
            })?;
        if !parsed.ok {
            return Err(SyncError::Write {
                channel: channel.0.clone(),
                body: parsed.error.unwrap_or(body),
            });
        }
        Ok(())
    }
}
