use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use crate::models::{NotificationKind, UserId};
use crate::services::store::{NotificationError, NotificationSink};

#[derive(Debug, Serialize)]
struct NotificationPayload<'a> {
    #[serde(rename = "targetUserId")]
    target_user_id: UserId,
    #[serde(rename = "senderName")]
    sender_name: &'a str,
    kind: NotificationKind,
    message: &'a str,
}

/// Posts alerts to the platform's notification service
pub struct HttpNotificationSink {
    base_url: String,
    api_key: String,
    client: Client,
}

impl HttpNotificationSink {
    pub fn new(
        base_url: String,
        api_key: String,
        timeout: Duration,
    ) -> Result<Self, NotificationError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl NotificationSink for HttpNotificationSink {
    async fn send(
        &self,
        target_user_id: UserId,
        sender_name: &str,
        kind: NotificationKind,
        message: &str,
    ) -> Result<(), NotificationError> {
        let url = format!("{}/notifications", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("X-Api-Key", &self.api_key)
            .json(&NotificationPayload {
                target_user_id,
                sender_name,
                kind,
                message,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotificationError::ApiError(format!(
                "Failed to send notification: {}",
                response.status()
            )));
        }

        tracing::debug!("Sent {:?} notification to {}", kind, target_user_id);

        Ok(())
    }
}

/// Sink used when delivery is disabled; alerts only reach the log
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn send(
        &self,
        target_user_id: UserId,
        sender_name: &str,
        kind: NotificationKind,
        message: &str,
    ) -> Result<(), NotificationError> {
        tracing::info!(
            target_user_id = %target_user_id,
            sender = sender_name,
            kind = ?kind,
            "Notification (delivery disabled): {}",
            message
        );
        Ok(())
    }
}
