//! NATS connection and subscription for inbound records

use crate::config::NatsConfig;
use crate::error::SetupError;
use async_nats::{jetstream, Client, ConnectOptions, Subscriber};
use std::time::Duration;
use tracing::info;

/// Connect to the NATS server, failing fast instead of retrying.
pub async fn connect(config: &NatsConfig) -> Result<Client, SetupError> {
    let client = ConnectOptions::new()
        .connection_timeout(Duration::from_secs(config.connect_timeout_secs.max(1)))
        .connect(config.url.as_str())
        .await
        .map_err(|e| SetupError::StreamUnreachable {
            url: config.url.clone(),
            reason: e.to_string(),
        })?;

    info!(url = %config.url, "Connected to NATS");
    Ok(client)
}

/// Consumer for receiving raw record payloads from NATS
pub struct EventConsumer {
    client: Client,
    subject: String,
    queue_group: Option<String>,
    stream: Option<String>,
}

impl EventConsumer {
    pub fn new(client: Client, config: &NatsConfig) -> Self {
        Self {
            client,
            subject: config.subject.clone(),
            queue_group: config.queue_group.clone(),
            stream: config.stream.clone(),
        }
    }

    /// Check that the configured JetStream stream exists. A no-op when no
    /// stream is configured.
    pub async fn verify_stream(&self) -> Result<(), SetupError> {
        let Some(name) = &self.stream else {
            return Ok(());
        };

        let context = jetstream::new(self.client.clone());
        context
            .get_stream(name)
            .await
            .map_err(|e| SetupError::TopicUnavailable {
                subject: self.subject.clone(),
                reason: format!("stream {}: {}", name, e),
            })?;

        info!(stream = %name, "Verified JetStream stream");
        Ok(())
    }

    /// Subscribe to the record subject, joining the queue group if set
    pub async fn subscribe(&self) -> Result<Subscriber, SetupError> {
        let subscribed = match &self.queue_group {
            Some(group) => {
                self.client
                    .queue_subscribe(self.subject.clone(), group.clone())
                    .await
            }
            None => self.client.subscribe(self.subject.clone()).await,
        };

        let subscriber = subscribed.map_err(|e| SetupError::TopicUnavailable {
            subject: self.subject.clone(),
            reason: e.to_string(),
        })?;

        info!(
            subject = %self.subject,
            queue_group = ?self.queue_group,
            "Subscribed to record subject"
        );
        Ok(subscriber)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[tokio::test]
    async fn test_unreachable_server_maps_to_stream_unreachable() {
        let mut config = AppConfig::default().nats;
        // Reserved port with nothing listening.
        config.url = "nats://127.0.0.1:1".to_string();
        config.connect_timeout_secs = 1;

        let err = connect(&config).await.unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_STREAM_UNREACHABLE);
    }
}
