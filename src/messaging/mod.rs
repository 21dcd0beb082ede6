//! Outbound messages published at the pipeline boundary
//!
//! Transport mechanics live behind [`MessageProducer`]; the pipeline only
//! builds typed messages and hands over their JSON encoding.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use thiserror::Error;

pub const PRINT_BATCH_DISPATCHED_STREAM: &str = "print-batch-dispatched";
pub const STATISTICS_UPDATE_STREAM: &str = "application-statistics-update";

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("Publish failed: {0}")]
    PublishFailed(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MessagingError>;

/// Message producer for the outbound streams
#[async_trait]
pub trait MessageProducer: Send + Sync {
    /// Publish message to stream
    async fn publish(&self, stream: &str, message: Vec<u8>) -> Result<()>;

    /// Health check
    async fn health(&self) -> bool;
}

/// A batch archive reached the provider-facing location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintBatchDispatched {
    pub batch_id: String,
    pub archive: String,
    pub request_ids: Vec<String>,
    pub correlation_id: String,
    pub dispatched_at: DateTime<Utc>,
}

/// Ask the application service to refresh its statistics.
/// Consumers dedupe on `source_reference`, so repeats are harmless.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsUpdate {
    pub source_reference: String,
    pub correlation_id: String,
}

/// Serialize `message` as JSON and publish it
pub async fn publish_json<T: Serialize + Sync>(
    producer: &dyn MessageProducer,
    stream: &str,
    message: &T,
) -> Result<()> {
    let payload = serde_json::to_vec(message)?;
    producer.publish(stream, payload).await
}

/// Producer that only logs, for single-process deployments
#[derive(Debug, Clone, Default)]
pub struct LoggingProducer;

impl LoggingProducer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MessageProducer for LoggingProducer {
    async fn publish(&self, stream: &str, message: Vec<u8>) -> Result<()> {
        tracing::info!(stream, size = message.len(), "Message published");
        Ok(())
    }

    async fn health(&self) -> bool {
        true
    }
}

/// Producer keeping every message in memory
#[derive(Debug, Default)]
pub struct InMemoryProducer {
    messages: Mutex<Vec<(String, Vec<u8>)>>,
}

impl InMemoryProducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoded messages published to `stream`, in publish order
    pub fn messages<T: DeserializeOwned>(&self, stream: &str) -> Vec<T> {
        let messages = self.messages.lock().unwrap_or_else(|e| e.into_inner());
        messages
            .iter()
            .filter(|(s, _)| s == stream)
            .filter_map(|(_, payload)| serde_json::from_slice(payload).ok())
            .collect()
    }
}

#[async_trait]
impl MessageProducer for InMemoryProducer {
    async fn publish(&self, stream: &str, message: Vec<u8>) -> Result<()> {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((stream.to_string(), message));
        Ok(())
    }

    async fn health(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_json_round_trips_through_producer() {
        let producer = InMemoryProducer::new();
        let update = StatisticsUpdate {
            source_reference: "app-1".to_string(),
            correlation_id: "c-1".to_string(),
        };

        publish_json(&producer, STATISTICS_UPDATE_STREAM, &update)
            .await
            .unwrap();

        assert_eq!(producer.messages::<StatisticsUpdate>(STATISTICS_UPDATE_STREAM), vec![update]);
        assert!(producer
            .messages::<StatisticsUpdate>(PRINT_BATCH_DISPATCHED_STREAM)
            .is_empty());
    }

    #[test]
    fn test_messages_use_camel_case() {
        let update = StatisticsUpdate {
            source_reference: "app-1".to_string(),
            correlation_id: "c-1".to_string(),
        };
        let json = serde_json::to_string(&update).unwrap();
        assert!(json.contains("\"sourceReference\""));
    }
}
