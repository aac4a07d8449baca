//! In-memory publish collaborator
//!
//! `MemoryClient` accepts every batch, assigns a UUID to each message and keeps
//! the batch for inspection. It can be told to fail or to take a fixed amount
//! of time per request, which makes it the collaborator of choice for the CLI's
//! dry runs and for exercising the publisher.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::client::PublishClient;
use crate::publisher::message::Message;
use crate::utils::error::ClientError;

/// A batch accepted by a `MemoryClient`.
#[derive(Debug, Clone)]
pub struct PublishedBatch {
    pub topic: String,
    pub messages: Vec<Message>,
    pub message_ids: Vec<String>,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct MemoryClient {
    batches: Mutex<Vec<PublishedBatch>>,
    failure: Mutex<Option<ClientError>>,
    latency: Option<Duration>,
    attempts: AtomicUsize,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every request by `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Makes subsequent requests fail with `error` until `recover` is called.
    pub fn fail_with(&self, error: ClientError) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(error);
    }

    pub fn recover(&self) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Number of requests received, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Batches accepted so far, in the order their requests completed.
    pub fn batches(&self) -> Vec<PublishedBatch> {
        self.batches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches()
            .iter()
            .map(|batch| batch.messages.len())
            .collect()
    }

    /// Every accepted message, batch by batch.
    pub fn messages(&self) -> Vec<Message> {
        self.batches()
            .into_iter()
            .flat_map(|batch| batch.messages)
            .collect()
    }
}

#[async_trait]
impl PublishClient for MemoryClient {
    async fn publish_batch(
        &self,
        topic: &str,
        messages: &[Message],
    ) -> Result<Vec<String>, ClientError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let failure = self
            .failure
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(error) = failure {
            return Err(error);
        }

        let message_ids: Vec<String> = messages
            .iter()
            .map(|_| Uuid::new_v4().to_string())
            .collect();

        debug!(topic, count = messages.len(), "memory client accepted batch");

        self.batches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(PublishedBatch {
                topic: topic.to_string(),
                messages: messages.to_vec(),
                message_ids: message_ids.clone(),
                published_at: Utc::now(),
            });

        Ok(message_ids)
    }
}
