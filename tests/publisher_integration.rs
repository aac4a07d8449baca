use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use batchpub::config::{LimitExceededBehavior, Settings};
use batchpub::{BatchPublisher, ClientError, Message, PublishClient, PublisherError};

/// Numbers messages per topic, like a broker handing out offsets.
#[derive(Default)]
struct SequencingClient {
    next: AtomicUsize,
    requests: AtomicUsize,
}

#[async_trait]
impl PublishClient for SequencingClient {
    async fn publish_batch(
        &self,
        topic: &str,
        messages: &[Message],
    ) -> Result<Vec<String>, ClientError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let start = self.next.fetch_add(messages.len(), Ordering::SeqCst);
        Ok((start..start + messages.len())
            .map(|offset| format!("{topic}/{offset}"))
            .collect())
    }
}

fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.publisher.max_messages = 3;
    settings.publisher.flush_interval_ms = 20;
    settings.publisher.worker_count = 2;
    settings.flow_control.limit_exceeded_behavior = LimitExceededBehavior::Block;
    settings
}

#[tokio::test]
async fn publishes_through_custom_client_and_reports_ids() {
    let client = Arc::new(SequencingClient::default());
    let publisher = BatchPublisher::from_settings("events", client.clone(), &settings());

    let mut receipts = Vec::new();
    for i in 0..7 {
        let message = Message::from(format!("event-{i}")).with_attribute("seq", i.to_string());
        receipts.push(publisher.publish_with_receipt(message).await.unwrap());
    }

    let mut ids = Vec::new();
    for receipt in receipts {
        let result = receipt.await.unwrap();
        assert!(result.succeeded(), "unexpected failure: {:?}", result.error());
        ids.push(result.message_id().unwrap().to_string());
    }

    // Seven messages with a limit of three per batch: 3 + 3 + 1
    assert_eq!(client.requests.load(Ordering::SeqCst), 3);
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 7);
    assert!(ids.iter().all(|id| id.starts_with("events/")));

    assert!(publisher.shutdown(Some(Duration::from_secs(5))).await);
    assert!(matches!(
        publisher.publish("late").await,
        Err(PublisherError::Stopped)
    ));
}

#[tokio::test]
async fn results_carry_the_original_message() {
    let client = Arc::new(SequencingClient::default());
    let publisher = BatchPublisher::from_settings("audit", client, &settings());

    let message = Message::new(vec![1u8, 2, 3]).with_attribute("kind", "binary");
    let receipt = publisher.publish_with_receipt(message.clone()).await.unwrap();
    publisher.flush();

    let result = receipt.await.unwrap();
    assert_eq!(result.message, message);
    assert_eq!(result.message_id(), Some("audit/0"));
}
