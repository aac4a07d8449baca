use super::{MemoryClient, PublishClient};
use crate::publisher::message::Message;
use crate::utils::error::ClientError;
use std::time::Duration;

#[tokio::test]
async fn test_memory_client_assigns_one_id_per_message() {
    let client = MemoryClient::new();
    let messages = vec![Message::from("a"), Message::from("b"), Message::from("c")];

    let ids = client.publish_batch("orders", &messages).await.unwrap();

    assert_eq!(ids.len(), 3);
    let batches = client.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].topic, "orders");
    assert_eq!(batches[0].messages, messages);
    assert_eq!(batches[0].message_ids, ids);
}

#[tokio::test]
async fn test_memory_client_failure_and_recovery() {
    let client = MemoryClient::new();
    client.fail_with(ClientError::Unavailable("down".to_string()));

    let err = client
        .publish_batch("orders", &[Message::from("a")])
        .await
        .unwrap_err();
    assert_eq!(err, ClientError::Unavailable("down".to_string()));
    assert!(client.batches().is_empty());

    client.recover();
    client
        .publish_batch("orders", &[Message::from("b")])
        .await
        .unwrap();

    assert_eq!(client.attempts(), 2);
    assert_eq!(client.batch_sizes(), vec![1]);
    assert_eq!(client.messages(), vec![Message::from("b")]);
}

#[tokio::test(start_paused = true)]
async fn test_memory_client_latency_delays_the_answer() {
    let client = MemoryClient::new().with_latency(Duration::from_secs(2));
    let started = tokio::time::Instant::now();

    client
        .publish_batch("orders", &[Message::from("a")])
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_secs(2));
}
