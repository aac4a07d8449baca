//! Batches of pending messages
//!
//! A `Batch` is only mutable while it is the publisher's current batch. Once
//! it is handed to a flush worker it is consumed by `into_items`.
//!
//! Byte accounting mirrors the publish request the batch becomes: the topic
//! field is always present, and every message is one more length-delimited
//! entry of the repeated `messages` field.

use tokio::time::Instant;

use crate::publisher::message::{Message, field_len};
use crate::publisher::result::PublishResult;

/// Completion callback invoked once per message.
pub type Callback = Box<dyn FnOnce(PublishResult) + Send + 'static>;

pub struct PendingItem {
    pub message: Message,
    pub callback: Option<Callback>,
    /// Bytes this message adds to the request.
    pub(crate) request_bytes: usize,
}

impl PendingItem {
    pub fn new(message: Message, callback: Option<Callback>) -> Self {
        let request_bytes = field_len(message.encoded_len());
        Self {
            message,
            callback,
            request_bytes,
        }
    }

    pub fn request_bytes(&self) -> usize {
        self.request_bytes
    }
}

impl std::fmt::Debug for PendingItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingItem")
            .field("message", &self.message)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

#[derive(Debug)]
pub struct Batch {
    items: Vec<PendingItem>,
    total_bytes: usize,
    max_messages: usize,
    max_bytes: usize,
    created_at: Instant,
}

impl Batch {
    pub fn new(topic: &str, max_messages: usize, max_bytes: usize) -> Self {
        Self {
            items: Vec::new(),
            total_bytes: Self::request_overhead(topic),
            max_messages,
            max_bytes,
            created_at: Instant::now(),
        }
    }

    /// Bytes an empty publish request for `topic` already occupies.
    pub fn request_overhead(topic: &str) -> usize {
        field_len(topic.len())
    }

    /// Appends `item`, or hands it back if either limit would be exceeded.
    pub fn try_add(&mut self, item: PendingItem) -> Result<(), PendingItem> {
        if self.items.len() + 1 > self.max_messages
            || self.total_bytes + item.request_bytes > self.max_bytes
        {
            return Err(item);
        }

        self.total_bytes += item.request_bytes;
        self.items.push(item);

        debug_assert!(self.items.len() <= self.max_messages);
        debug_assert!(self.total_bytes <= self.max_bytes);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.max_messages
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn into_items(self) -> Vec<PendingItem> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOPIC: &str = "topic-name-goes-here";

    fn item(data: &str) -> PendingItem {
        PendingItem::new(Message::from(data), None)
    }

    #[test]
    fn overhead_counts_topic_field() {
        assert_eq!(Batch::request_overhead(TOPIC), 22);
        assert_eq!(Batch::new(TOPIC, 10, 1000).total_bytes(), 22);
    }

    #[test]
    fn rejects_once_message_count_is_reached() {
        let mut batch = Batch::new(TOPIC, 10, 10_000);
        for _ in 0..10 {
            assert!(batch.try_add(item("hello world")).is_ok());
        }
        assert!(batch.is_full());

        let rejected = batch.try_add(item("hello world")).unwrap_err();
        assert_eq!(rejected.message, Message::from("hello world"));
        assert_eq!(batch.len(), 10);
    }

    #[test]
    fn rejects_once_byte_limit_would_be_exceeded() {
        // 22 bytes of topic plus 15 per "hello world": ten fit in 175, eleven do not
        let mut batch = Batch::new(TOPIC, 1000, 175);
        for _ in 0..10 {
            assert!(batch.try_add(item("hello world")).is_ok());
        }
        assert_eq!(batch.total_bytes(), 172);
        assert!(!batch.is_full());
        assert!(batch.try_add(item("hello world")).is_err());
        assert_eq!(batch.len(), 10);
    }

    #[test]
    fn message_exactly_at_limit_is_accepted() {
        let mut batch = Batch::new(TOPIC, 1000, 22 + 15);
        assert!(batch.try_add(item("hello world")).is_ok());
        assert_eq!(batch.total_bytes(), 37);
    }

    #[test]
    fn into_items_preserves_insertion_order() {
        let mut batch = Batch::new(TOPIC, 10, 10_000);
        for data in ["a", "b", "c"] {
            batch.try_add(item(data)).unwrap();
        }
        let data: Vec<_> = batch
            .into_items()
            .into_iter()
            .map(|i| i.message.data)
            .collect();
        assert_eq!(data, vec!["a", "b", "c"]);
    }
}
