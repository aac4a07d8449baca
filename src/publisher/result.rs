use crate::publisher::message::Message;
use crate::utils::error::BatchPublishError;

/// Outcome of publishing one message, handed to its completion callback.
#[derive(Debug, Clone)]
pub struct PublishResult {
    pub message: Message,
    pub outcome: Result<String, BatchPublishError>,
}

impl PublishResult {
    pub fn success(message: Message, message_id: String) -> Self {
        Self {
            message,
            outcome: Ok(message_id),
        }
    }

    pub fn failure(message: Message, error: BatchPublishError) -> Self {
        Self {
            message,
            outcome: Err(error),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn failed(&self) -> bool {
        !self.succeeded()
    }

    /// Server-assigned id, present only on success.
    pub fn message_id(&self) -> Option<&str> {
        self.outcome.as_ref().ok().map(String::as_str)
    }

    pub fn error(&self) -> Option<&BatchPublishError> {
        self.outcome.as_ref().err()
    }
}
