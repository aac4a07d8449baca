//! Error types used within `batchpub`.
//!
//! Errors fall into two groups. `PublisherError` and `FlowControlError` are
//! returned synchronously to the caller of `publish`. `BatchPublishError` is
//! only ever delivered asynchronously, through the completion callback of each
//! message in the failed batch.

use thiserror::Error;

/// Errors reported by a publish collaborator for a whole batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The destination could not be reached.
    #[error("publish service unavailable: {0}")]
    Unavailable(String),

    /// The destination refused the request.
    #[error("publish request rejected: {0}")]
    Rejected(String),

    /// The collaborator broke the positional id contract.
    #[error("expected {expected} message ids, received {received}")]
    IdCountMismatch { expected: usize, received: usize },
}

/// A failed batch, shared by every message that was part of it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to publish batch of {batch_size} messages to '{topic}': {source}")]
pub struct BatchPublishError {
    pub topic: String,
    pub batch_size: usize,
    #[source]
    pub source: ClientError,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowControlError {
    #[error(
        "flow control limits exceeded: {messages} messages / {bytes} bytes outstanding \
         (limits {message_limit} messages / {byte_limit} bytes)"
    )]
    LimitExceeded {
        messages: usize,
        bytes: usize,
        message_limit: usize,
        byte_limit: usize,
    },

    #[error("released {messages} messages / {bytes} bytes that were never acquired")]
    ReleaseUnderflow { messages: usize, bytes: usize },
}

/// Errors raised synchronously from the submission path.
#[derive(Debug, Error)]
pub enum PublisherError {
    #[error("publisher has been stopped")]
    Stopped,

    #[error("publisher batches are limited to zero messages")]
    NoBatchCapacity,

    #[error("message of {size} bytes can never fit a batch limited to {limit} bytes")]
    MessageTooLarge { size: usize, limit: usize },

    #[error(transparent)]
    FlowControl(#[from] FlowControlError),
}
