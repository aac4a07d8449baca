use async_trait::async_trait;

use crate::publisher::message::Message;
use crate::utils::error::ClientError;

/// The publish RPC a `BatchPublisher` flushes its batches through.
///
/// Implementations must return exactly one id per message, in the order the
/// messages were given. A failure applies to the whole batch.
#[async_trait]
pub trait PublishClient: Send + Sync {
    async fn publish_batch(
        &self,
        topic: &str,
        messages: &[Message],
    ) -> Result<Vec<String>, ClientError>;
}
