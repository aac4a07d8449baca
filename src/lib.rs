//! # batchpub
//!
//! `batchpub` is an asynchronous batching publisher. It accepts messages for a
//! single topic, groups them into batches bounded by message count and request
//! size, and publishes each batch on a bounded pool of concurrent workers,
//! reporting every message's outcome through a completion callback.
//!
//! ## Core Modules
//!
//! - `publisher`: messages, batches, flow control and the `BatchPublisher` engine.
//! - `client`: the `PublishClient` collaborator trait and an in-memory implementation.
//! - `config`: loading publisher settings from files and environment variables.
//! - `utils`: error types and logging initialisation.

pub mod client;
pub mod config;
pub mod publisher;
pub mod utils;

pub use client::{MemoryClient, PublishClient};
pub use publisher::{BatchPublisher, Message, PublishResult};
pub use utils::error::{BatchPublishError, ClientError, FlowControlError, PublisherError};
