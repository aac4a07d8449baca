//! The `client` module defines the publish collaborator a `BatchPublisher`
//! sends its batches to.
//!
//! It provides the `PublishClient` trait, which any transport (gRPC, HTTP,
//! a broker connection) implements, and `MemoryClient`, an in-process
//! implementation that records every batch it receives.

pub mod memory;
pub mod publish_client;

pub use memory::{MemoryClient, PublishedBatch};
pub use publish_client::PublishClient;

#[cfg(test)]
mod tests;
