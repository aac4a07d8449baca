//! The `utils` module provides shared definitions used across `batchpub`.
//!
//! It centralizes the error taxonomy and the logging bootstrap so the
//! publisher, the collaborator clients and the CLI report failures the same way.

pub mod error;
pub mod logging;

#[cfg(test)]
mod tests;
