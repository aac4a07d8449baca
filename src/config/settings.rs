use serde::{Deserialize, Serialize};

/// Top-level configuration settings for the application.
///
/// Groups the batching limits of the publisher, its flow control policy and
/// the logging level.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    pub publisher: PublisherSettings,
    pub flow_control: FlowControlSettings,
    pub logging: LoggingSettings,
}

/// Batching limits and worker pool size for a `BatchPublisher`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct PublisherSettings {
    /// Byte ceiling for a single publish request.
    pub max_bytes: usize,
    /// Message-count ceiling for a single publish request.
    pub max_messages: usize,
    /// Longest time a partial batch may wait before it is flushed.
    pub flush_interval_ms: u64,
    /// Number of batches that may be publishing concurrently.
    pub worker_count: usize,
}

/// What a flow controller does once its limits are reached.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LimitExceededBehavior {
    #[default]
    Ignore,
    Error,
    Block,
}

/// Limits on messages that were submitted but whose batch has not completed.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct FlowControlSettings {
    pub message_limit: usize,
    pub byte_limit: usize,
    pub limit_exceeded_behavior: LimitExceededBehavior,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub publisher: Option<PartialPublisherSettings>,
    pub flow_control: Option<PartialFlowControlSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialPublisherSettings {
    pub max_bytes: Option<usize>,
    pub max_messages: Option<usize>,
    pub flush_interval_ms: Option<u64>,
    pub worker_count: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PartialFlowControlSettings {
    pub message_limit: Option<usize>,
    pub byte_limit: Option<usize>,
    pub limit_exceeded_behavior: Option<LimitExceededBehavior>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

impl PublisherSettings {
    pub const DEFAULT_MAX_BYTES: usize = 5 * 1024 * 1024;
    pub const DEFAULT_MAX_MESSAGES: usize = 1000;
    pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 250;
    pub const MIN_WORKER_COUNT: usize = 2;

    /// Twice the available parallelism, never fewer than two workers.
    pub fn default_worker_count() -> usize {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        (cores * 2).max(Self::MIN_WORKER_COUNT)
    }

    pub fn flush_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.flush_interval_ms)
    }

    /// Rejects limits that would make batching impossible.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.max_bytes == 0 {
            return Err(config::ConfigError::Message(
                "publisher.max_bytes must be greater than zero".to_string(),
            ));
        }
        if self.max_messages == 0 {
            return Err(config::ConfigError::Message(
                "publisher.max_messages must be greater than zero".to_string(),
            ));
        }
        if self.flush_interval_ms == 0 {
            return Err(config::ConfigError::Message(
                "publisher.flush_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.worker_count < Self::MIN_WORKER_COUNT {
            return Err(config::ConfigError::Message(format!(
                "publisher.worker_count must be at least {}",
                Self::MIN_WORKER_COUNT
            )));
        }
        Ok(())
    }
}

impl Default for PublisherSettings {
    fn default() -> Self {
        Self {
            max_bytes: Self::DEFAULT_MAX_BYTES,
            max_messages: Self::DEFAULT_MAX_MESSAGES,
            flush_interval_ms: Self::DEFAULT_FLUSH_INTERVAL_MS,
            worker_count: Self::default_worker_count(),
        }
    }
}

impl FlowControlSettings {
    /// Ten batches worth of outstanding messages, ignored unless configured.
    pub fn for_publisher(publisher: &PublisherSettings) -> Self {
        Self {
            message_limit: publisher.max_messages.saturating_mul(10),
            byte_limit: publisher.max_bytes.saturating_mul(10),
            limit_exceeded_behavior: LimitExceededBehavior::Ignore,
        }
    }
}

impl FlowControlSettings {
    /// Rejects limits that no message could ever fit under.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.message_limit == 0 {
            return Err(config::ConfigError::Message(
                "flow_control.message_limit must be greater than zero".to_string(),
            ));
        }
        if self.byte_limit == 0 {
            return Err(config::ConfigError::Message(
                "flow_control.byte_limit must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for FlowControlSettings {
    fn default() -> Self {
        Self::for_publisher(&PublisherSettings::default())
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Provides default values for `Settings`.
impl Default for Settings {
    fn default() -> Self {
        Self {
            publisher: PublisherSettings::default(),
            flow_control: FlowControlSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}
