mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{
    FlowControlSettings, LimitExceededBehavior, LoggingSettings, PublisherSettings, Settings,
};

/// Prefix of the environment variables read by `load_config`, e.g.
/// `BATCHPUB__PUBLISHER__MAX_MESSAGES=500`.
pub const ENV_PREFIX: &str = "BATCHPUB";

/// Loads the configuration from the default file and environment variables
/// Merges the configuration with default values
/// Returns a `Settings` struct containing the publisher, flow control and logging configurations
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    let settings = merge_with_defaults(partial);
    settings.publisher.validate()?;
    settings.flow_control.validate()?;
    Ok(settings)
}

fn merge_with_defaults(partial: PartialSettings) -> Settings {
    let default_publisher = PublisherSettings::default();
    let publisher = PublisherSettings {
        max_bytes: partial
            .publisher
            .as_ref()
            .and_then(|p| p.max_bytes)
            .unwrap_or(default_publisher.max_bytes),
        max_messages: partial
            .publisher
            .as_ref()
            .and_then(|p| p.max_messages)
            .unwrap_or(default_publisher.max_messages),
        flush_interval_ms: partial
            .publisher
            .as_ref()
            .and_then(|p| p.flush_interval_ms)
            .unwrap_or(default_publisher.flush_interval_ms),
        worker_count: partial
            .publisher
            .as_ref()
            .and_then(|p| p.worker_count)
            .unwrap_or(default_publisher.worker_count),
    };

    // Flow control defaults scale with the merged publisher limits
    let default_flow = FlowControlSettings::for_publisher(&publisher);
    let flow_control = FlowControlSettings {
        message_limit: partial
            .flow_control
            .as_ref()
            .and_then(|f| f.message_limit)
            .unwrap_or(default_flow.message_limit),
        byte_limit: partial
            .flow_control
            .as_ref()
            .and_then(|f| f.byte_limit)
            .unwrap_or(default_flow.byte_limit),
        limit_exceeded_behavior: partial
            .flow_control
            .as_ref()
            .and_then(|f| f.limit_exceeded_behavior)
            .unwrap_or(default_flow.limit_exceeded_behavior),
    };

    Settings {
        publisher,
        flow_control,
        logging: LoggingSettings {
            level: partial
                .logging
                .and_then(|l| l.level)
                .unwrap_or_else(|| LoggingSettings::default().level),
        },
    }
}
