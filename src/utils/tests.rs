use super::error::{BatchPublishError, ClientError, FlowControlError, PublisherError};
use super::logging;
use std::error::Error;

#[test]
fn logging_init_accepts_levels() {
    // Repeated initialisation must not panic
    logging::init("info");
    logging::init("debug");
    logging::init("warn");
}

#[test]
fn parse_level_falls_back_to_info() {
    assert_eq!(logging::parse_level("WARNING"), tracing::Level::WARN);
    assert_eq!(logging::parse_level(" trace "), tracing::Level::TRACE);
    assert_eq!(logging::parse_level("verbose"), tracing::Level::INFO);
}

#[test]
fn batch_error_exposes_client_error_as_source() {
    let err = BatchPublishError {
        topic: "orders".to_string(),
        batch_size: 3,
        source: ClientError::Unavailable("connection reset".to_string()),
    };

    assert_eq!(
        err.to_string(),
        "failed to publish batch of 3 messages to 'orders': publish service unavailable: connection reset"
    );
    let source = err.source().unwrap();
    assert_eq!(
        source.to_string(),
        "publish service unavailable: connection reset"
    );
}

#[test]
fn flow_control_error_converts_into_publisher_error() {
    let err: PublisherError = FlowControlError::ReleaseUnderflow {
        messages: 1,
        bytes: 10,
    }
    .into();
    assert!(matches!(
        err,
        PublisherError::FlowControl(FlowControlError::ReleaseUnderflow { .. })
    ));
}
