pub mod batch;
pub mod engine;
pub mod flow_control;
pub mod message;
pub mod result;

pub use engine::BatchPublisher;
pub use flow_control::FlowController;
pub use message::Message;
pub use result::PublishResult;
