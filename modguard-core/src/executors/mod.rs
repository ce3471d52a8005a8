pub mod channel_executor;
pub mod log_executor;

pub use channel_executor::{ChannelExecutor, OutboundMessage};
pub use log_executor::LoggingExecutor;
