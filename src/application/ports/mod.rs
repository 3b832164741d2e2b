//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod event_sink;
mod session_registry;

pub use event_sink::{NullEventSink, PlaybackEvent, PlaybackEventSink};
pub use session_registry::{BulkEnqueueOutcome, SessionRegistryPort, SessionSummary};
