//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（SessionRegistry、PlaybackEventSink）
//! - commands: 播放命令及处理器
//! - queries: 聚合统计查询及处理器
//! - error: 应用层错误定义

pub mod commands;
pub mod error;
pub mod ports;
pub mod queries;

pub use commands::{handlers::PlaybackCommandHandler, PlaybackCommand, PlaybackReply};

pub use error::ApplicationError;

pub use ports::{
    BulkEnqueueOutcome, NullEventSink, PlaybackEvent, PlaybackEventSink, SessionRegistryPort,
    SessionSummary,
};

pub use queries::{handlers::GetQueueStatsHandler, GetQueueStats, QueueStats};
