//! Worker Layer - Per-Chat Event Dispatch
//!
//! 实现 PlaybackDispatcher，按聊天串行执行播放事件

mod dispatcher;

pub use dispatcher::{DispatcherConfig, PlaybackDispatcher};
