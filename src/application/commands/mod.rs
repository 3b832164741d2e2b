//! 应用层 - 命令（写操作）
//!
//! CQRS 命令侧：播放状态变更

mod playback_commands;

pub mod handlers;

pub use playback_commands::*;
