//! Domain Layer - 领域层
//!
//! 包含一个限界上下文:
//! - Playback Context: 每个聊天的播放队列与状态机

pub mod playback;
