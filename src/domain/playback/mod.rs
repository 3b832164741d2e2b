//! Playback Context - 播放限界上下文
//!
//! 职责:
//! - 每个聊天独立的播放队列
//! - 当前播放项（Idle / Playing）
//! - 循环、洗牌、切歌等状态转换

mod errors;
mod session;
mod value_objects;

pub use errors::PlaybackError;
pub use session::{AdvanceReason, AdvanceResult, PlaybackState, Session};
pub use value_objects::{ChatId, MediaKind, PlayableItem, QueueLimits};
