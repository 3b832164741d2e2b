//! Playback Event Sink Port - 状态变更信号
//!
//! 播放核心向展示/推流协作方发出的信号

use serde::{Deserialize, Serialize};

use crate::domain::playback::{ChatId, PlayableItem};

/// 播放信号
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum PlaybackEvent {
    /// 播放项入队
    Enqueued {
        chat_id: ChatId,
        position: usize,
        item: PlayableItem,
    },
    /// 曲目自然结束；next_item 为 None 表示进入空闲
    Completed {
        chat_id: ChatId,
        next_item: Option<PlayableItem>,
    },
    /// 用户跳过；next_item 为 None 表示进入空闲
    Skipped {
        chat_id: ChatId,
        next_item: Option<PlayableItem>,
    },
    /// 循环模式切换
    LoopToggled { chat_id: ChatId, enabled: bool },
    /// 会话被清空并移除
    Cleared { chat_id: ChatId },
}

impl PlaybackEvent {
    pub fn chat_id(&self) -> ChatId {
        match self {
            Self::Enqueued { chat_id, .. }
            | Self::Completed { chat_id, .. }
            | Self::Skipped { chat_id, .. }
            | Self::LoopToggled { chat_id, .. }
            | Self::Cleared { chat_id } => *chat_id,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enqueued { .. } => "enqueued",
            Self::Completed { .. } => "completed",
            Self::Skipped { .. } => "skipped",
            Self::LoopToggled { .. } => "loop_toggled",
            Self::Cleared { .. } => "cleared",
        }
    }
}

/// Playback Event Sink Port
///
/// 在会话临界区内被调用，实现必须非阻塞。
pub trait PlaybackEventSink: Send + Sync {
    fn publish(&self, event: PlaybackEvent);
}

/// 丢弃所有信号
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventSink;

impl PlaybackEventSink for NullEventSink {
    fn publish(&self, _event: PlaybackEvent) {}
}
