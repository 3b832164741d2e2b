//! Playback Commands - 播放相关命令
//!
//! 由外部协作方（命令解析、推流回调）产生，经调度器按聊天串行执行

use crate::application::ports::BulkEnqueueOutcome;
use crate::domain::playback::{AdvanceResult, PlayableItem};

/// 播放命令
#[derive(Debug, Clone)]
pub enum PlaybackCommand {
    /// 入队单个播放项
    Enqueue(PlayableItem),
    /// 批量入队（播放列表）
    EnqueueMany(Vec<PlayableItem>),
    /// 当前曲目播放完毕
    Advance,
    /// 用户跳过当前曲目
    Skip,
    /// 查看队列
    PeekQueue { limit: usize },
    /// 打乱队列
    Shuffle,
    /// 切换循环
    ToggleLoop,
    /// 停止并清空
    ClearAndStop,
}

impl PlaybackCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Enqueue(_) => "enqueue",
            Self::EnqueueMany(_) => "enqueue_many",
            Self::Advance => "advance",
            Self::Skip => "skip",
            Self::PeekQueue { .. } => "peek_queue",
            Self::Shuffle => "shuffle",
            Self::ToggleLoop => "toggle_loop",
            Self::ClearAndStop => "clear_and_stop",
        }
    }
}

/// 播放命令响应
#[derive(Debug, Clone)]
pub enum PlaybackReply {
    Enqueued { position: usize },
    BulkEnqueued(BulkEnqueueOutcome),
    Advanced(AdvanceResult),
    Queue(Vec<PlayableItem>),
    Shuffled { count: usize },
    LoopToggled { enabled: bool },
    Cleared,
}
