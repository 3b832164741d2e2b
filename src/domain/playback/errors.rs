//! Playback Context - Errors

use thiserror::Error;

use super::ChatId;

/// 播放状态机错误
///
/// 容量/时长类错误属于可预期结果，由展示层原样反馈给用户。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("Queue is full (max {max} items)")]
    QueueFull { max: usize },

    #[error("Duration {duration}s exceeds the limit of {limit}s")]
    DurationExceeded { duration: u64, limit: u64 },

    #[error("No playback session for chat {0}")]
    SessionNotFound(ChatId),

    #[error("Playlist exceeds the limit of {limit} items")]
    PlaylistTooLong { limit: usize },

    #[error("Invariant violated: {0}")]
    InvariantViolation(String),
}

impl PlaybackError {
    /// 是否为程序缺陷（而非用户可见的预期结果）
    pub fn is_defect(&self) -> bool {
        matches!(self, Self::InvariantViolation(_))
    }
}
