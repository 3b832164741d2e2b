//! 应用层错误定义
//!
//! 调度边界的统一错误类型

use thiserror::Error;

use crate::domain::playback::{ChatId, PlaybackError};

/// 应用层错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 播放状态机返回的错误（可原样反馈给用户）
    #[error(transparent)]
    Playback(#[from] PlaybackError),

    /// 聊天的调度通道已关闭
    #[error("Dispatcher closed for chat {0}")]
    DispatcherClosed(ChatId),
}

impl ApplicationError {
    /// 取出播放错误（若是）
    pub fn as_playback(&self) -> Option<&PlaybackError> {
        match self {
            Self::Playback(e) => Some(e),
            _ => None,
        }
    }
}
