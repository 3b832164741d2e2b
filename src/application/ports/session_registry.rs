//! Session Registry Port - 会话注册表
//!
//! 定义按聊天 ID 访问播放会话的抽象接口，具体实现在 infrastructure/memory 层

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::playback::{
    AdvanceResult, ChatId, PlayableItem, PlaybackError, PlaybackState, QueueLimits, Session,
};

/// 会话只读摘要（某一时刻的快照）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub chat_id: ChatId,
    pub state: PlaybackState,
    pub queue_len: usize,
    pub now_playing: Option<String>,
    pub loop_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl SessionSummary {
    /// 队列非空或正在播放
    pub fn is_active(&self) -> bool {
        self.queue_len > 0 || self.state == PlaybackState::Playing
    }
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            chat_id: session.chat_id(),
            state: session.state(),
            queue_len: session.queue_len(),
            now_playing: session.current().map(|item| item.title().to_string()),
            loop_enabled: session.loop_enabled(),
            created_at: session.created_at(),
            last_activity: session.last_activity(),
        }
    }
}

/// 批量入队结果
#[derive(Debug, Clone, Default)]
pub struct BulkEnqueueOutcome {
    /// 成功入队项的 1-based 位置，按输入顺序
    pub positions: Vec<usize>,
    /// 被拒绝的项及原因
    pub rejected: Vec<(PlayableItem, PlaybackError)>,
}

impl BulkEnqueueOutcome {
    pub fn accepted(&self) -> usize {
        self.positions.len()
    }
}

/// Session Registry Port
///
/// 每个聊天 ID 对应恰好一个会话；同一聊天的操作严格串行，
/// 不同聊天的操作互不阻塞。
pub trait SessionRegistryPort: Send + Sync {
    /// 获取会话摘要，不存在时创建空闲会话
    fn get_or_create(&self, chat_id: ChatId) -> SessionSummary;

    /// 会话是否存在
    fn contains(&self, chat_id: ChatId) -> bool;

    /// 入队单个播放项，返回 1-based 位置
    fn enqueue(&self, chat_id: ChatId, item: PlayableItem) -> Result<usize, PlaybackError>;

    /// 在同一临界区内批量入队（播放列表导入）
    fn enqueue_many(&self, chat_id: ChatId, items: Vec<PlayableItem>) -> BulkEnqueueOutcome;

    /// 当前曲目自然结束
    fn advance(&self, chat_id: ChatId) -> Result<AdvanceResult, PlaybackError>;

    /// 用户请求跳过
    fn skip(&self, chat_id: ChatId) -> Result<AdvanceResult, PlaybackError>;

    /// 队列前 limit 项的副本；未知聊天返回空
    fn peek_queue(&self, chat_id: ChatId, limit: usize) -> Vec<PlayableItem>;

    /// 打乱待播队列，返回队列长度
    fn shuffle(&self, chat_id: ChatId) -> Result<usize, PlaybackError>;

    /// 切换循环模式，返回新状态
    fn toggle_loop(&self, chat_id: ChatId) -> bool;

    /// 清空并移除会话（幂等）
    fn clear_and_stop(&self, chat_id: ChatId);

    /// 清空并移除所有会话，返回移除数量
    fn clear_all(&self) -> usize;

    /// 队列是否为空（未知聊天视为空）
    fn is_empty(&self, chat_id: ChatId) -> bool;

    /// 当前播放项
    fn now_playing(&self, chat_id: ChatId) -> Option<PlayableItem>;

    /// 单个会话摘要，不创建会话
    fn session_summary(&self, chat_id: ChatId) -> Option<SessionSummary>;

    /// 所有已注册聊天 ID
    fn chat_ids(&self) -> Vec<ChatId>;

    /// 一致性快照
    fn snapshot_all(&self) -> Vec<SessionSummary>;

    /// 当前生效的队列限制
    fn limits(&self) -> QueueLimits;
}
