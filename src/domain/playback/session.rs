//! Playback Context - Session Aggregate

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use super::{ChatId, PlayableItem, PlaybackError, QueueLimits};

/// 会话播放状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    Idle,
    Playing,
}

/// advance 的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceResult {
    NextItem(PlayableItem),
    BecameIdle,
}

impl AdvanceResult {
    pub fn next_item(&self) -> Option<&PlayableItem> {
        match self {
            Self::NextItem(item) => Some(item),
            Self::BecameIdle => None,
        }
    }
}

/// 触发 advance 的原因，仅影响发出的信号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceReason {
    /// 曲目自然播放完毕
    Completed,
    /// 用户请求跳过
    Skipped,
}

/// 每个聊天的播放会话
///
/// 不变量:
/// - current 为 None 当且仅当会话处于 Idle
/// - 队列长度不超过 max_queue_size，超出的入队被拒绝而非截断
/// - current 只能通过 advance 改变（clear 除外）
/// - Idle 且队列非空只是过渡状态，由调用方显式 advance 解决
#[derive(Debug, Clone)]
pub struct Session {
    chat_id: ChatId,
    queue: VecDeque<PlayableItem>,
    current: Option<PlayableItem>,
    loop_enabled: bool,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

impl Session {
    /// 创建空闲、空队列的会话
    pub fn new(chat_id: ChatId) -> Self {
        let now = Utc::now();
        Self {
            chat_id,
            queue: VecDeque::new(),
            current: None,
            loop_enabled: false,
            created_at: now,
            last_activity: now,
        }
    }

    /// 检查播放项能否入队，不修改状态
    pub fn admit(&self, item: &PlayableItem, limits: &QueueLimits) -> Result<(), PlaybackError> {
        if self.queue.len() >= limits.max_queue_size {
            return Err(PlaybackError::QueueFull {
                max: limits.max_queue_size,
            });
        }
        if item.duration_secs() > limits.max_duration_limit {
            return Err(PlaybackError::DurationExceeded {
                duration: item.duration_secs(),
                limit: limits.max_duration_limit,
            });
        }
        Ok(())
    }

    /// 追加到队尾，返回 1-based 位置
    pub fn enqueue(
        &mut self,
        item: PlayableItem,
        limits: &QueueLimits,
    ) -> Result<usize, PlaybackError> {
        self.admit(&item, limits)?;
        self.queue.push_back(item);
        self.touch();
        Ok(self.queue.len())
    }

    /// 消费队首作为新的 current
    ///
    /// 开启循环时，刚结束的 current 会被追加回队尾；
    /// 队列为空时进入 Idle，不做任何追加。
    pub fn advance(&mut self) -> AdvanceResult {
        self.touch();
        match self.queue.pop_front() {
            Some(next) => {
                if self.loop_enabled {
                    if let Some(finished) = self.current.take() {
                        self.queue.push_back(finished);
                    }
                }
                self.current = Some(next.clone());
                AdvanceResult::NextItem(next)
            }
            None => {
                self.current = None;
                AdvanceResult::BecameIdle
            }
        }
    }

    /// 返回最多 limit 项的队列副本
    pub fn peek_queue(&self, limit: usize) -> Vec<PlayableItem> {
        self.queue.iter().take(limit).cloned().collect()
    }

    /// 使用线程随机数打乱待播队列
    pub fn shuffle(&mut self) -> Result<usize, PlaybackError> {
        self.shuffle_with(&mut rand::thread_rng())
    }

    /// Fisher-Yates 均匀打乱，不影响 current
    pub fn shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<usize, PlaybackError> {
        let before = self.queue.len();
        if before == 0 {
            return Ok(0);
        }

        self.queue.make_contiguous().shuffle(rng);
        self.touch();

        let after = self.queue.len();
        if after != before {
            return Err(PlaybackError::InvariantViolation(format!(
                "shuffle changed queue length of chat {} from {} to {}",
                self.chat_id, before, after
            )));
        }
        Ok(after)
    }

    /// 切换循环模式，返回新状态
    pub fn toggle_loop(&mut self) -> bool {
        self.loop_enabled = !self.loop_enabled;
        self.touch();
        self.loop_enabled
    }

    /// 清空队列并回到 Idle，循环标志不变
    pub fn clear(&mut self) {
        self.queue.clear();
        self.current = None;
        self.touch();
    }

    fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    // Getters
    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    pub fn state(&self) -> PlaybackState {
        if self.current.is_some() {
            PlaybackState::Playing
        } else {
            PlaybackState::Idle
        }
    }

    pub fn current(&self) -> Option<&PlayableItem> {
        self.current.as_ref()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn loop_enabled(&self) -> bool {
        self.loop_enabled
    }

    /// 是否计入活跃会话：队列非空或正在播放
    pub fn is_active(&self) -> bool {
        !self.queue.is_empty() || self.current.is_some()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }
}
