//! Event Publisher Implementation
//!
//! 播放信号推送实现：每个聊天一个 broadcast 通道，外加一个全局通道

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::application::ports::{PlaybackEvent, PlaybackEventSink};
use crate::domain::playback::ChatId;

/// 默认通道容量
const DEFAULT_CAPACITY: usize = 100;

/// 事件发布器
pub struct EventPublisher {
    /// chat_id -> broadcast sender (for chat-specific events)
    chat_channels: DashMap<ChatId, broadcast::Sender<PlaybackEvent>>,
    /// Global broadcast channel (all chats)
    global_channel: broadcast::Sender<PlaybackEvent>,
    capacity: usize,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (global_tx, _) = broadcast::channel(capacity);
        Self {
            chat_channels: DashMap::new(),
            global_channel: global_tx,
            capacity,
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 订阅所有聊天的信号
    pub fn subscribe_global(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.global_channel.subscribe()
    }

    /// 订阅单个聊天的信号，通道不存在时创建
    pub fn subscribe(&self, chat_id: ChatId) -> broadcast::Receiver<PlaybackEvent> {
        self.chat_channels
            .entry(chat_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// 取消注册聊天通道，已有订阅者随后收到 Closed
    pub fn unregister_chat(&self, chat_id: ChatId) {
        self.chat_channels.remove(&chat_id);
    }

    fn publish_to_chat(&self, chat_id: ChatId, event: PlaybackEvent) {
        if let Some(sender) = self.chat_channels.get(&chat_id) {
            if let Err(e) = sender.send(event) {
                tracing::debug!(
                    chat_id = %chat_id,
                    error = %e,
                    "Failed to publish event (no receivers)"
                );
            }
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackEventSink for EventPublisher {
    fn publish(&self, event: PlaybackEvent) {
        let chat_id = event.chat_id();
        let cleared = matches!(event, PlaybackEvent::Cleared { .. });

        if let Err(e) = self.global_channel.send(event.clone()) {
            tracing::trace!(
                chat_id = %chat_id,
                event = event.as_str(),
                error = %e,
                "No global subscribers"
            );
        }
        self.publish_to_chat(chat_id, event);

        // 会话已移除，关闭该聊天的通道
        if cleared {
            self.unregister_chat(chat_id);
        }
    }
}
