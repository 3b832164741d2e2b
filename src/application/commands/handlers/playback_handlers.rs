//! Playback Command Handlers

use std::sync::Arc;

use crate::application::commands::playback_commands::{PlaybackCommand, PlaybackReply};
use crate::application::error::ApplicationError;
use crate::application::ports::SessionRegistryPort;
use crate::domain::playback::ChatId;

/// Playback Handler - 将命令映射到会话注册表操作
pub struct PlaybackCommandHandler {
    registry: Arc<dyn SessionRegistryPort>,
}

impl PlaybackCommandHandler {
    pub fn new(registry: Arc<dyn SessionRegistryPort>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<dyn SessionRegistryPort> {
        &self.registry
    }

    pub fn handle(
        &self,
        chat_id: ChatId,
        cmd: PlaybackCommand,
    ) -> Result<PlaybackReply, ApplicationError> {
        let reply = match cmd {
            PlaybackCommand::Enqueue(item) => PlaybackReply::Enqueued {
                position: self.registry.enqueue(chat_id, item)?,
            },
            PlaybackCommand::EnqueueMany(items) => {
                PlaybackReply::BulkEnqueued(self.registry.enqueue_many(chat_id, items))
            }
            PlaybackCommand::Advance => PlaybackReply::Advanced(self.registry.advance(chat_id)?),
            PlaybackCommand::Skip => PlaybackReply::Advanced(self.registry.skip(chat_id)?),
            PlaybackCommand::PeekQueue { limit } => {
                PlaybackReply::Queue(self.registry.peek_queue(chat_id, limit))
            }
            PlaybackCommand::Shuffle => PlaybackReply::Shuffled {
                count: self.registry.shuffle(chat_id)?,
            },
            PlaybackCommand::ToggleLoop => PlaybackReply::LoopToggled {
                enabled: self.registry.toggle_loop(chat_id),
            },
            PlaybackCommand::ClearAndStop => {
                self.registry.clear_and_stop(chat_id);
                PlaybackReply::Cleared
            }
        };
        Ok(reply)
    }
}
