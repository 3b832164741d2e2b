//! Playback Dispatcher - Per-Chat Event Lanes
//!
//! 每个聊天一条 FIFO 通道（lane），由独立的 tokio 任务按到达顺序消费；
//! 所有 lane 共享一个 semaphore，限制同时执行的事件数。
//!
//! lane 在空闲超时或处理完 ClearAndStop 后回收。只有当该 lane 上没有
//! 未处理完的事件时才会从表中摘除，之后同一聊天的新事件进入新 lane，
//! 因此新旧 lane 不会并发执行。

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Semaphore};

use crate::application::{
    ApplicationError, PlaybackCommand, PlaybackCommandHandler, PlaybackReply, SessionRegistryPort,
};
use crate::domain::playback::ChatId;

/// 调度器配置
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// 最大并发执行数
    pub max_concurrent: usize,
    /// 每个聊天的通道容量
    pub channel_capacity: usize,
    /// lane 空闲多久后回收
    pub idle_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 8,
            channel_capacity: 256,
            idle_timeout: Duration::from_secs(60),
        }
    }
}

type ReplySender = oneshot::Sender<Result<PlaybackReply, ApplicationError>>;
type Lanes = Arc<DashMap<ChatId, Lane>>;

/// lane 上未处理完的事件计数，随事件移动，丢弃时归还
struct PendingGuard(Arc<AtomicUsize>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// 待执行的事件
struct Job {
    command: PlaybackCommand,
    reply: ReplySender,
    pending: PendingGuard,
}

struct Lane {
    id: u64,
    sender: mpsc::Sender<Job>,
    pending: Arc<AtomicUsize>,
}

impl Lane {
    /// 必须在持有表项锁时调用，回收判断依赖这一点
    fn acquire(&self) -> (mpsc::Sender<Job>, PendingGuard) {
        self.pending.fetch_add(1, Ordering::AcqRel);
        (self.sender.clone(), PendingGuard(self.pending.clone()))
    }
}

/// 播放调度器
///
/// 同一聊天的事件严格按到达顺序执行，不同聊天并行。
pub struct PlaybackDispatcher {
    config: DispatcherConfig,
    handler: Arc<PlaybackCommandHandler>,
    lanes: Lanes,
    next_lane_id: AtomicU64,
    permits: Arc<Semaphore>,
}

impl PlaybackDispatcher {
    pub fn new(config: DispatcherConfig, registry: Arc<dyn SessionRegistryPort>) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent));
        Self {
            config,
            handler: Arc::new(PlaybackCommandHandler::new(registry)),
            lanes: Arc::new(DashMap::new()),
            next_lane_id: AtomicU64::new(0),
            permits,
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn registry(&self) -> &Arc<dyn SessionRegistryPort> {
        self.handler.registry()
    }

    /// 提交事件并等待结果
    pub async fn dispatch(
        &self,
        chat_id: ChatId,
        command: PlaybackCommand,
    ) -> Result<PlaybackReply, ApplicationError> {
        let reply = self.submit(chat_id, command).await?;
        reply
            .await
            .map_err(|_| ApplicationError::DispatcherClosed(chat_id))?
    }

    /// 提交事件，返回结果接收端
    ///
    /// 返回时事件已进入该聊天的 lane，执行顺序即提交顺序。
    pub async fn submit(
        &self,
        chat_id: ChatId,
        command: PlaybackCommand,
    ) -> Result<oneshot::Receiver<Result<PlaybackReply, ApplicationError>>, ApplicationError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let (sender, pending) = self.lane(chat_id);

        sender
            .send(Job {
                command,
                reply: reply_tx,
                pending,
            })
            .await
            .map_err(|_| ApplicationError::DispatcherClosed(chat_id))?;

        Ok(reply_rx)
    }

    /// 当前存活的 lane 数
    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    /// 关闭所有 lane；已入队的事件仍会执行完毕
    pub fn shutdown(&self) {
        let count = self.lanes.len();
        self.lanes.clear();
        tracing::info!(lanes = count, "PlaybackDispatcher shut down");
    }

    fn lane(&self, chat_id: ChatId) -> (mpsc::Sender<Job>, PendingGuard) {
        if let Some(lane) = self.lanes.get(&chat_id) {
            return lane.acquire();
        }

        let lane = self
            .lanes
            .entry(chat_id)
            .or_insert_with(|| self.spawn_lane(chat_id));
        lane.acquire()
    }

    fn spawn_lane(&self, chat_id: ChatId) -> Lane {
        let id = self.next_lane_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(self.config.channel_capacity);
        let pending = Arc::new(AtomicUsize::new(0));

        let worker = LaneWorker {
            chat_id,
            lane_id: id,
            lanes: self.lanes.clone(),
            handler: self.handler.clone(),
            permits: self.permits.clone(),
            idle_timeout: self.config.idle_timeout,
        };
        tokio::spawn(worker.run(receiver));

        Lane {
            id,
            sender,
            pending,
        }
    }
}

/// 单个聊天的事件循环
struct LaneWorker {
    chat_id: ChatId,
    lane_id: u64,
    lanes: Lanes,
    handler: Arc<PlaybackCommandHandler>,
    permits: Arc<Semaphore>,
    idle_timeout: Duration,
}

impl LaneWorker {
    async fn run(self, mut receiver: mpsc::Receiver<Job>) {
        let chat_id = self.chat_id;
        tracing::debug!(chat_id = %chat_id, lane = self.lane_id, "Lane started");

        loop {
            let job = match tokio::time::timeout(self.idle_timeout, receiver.recv()).await {
                Ok(Some(job)) => job,
                Ok(None) => break,
                Err(_) => {
                    if self.try_retire("idle") {
                        break;
                    }
                    continue;
                }
            };

            let Job {
                command,
                reply,
                pending,
            } = job;
            let name = command.name();
            let clears = matches!(command, PlaybackCommand::ClearAndStop);

            let permit = match self.permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    tracing::error!(chat_id = %chat_id, error = %e, "Failed to acquire semaphore permit");
                    let _ = reply.send(Err(ApplicationError::DispatcherClosed(chat_id)));
                    break;
                }
            };

            let result = self.handler.handle(chat_id, command);
            drop(permit);

            if let Err(e) = &result {
                match e.as_playback() {
                    Some(err) if err.is_defect() => {
                        tracing::error!(chat_id = %chat_id, command = name, error = %e, "Command hit a defect");
                    }
                    _ => {
                        tracing::debug!(chat_id = %chat_id, command = name, error = %e, "Command failed");
                    }
                }
            }

            // 调用方可能已放弃等待
            if reply.send(result).is_err() {
                tracing::trace!(chat_id = %chat_id, command = name, "Reply dropped");
            }
            drop(pending);

            if clears && self.try_retire("cleared") {
                break;
            }
        }

        tracing::debug!(chat_id = %chat_id, lane = self.lane_id, "Lane stopped");
    }

    /// 没有未处理事件时从表中摘除自己
    ///
    /// 判断与 acquire 都在表项锁内进行，摘除成功后不会再有事件发往本 lane。
    fn try_retire(&self, reason: &'static str) -> bool {
        let retired = self
            .lanes
            .remove_if(&self.chat_id, |_, lane| {
                lane.id == self.lane_id && lane.pending.load(Ordering::Acquire) == 0
            })
            .is_some();
        if retired {
            tracing::debug!(chat_id = %self.chat_id, lane = self.lane_id, reason = reason, "Lane retired");
        }
        retired
    }
}
