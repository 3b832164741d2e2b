//! In-Memory Session Registry Implementation
//!
//! 锁粒度:
//! - DashMap 分片锁只保护 chat_id -> 会话槽 的插入/删除
//! - 每个会话有独立的 Mutex，同一聊天的操作在其中串行
//! - membership: 只在插入新会话时持读锁，快照/全量清理持写锁冻结成员集合；
//!   会话临界区从不持有它，聊天之间互不阻塞

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

use crate::application::ports::{
    BulkEnqueueOutcome, PlaybackEvent, PlaybackEventSink, SessionRegistryPort, SessionSummary,
};
use crate::domain::playback::{
    AdvanceReason, AdvanceResult, ChatId, PlayableItem, PlaybackError, QueueLimits, Session,
};

/// 注册表中的会话槽
///
/// removed 为 true 表示该槽已从注册表摘除，持有旧 Arc 的调用方需重新查找。
struct SessionSlot {
    session: Session,
    removed: bool,
}

type SharedSlot = Arc<Mutex<SessionSlot>>;

/// 内存会话注册表
pub struct InMemorySessionRegistry {
    sessions: DashMap<ChatId, SharedSlot>,
    limits: RwLock<QueueLimits>,
    membership: RwLock<()>,
    events: Arc<dyn PlaybackEventSink>,
}

impl InMemorySessionRegistry {
    pub fn new(limits: QueueLimits, events: Arc<dyn PlaybackEventSink>) -> Self {
        Self {
            sessions: DashMap::new(),
            limits: RwLock::new(limits),
            membership: RwLock::new(()),
            events,
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 运行时更新队列限制
    ///
    /// 已在队列中的项不受影响，新限制从下一次入队开始生效。
    pub fn update_limits(&self, limits: QueueLimits) -> Result<(), &'static str> {
        limits.validate()?;
        *self.limits.write() = limits;
        tracing::info!(
            max_queue_size = limits.max_queue_size,
            max_duration_limit = limits.max_duration_limit,
            playlist_limit = limits.playlist_limit,
            "Queue limits updated"
        );
        Ok(())
    }

    /// 已注册会话数
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_registry_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn slot_or_create(&self, chat_id: ChatId) -> SharedSlot {
        if let Some(slot) = self.sessions.get(&chat_id) {
            return slot.value().clone();
        }
        let _membership = self.membership.read();
        self.sessions
            .entry(chat_id)
            .or_insert_with(|| {
                tracing::info!(chat_id = %chat_id, "Session created");
                Arc::new(Mutex::new(SessionSlot {
                    session: Session::new(chat_id),
                    removed: false,
                }))
            })
            .value()
            .clone()
    }

    fn existing_slot(&self, chat_id: ChatId) -> Option<SharedSlot> {
        self.sessions.get(&chat_id).map(|slot| slot.value().clone())
    }

    /// 在会话临界区内执行 f，会话不存在时创建
    fn with_session<T>(&self, chat_id: ChatId, f: impl FnOnce(&mut Session) -> T) -> T {
        loop {
            let slot = self.slot_or_create(chat_id);
            let mut guard = slot.lock();
            if guard.removed {
                continue;
            }
            return f(&mut guard.session);
        }
    }

    /// 在会话临界区内执行 f，会话不存在时返回 None
    fn with_existing<T>(&self, chat_id: ChatId, f: impl FnOnce(&mut Session) -> T) -> Option<T> {
        loop {
            let slot = self.existing_slot(chat_id)?;
            let mut guard = slot.lock();
            if guard.removed {
                continue;
            }
            return Some(f(&mut guard.session));
        }
    }

    /// 按 chat id 排序的会话槽，固定跨会话加锁顺序
    fn collect_slots(&self) -> Vec<(ChatId, SharedSlot)> {
        let mut slots: Vec<(ChatId, SharedSlot)> = self
            .sessions
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        slots.sort_unstable_by_key(|(chat_id, _)| *chat_id);
        slots
    }

    fn advance_with_reason(
        &self,
        chat_id: ChatId,
        reason: AdvanceReason,
    ) -> Result<AdvanceResult, PlaybackError> {
        self.with_existing(chat_id, |session| {
            let result = session.advance();
            let next_item = result.next_item().cloned();

            tracing::debug!(
                chat_id = %chat_id,
                reason = ?reason,
                next = ?next_item.as_ref().map(|i| i.title()),
                queue_len = session.queue_len(),
                "Session advanced"
            );

            let event = match reason {
                AdvanceReason::Completed => PlaybackEvent::Completed { chat_id, next_item },
                AdvanceReason::Skipped => PlaybackEvent::Skipped { chat_id, next_item },
            };
            self.events.publish(event);
            result
        })
        .ok_or(PlaybackError::SessionNotFound(chat_id))
    }
}

impl SessionRegistryPort for InMemorySessionRegistry {
    fn get_or_create(&self, chat_id: ChatId) -> SessionSummary {
        self.with_session(chat_id, |session| SessionSummary::from(&*session))
    }

    fn contains(&self, chat_id: ChatId) -> bool {
        self.sessions.contains_key(&chat_id)
    }

    fn enqueue(&self, chat_id: ChatId, item: PlayableItem) -> Result<usize, PlaybackError> {
        self.with_session(chat_id, |session| {
            let limits = *self.limits.read();
            match session.enqueue(item.clone(), &limits) {
                Ok(position) => {
                    tracing::debug!(
                        chat_id = %chat_id,
                        title = %item.title(),
                        kind = item.kind().as_str(),
                        position = position,
                        "Item enqueued"
                    );
                    self.events.publish(PlaybackEvent::Enqueued {
                        chat_id,
                        position,
                        item,
                    });
                    Ok(position)
                }
                Err(e) => {
                    tracing::warn!(
                        chat_id = %chat_id,
                        title = %item.title(),
                        error = %e,
                        "Enqueue rejected"
                    );
                    Err(e)
                }
            }
        })
    }

    fn enqueue_many(&self, chat_id: ChatId, items: Vec<PlayableItem>) -> BulkEnqueueOutcome {
        self.with_session(chat_id, |session| {
            let limits = *self.limits.read();
            let mut outcome = BulkEnqueueOutcome::default();

            for (index, item) in items.into_iter().enumerate() {
                if index >= limits.playlist_limit {
                    outcome.rejected.push((
                        item,
                        PlaybackError::PlaylistTooLong {
                            limit: limits.playlist_limit,
                        },
                    ));
                    continue;
                }

                match session.enqueue(item.clone(), &limits) {
                    Ok(position) => {
                        outcome.positions.push(position);
                        self.events.publish(PlaybackEvent::Enqueued {
                            chat_id,
                            position,
                            item,
                        });
                    }
                    Err(e) => outcome.rejected.push((item, e)),
                }
            }

            tracing::info!(
                chat_id = %chat_id,
                accepted = outcome.accepted(),
                rejected = outcome.rejected.len(),
                "Bulk enqueue finished"
            );
            outcome
        })
    }

    fn advance(&self, chat_id: ChatId) -> Result<AdvanceResult, PlaybackError> {
        self.advance_with_reason(chat_id, AdvanceReason::Completed)
    }

    fn skip(&self, chat_id: ChatId) -> Result<AdvanceResult, PlaybackError> {
        self.advance_with_reason(chat_id, AdvanceReason::Skipped)
    }

    fn peek_queue(&self, chat_id: ChatId, limit: usize) -> Vec<PlayableItem> {
        self.with_existing(chat_id, |session| session.peek_queue(limit))
            .unwrap_or_default()
    }

    fn shuffle(&self, chat_id: ChatId) -> Result<usize, PlaybackError> {
        self.with_existing(chat_id, |session| {
            let result = session.shuffle();
            match &result {
                Ok(count) => {
                    tracing::debug!(chat_id = %chat_id, count = count, "Queue shuffled");
                }
                Err(e) => {
                    tracing::error!(chat_id = %chat_id, error = %e, "Shuffle failed");
                }
            }
            result
        })
        .unwrap_or(Ok(0))
    }

    fn toggle_loop(&self, chat_id: ChatId) -> bool {
        self.with_session(chat_id, |session| {
            let enabled = session.toggle_loop();
            tracing::debug!(chat_id = %chat_id, enabled = enabled, "Loop toggled");
            self.events
                .publish(PlaybackEvent::LoopToggled { chat_id, enabled });
            enabled
        })
    }

    fn clear_and_stop(&self, chat_id: ChatId) {
        loop {
            let Some(slot) = self.existing_slot(chat_id) else {
                return;
            };
            let mut guard = slot.lock();
            if guard.removed {
                continue;
            }

            guard.session.clear();
            guard.removed = true;
            // 先发信号再摘除，新会话的信号一定排在 Cleared 之后
            self.events.publish(PlaybackEvent::Cleared { chat_id });
            self.sessions
                .remove_if(&chat_id, |_, current| Arc::ptr_eq(current, &slot));

            tracing::info!(chat_id = %chat_id, "Session cleared and removed");
            return;
        }
    }

    fn clear_all(&self) -> usize {
        let _membership = self.membership.write();
        let slots = self.collect_slots();

        let mut removed = 0;
        for (chat_id, slot) in slots {
            let mut guard = slot.lock();
            if guard.removed {
                continue;
            }
            guard.session.clear();
            guard.removed = true;
            // 先发信号再摘除，新会话的信号一定排在 Cleared 之后
            self.events.publish(PlaybackEvent::Cleared { chat_id });
            self.sessions
                .remove_if(&chat_id, |_, current| Arc::ptr_eq(current, &slot));
            removed += 1;
        }

        tracing::info!(removed = removed, "All sessions cleared");
        removed
    }

    fn is_empty(&self, chat_id: ChatId) -> bool {
        self.with_existing(chat_id, |session| session.is_empty())
            .unwrap_or(true)
    }

    fn now_playing(&self, chat_id: ChatId) -> Option<PlayableItem> {
        self.with_existing(chat_id, |session| session.current().cloned())
            .flatten()
    }

    fn session_summary(&self, chat_id: ChatId) -> Option<SessionSummary> {
        self.with_existing(chat_id, |session| SessionSummary::from(&*session))
    }

    fn chat_ids(&self) -> Vec<ChatId> {
        self.sessions.iter().map(|e| *e.key()).collect()
    }

    /// 冻结成员集合后按 chat id 顺序逐个加锁，全部持有后再拷贝
    ///
    /// 尚未轮到的会话不受影响；已摘除的槽视为快照之前就已删除。
    fn snapshot_all(&self) -> Vec<SessionSummary> {
        let _membership = self.membership.write();
        let slots = self.collect_slots();
        let guards: Vec<_> = slots.iter().map(|(_, slot)| slot.lock()).collect();

        guards
            .iter()
            .filter(|guard| !guard.removed)
            .map(|guard| SessionSummary::from(&guard.session))
            .collect()
    }

    fn limits(&self) -> QueueLimits {
        *self.limits.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::playback::{MediaKind, PlaybackState};
    use std::collections::HashMap;
    use std::time::{Duration, Instant};

    /// 记录所有信号，便于断言顺序
    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<PlaybackEvent>>,
    }

    impl RecordingSink {
        fn take(&self) -> Vec<PlaybackEvent> {
            std::mem::take(&mut *self.events.lock())
        }
    }

    impl PlaybackEventSink for RecordingSink {
        fn publish(&self, event: PlaybackEvent) {
            self.events.lock().push(event);
        }
    }

    /// 对指定聊天的入队信号阻塞一段时间，拉长该会话的临界区
    struct SlowSink {
        chat_id: ChatId,
        delay: Duration,
    }

    impl PlaybackEventSink for SlowSink {
        fn publish(&self, event: PlaybackEvent) {
            if matches!(&event, PlaybackEvent::Enqueued { chat_id, .. } if *chat_id == self.chat_id) {
                std::thread::sleep(self.delay);
            }
        }
    }

    fn item(title: &str) -> PlayableItem {
        PlayableItem::new(title, 180, format!("/tmp/{}.mp3", title), "tester", MediaKind::File)
    }

    fn registry_with(max_queue_size: usize) -> (InMemorySessionRegistry, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let limits = QueueLimits {
            max_queue_size,
            ..QueueLimits::default()
        };
        (InMemorySessionRegistry::new(limits, sink.clone()), sink)
    }

    #[test]
    fn test_get_or_create_returns_same_session() {
        let (registry, _) = registry_with(10);
        let chat = ChatId::new(1);

        let first = registry.get_or_create(chat);
        assert_eq!(first.state, PlaybackState::Idle);
        assert_eq!(first.queue_len, 0);

        registry.enqueue(chat, item("A")).unwrap();
        let second = registry.get_or_create(chat);
        assert_eq!(second.queue_len, 1);
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_read_paths_do_not_create_sessions() {
        let (registry, _) = registry_with(10);
        let chat = ChatId::new(404);

        assert!(registry.peek_queue(chat, 10).is_empty());
        assert!(registry.is_empty(chat));
        assert!(registry.now_playing(chat).is_none());
        assert!(registry.session_summary(chat).is_none());
        assert_eq!(registry.shuffle(chat), Ok(0));
        assert!(registry.snapshot_all().is_empty());

        assert!(!registry.contains(chat));
        assert!(registry.is_registry_empty());
    }

    #[test]
    fn test_advance_unknown_chat_is_session_not_found() {
        let (registry, sink) = registry_with(10);
        let chat = ChatId::new(7);

        assert_eq!(
            registry.advance(chat),
            Err(PlaybackError::SessionNotFound(chat))
        );
        assert_eq!(
            registry.skip(chat),
            Err(PlaybackError::SessionNotFound(chat))
        );
        assert!(!registry.contains(chat));
        assert!(sink.take().is_empty());
    }

    #[test]
    fn test_signals_follow_call_order() {
        let (registry, sink) = registry_with(10);
        let chat = ChatId::new(1);

        registry.enqueue(chat, item("A")).unwrap();
        registry.enqueue(chat, item("B")).unwrap();
        registry.advance(chat).unwrap();
        registry.skip(chat).unwrap();
        registry.toggle_loop(chat);
        registry.advance(chat).unwrap();
        registry.clear_and_stop(chat);

        assert_eq!(
            sink.take(),
            vec![
                PlaybackEvent::Enqueued {
                    chat_id: chat,
                    position: 1,
                    item: item("A")
                },
                PlaybackEvent::Enqueued {
                    chat_id: chat,
                    position: 2,
                    item: item("B")
                },
                PlaybackEvent::Completed {
                    chat_id: chat,
                    next_item: Some(item("A"))
                },
                PlaybackEvent::Skipped {
                    chat_id: chat,
                    next_item: Some(item("B"))
                },
                PlaybackEvent::LoopToggled {
                    chat_id: chat,
                    enabled: true
                },
                PlaybackEvent::Completed {
                    chat_id: chat,
                    next_item: None
                },
                PlaybackEvent::Cleared { chat_id: chat },
            ]
        );
    }

    #[test]
    fn test_rejected_enqueue_emits_nothing() {
        let (registry, sink) = registry_with(1);
        let chat = ChatId::new(1);

        registry.enqueue(chat, item("A")).unwrap();
        sink.take();

        assert_eq!(
            registry.enqueue(chat, item("B")),
            Err(PlaybackError::QueueFull { max: 1 })
        );
        assert!(sink.take().is_empty());
    }

    #[test]
    fn test_clear_and_stop_removes_session() {
        let (registry, sink) = registry_with(10);
        let chat = ChatId::new(1);

        registry.toggle_loop(chat);
        registry.enqueue(chat, item("A")).unwrap();
        registry.advance(chat).unwrap();
        sink.take();

        registry.clear_and_stop(chat);
        assert!(!registry.contains(chat));
        assert_eq!(sink.take(), vec![PlaybackEvent::Cleared { chat_id: chat }]);

        // 幂等：第二次不发信号
        registry.clear_and_stop(chat);
        assert!(sink.take().is_empty());

        // 重新创建的会话是全新的
        let fresh = registry.get_or_create(chat);
        assert!(!fresh.loop_enabled);
        assert_eq!(fresh.queue_len, 0);
        assert!(fresh.now_playing.is_none());
    }

    #[test]
    fn test_idle_session_stays_registered() {
        let (registry, _) = registry_with(10);
        let chat = ChatId::new(1);

        registry.enqueue(chat, item("A")).unwrap();
        registry.advance(chat).unwrap();
        assert_eq!(registry.advance(chat), Ok(AdvanceResult::BecameIdle));

        assert!(registry.contains(chat));
        assert_eq!(
            registry.session_summary(chat).map(|s| s.state),
            Some(PlaybackState::Idle)
        );
    }

    #[test]
    fn test_enqueue_many_respects_limits() {
        let sink = Arc::new(RecordingSink::default());
        let limits = QueueLimits {
            max_queue_size: 4,
            max_duration_limit: 300,
            playlist_limit: 5,
        };
        let registry = InMemorySessionRegistry::new(limits, sink.clone());
        let chat = ChatId::new(1);
        registry.enqueue(chat, item("existing")).unwrap();
        sink.take();

        let long = PlayableItem::new("long", 301, "/tmp/long.mp3", "tester", MediaKind::PlaylistEntry);
        let items = vec![
            item("a"),
            long.clone(),
            item("b"),
            item("c"),
            item("d"),
            item("e"),
        ];

        let outcome = registry.enqueue_many(chat, items);
        assert_eq!(outcome.positions, vec![2, 3, 4]);
        assert_eq!(
            outcome.rejected,
            vec![
                (
                    long,
                    PlaybackError::DurationExceeded {
                        duration: 301,
                        limit: 300
                    }
                ),
                (item("d"), PlaybackError::QueueFull { max: 4 }),
                (item("e"), PlaybackError::PlaylistTooLong { limit: 5 }),
            ]
        );
        assert_eq!(sink.take().len(), 3);
    }

    #[test]
    fn test_update_limits_applies_to_next_enqueue() {
        let (registry, _) = registry_with(3);
        let chat = ChatId::new(1);
        for title in ["a", "b", "c"] {
            registry.enqueue(chat, item(title)).unwrap();
        }

        registry
            .update_limits(QueueLimits {
                max_queue_size: 2,
                ..QueueLimits::default()
            })
            .unwrap();

        assert_eq!(registry.peek_queue(chat, 10).len(), 3);
        assert_eq!(
            registry.enqueue(chat, item("d")),
            Err(PlaybackError::QueueFull { max: 2 })
        );

        assert!(registry
            .update_limits(QueueLimits {
                max_queue_size: 0,
                ..QueueLimits::default()
            })
            .is_err());
        assert_eq!(registry.limits().max_queue_size, 2);
    }

    #[test]
    fn test_clear_all_removes_every_session() {
        let (registry, sink) = registry_with(10);
        for id in 1..=3 {
            registry.enqueue(ChatId::new(id), item("a")).unwrap();
        }
        sink.take();

        assert_eq!(registry.clear_all(), 3);
        assert!(registry.chat_ids().is_empty());
        assert_eq!(sink.take().len(), 3);
    }

    #[test]
    fn test_concurrent_enqueue_positions_are_unique() {
        const WORKERS: usize = 64;
        const MAX: usize = 40;

        let (registry, _) = registry_with(MAX);
        let chat = ChatId::new(1);

        let results: Vec<Result<usize, PlaybackError>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..WORKERS)
                .map(|n| {
                    let registry = &registry;
                    scope.spawn(move || registry.enqueue(chat, item(&n.to_string())))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let mut positions: Vec<usize> = results.iter().filter_map(|r| r.clone().ok()).collect();
        positions.sort_unstable();
        assert_eq!(positions, (1..=MAX).collect::<Vec<_>>());

        let full = results
            .iter()
            .filter(|r| matches!(r, Err(PlaybackError::QueueFull { .. })))
            .count();
        assert_eq!(full, WORKERS - MAX);
    }

    #[test]
    fn test_concurrent_chats_are_isolated() {
        let (registry, _) = registry_with(100);

        std::thread::scope(|scope| {
            for id in 0..8 {
                let registry = &registry;
                scope.spawn(move || {
                    let chat = ChatId::new(id);
                    for n in 0..50 {
                        registry.enqueue(chat, item(&n.to_string())).unwrap();
                    }
                    for _ in 0..25 {
                        registry.advance(chat).unwrap();
                    }
                });
            }
        });

        let snapshot: HashMap<ChatId, SessionSummary> = registry
            .snapshot_all()
            .into_iter()
            .map(|s| (s.chat_id, s))
            .collect();
        assert_eq!(snapshot.len(), 8);
        for summary in snapshot.values() {
            assert_eq!(summary.queue_len, 25);
            assert_eq!(summary.now_playing.as_deref(), Some("24"));
        }
    }

    #[test]
    fn test_enqueue_racing_clear_keeps_registry_consistent() {
        let (registry, sink) = registry_with(1000);
        let chat = ChatId::new(1);

        std::thread::scope(|scope| {
            let registry = &registry;
            scope.spawn(move || {
                for n in 0..200 {
                    let _ = registry.enqueue(chat, item(&n.to_string()));
                }
            });
            scope.spawn(move || {
                for _ in 0..50 {
                    registry.clear_and_stop(chat);
                    let _ = registry.snapshot_all();
                }
            });
        });

        // 最后一次 Cleared 之后的入队信号数必须等于残留队列长度，
        // 否则说明有入队落进了已摘除的会话
        let events = sink.take();
        let since_last_clear = match events
            .iter()
            .rposition(|e| matches!(e, PlaybackEvent::Cleared { .. }))
        {
            Some(index) => &events[index + 1..],
            None => &events[..],
        };
        let enqueued = since_last_clear
            .iter()
            .filter(|e| matches!(e, PlaybackEvent::Enqueued { .. }))
            .count();

        let total_enqueued = events
            .iter()
            .filter(|e| matches!(e, PlaybackEvent::Enqueued { .. }))
            .count();
        assert_eq!(total_enqueued, 200);
        assert_eq!(registry.peek_queue(chat, usize::MAX).len(), enqueued);
        assert_eq!(registry.is_empty(chat), enqueued == 0);
    }

    #[test]
    fn test_long_section_on_one_chat_does_not_stall_another() {
        let slow = ChatId::new(1);
        let other = ChatId::new(2);
        let sink = Arc::new(SlowSink {
            chat_id: slow,
            delay: Duration::from_millis(400),
        });
        let registry = InMemorySessionRegistry::new(QueueLimits::default(), sink);
        registry.get_or_create(slow);
        registry.enqueue(other, item("x")).unwrap();

        std::thread::scope(|scope| {
            let registry = &registry;
            let blocker = scope.spawn(move || registry.enqueue(slow, item("long")));
            std::thread::sleep(Duration::from_millis(50));
            let snapshot = scope.spawn(move || registry.snapshot_all());
            std::thread::sleep(Duration::from_millis(50));

            let started = Instant::now();
            let result = registry.advance(other);
            let elapsed = started.elapsed();
            assert!(matches!(result, Ok(AdvanceResult::NextItem(ref next)) if next.title() == "x"));
            assert!(
                elapsed < Duration::from_millis(150),
                "advance on another chat waited {:?}",
                elapsed
            );

            assert_eq!(blocker.join().unwrap(), Ok(1));
            let summaries = snapshot.join().unwrap();
            assert_eq!(summaries.len(), 2);
            let slow_summary = summaries.iter().find(|s| s.chat_id == slow).unwrap();
            assert_eq!(slow_summary.queue_len, 1);
        });
    }
}
