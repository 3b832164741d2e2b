//! Stats Queries - 聚合统计查询

use serde::Serialize;

use crate::application::ports::SessionSummary;

/// 获取聚合统计
#[derive(Debug, Clone, Default)]
pub struct GetQueueStats;

/// 聚合统计结果
///
/// 每次从注册表快照重新计算，不增量维护。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueStats {
    pub total_sessions: usize,
    pub active_sessions: usize,
    pub total_queued_items: usize,
    pub loop_enabled_count: usize,
    pub average_queue_size: f64,
}

impl QueueStats {
    pub fn from_snapshot(snapshot: &[SessionSummary]) -> Self {
        let active_sessions = snapshot.iter().filter(|s| s.is_active()).count();
        let total_queued_items: usize = snapshot.iter().map(|s| s.queue_len).sum();
        let loop_enabled_count = snapshot.iter().filter(|s| s.loop_enabled).count();

        Self {
            total_sessions: snapshot.len(),
            active_sessions,
            total_queued_items,
            loop_enabled_count,
            average_queue_size: total_queued_items as f64 / active_sessions.max(1) as f64,
        }
    }
}
