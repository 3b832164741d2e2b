//! Stats Query Handlers

use std::sync::Arc;

use crate::application::ports::SessionRegistryPort;
use crate::application::queries::stats_queries::{GetQueueStats, QueueStats};

/// GetQueueStats Handler - 基于单次快照计算统计
pub struct GetQueueStatsHandler {
    registry: Arc<dyn SessionRegistryPort>,
}

impl GetQueueStatsHandler {
    pub fn new(registry: Arc<dyn SessionRegistryPort>) -> Self {
        Self { registry }
    }

    pub fn handle(&self, _query: GetQueueStats) -> QueueStats {
        let snapshot = self.registry.snapshot_all();
        let stats = QueueStats::from_snapshot(&snapshot);

        tracing::debug!(
            total_sessions = stats.total_sessions,
            active_sessions = stats.active_sessions,
            total_queued_items = stats.total_queued_items,
            "Queue stats computed"
        );
        stats
    }
}
