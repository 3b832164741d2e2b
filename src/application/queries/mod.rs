//! 应用层 - 查询（读操作）
//!
//! CQRS 查询侧：聚合统计

mod stats_queries;

pub mod handlers;

pub use stats_queries::*;
