//! Chatcast - 多聊天播放队列协调器
//!
//! 架构设计: DDD + CQRS + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Playback Context: 播放会话状态机（队列、当前项、循环）
//!
//! 应用层 (application/):
//! - Ports: 端口定义（SessionRegistry, PlaybackEventSink）
//! - Commands: 播放命令处理器
//! - Queries: 聚合统计
//!
//! 基础设施层 (infrastructure/):
//! - Memory: SessionRegistry 内存实现
//! - Worker: PlaybackDispatcher 按聊天串行调度
//! - Events: 播放信号发布

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
