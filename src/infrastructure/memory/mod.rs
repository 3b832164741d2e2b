//! Memory Layer - In-Memory State Management
//!
//! 实现 SessionRegistry，管理每个聊天的播放会话

mod session_registry;

pub use session_registry::InMemorySessionRegistry;
