//! Infrastructure Layer - 基础设施层
//!
//! 提供所有端口的具体实现

pub mod events;
pub mod memory;
pub mod worker;

pub use events::EventPublisher;
pub use memory::InMemorySessionRegistry;
pub use worker::{DispatcherConfig, PlaybackDispatcher};
