//! Events Layer - 播放信号发布

mod publisher;

pub use publisher::EventPublisher;
