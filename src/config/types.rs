//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::time::Duration;

use crate::domain::playback::QueueLimits;
use crate::infrastructure::DispatcherConfig;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 队列限制
    #[serde(default)]
    pub queue: QueueConfig,

    /// 调度器配置
    #[serde(default)]
    pub dispatcher: DispatchConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 队列配置
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// 每个聊天的最大队列长度
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    /// 单个播放项最大时长（秒）
    #[serde(default = "default_max_duration_limit")]
    pub max_duration_limit: u64,

    /// 单次播放列表导入的最大条数
    #[serde(default = "default_playlist_limit")]
    pub playlist_limit: usize,
}

fn default_max_queue_size() -> usize {
    50
}

fn default_max_duration_limit() -> u64 {
    3600 // 1 小时
}

fn default_playlist_limit() -> usize {
    25
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_queue_size: default_max_queue_size(),
            max_duration_limit: default_max_duration_limit(),
            playlist_limit: default_playlist_limit(),
        }
    }
}

impl QueueConfig {
    /// 转换为领域层的队列限制
    pub fn limits(&self) -> QueueLimits {
        QueueLimits {
            max_queue_size: self.max_queue_size,
            max_duration_limit: self.max_duration_limit,
            playlist_limit: self.playlist_limit,
        }
    }
}

/// 调度器配置
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// 同时执行的最大事件数
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// 每个聊天的事件缓冲容量
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// 聊天通道空闲多久后回收（秒）
    #[serde(default = "default_lane_idle_secs")]
    pub lane_idle_secs: u64,
}

fn default_max_concurrent() -> usize {
    8
}

fn default_channel_capacity() -> usize {
    256
}

fn default_lane_idle_secs() -> u64 {
    60
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            channel_capacity: default_channel_capacity(),
            lane_idle_secs: default_lane_idle_secs(),
        }
    }
}

impl From<&DispatchConfig> for DispatcherConfig {
    fn from(config: &DispatchConfig) -> Self {
        DispatcherConfig {
            max_concurrent: config.max_concurrent,
            channel_capacity: config.channel_capacity,
            idle_timeout: Duration::from_secs(config.lane_idle_secs),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.queue.max_queue_size, 50);
        assert_eq!(config.queue.max_duration_limit, 3600);
        assert_eq!(config.queue.playlist_limit, 25);
        assert_eq!(config.dispatcher.max_concurrent, 8);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_queue_limits_conversion() {
        let config = QueueConfig {
            max_queue_size: 3,
            max_duration_limit: 60,
            playlist_limit: 2,
        };
        let limits = config.limits();
        assert_eq!(limits.max_queue_size, 3);
        assert_eq!(limits.max_duration_limit, 60);
        assert_eq!(limits.playlist_limit, 2);
    }

    #[test]
    fn test_dispatcher_config_conversion() {
        let config = DispatchConfig {
            max_concurrent: 4,
            channel_capacity: 32,
            lane_idle_secs: 5,
        };
        let dispatcher = DispatcherConfig::from(&config);
        assert_eq!(dispatcher.max_concurrent, 4);
        assert_eq!(dispatcher.channel_capacity, 32);
        assert_eq!(dispatcher.idle_timeout, Duration::from_secs(5));
    }
}
