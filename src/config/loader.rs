//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `CHATCAST_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `CHATCAST_QUEUE__MAX_QUEUE_SIZE=100`
/// - `CHATCAST_QUEUE__MAX_DURATION_LIMIT=7200`
/// - `CHATCAST_DISPATCHER__MAX_CONCURRENT=16`
/// - `CHATCAST_LOG__LEVEL=debug`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 默认值（最低优先级）
    builder = builder
        .set_default("queue.max_queue_size", 50)?
        .set_default("queue.max_duration_limit", 3600)?
        .set_default("queue.playlist_limit", 25)?
        .set_default("dispatcher.max_concurrent", 8)?
        .set_default("dispatcher.channel_capacity", 256)?
        .set_default("dispatcher.lane_idle_secs", 60)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 环境变量（最高优先级）
    // 例如: CHATCAST_QUEUE__MAX_QUEUE_SIZE=100
    builder = builder.add_source(
        Environment::with_prefix("CHATCAST")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    config
        .queue
        .limits()
        .validate()
        .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

    if config.dispatcher.max_concurrent == 0 {
        return Err(ConfigError::ValidationError(
            "Dispatcher max_concurrent cannot be 0".to_string(),
        ));
    }

    if config.dispatcher.channel_capacity == 0 {
        return Err(ConfigError::ValidationError(
            "Dispatcher channel_capacity cannot be 0".to_string(),
        ));
    }

    if config.dispatcher.lane_idle_secs == 0 {
        return Err(ConfigError::ValidationError(
            "Dispatcher lane_idle_secs cannot be 0".to_string(),
        ));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Max Queue Size: {}", config.queue.max_queue_size);
    tracing::info!("Max Duration: {}s", config.queue.max_duration_limit);
    tracing::info!("Playlist Limit: {}", config.queue.playlist_limit);
    tracing::info!("Dispatcher Concurrency: {}", config.dispatcher.max_concurrent);
    tracing::info!("Dispatcher Channel Capacity: {}", config.dispatcher.channel_capacity);
    tracing::info!("Dispatcher Lane Idle: {}s", config.dispatcher.lane_idle_secs);
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}
