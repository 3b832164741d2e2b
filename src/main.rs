//! Chatcast - 多聊天播放队列协调器
//!
//! 宿主进程：加载配置、装配注册表/信号发布器/调度器，
//! 记录所有播放信号，收到退出信号时清空全部会话。

use std::sync::Arc;

use chatcast::application::{GetQueueStats, GetQueueStatsHandler, SessionRegistryPort};
use chatcast::config::{load_config, print_config};
use chatcast::infrastructure::{
    DispatcherConfig, EventPublisher, InMemorySessionRegistry, PlaybackDispatcher,
};
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    // 初始化日志
    let log_filter = format!("{},chatcast={}", config.log.level, config.log.level);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter));
    if config.log.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    tracing::info!("Chatcast - playback coordinator");
    print_config(&config);

    // 创建事件发布器
    let event_publisher = Arc::new(EventPublisher::new());

    // 创建会话注册表
    let registry = Arc::new(InMemorySessionRegistry::new(
        config.queue.limits(),
        event_publisher.clone(),
    ));

    // 创建调度器
    let dispatcher =
        PlaybackDispatcher::new(DispatcherConfig::from(&config.dispatcher), registry.clone()).arc();

    // 记录所有播放信号
    let mut events = event_publisher.subscribe_global();
    let event_logger = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    tracing::info!(
                        chat_id = %event.chat_id(),
                        event = event.as_str(),
                        "Playback signal"
                    );
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped = skipped, "Signal logger lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    tracing::info!("Waiting for playback events...");
    tokio::signal::ctrl_c().await?;
    tracing::info!("Received shutdown signal");

    dispatcher.shutdown();

    let stats = GetQueueStatsHandler::new(registry.clone()).handle(GetQueueStats);
    tracing::info!(
        total_sessions = stats.total_sessions,
        active_sessions = stats.active_sessions,
        total_queued_items = stats.total_queued_items,
        "Final queue stats"
    );

    let cleared = registry.clear_all();
    tracing::info!(cleared = cleared, "Sessions cleared");

    event_logger.abort();
    tracing::info!("Shutdown complete");

    Ok(())
}
