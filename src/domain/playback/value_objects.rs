//! Playback Context - Value Objects

use serde::{Deserialize, Serialize};

/// 聊天唯一标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChatId(i64);

impl ChatId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl From<i64> for ChatId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 媒体来源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// 用户直接上传的音频/视频文件
    File,
    /// 搜索结果
    RemoteSearch,
    /// 播放列表中的一项
    PlaylistEntry,
    /// 电台直播流
    RadioStream,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::RemoteSearch => "remote_search",
            Self::PlaylistEntry => "playlist_entry",
            Self::RadioStream => "radio_stream",
        }
    }
}

/// 可播放项
///
/// 由下载/搜索协作方产出，入队后不可变。
/// 时长使用无符号整数，负时长在类型层面即不可表达。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayableItem {
    title: String,
    duration_secs: u64,
    source_ref: String,
    requested_by: String,
    kind: MediaKind,
}

impl PlayableItem {
    pub fn new(
        title: impl Into<String>,
        duration_secs: u64,
        source_ref: impl Into<String>,
        requested_by: impl Into<String>,
        kind: MediaKind,
    ) -> Self {
        Self {
            title: title.into(),
            duration_secs,
            source_ref: source_ref.into(),
            requested_by: requested_by.into(),
            kind,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }

    pub fn source_ref(&self) -> &str {
        &self.source_ref
    }

    pub fn requested_by(&self) -> &str {
        &self.requested_by
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }
}

/// 队列限制
///
/// 不变量:
/// - 所有上限均为正数（由配置加载时校验）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueLimits {
    /// 每个聊天队列的最大长度
    pub max_queue_size: usize,
    /// 单个播放项的最大时长（秒）
    pub max_duration_limit: u64,
    /// 单次批量入队的最大条数
    pub playlist_limit: usize,
}

impl Default for QueueLimits {
    fn default() -> Self {
        Self {
            max_queue_size: 50,
            max_duration_limit: 3600,
            playlist_limit: 25,
        }
    }
}

impl QueueLimits {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.max_queue_size == 0 {
            return Err("max_queue_size must be positive");
        }
        if self.max_duration_limit == 0 {
            return Err("max_duration_limit must be positive");
        }
        if self.playlist_limit == 0 {
            return Err("playlist_limit must be positive");
        }
        Ok(())
    }
}
