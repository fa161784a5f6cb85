//! 日志初始化

use crate::errors::{InfrastructureError, InfrastructureResult};
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// 紧凑单行
    #[default]
    Compact,
    /// JSON
    Json,
    /// 多行易读格式
    Pretty,
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 过滤指令，如 `info` 或 `di_impl=debug,info`；`RUST_LOG` 存在时优先
    pub level: String,
    /// 输出格式
    pub format: LogFormat,
    /// 是否显示目标
    pub show_target: bool,
    /// 是否显示线程ID
    pub show_thread_ids: bool,
    /// 是否显示文件名与行号
    pub show_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            show_target: true,
            show_thread_ids: false,
            show_location: false,
        }
    }
}

impl LoggingConfig {
    /// 开发环境日志配置
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            format: LogFormat::Pretty,
            show_target: true,
            show_thread_ids: true,
            show_location: true,
        }
    }

    /// 生产环境日志配置
    pub fn production() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
            show_target: false,
            show_thread_ids: false,
            show_location: false,
        }
    }

    /// 设置过滤指令
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// 设置输出格式
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    fn filter(&self) -> InfrastructureResult<EnvFilter> {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .map_err(|e| InfrastructureError::BootstrapFailed {
                message: format!("日志过滤指令无效 {}: {}", self.level, e),
            })
    }
}

/// 初始化全局日志订阅者
///
/// 已存在全局订阅者时返回错误，调用方可以选择忽略。
pub fn initialize_logging(config: &LoggingConfig) -> InfrastructureResult<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(config.filter()?)
        .with_target(config.show_target)
        .with_thread_ids(config.show_thread_ids)
        .with_file(config.show_location)
        .with_line_number(config.show_location);

    match config.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    }
    .map_err(|e| InfrastructureError::BootstrapFailed {
        message: format!("日志初始化失败: {}", e),
    })?;

    info!("日志系统初始化完成: 级别 {}, 格式 {:?}", config.level, config.format);
    Ok(())
}
