//! 组合层错误

use infrastructure_common::{ConfigError, ContainerError};
use thiserror::Error;

/// 应用上下文启动错误
#[derive(Error, Debug)]
pub enum InfrastructureError {
    #[error("配置错误: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("容器错误: {source}")]
    Container {
        #[from]
        source: ContainerError,
    },

    #[error("组件定义验证失败: {}", .errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Validation { errors: Vec<ContainerError> },

    #[error("启动失败: {message}")]
    BootstrapFailed { message: String },
}

/// 组合层结果类型
pub type InfrastructureResult<T> = Result<T, InfrastructureError>;
