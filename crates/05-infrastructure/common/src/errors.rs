//! 错误类型定义

use crate::lifecycle::CreationPhase;
use thiserror::Error;

/// 装箱的通用错误类型
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    #[error("配置加载失败: {source}")]
    LoadFailed {
        #[from]
        source: config::ConfigError,
    },

    #[error("配置验证失败: {message}")]
    ValidationError { message: String },
}

/// 属性注入错误类型
#[derive(Error, Debug)]
pub enum PropertyError {
    #[error("组件 {type_name} 不存在属性: {property}")]
    UnknownProperty { type_name: String, property: String },

    #[error("属性类型不匹配: {property}, 期望 {expected}, 原因: {message}")]
    TypeMismatch {
        property: String,
        expected: String,
        message: String,
    },

    #[error("构造参数缺失: 索引 {index}")]
    MissingArgument { index: usize },
}

impl PropertyError {
    /// 创建未知属性错误
    pub fn unknown(type_name: impl Into<String>, property: impl Into<String>) -> Self {
        Self::UnknownProperty {
            type_name: type_name.into(),
            property: property.into(),
        }
    }

    /// 创建类型不匹配错误
    pub fn mismatch(
        property: impl Into<String>,
        expected: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            property: property.into(),
            expected: expected.into(),
            message: message.into(),
        }
    }
}

/// 事务错误类型
#[derive(Error, Debug)]
pub enum TransactionError {
    /// 参与者将事务标记为仅回滚，外层正常返回时事务被回滚
    #[error("事务 {name} 已回滚: 工作单元被标记为仅回滚")]
    Rollback { name: String },

    #[error("传播行为 MANDATORY 要求存在活动事务: {method}")]
    NoExistingTransaction { method: String },

    #[error("传播行为 NEVER 不允许存在活动事务: {method}")]
    ExistingTransaction { method: String },

    #[error("只读事务中不允许写入: {key}")]
    ReadOnlyViolation { key: String },

    #[error("工作单元已完成: {id}")]
    AlreadyCompleted { id: String },

    #[error("事务资源操作失败: {message}")]
    ResourceFailure { message: String },
}

/// 方法调用错误类型
#[derive(Error, Debug)]
pub enum InvocationError {
    #[error("方法不存在: {type_name}::{method}")]
    NoSuchMethod { type_name: String, method: String },

    #[error("方法参数无效: {method}, 原因: {message}")]
    InvalidArguments { method: String, message: String },

    /// 运行时失败，默认触发事务回滚
    #[error("方法执行失败: {method}, 原因: {message}")]
    Runtime { method: String, message: String },

    /// 声明式业务异常，默认不触发事务回滚
    #[error("业务异常 [{code}]: {message}")]
    Business { code: String, message: String },

    #[error("事务错误: {source}")]
    Transaction {
        #[from]
        source: TransactionError,
    },
}

impl InvocationError {
    /// 创建方法不存在错误
    pub fn no_such_method(type_name: impl Into<String>, method: impl Into<String>) -> Self {
        Self::NoSuchMethod {
            type_name: type_name.into(),
            method: method.into(),
        }
    }

    /// 创建参数无效错误
    pub fn invalid_arguments(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            method: method.into(),
            message: message.into(),
        }
    }

    /// 创建运行时错误
    pub fn runtime(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Runtime {
            method: method.into(),
            message: message.into(),
        }
    }

    /// 创建业务异常
    pub fn business(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Business {
            code: code.into(),
            message: message.into(),
        }
    }

    /// 是否为运行时失败（业务异常之外的所有错误）
    pub const fn is_runtime(&self) -> bool {
        !matches!(self, Self::Business { .. })
    }
}

/// 容器错误类型
#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("组件未注册: {name}")]
    UnknownComponent { name: String },

    #[error("未找到类型匹配的组件: {type_name}")]
    UnknownComponentType { type_name: String },

    #[error("组件定义重复: {name}")]
    DuplicateDefinition { name: String },

    #[error("类型 {type_name} 存在多个候选组件: {candidates:?}")]
    NoUniqueComponent {
        type_name: String,
        candidates: Vec<String>,
    },

    #[error("检测到无法解析的循环依赖: {}", .chain.join(" -> "))]
    CircularDependency { chain: Vec<String> },

    #[error("组件创建失败: {name}, 阶段: {phase}, 解析链: {}, 原因: {source}", .chain.join(" -> "))]
    Creation {
        name: String,
        phase: CreationPhase,
        chain: Vec<String>,
        source: BoxError,
    },

    #[error("组件初始化失败: {name}, 初始化方法: {method}, 原因: {source}")]
    Initialization {
        name: String,
        method: String,
        chain: Vec<String>,
        source: InvocationError,
    },

    #[error("组件类型不匹配: {name}, 期望 {expected}")]
    TypeMismatch { name: String, expected: String },

    #[error("组件定义无效: {name}, 原因: {message}")]
    InvalidDefinition { name: String, message: String },

    #[error("容器已关闭，无法获取组件: {name}")]
    ContainerClosed { name: String },
}

impl ContainerError {
    /// 失败发生的创建阶段（仅创建类错误）
    pub const fn phase(&self) -> Option<CreationPhase> {
        match self {
            Self::Creation { phase, .. } => Some(*phase),
            Self::Initialization { .. } => Some(CreationPhase::Initializing),
            _ => None,
        }
    }

    /// 是否为创建类错误（`Initialization` 是其特例）
    pub const fn is_creation_failure(&self) -> bool {
        matches!(self, Self::Creation { .. } | Self::Initialization { .. })
    }

    /// 失败时最深一层的解析链
    pub fn chain(&self) -> &[String] {
        match self {
            Self::Creation { chain, source, .. } => source
                .downcast_ref::<Self>()
                .map(Self::chain)
                .filter(|inner| !inner.is_empty())
                .unwrap_or(chain),
            Self::Initialization { chain, .. } | Self::CircularDependency { chain } => chain,
            _ => &[],
        }
    }

    /// 沿错误链找到根因
    pub fn root_cause(&self) -> &(dyn std::error::Error + 'static) {
        let mut current: &(dyn std::error::Error + 'static) = self;
        while let Some(next) = current.source() {
            current = next;
        }
        current
    }

    /// 错误链中是否存在循环依赖错误
    pub fn is_circular_dependency(&self) -> bool {
        let mut current: Option<&(dyn std::error::Error + 'static)> = Some(self);
        while let Some(error) = current {
            if matches!(
                error.downcast_ref::<Self>(),
                Some(Self::CircularDependency { .. })
            ) {
                return true;
            }
            current = error.source();
        }
        false
    }
}

/// 结果类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type ContainerResult<T> = Result<T, ContainerError>;
pub type InvocationResult<T> = Result<T, InvocationError>;
pub type TransactionResult<T> = Result<T, TransactionError>;
