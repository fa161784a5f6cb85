//! 组件作用域与生命周期状态

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 组件作用域
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentScope {
    /// 单例 - 容器内只缓存一个实例
    #[default]
    Singleton,
    /// 原型 - 每次获取都创建新实例
    Prototype,
}

impl ComponentScope {
    /// 是否为单例作用域
    pub const fn is_singleton(self) -> bool {
        matches!(self, Self::Singleton)
    }
}

impl fmt::Display for ComponentScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Singleton => write!(f, "singleton"),
            Self::Prototype => write!(f, "prototype"),
        }
    }
}

impl FromStr for ComponentScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "singleton" => Ok(Self::Singleton),
            "prototype" => Ok(Self::Prototype),
            _ => Err(format!("无效的组件作用域: {}", s)),
        }
    }
}

/// 单例实例的解析状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstanceState {
    /// 尚未开始创建
    #[default]
    NotStarted,
    /// 创建中（可能已暴露早期引用）
    InCreation,
    /// 已完全初始化
    FullyInitialized,
    /// 已销毁
    Destroyed,
}

/// 单次创建过程所处的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CreationPhase {
    /// 解析组件定义
    ResolvingDefinition,
    /// 实例化
    Instantiating,
    /// 已暴露早期引用
    ExposedEarly,
    /// 属性注入
    Populating,
    /// 调用初始化方法
    Initializing,
    /// 初始化后处理
    PostProcessing,
    /// 就绪
    Ready,
    /// 失败
    Failed,
}

impl CreationPhase {
    /// 阶段名称
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ResolvingDefinition => "RESOLVING_DEFINITION",
            Self::Instantiating => "INSTANTIATING",
            Self::ExposedEarly => "EXPOSED_EARLY",
            Self::Populating => "POPULATING",
            Self::Initializing => "INITIALIZING",
            Self::PostProcessing => "POST_PROCESSING",
            Self::Ready => "READY",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for CreationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
