//! 容器配置
//!
//! 配置可来自代码、TOML/JSON 文本、配置文件和 `ADSP_` 前缀的环境变量，
//! 位于文档的 `[container]` 节下。

use crate::errors::{ConfigError, ConfigResult};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// 环境变量前缀，如 `ADSP_CONTAINER__MAX_RESOLUTION_DEPTH=50`
pub const ENV_PREFIX: &str = "ADSP";

/// 早期引用与最终实例不一致时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EarlyReferencePolicy {
    /// 创建失败
    #[default]
    Reject,
    /// 记录警告后继续，已持有早期引用的组件保持旧引用
    Allow,
}

/// 容器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// 是否允许同名定义覆盖
    pub allow_definition_overriding: bool,
    /// 早期引用不一致策略
    pub early_reference_policy: EarlyReferencePolicy,
    /// 最大解析深度
    pub max_resolution_depth: usize,
    /// 启动时是否预先实例化非延迟单例
    pub preinstantiate_singletons: bool,
    /// 自动代理是否总是以目标类型呈现
    pub proxy_target_type: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            allow_definition_overriding: false,
            early_reference_policy: EarlyReferencePolicy::Reject,
            max_resolution_depth: 100,
            preinstantiate_singletons: false,
            proxy_target_type: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigDocument {
    container: ContainerConfig,
}

impl ContainerConfig {
    /// 开发环境配置：允许覆盖定义，便于测试替换组件
    pub fn development() -> Self {
        Self {
            allow_definition_overriding: true,
            ..Self::default()
        }
    }

    /// 设置是否允许定义覆盖
    pub const fn with_definition_overriding(mut self, allow: bool) -> Self {
        self.allow_definition_overriding = allow;
        self
    }

    /// 设置早期引用策略
    pub const fn with_early_reference_policy(mut self, policy: EarlyReferencePolicy) -> Self {
        self.early_reference_policy = policy;
        self
    }

    /// 设置最大解析深度
    pub const fn with_max_resolution_depth(mut self, depth: usize) -> Self {
        self.max_resolution_depth = depth;
        self
    }

    /// 设置是否预实例化单例
    pub const fn with_preinstantiate_singletons(mut self, enabled: bool) -> Self {
        self.preinstantiate_singletons = enabled;
        self
    }

    /// 设置自动代理是否以目标类型呈现
    pub const fn with_proxy_target_type(mut self, enabled: bool) -> Self {
        self.proxy_target_type = enabled;
        self
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_resolution_depth == 0 {
            return Err(ConfigError::ValidationError {
                message: "max_resolution_depth 必须大于 0".to_string(),
            });
        }
        Ok(())
    }

    /// 从 TOML 文本加载
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Self::load(Config::builder().add_source(File::from_str(content, FileFormat::Toml)))
    }

    /// 从 JSON 文本加载
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        Self::load(Config::builder().add_source(File::from_str(content, FileFormat::Json)))
    }

    /// 从配置文件加载，格式由扩展名决定
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        Self::ensure_exists(path)?;
        Self::load(Config::builder().add_source(File::from(path)))
    }

    /// 从配置文件加载，并以环境变量覆盖
    pub fn from_file_with_env(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        Self::ensure_exists(path)?;
        Self::load(
            Config::builder()
                .add_source(File::from(path))
                .add_source(Self::environment()),
        )
    }

    /// 仅从环境变量加载
    pub fn from_env() -> ConfigResult<Self> {
        Self::load(Config::builder().add_source(Self::environment()))
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    fn ensure_exists(path: &Path) -> ConfigResult<()> {
        if path.exists() {
            Ok(())
        } else {
            Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            })
        }
    }

    fn load(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> ConfigResult<Self> {
        let document: ConfigDocument = builder.build()?.try_deserialize()?;
        let config = document.container;
        config.validate()?;
        debug!("容器配置加载完成: {:?}", config);
        Ok(config)
    }
}
