//! 受管组件容器

use crate::engine::CreationEngine;
use di_abstractions::{
    CircularDependencyDetector, ComponentDefinition, ComponentLookup, ComponentPostProcessor,
    ContainerStats, DefaultCircularDependencyDetector, DefinitionRegistry,
};
use infrastructure_common::{
    ComponentRef, ContainerConfig, ContainerError, ContainerResult, InstanceState, TypeInfo,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 受管组件容器
///
/// 注册定义、按名称或类型获取组件、在关闭时按创建逆序销毁单例。
#[derive(Debug)]
pub struct ManagedContainer {
    engine: CreationEngine,
    closed: AtomicBool,
}

impl ManagedContainer {
    /// 创建新的容器
    pub fn new(config: ContainerConfig) -> Self {
        info!(
            "创建组件容器: 允许覆盖定义={}, 早期引用策略={:?}, 最大解析深度={}",
            config.allow_definition_overriding,
            config.early_reference_policy,
            config.max_resolution_depth
        );
        Self {
            engine: CreationEngine::new(config),
            closed: AtomicBool::new(false),
        }
    }

    /// 使用自定义注册表创建容器
    pub fn with_registry(config: ContainerConfig, registry: Box<dyn DefinitionRegistry>) -> Self {
        Self {
            engine: CreationEngine::with_registry(config, registry),
            closed: AtomicBool::new(false),
        }
    }

    /// 创建引擎
    pub const fn engine(&self) -> &CreationEngine {
        &self.engine
    }

    /// 容器配置
    pub const fn config(&self) -> &ContainerConfig {
        self.engine.config()
    }

    /// 注册组件定义
    pub fn register_definition(&self, definition: ComponentDefinition) -> ContainerResult<()> {
        self.ensure_open(definition.name())?;
        info!("注册组件: {} ({})", definition.name(), definition.type_info());
        self.engine.register_definition(definition)
    }

    /// 获取组件定义
    pub fn definition(&self, name: &str) -> ContainerResult<Arc<ComponentDefinition>> {
        self.engine.registry().get(name)
    }

    /// 添加扩展钩子，优先级数值越小越先执行前置阶段
    pub fn add_hook(&self, hook: Arc<dyn ComponentPostProcessor>, priority: i32) {
        debug!("添加扩展钩子: {} (优先级 {})", hook.name(), priority);
        self.engine.add_hook(hook, priority);
    }

    /// 按注册顺序创建全部非延迟单例
    pub fn preinstantiate_singletons(&self) -> ContainerResult<usize> {
        self.ensure_open("*")?;
        self.engine.preinstantiate_singletons()
    }

    /// 单例状态
    pub fn state(&self, name: &str) -> InstanceState {
        self.engine.cache().state(name)
    }

    /// 是否已关闭
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// 关闭容器：按创建逆序调用单例销毁方法并清空缓存，重复调用无效果
    pub fn destroy(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            warn!("容器已关闭，忽略重复的销毁请求");
            return;
        }
        self.engine.destroy_singletons();
        info!("组件容器已关闭");
    }

    /// 容器统计信息
    pub fn stats(&self) -> ContainerStats {
        let engine = self.engine.stats();
        let total_creation_time_ms = engine.total_creation_micros / 1000;
        ContainerStats {
            registered_components: self.engine.registry().len(),
            created_components: engine.created,
            active_singletons: self.engine.cache().singleton_count(),
            registered_hooks: self.engine.hooks().len(),
            total_creation_time_ms,
            average_creation_time_ms: if engine.created == 0 {
                0.0
            } else {
                engine.total_creation_micros as f64 / 1000.0 / engine.created as f64
            },
            creation_errors: engine.errors,
        }
    }

    /// 验证定义：引用与 `depends_on` 的目标都已注册，且不存在原型间的引用环或 `depends_on` 环
    pub fn validate(&self) -> Result<(), Vec<ContainerError>> {
        info!("验证容器定义");
        let guard = self.engine.registry();
        let registry: &dyn DefinitionRegistry = &**guard;
        let mut errors = Vec::new();

        for name in registry.names() {
            let Ok(definition) = registry.get(name) else {
                continue;
            };
            let targets = definition
                .referenced_names()
                .into_iter()
                .chain(definition.depends_on().iter().map(String::as_str));
            for target in targets {
                if !registry.contains(target) {
                    errors.push(ContainerError::InvalidDefinition {
                        name: name.to_string(),
                        message: format!("引用的组件未注册: {}", target),
                    });
                }
            }
        }

        let detector = DefaultCircularDependencyDetector;
        let is_prototype = |name: &str| {
            registry
                .get(name)
                .map(|definition| !definition.is_singleton())
                .unwrap_or(false)
        };
        let prototype_edges = |definition: &ComponentDefinition| -> Vec<String> {
            if definition.is_singleton() {
                return Vec::new();
            }
            definition
                .referenced_names()
                .into_iter()
                .filter(|target| is_prototype(*target))
                .map(str::to_string)
                .collect()
        };
        let prototype_graph = detector.build_dependency_graph(registry, &prototype_edges);
        if let Err(e) = detector.detect_circular_dependencies(&prototype_graph) {
            errors.push(e);
        }

        let depends_on_edges =
            |definition: &ComponentDefinition| -> Vec<String> { definition.depends_on().to_vec() };
        let depends_on_graph = detector.build_dependency_graph(registry, &depends_on_edges);
        if let Err(e) = detector.detect_circular_dependencies(&depends_on_graph) {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            warn!("容器定义验证失败: {} 个错误", errors.len());
            Err(errors)
        }
    }

    fn ensure_open(&self, name: &str) -> ContainerResult<()> {
        if self.is_closed() {
            return Err(ContainerError::ContainerClosed {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

impl Default for ManagedContainer {
    fn default() -> Self {
        Self::new(ContainerConfig::default())
    }
}

impl ComponentLookup for ManagedContainer {
    fn get_component(&self, name: &str) -> ContainerResult<ComponentRef> {
        self.ensure_open(name)?;
        self.engine.get_component(name)
    }

    fn get_component_by_type(&self, type_info: &TypeInfo) -> ContainerResult<ComponentRef> {
        self.ensure_open(type_info.short_name())?;
        self.engine.get_component_by_type(type_info)
    }

    fn contains_component(&self, name: &str) -> bool {
        self.engine.registry().contains(name)
    }

    fn definition_names(&self) -> Vec<String> {
        self.engine.registry().names().map(str::to_string).collect()
    }
}
