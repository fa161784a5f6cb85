//! 组件创建引擎
//!
//! 创建流程：解析定义 → 实例化 → 暴露早期引用 → 属性注入 → 初始化 → 初始化后处理 → 缓存。
//! 单例创建在一把可重入锁内串行执行，创建线程可以在循环依赖中重入；
//! 已完全初始化的单例查找不经过该锁。

use crate::cache::InstanceCache;
use crate::hooks::HookChain;
use crate::registry::DefaultDefinitionRegistry;
use di_abstractions::{
    ComponentDefinition, ComponentPostProcessor, ConstructionStrategy, DefinitionRegistry,
    PropertyValue, PropertyValues, ResolveContext,
};
use infrastructure_common::{
    same_component, BoxError, ComponentRef, ConstructorArgs, ContainerConfig, ContainerError,
    ContainerResult, CreationPhase, EarlyReferencePolicy, ExecutionContext, InstanceState,
    ResolvedValue, TypeInfo,
};
use parking_lot::{ReentrantMutex, RwLock, RwLockReadGuard};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

/// 早期引用已被其他组件持有，但初始化后处理返回了不同的对象
#[derive(Error, Debug)]
#[error("组件 {name} 的早期引用已注入其他组件，但初始化后处理返回了不同的对象")]
pub struct EarlyReferenceMismatch {
    /// 组件名称
    pub name: String,
}

#[derive(Debug, Default)]
struct EngineCounters {
    created: AtomicUsize,
    errors: AtomicUsize,
    total_creation_micros: AtomicU64,
}

/// 引擎运行统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// 完成的创建次数
    pub created: usize,
    /// 顶层查找失败次数
    pub errors: usize,
    /// 创建总耗时（微秒）
    pub total_creation_micros: u64,
}

/// 组件创建引擎
pub struct CreationEngine {
    registry: RwLock<Box<dyn DefinitionRegistry>>,
    cache: InstanceCache,
    hooks: Arc<HookChain>,
    config: ContainerConfig,
    creation_lock: ReentrantMutex<()>,
    counters: EngineCounters,
}

impl CreationEngine {
    /// 使用默认注册表创建引擎
    pub fn new(config: ContainerConfig) -> Self {
        let registry = DefaultDefinitionRegistry::new(config.allow_definition_overriding);
        Self::with_registry(config, Box::new(registry))
    }

    /// 使用指定注册表创建引擎
    pub fn with_registry(config: ContainerConfig, registry: Box<dyn DefinitionRegistry>) -> Self {
        Self {
            registry: RwLock::new(registry),
            cache: InstanceCache::new(),
            hooks: Arc::new(HookChain::new()),
            config,
            creation_lock: ReentrantMutex::new(()),
            counters: EngineCounters::default(),
        }
    }

    /// 引擎配置
    pub const fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// 注册组件定义
    ///
    /// 单例一旦开始创建，其定义不再允许覆盖。
    pub fn register_definition(&self, definition: ComponentDefinition) -> ContainerResult<()> {
        let _guard = self.creation_lock.lock();
        let name = definition.name();
        let state = self.cache.state(name);
        if self.config.allow_definition_overriding
            && matches!(
                state,
                InstanceState::InCreation | InstanceState::FullyInitialized
            )
            && self.registry.read().contains(name)
        {
            return Err(ContainerError::InvalidDefinition {
                name: name.to_string(),
                message: format!("单例已处于 {:?} 状态，定义不可覆盖", state),
            });
        }
        self.registry.write().register(definition)
    }

    /// 读取注册表
    pub fn registry(&self) -> RwLockReadGuard<'_, Box<dyn DefinitionRegistry>> {
        self.registry.read()
    }

    /// 实例缓存
    pub const fn cache(&self) -> &InstanceCache {
        &self.cache
    }

    /// 添加扩展钩子
    pub fn add_hook(&self, hook: Arc<dyn ComponentPostProcessor>, priority: i32) {
        self.hooks.add(hook, priority);
    }

    /// 扩展钩子链
    pub fn hooks(&self) -> &HookChain {
        &self.hooks
    }

    /// 运行统计
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            created: self.counters.created.load(Ordering::Relaxed),
            errors: self.counters.errors.load(Ordering::Relaxed),
            total_creation_micros: self.counters.total_creation_micros.load(Ordering::Relaxed),
        }
    }

    /// 按名称获取组件
    pub fn get_component(&self, name: &str) -> ContainerResult<ComponentRef> {
        if let Some(instance) = self.cache.get_if_present(name) {
            return Ok(instance);
        }
        let mut context = ResolveContext::new(self.config.max_resolution_depth);
        self.resolve(name, &mut context).map_err(|e| {
            self.counters.errors.fetch_add(1, Ordering::Relaxed);
            e
        })
    }

    /// 按类型获取组件：恰好一个匹配，或匹配中恰好一个首选组件
    pub fn get_component_by_type(&self, type_info: &TypeInfo) -> ContainerResult<ComponentRef> {
        let selected = {
            let registry = self.registry.read();
            let candidates = registry.names_for_type(type_info);
            match candidates.len() {
                0 => {
                    return Err(ContainerError::UnknownComponentType {
                        type_name: type_info.to_string(),
                    })
                }
                1 => candidates[0].clone(),
                _ => {
                    let primaries: Vec<&String> = candidates
                        .iter()
                        .filter(|name| {
                            registry
                                .get(name)
                                .map(|definition| definition.is_primary())
                                .unwrap_or(false)
                        })
                        .collect();
                    match primaries.as_slice() {
                        [primary] => (*primary).clone(),
                        _ => {
                            return Err(ContainerError::NoUniqueComponent {
                                type_name: type_info.to_string(),
                                candidates,
                            })
                        }
                    }
                }
            }
        };
        self.get_component(&selected)
    }

    /// 按注册顺序创建全部非延迟单例
    pub fn preinstantiate_singletons(&self) -> ContainerResult<usize> {
        let names: Vec<String> = self.registry.read().names().map(str::to_string).collect();
        let mut count = 0;
        for name in names {
            let definition = self.registry.read().get(&name)?;
            if definition.is_singleton() && !definition.is_lazy() {
                self.get_component(&name)?;
                count += 1;
            }
        }
        info!("预实例化单例组件完成: {} 个", count);
        Ok(count)
    }

    /// 按创建顺序的逆序调用单例的销毁方法，然后清空缓存
    ///
    /// 销毁方法的失败只记录日志，不中断其余组件的销毁。
    pub fn destroy_singletons(&self) {
        let _guard = self.creation_lock.lock();
        let order = self.cache.creation_order();
        info!("开始销毁单例组件: {} 个", order.len());

        for name in order.iter().rev() {
            if let Some(instance) = self.cache.get_if_present(name) {
                self.invoke_destroy_method(name, instance);
            }
            self.cache.mark_destroyed(name);
        }
    }

    fn invoke_destroy_method(&self, name: &str, instance: ComponentRef) {
        let destroy_method = self
            .registry
            .read()
            .get(name)
            .ok()
            .and_then(|definition| definition.destroy_method().map(str::to_string));
        if let Some(method) = destroy_method {
            let target = unwrap_proxy(instance);
            let context = ExecutionContext::new();
            match target.invoke(&context, &method, &[]) {
                Ok(_) => debug!("组件已销毁: {} ({})", name, method),
                Err(e) => error!("组件销毁失败: {} ({}): {}", name, method, e),
            }
        }
    }

    /// 解析链中最近的单例，即最终持有当前解析结果的组件
    fn holder(&self, context: &ResolveContext) -> Option<String> {
        let registry = self.registry.read();
        context
            .chain()
            .iter()
            .rev()
            .find(|name| {
                registry
                    .get(name)
                    .map(|definition| definition.is_singleton())
                    .unwrap_or(false)
            })
            .cloned()
    }

    /// 单例创建失败：回滚标记，并移出持有其早期引用的单例
    fn discard_failed_singleton(&self, name: &str) {
        self.cache.rollback(name);
        for (dependent, instance) in self.cache.evict_dependents(name) {
            warn!("组件 {} 持有创建失败的 {} 的早期引用，已移出缓存", dependent, name);
            self.invoke_destroy_method(&dependent, instance);
        }
    }

    fn resolve(&self, name: &str, context: &mut ResolveContext) -> ContainerResult<ComponentRef> {
        let definition = self.registry.read().get(name)?;

        if !definition.is_singleton() {
            if context.contains(name) {
                return Err(ContainerError::CircularDependency {
                    chain: context.chain_with(name),
                });
            }
            return self.create(&definition, context);
        }

        let instance = self.resolve_singleton(&definition, context)?;
        if let Some(holder) = self.holder(context) {
            self.cache.register_dependent(name, &holder);
        }
        Ok(instance)
    }

    fn resolve_singleton(
        &self,
        definition: &Arc<ComponentDefinition>,
        context: &mut ResolveContext,
    ) -> ContainerResult<ComponentRef> {
        let name = definition.name();
        if let Some(instance) = self.cache.get_if_present(name) {
            return Ok(instance);
        }

        let _guard = self.creation_lock.lock();
        if let Some(instance) = self.cache.get_if_present(name) {
            return Ok(instance);
        }

        if self.cache.is_in_creation(name) {
            return match self.cache.get_early_reference(name) {
                Ok(Some(early)) => {
                    trace!("组件 {} 使用早期引用解析 {}", context.chain().join(" -> "), name);
                    Ok(early)
                }
                Ok(None) => Err(ContainerError::CircularDependency {
                    chain: context.chain_with(name),
                }),
                Err(source) => Err(ContainerError::Creation {
                    name: name.to_string(),
                    phase: CreationPhase::ExposedEarly,
                    chain: context.chain_with(name),
                    source,
                }),
            };
        }

        // 在解析链中但尚未进入创建：depends_on 形成的环
        if context.contains(name) {
            return Err(ContainerError::CircularDependency {
                chain: context.chain_with(name),
            });
        }

        self.create(definition, context)
    }

    fn create(
        &self,
        definition: &Arc<ComponentDefinition>,
        context: &mut ResolveContext,
    ) -> ContainerResult<ComponentRef> {
        let name = definition.name();
        context
            .enter(name)
            .map_err(|e| ContainerError::Creation {
                name: name.to_string(),
                phase: CreationPhase::ResolvingDefinition,
                chain: e.chain.clone(),
                source: Box::new(e),
            })?;

        let started = Instant::now();
        let result = self.create_in_context(definition, context);
        context.exit();

        match &result {
            Ok(_) => {
                let elapsed = started.elapsed();
                self.counters.created.fetch_add(1, Ordering::Relaxed);
                self.counters.total_creation_micros.fetch_add(
                    u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
                    Ordering::Relaxed,
                );
                debug!(
                    "组件创建完成: {} ({}, 耗时 {:?})",
                    name,
                    definition.scope(),
                    elapsed
                );
            }
            Err(e) => trace!("组件 {} 进入阶段 {}: {}", name, CreationPhase::Failed, e),
        }
        result
    }

    fn create_in_context(
        &self,
        definition: &Arc<ComponentDefinition>,
        context: &mut ResolveContext,
    ) -> ContainerResult<ComponentRef> {
        let name = definition.name();
        trace!("组件 {} 进入阶段 {}", name, CreationPhase::ResolvingDefinition);

        for dependency in definition.depends_on() {
            self.resolve(dependency, context).map_err(|e| {
                self.nested(name, CreationPhase::ResolvingDefinition, context, e)
            })?;
        }

        if !definition.is_singleton() {
            return self.build(definition, context);
        }

        self.cache.mark_in_creation(name);
        match self.build(definition, context) {
            Ok(instance) => {
                self.cache.mark_created(name, Arc::clone(&instance));
                Ok(instance)
            }
            Err(e) => {
                self.discard_failed_singleton(name);
                Err(e)
            }
        }
    }

    fn build(
        &self,
        definition: &Arc<ComponentDefinition>,
        context: &mut ResolveContext,
    ) -> ContainerResult<ComponentRef> {
        let name = definition.name();

        let substitute = self
            .hooks
            .apply_before_instantiation(definition)
            .map_err(|e| self.failure(name, CreationPhase::Instantiating, context, e))?;
        if let Some(substitute) = substitute {
            return self.post_process(definition, substitute, context);
        }

        trace!("组件 {} 进入阶段 {}", name, CreationPhase::Instantiating);
        let raw = self.instantiate(definition, context)?;

        if definition.is_singleton() {
            let hooks = Arc::clone(&self.hooks);
            let early_definition = Arc::clone(definition);
            let early = Arc::clone(&raw);
            self.cache.register_early_reference(
                name,
                Box::new(move || {
                    hooks
                        .apply_early_reference(early, &early_definition)
                        .map_err(BoxError::from)
                }),
            );
        }
        trace!("组件 {} 进入阶段 {}", name, CreationPhase::ExposedEarly);

        let populate = self
            .hooks
            .apply_after_instantiation(&raw, definition)
            .map_err(|e| self.failure(name, CreationPhase::ExposedEarly, context, e))?;
        if populate {
            trace!("组件 {} 进入阶段 {}", name, CreationPhase::Populating);
            self.populate(definition, &raw, context)?;
        }

        self.initialize(definition, &raw, context)?;

        let instance = self.post_process(definition, Arc::clone(&raw), context)?;
        self.reconcile_early_reference(definition, &raw, instance, context)
    }

    fn instantiate(
        &self,
        definition: &ComponentDefinition,
        context: &mut ResolveContext,
    ) -> ContainerResult<ComponentRef> {
        let name = definition.name();
        let phase = CreationPhase::Instantiating;
        match definition.construction() {
            ConstructionStrategy::Constructor { args, constructor }
            | ConstructionStrategy::StaticFactory {
                args,
                factory: constructor,
                ..
            } => {
                let args = self.resolve_args(name, args, context)?;
                constructor(&args).map_err(|e| self.failure(name, phase, context, e))
            }
            ConstructionStrategy::InstanceFactory {
                factory_component,
                method,
                args,
            } => {
                let factory = self
                    .resolve(factory_component, context)
                    .map_err(|e| self.nested(name, phase, context, e))?;
                let args = self.resolve_args(name, args, context)?;
                factory
                    .create_product(method, &args)
                    .map_err(|e| self.failure(name, phase, context, e))
            }
            ConstructionStrategy::Supplier(supplier) => {
                supplier().map_err(|e| self.failure(name, phase, context, e))
            }
        }
    }

    fn resolve_args(
        &self,
        name: &str,
        args: &[PropertyValue],
        context: &mut ResolveContext,
    ) -> ContainerResult<ConstructorArgs> {
        let values = args
            .iter()
            .map(|arg| self.resolve_value(arg, context))
            .collect::<ContainerResult<Vec<_>>>()
            .map_err(|e| self.nested(name, CreationPhase::Instantiating, context, e))?;
        Ok(ConstructorArgs::new(values))
    }

    fn resolve_value(
        &self,
        value: &PropertyValue,
        context: &mut ResolveContext,
    ) -> ContainerResult<ResolvedValue> {
        match value {
            PropertyValue::Literal(literal) => Ok(ResolvedValue::Literal(literal.clone())),
            PropertyValue::Reference(target) => {
                self.resolve(target, context).map(ResolvedValue::Component)
            }
            PropertyValue::List(items) => items
                .iter()
                .map(|item| self.resolve_value(item, context))
                .collect::<ContainerResult<Vec<_>>>()
                .map(ResolvedValue::List),
        }
    }

    fn populate(
        &self,
        definition: &ComponentDefinition,
        instance: &ComponentRef,
        context: &mut ResolveContext,
    ) -> ContainerResult<()> {
        let name = definition.name();
        let phase = CreationPhase::Populating;

        let mut values = PropertyValues::new();
        for binding in definition.properties() {
            let value = self
                .resolve_value(&binding.value, context)
                .map_err(|e| self.nested(name, phase, context, e))?;
            values.set(binding.name.clone(), value);
        }

        let values = self
            .hooks
            .apply_property_values(values, instance, definition)
            .map_err(|e| self.failure(name, phase, context, e))?;

        for (property, value) in values {
            instance
                .set_property(&property, value)
                .map_err(|e| self.failure(name, phase, context, e))?;
        }
        Ok(())
    }

    fn initialize(
        &self,
        definition: &ComponentDefinition,
        instance: &ComponentRef,
        context: &ResolveContext,
    ) -> ContainerResult<()> {
        let Some(method) = definition.init_method() else {
            return Ok(());
        };
        trace!("组件 {} 进入阶段 {}", definition.name(), CreationPhase::Initializing);
        let execution = ExecutionContext::new();
        instance
            .invoke(&execution, method, &[])
            .map(|_| ())
            .map_err(|source| ContainerError::Initialization {
                name: definition.name().to_string(),
                method: method.to_string(),
                chain: context.chain_ending_with(definition.name()),
                source,
            })
    }

    fn post_process(
        &self,
        definition: &ComponentDefinition,
        instance: ComponentRef,
        context: &ResolveContext,
    ) -> ContainerResult<ComponentRef> {
        let name = definition.name();
        trace!("组件 {} 进入阶段 {}", name, CreationPhase::PostProcessing);
        self.hooks
            .apply_after_initialization(instance, definition)
            .map_err(|e| self.failure(name, CreationPhase::PostProcessing, context, e))
    }

    /// 早期引用与最终实例保持一致
    fn reconcile_early_reference(
        &self,
        definition: &ComponentDefinition,
        raw: &ComponentRef,
        instance: ComponentRef,
        context: &ResolveContext,
    ) -> ContainerResult<ComponentRef> {
        let name = definition.name();
        let Some(early) = self.cache.exposed_early_reference(name) else {
            return Ok(instance);
        };

        // 初始化后处理未替换实例：早期引用（可能是钩子提前给出的包装）即最终实例
        if same_component(&instance, raw) || same_component(&instance, &early) {
            return Ok(early);
        }

        match self.config.early_reference_policy {
            EarlyReferencePolicy::Reject => Err(self.failure(
                name,
                CreationPhase::PostProcessing,
                context,
                EarlyReferenceMismatch {
                    name: name.to_string(),
                },
            )),
            EarlyReferencePolicy::Allow => {
                warn!(
                    "组件 {} 的早期引用与最终实例不一致，已持有早期引用的组件不会更新",
                    name
                );
                Ok(instance)
            }
        }
    }

    fn failure(
        &self,
        name: &str,
        phase: CreationPhase,
        context: &ResolveContext,
        source: impl Into<BoxError>,
    ) -> ContainerError {
        ContainerError::Creation {
            name: name.to_string(),
            phase,
            chain: context.chain_ending_with(name),
            source: source.into(),
        }
    }

    /// 包装依赖解析失败；循环依赖原样向上传播
    fn nested(
        &self,
        name: &str,
        phase: CreationPhase,
        context: &ResolveContext,
        error: ContainerError,
    ) -> ContainerError {
        if matches!(error, ContainerError::CircularDependency { .. }) {
            return error;
        }
        self.failure(name, phase, context, error)
    }
}

impl std::fmt::Debug for CreationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreationEngine")
            .field("definitions", &self.registry.read().len())
            .field("cache", &self.cache)
            .field("hooks", &self.hooks)
            .field("config", &self.config)
            .finish()
    }
}

/// 沿代理链找到最内层目标
fn unwrap_proxy(mut instance: ComponentRef) -> ComponentRef {
    while let Some(target) = instance.proxied_target() {
        instance = target;
    }
    instance
}
