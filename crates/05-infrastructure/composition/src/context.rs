//! 应用上下文
//!
//! 组合受管组件容器与自动代理钩子，对外提供组件查找、通知注册与关闭。

use crate::builder::ApplicationContextBuilder;
use chrono::{DateTime, Utc};
use di_abstractions::{
    ComponentDefinition, ComponentLookup, ComponentPostProcessor, ContainerStats,
};
use di_impl::ManagedContainer;
use infrastructure_common::{
    ComponentRef, ContainerConfig, ContainerResult, ExecutionContext, InstanceState, TypeInfo,
};
use interception::{Advice, Advisor, AutoProxyCreator, Pointcut};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// 自动代理钩子的优先级：初始化后阶段按优先级逆序执行，因此它最后包装
pub const AUTO_PROXY_HOOK_PRIORITY: i32 = i32::MIN;

/// 应用上下文
#[derive(Debug)]
pub struct ApplicationContext {
    id: Uuid,
    started_at: DateTime<Utc>,
    container: ManagedContainer,
    auto_proxy: Arc<AutoProxyCreator>,
}

impl ApplicationContext {
    /// 创建构建器
    pub fn builder() -> ApplicationContextBuilder {
        ApplicationContextBuilder::new()
    }

    /// 以配置创建上下文，并安装自动代理钩子
    pub fn new(config: ContainerConfig) -> Self {
        let auto_proxy = Arc::new(AutoProxyCreator::new(config.proxy_target_type));
        let container = ManagedContainer::new(config);
        container.add_hook(auto_proxy.clone(), AUTO_PROXY_HOOK_PRIORITY);

        let context = Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            container,
            auto_proxy,
        };
        info!("应用上下文已创建: {}", context.id);
        context
    }

    /// 上下文标识
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// 创建时间
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// 底层容器
    pub const fn container(&self) -> &ManagedContainer {
        &self.container
    }

    /// 自动代理钩子
    pub fn auto_proxy(&self) -> &AutoProxyCreator {
        &self.auto_proxy
    }

    /// 注册组件定义
    pub fn register_definition(&self, definition: ComponentDefinition) -> ContainerResult<()> {
        self.container.register_definition(definition)
    }

    /// 添加扩展钩子
    pub fn add_hook(&self, hook: Arc<dyn ComponentPostProcessor>, priority: i32) {
        self.container.add_hook(hook, priority);
    }

    /// 添加通知：之后创建的、有方法命中切点的组件会被代理
    pub fn add_advice(&self, pointcut: impl Pointcut + 'static, advice: Advice, priority: i32) {
        let name = format!("advisor#{}", self.auto_proxy.advisor_count());
        self.auto_proxy
            .add_advisor(Advisor::new(name, pointcut, advice, priority));
    }

    /// 添加命名通知器
    pub fn add_advisor(&self, advisor: Advisor) {
        self.auto_proxy.add_advisor(advisor);
    }

    /// 创建新的执行上下文
    pub fn execution_context(&self) -> ExecutionContext {
        ExecutionContext::new()
    }

    /// 单例状态
    pub fn state(&self, name: &str) -> InstanceState {
        self.container.state(name)
    }

    /// 统计信息
    pub fn stats(&self) -> ContainerStats {
        self.container.stats()
    }

    /// 是否已关闭
    pub fn is_closed(&self) -> bool {
        self.container.is_closed()
    }

    /// 关闭上下文，按创建逆序销毁单例
    pub fn close(&self) {
        info!(
            "关闭应用上下文: {}, 运行时长 {} 秒",
            self.id,
            (Utc::now() - self.started_at).num_seconds()
        );
        self.container.destroy();
    }
}

impl Default for ApplicationContext {
    fn default() -> Self {
        Self::new(ContainerConfig::default())
    }
}

impl ComponentLookup for ApplicationContext {
    fn get_component(&self, name: &str) -> ContainerResult<ComponentRef> {
        self.container.get_component(name)
    }

    fn get_component_by_type(&self, type_info: &TypeInfo) -> ContainerResult<ComponentRef> {
        self.container.get_component_by_type(type_info)
    }

    fn contains_component(&self, name: &str) -> bool {
        self.container.contains_component(name)
    }

    fn definition_names(&self) -> Vec<String> {
        self.container.definition_names()
    }
}
