//! 自动代理钩子
//!
//! 作为初始化后处理钩子安装到容器中：任何方法命中已注册通知器的组件都会被包装为代理。
//! 循环依赖中提前暴露的早期引用同样会被包装；同一次创建的原始实例初始化后不再重复包装，
//! 创建失败后重试得到的新实例照常包装。

use crate::proxy::{create_proxy, has_matching_method, sort_advisors, Advisor, ProxyKind};
use di_abstractions::{ComponentDefinition, ComponentPostProcessor};
use infrastructure_common::{same_component, BoxError, ComponentRef, Managed};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, info};

/// 自动代理创建器
#[derive(Debug, Default)]
pub struct AutoProxyCreator {
    advisors: RwLock<Vec<Advisor>>,
    proxy_target_type: bool,
    /// 已包装过早期引用的原始实例
    early_proxy_references: Mutex<HashMap<String, Weak<dyn Managed>>>,
}

impl AutoProxyCreator {
    /// 创建自动代理创建器
    pub fn new(proxy_target_type: bool) -> Self {
        Self {
            proxy_target_type,
            ..Self::default()
        }
    }

    /// 注册通知器，之后创建的组件才会受影响
    pub fn add_advisor(&self, advisor: Advisor) {
        info!(
            "注册通知器: {} ({}, 优先级 {})",
            advisor.name(),
            advisor.advice().kind(),
            advisor.priority()
        );
        let mut advisors = self.advisors.write();
        advisors.push(advisor);
        sort_advisors(&mut advisors);
    }

    /// 已注册的通知器（按优先级排序）
    pub fn advisors(&self) -> Vec<Advisor> {
        self.advisors.read().clone()
    }

    /// 通知器数量
    pub fn advisor_count(&self) -> usize {
        self.advisors.read().len()
    }

    /// 是否以目标类型代理所有组件
    pub const fn proxy_target_type(&self) -> bool {
        self.proxy_target_type
    }

    fn wrap_if_necessary(
        &self,
        instance: ComponentRef,
        definition: &ComponentDefinition,
    ) -> ComponentRef {
        let advisors = self.advisors();
        if advisors.is_empty() || !has_matching_method(&instance, &advisors) {
            return instance;
        }

        let mut interfaces: Vec<String> = definition.interfaces().to_vec();
        for interface in instance.interfaces() {
            if !interfaces.contains(&interface) {
                interfaces.push(interface);
            }
        }
        let kind = if self.proxy_target_type || interfaces.is_empty() {
            ProxyKind::TargetType
        } else {
            ProxyKind::Interface
        };

        debug!("为组件 {} 创建 {:?} 代理", definition.name(), kind);
        create_proxy(instance, advisors, interfaces, kind)
    }
}

impl ComponentPostProcessor for AutoProxyCreator {
    fn name(&self) -> &str {
        "AutoProxyCreator"
    }

    fn early_reference(
        &self,
        instance: ComponentRef,
        definition: &ComponentDefinition,
    ) -> Result<ComponentRef, BoxError> {
        self.early_proxy_references
            .lock()
            .insert(definition.name().to_string(), Arc::downgrade(&instance));
        Ok(self.wrap_if_necessary(instance, definition))
    }

    fn after_initialization(
        &self,
        instance: ComponentRef,
        definition: &ComponentDefinition,
    ) -> Result<ComponentRef, BoxError> {
        // 本次创建的早期引用已经包装过，原样返回由容器改用早期引用
        let wrapped_early = self
            .early_proxy_references
            .lock()
            .remove(definition.name())
            .and_then(|raw| raw.upgrade())
            .is_some_and(|raw| same_component(&raw, &instance));
        if wrapped_early {
            return Ok(instance);
        }
        Ok(self.wrap_if_necessary(instance, definition))
    }
}
