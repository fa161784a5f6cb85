//! 组件创建扩展钩子
//!
//! 钩子在组件创建的固定节点被调用，可以替换实例、阻止属性注入、改写属性值，
//! 或在初始化后包装实例（自动代理即经由此接口安装）。

use crate::definition::ComponentDefinition;
use infrastructure_common::{BoxError, ComponentRef, ResolvedValue};
use std::fmt;

/// 钩子扩展点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPhase {
    /// 实例化前，可返回替代实例
    BeforeInstantiation,
    /// 实例化后，返回 `false` 跳过属性注入
    AfterInstantiation,
    /// 属性注入前，可改写属性集合
    PropertyValues,
    /// 早期引用被第一次获取时，可返回包装后的引用
    EarlyReference,
    /// 初始化后，可返回包装或替代实例
    AfterInitialization,
}

impl HookPhase {
    /// 是否为"前置"阶段：前置阶段按优先级升序执行，后置阶段按降序执行
    pub const fn is_before(self) -> bool {
        matches!(
            self,
            Self::BeforeInstantiation | Self::EarlyReference | Self::PropertyValues
        )
    }

    /// 阶段名称
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BeforeInstantiation => "before_instantiation",
            Self::AfterInstantiation => "after_instantiation",
            Self::PropertyValues => "property_values",
            Self::EarlyReference => "early_reference",
            Self::AfterInitialization => "after_initialization",
        }
    }
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 已解析的属性集合（保持声明顺序）
#[derive(Debug, Clone, Default)]
pub struct PropertyValues {
    values: Vec<(String, ResolvedValue)>,
}

impl PropertyValues {
    /// 创建空集合
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置属性，同名属性原位替换
    pub fn set(&mut self, name: impl Into<String>, value: ResolvedValue) {
        let name = name.into();
        match self.values.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.values.push((name, value)),
        }
    }

    /// 获取属性
    pub fn get(&self, name: &str) -> Option<&ResolvedValue> {
        self.values
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    /// 移除属性
    pub fn remove(&mut self, name: &str) -> Option<ResolvedValue> {
        let position = self.values.iter().position(|(existing, _)| existing == name)?;
        Some(self.values.remove(position).1)
    }

    /// 是否包含属性
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// 属性名称
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(name, _)| name.as_str())
    }

    /// 属性数量
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl IntoIterator for PropertyValues {
    type Item = (String, ResolvedValue);
    type IntoIter = std::vec::IntoIter<(String, ResolvedValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

/// 组件后处理器（扩展钩子）
///
/// 所有扩展点都有默认实现，钩子只需覆盖关心的阶段。
pub trait ComponentPostProcessor: Send + Sync {
    /// 钩子名称，用于日志与错误信息
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// 实例化前调用，返回 `Some` 时跳过实例化与属性注入，直接进入初始化后处理
    fn before_instantiation(
        &self,
        definition: &ComponentDefinition,
    ) -> Result<Option<ComponentRef>, BoxError> {
        let _ = definition;
        Ok(None)
    }

    /// 实例化后调用，返回 `false` 跳过属性注入
    fn after_instantiation(
        &self,
        instance: &ComponentRef,
        definition: &ComponentDefinition,
    ) -> Result<bool, BoxError> {
        let _ = (instance, definition);
        Ok(true)
    }

    /// 属性注入前调用，可改写属性集合
    fn property_values(
        &self,
        values: PropertyValues,
        instance: &ComponentRef,
        definition: &ComponentDefinition,
    ) -> Result<PropertyValues, BoxError> {
        let _ = (instance, definition);
        Ok(values)
    }

    /// 循环依赖中早期引用被获取时调用，可提前返回稍后将安装的包装对象
    fn early_reference(
        &self,
        instance: ComponentRef,
        definition: &ComponentDefinition,
    ) -> Result<ComponentRef, BoxError> {
        let _ = definition;
        Ok(instance)
    }

    /// 初始化后调用，返回值传递给下一个钩子，最后的结果成为最终实例
    fn after_initialization(
        &self,
        instance: ComponentRef,
        definition: &ComponentDefinition,
    ) -> Result<ComponentRef, BoxError> {
        let _ = definition;
        Ok(instance)
    }
}
