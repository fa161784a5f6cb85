//! 组件容器查找接口
//!
//! 提供按名称、按类型获取已完成组件的核心抽象

use infrastructure_common::{
    downcast_component, ComponentRef, ContainerError, ContainerResult, TypeInfo,
};
use std::any::Any;
use std::sync::Arc;

/// 组件查找 trait
pub trait ComponentLookup: Send + Sync {
    /// 按名称获取组件，必要时创建
    fn get_component(&self, name: &str) -> ContainerResult<ComponentRef>;

    /// 按类型获取组件：恰好一个匹配，或匹配中恰好一个首选组件
    fn get_component_by_type(&self, type_info: &TypeInfo) -> ContainerResult<ComponentRef>;

    /// 是否存在组件定义
    fn contains_component(&self, name: &str) -> bool;

    /// 全部组件名称（注册顺序）
    fn definition_names(&self) -> Vec<String>;
}

/// 组件查找的类型化扩展
pub trait ComponentLookupExt: ComponentLookup {
    /// 按名称获取并转型为具体类型
    fn get_typed<T: Any + Send + Sync>(&self, name: &str) -> ContainerResult<Arc<T>> {
        let component = self.get_component(name)?;
        downcast_component::<T>(&component).ok_or_else(|| ContainerError::TypeMismatch {
            name: name.to_string(),
            expected: std::any::type_name::<T>().to_string(),
        })
    }

    /// 按类型（含 trait 对象类型）获取组件
    fn get_component_of<T: ?Sized + 'static>(&self) -> ContainerResult<ComponentRef> {
        self.get_component_by_type(&TypeInfo::of::<T>())
    }

    /// 按具体类型获取并转型
    fn get_by_type<T: Any + Send + Sync>(&self) -> ContainerResult<Arc<T>> {
        let component = self.get_component_of::<T>()?;
        downcast_component::<T>(&component).ok_or_else(|| ContainerError::TypeMismatch {
            name: component.type_name().to_string(),
            expected: std::any::type_name::<T>().to_string(),
        })
    }
}

impl<L: ComponentLookup + ?Sized> ComponentLookupExt for L {}

/// 容器统计信息
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerStats {
    /// 已注册组件定义数量
    pub registered_components: usize,
    /// 已完成的创建次数（单例与原型）
    pub created_components: usize,
    /// 活跃单例数量
    pub active_singletons: usize,
    /// 已注册钩子数量
    pub registered_hooks: usize,
    /// 创建总耗时（毫秒）
    pub total_creation_time_ms: u64,
    /// 平均创建耗时（毫秒）
    pub average_creation_time_ms: f64,
    /// 创建失败次数
    pub creation_errors: usize,
}
