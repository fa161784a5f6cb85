//! 受管组件能力接口定义
//!
//! 容器不依赖运行时反射：属性注入、构造与方法调用都通过按类型实现的能力 trait 完成。
//! `Settable` 通常由 `component-macros` 的派生宏生成，`Constructible` 与 `Managed`
//! 由组件作者实现。

use crate::context::ExecutionContext;
use crate::errors::{BoxError, InvocationError, PropertyError};
use crate::metadata::MethodSignature;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// 容器中流转的组件引用
pub type ComponentRef = Arc<dyn Managed>;

/// 类型擦除辅助 trait，为所有 `Send + Sync + 'static` 类型自动实现
pub trait AsAny: Any + Send + Sync {
    /// 以 `&dyn Any` 形式访问
    fn as_any(&self) -> &dyn Any;

    /// 转换为 `Arc<dyn Any>` 以便按具体类型向下转型
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// 可按名称注入属性的组件
///
/// 组件可能在属性注入前就作为早期引用被其他组件持有，所以注入通过 `&self` 完成，
/// 字段需要内部可变性（见 [`PropertyCell`] 与 [`ComponentCell`]）。
pub trait Settable {
    /// 注入单个属性
    fn set_property(&self, name: &str, value: ResolvedValue) -> Result<(), PropertyError>;
}

/// 受管组件 trait
///
/// 所有由容器创建和管理的组件都必须实现此 trait
pub trait Managed: AsAny + Settable {
    /// 组件的具体类型名称
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// 可被拦截的方法签名
    fn methods(&self) -> Vec<MethodSignature> {
        Vec::new()
    }

    /// 组件额外暴露的接口名称
    fn interfaces(&self) -> Vec<String> {
        Vec::new()
    }

    /// 按方法名动态调用；初始化与销毁方法也经由此入口调用
    fn invoke(
        &self,
        ctx: &ExecutionContext,
        method: &str,
        args: &[Value],
    ) -> Result<Value, InvocationError> {
        let _ = (ctx, args);
        Err(InvocationError::no_such_method(self.type_name(), method))
    }

    /// 实例工厂方法：由本组件生产另一个组件
    fn create_product(
        &self,
        method: &str,
        args: &ConstructorArgs,
    ) -> Result<ComponentRef, InvocationError> {
        let _ = args;
        Err(InvocationError::no_such_method(self.type_name(), method))
    }

    /// 代理对象返回被代理的目标
    fn proxied_target(&self) -> Option<ComponentRef> {
        None
    }

    /// 代理对象是否以目标的具体类型对外呈现
    fn presents_target_type(&self) -> bool {
        false
    }
}

/// 可由容器通过构造参数创建的组件
pub trait Constructible: Managed + Sized {
    /// 使用已解析的构造参数创建实例
    fn construct(args: &ConstructorArgs) -> Result<Self, BoxError>;
}

/// 判断两个组件引用是否指向同一对象
pub fn same_component(left: &ComponentRef, right: &ComponentRef) -> bool {
    std::ptr::eq(
        Arc::as_ptr(left).cast::<()>(),
        Arc::as_ptr(right).cast::<()>(),
    )
}

/// 按具体类型向下转型组件引用
///
/// 以目标类型呈现的代理会转型为其目标（此时直接调用将绕过拦截）。
pub fn downcast_component<T: Any + Send + Sync>(component: &ComponentRef) -> Option<Arc<T>> {
    if let Ok(typed) = AsAny::into_any_arc(Arc::clone(component)).downcast::<T>() {
        return Some(typed);
    }
    if component.presents_target_type() {
        return component
            .proxied_target()
            .and_then(|target| downcast_component::<T>(&target));
    }
    None
}

/// 按具体类型借用组件
pub fn component_ref<T: Any>(component: &ComponentRef) -> Option<&T> {
    AsAny::as_any(&**component).downcast_ref::<T>()
}

/// 已解析的属性或参数值
#[derive(Clone)]
pub enum ResolvedValue {
    /// 字面值
    Literal(Value),
    /// 另一个组件
    Component(ComponentRef),
    /// 值列表
    List(Vec<ResolvedValue>),
}

impl ResolvedValue {
    /// 将字面值（或全部为字面值的列表）转换为 JSON 值
    pub fn to_json(&self) -> Option<Value> {
        match self {
            Self::Literal(value) => Some(value.clone()),
            Self::Component(_) => None,
            Self::List(items) => items
                .iter()
                .map(Self::to_json)
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
        }
    }

    /// 反序列化为具体类型
    pub fn literal<T: DeserializeOwned>(&self, property: &str) -> Result<T, PropertyError> {
        let value = self.to_json().ok_or_else(|| {
            PropertyError::mismatch(property, std::any::type_name::<T>(), "值是组件引用")
        })?;
        serde_json::from_value(value).map_err(|e| {
            PropertyError::mismatch(property, std::any::type_name::<T>(), e.to_string())
        })
    }

    /// 取出组件引用
    pub fn component(&self, property: &str) -> Result<ComponentRef, PropertyError> {
        match self {
            Self::Component(component) => Ok(Arc::clone(component)),
            _ => Err(PropertyError::mismatch(property, "component", "值不是组件引用")),
        }
    }

    /// 是否为组件引用
    pub const fn is_component(&self) -> bool {
        matches!(self, Self::Component(_))
    }
}

impl fmt::Debug for ResolvedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Component(component) => f
                .debug_tuple("Component")
                .field(&component.type_name())
                .finish(),
            Self::List(items) => f.debug_tuple("List").field(items).finish(),
        }
    }
}

impl From<Value> for ResolvedValue {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

impl From<ComponentRef> for ResolvedValue {
    fn from(component: ComponentRef) -> Self {
        Self::Component(component)
    }
}

/// 已解析的构造参数
#[derive(Debug, Clone, Default)]
pub struct ConstructorArgs {
    values: Vec<ResolvedValue>,
}

impl ConstructorArgs {
    /// 创建构造参数
    pub fn new(values: Vec<ResolvedValue>) -> Self {
        Self { values }
    }

    /// 参数个数
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// 是否没有参数
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 获取指定位置的参数
    pub fn get(&self, index: usize) -> Result<&ResolvedValue, PropertyError> {
        self.values
            .get(index)
            .ok_or(PropertyError::MissingArgument { index })
    }

    /// 按具体类型读取字面参数
    pub fn literal<T: DeserializeOwned>(&self, index: usize) -> Result<T, PropertyError> {
        self.get(index)?.literal(&format!("arg{}", index))
    }

    /// 读取组件参数
    pub fn component(&self, index: usize) -> Result<ComponentRef, PropertyError> {
        self.get(index)?.component(&format!("arg{}", index))
    }
}

/// 派生宏生成的属性注入目标
pub trait PropertyTarget {
    /// 将已解析的值写入该字段
    fn assign(&self, property: &str, value: ResolvedValue) -> Result<(), PropertyError>;
}

/// 字面值属性字段
pub struct PropertyCell<T> {
    value: RwLock<Option<T>>,
}

impl<T> PropertyCell<T> {
    /// 创建空属性
    pub fn new() -> Self {
        Self {
            value: RwLock::new(None),
        }
    }

    /// 创建带初始值的属性
    pub fn with_value(value: T) -> Self {
        Self {
            value: RwLock::new(Some(value)),
        }
    }

    /// 直接写入值
    pub fn set(&self, value: T) {
        *self.value.write() = Some(value);
    }

    /// 是否已赋值
    pub fn is_set(&self) -> bool {
        self.value.read().is_some()
    }

    /// 以闭包读取当前值
    pub fn with<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        f(self.value.read().as_ref())
    }
}

impl<T: Clone> PropertyCell<T> {
    /// 获取当前值
    pub fn get(&self) -> Option<T> {
        self.value.read().clone()
    }
}

impl<T> Default for PropertyCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for PropertyCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PropertyCell").field(&*self.value.read()).finish()
    }
}

impl<T: DeserializeOwned> PropertyTarget for PropertyCell<T> {
    fn assign(&self, property: &str, value: ResolvedValue) -> Result<(), PropertyError> {
        let typed = value.literal::<T>(property)?;
        *self.value.write() = Some(typed);
        Ok(())
    }
}

/// 组件引用属性字段
#[derive(Default)]
pub struct ComponentCell {
    component: RwLock<Option<ComponentRef>>,
}

impl ComponentCell {
    /// 创建空引用
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取引用的组件
    pub fn get(&self) -> Option<ComponentRef> {
        self.component.read().clone()
    }

    /// 按具体类型获取引用的组件
    pub fn get_typed<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.get().and_then(|component| downcast_component::<T>(&component))
    }

    /// 直接写入引用
    pub fn set(&self, component: ComponentRef) {
        *self.component.write() = Some(component);
    }
}

impl fmt::Debug for ComponentCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.component.read().as_ref().map(|c| c.type_name());
        f.debug_tuple("ComponentCell").field(&name).finish()
    }
}

impl PropertyTarget for ComponentCell {
    fn assign(&self, property: &str, value: ResolvedValue) -> Result<(), PropertyError> {
        let component = value.component(property)?;
        *self.component.write() = Some(component);
        Ok(())
    }
}

/// 组件引用列表属性字段
#[derive(Default)]
pub struct ComponentListCell {
    components: RwLock<Vec<ComponentRef>>,
}

impl ComponentListCell {
    /// 获取全部引用
    pub fn get(&self) -> Vec<ComponentRef> {
        self.components.read().clone()
    }
}

impl fmt::Debug for ComponentListCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComponentListCell")
            .field(&self.components.read().len())
            .finish()
    }
}

impl PropertyTarget for ComponentListCell {
    fn assign(&self, property: &str, value: ResolvedValue) -> Result<(), PropertyError> {
        let components = match value {
            ResolvedValue::List(items) => items
                .iter()
                .map(|item| item.component(property))
                .collect::<Result<Vec<_>, _>>()?,
            ResolvedValue::Component(component) => vec![component],
            ResolvedValue::Literal(_) => {
                return Err(PropertyError::mismatch(property, "component list", "值是字面值"))
            }
        };
        *self.components.write() = components;
        Ok(())
    }
}
