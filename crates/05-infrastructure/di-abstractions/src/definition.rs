//! 组件定义
//!
//! 组件定义是容器创建组件的声明式描述：名称、类型、作用域、构造策略、属性绑定、
//! 初始化与销毁方法、额外暴露的接口。定义在注册后即不再修改。

use infrastructure_common::{
    BoxError, ComponentRef, ComponentScope, Constructible, ConstructorArgs, Managed, TypeInfo,
};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// 以已解析参数构造组件的函数
pub type ConstructFn =
    Arc<dyn Fn(&ConstructorArgs) -> Result<ComponentRef, BoxError> + Send + Sync>;

/// 无参数的组件提供函数
pub type SupplierFn = Arc<dyn Fn() -> Result<ComponentRef, BoxError> + Send + Sync>;

/// 属性或构造参数的声明值
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// 字面值
    Literal(Value),
    /// 按名称引用另一个组件
    Reference(String),
    /// 值列表
    List(Vec<PropertyValue>),
}

impl PropertyValue {
    /// 创建字面值
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    /// 创建组件引用
    pub fn reference(name: impl Into<String>) -> Self {
        Self::Reference(name.into())
    }

    /// 收集值中引用的全部组件名称
    fn collect_references<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Self::Literal(_) => {}
            Self::Reference(name) => names.push(name),
            Self::List(items) => items.iter().for_each(|item| item.collect_references(names)),
        }
    }
}

impl From<Value> for PropertyValue {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

/// 属性绑定：属性名 → 声明值
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyBinding {
    /// 属性名
    pub name: String,
    /// 声明值
    pub value: PropertyValue,
}

/// 构造策略
#[derive(Clone)]
pub enum ConstructionStrategy {
    /// 以构造参数调用构造函数
    Constructor {
        /// 构造参数
        args: Vec<PropertyValue>,
        /// 构造函数
        constructor: ConstructFn,
    },
    /// 调用声明类型上的静态工厂方法
    StaticFactory {
        /// 工厂方法所在类型
        declaring_type: String,
        /// 工厂方法名
        method: String,
        /// 工厂方法参数
        args: Vec<PropertyValue>,
        /// 工厂方法实现
        factory: ConstructFn,
    },
    /// 调用另一个组件上的工厂方法
    InstanceFactory {
        /// 工厂组件名称
        factory_component: String,
        /// 工厂方法名
        method: String,
        /// 工厂方法参数
        args: Vec<PropertyValue>,
    },
    /// 由提供函数直接产出实例
    Supplier(SupplierFn),
}

impl ConstructionStrategy {
    /// 策略名称
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Constructor { .. } => "constructor",
            Self::StaticFactory { .. } => "static-factory",
            Self::InstanceFactory { .. } => "instance-factory",
            Self::Supplier(_) => "supplier",
        }
    }

    /// 构造参数
    pub fn args(&self) -> &[PropertyValue] {
        match self {
            Self::Constructor { args, .. }
            | Self::StaticFactory { args, .. }
            | Self::InstanceFactory { args, .. } => args,
            Self::Supplier(_) => &[],
        }
    }

    fn args_mut(&mut self) -> Option<&mut Vec<PropertyValue>> {
        match self {
            Self::Constructor { args, .. }
            | Self::StaticFactory { args, .. }
            | Self::InstanceFactory { args, .. } => Some(args),
            Self::Supplier(_) => None,
        }
    }
}

impl fmt::Debug for ConstructionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constructor { args, .. } => f
                .debug_struct("Constructor")
                .field("args", args)
                .finish_non_exhaustive(),
            Self::StaticFactory {
                declaring_type,
                method,
                args,
                ..
            } => f
                .debug_struct("StaticFactory")
                .field("declaring_type", declaring_type)
                .field("method", method)
                .field("args", args)
                .finish_non_exhaustive(),
            Self::InstanceFactory {
                factory_component,
                method,
                args,
            } => f
                .debug_struct("InstanceFactory")
                .field("factory_component", factory_component)
                .field("method", method)
                .field("args", args)
                .finish(),
            Self::Supplier(_) => f.write_str("Supplier(<function>)"),
        }
    }
}

/// 组件定义
#[derive(Debug, Clone)]
pub struct ComponentDefinition {
    name: String,
    type_info: TypeInfo,
    scope: ComponentScope,
    construction: ConstructionStrategy,
    properties: Vec<PropertyBinding>,
    init_method: Option<String>,
    destroy_method: Option<String>,
    interfaces: Vec<String>,
    depends_on: Vec<String>,
    lazy: bool,
    primary: bool,
    description: Option<String>,
}

impl ComponentDefinition {
    fn with_strategy(
        name: impl Into<String>,
        type_info: TypeInfo,
        construction: ConstructionStrategy,
    ) -> Self {
        Self {
            name: name.into(),
            type_info,
            scope: ComponentScope::Singleton,
            construction,
            properties: Vec::new(),
            init_method: None,
            destroy_method: None,
            interfaces: Vec::new(),
            depends_on: Vec::new(),
            lazy: false,
            primary: false,
            description: None,
        }
    }

    /// 以类型的构造函数创建定义
    pub fn of<T: Constructible>(name: impl Into<String>) -> Self {
        let constructor: ConstructFn = Arc::new(|args: &ConstructorArgs| {
            let instance: ComponentRef = Arc::new(T::construct(args)?);
            Ok(instance)
        });
        Self::with_strategy(
            name,
            TypeInfo::of::<T>(),
            ConstructionStrategy::Constructor {
                args: Vec::new(),
                constructor,
            },
        )
    }

    /// 以提供函数创建定义
    pub fn from_supplier<T, F>(name: impl Into<String>, supplier: F) -> Self
    where
        T: Managed,
        F: Fn() -> Result<T, BoxError> + Send + Sync + 'static,
    {
        let supplier: SupplierFn = Arc::new(move || {
            let instance: ComponentRef = Arc::new(supplier()?);
            Ok(instance)
        });
        Self::with_strategy(name, TypeInfo::of::<T>(), ConstructionStrategy::Supplier(supplier))
    }

    /// 以静态工厂方法创建定义
    pub fn from_static_factory<F>(
        name: impl Into<String>,
        type_info: TypeInfo,
        declaring_type: impl Into<String>,
        method: impl Into<String>,
        factory: F,
    ) -> Self
    where
        F: Fn(&ConstructorArgs) -> Result<ComponentRef, BoxError> + Send + Sync + 'static,
    {
        Self::with_strategy(
            name,
            type_info,
            ConstructionStrategy::StaticFactory {
                declaring_type: declaring_type.into(),
                method: method.into(),
                args: Vec::new(),
                factory: Arc::new(factory),
            },
        )
    }

    /// 以另一个组件上的工厂方法创建定义
    pub fn from_instance_factory(
        name: impl Into<String>,
        type_info: TypeInfo,
        factory_component: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self::with_strategy(
            name,
            type_info,
            ConstructionStrategy::InstanceFactory {
                factory_component: factory_component.into(),
                method: method.into(),
                args: Vec::new(),
            },
        )
    }

    /// 设置作用域
    pub fn with_scope(mut self, scope: ComponentScope) -> Self {
        self.scope = scope;
        self
    }

    /// 设置为原型作用域
    pub fn prototype(self) -> Self {
        self.with_scope(ComponentScope::Prototype)
    }

    /// 追加构造参数（提供函数策略没有参数，追加被忽略）
    pub fn with_constructor_arg(mut self, value: PropertyValue) -> Self {
        if let Some(args) = self.construction.args_mut() {
            args.push(value);
        }
        self
    }

    /// 添加属性绑定，同名绑定被替换
    pub fn with_property(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
        let name = name.into();
        match self.properties.iter_mut().find(|binding| binding.name == name) {
            Some(binding) => binding.value = value,
            None => self.properties.push(PropertyBinding { name, value }),
        }
        self
    }

    /// 添加字面值属性
    pub fn with_property_value(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with_property(name, PropertyValue::literal(value))
    }

    /// 添加组件引用属性
    pub fn with_property_ref(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.with_property(name, PropertyValue::reference(target))
    }

    /// 设置初始化方法
    pub fn with_init_method(mut self, method: impl Into<String>) -> Self {
        self.init_method = Some(method.into());
        self
    }

    /// 设置销毁方法
    pub fn with_destroy_method(mut self, method: impl Into<String>) -> Self {
        self.destroy_method = Some(method.into());
        self
    }

    /// 添加暴露的接口
    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    /// 添加必须先创建的组件
    pub fn with_depends_on(mut self, name: impl Into<String>) -> Self {
        self.depends_on.push(name.into());
        self
    }

    /// 设置为延迟创建
    pub const fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    /// 设置为按类型查找时的首选组件
    pub const fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// 设置描述
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// 组件名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 声明类型
    pub const fn type_info(&self) -> &TypeInfo {
        &self.type_info
    }

    /// 作用域
    pub const fn scope(&self) -> ComponentScope {
        self.scope
    }

    /// 是否为单例
    pub const fn is_singleton(&self) -> bool {
        self.scope.is_singleton()
    }

    /// 构造策略
    pub const fn construction(&self) -> &ConstructionStrategy {
        &self.construction
    }

    /// 属性绑定（声明顺序）
    pub fn properties(&self) -> &[PropertyBinding] {
        &self.properties
    }

    /// 初始化方法
    pub fn init_method(&self) -> Option<&str> {
        self.init_method.as_deref()
    }

    /// 销毁方法
    pub fn destroy_method(&self) -> Option<&str> {
        self.destroy_method.as_deref()
    }

    /// 额外暴露的接口
    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    /// 必须先创建的组件
    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }

    /// 是否延迟创建
    pub const fn is_lazy(&self) -> bool {
        self.lazy
    }

    /// 是否为首选组件
    pub const fn is_primary(&self) -> bool {
        self.primary
    }

    /// 描述
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// 构造参数与属性中引用的组件名称（含实例工厂组件），不含 `depends_on`
    pub fn referenced_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        if let ConstructionStrategy::InstanceFactory {
            factory_component, ..
        } = &self.construction
        {
            names.push(factory_component.as_str());
        }
        for arg in self.construction.args() {
            arg.collect_references(&mut names);
        }
        for binding in &self.properties {
            binding.value.collect_references(&mut names);
        }
        names
    }

    /// 声明类型或暴露的接口是否与给定类型匹配
    pub fn matches_type(&self, type_info: &TypeInfo) -> bool {
        self.type_info.same_type(type_info)
            || self.interfaces.iter().any(|interface| {
                interface == type_info.short_name() || *interface == type_info.module_path
            })
    }
}
