//! 元数据定义
//!
//! 提供组件类型与方法签名的元数据信息

use std::any::TypeId;
use std::fmt;

/// 类型信息
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeInfo {
    /// 类型名称（不含模块路径）
    pub name: String,
    /// 类型ID，按名称描述的类型（如接口名）没有类型ID
    pub id: Option<TypeId>,
    /// 完整类型路径
    pub module_path: String,
}

impl TypeInfo {
    /// 从类型获取类型信息
    pub fn of<T: ?Sized + 'static>() -> Self {
        let full_name = std::any::type_name::<T>();
        Self {
            name: full_name
                .rsplit("::")
                .next()
                .unwrap_or("Unknown")
                .to_string(),
            id: Some(TypeId::of::<T>()),
            module_path: full_name.to_string(),
        }
    }

    /// 从类型名称创建类型信息（用于接口名或外部描述）
    pub fn from_name(name: &str) -> Self {
        Self {
            name: name.rsplit("::").next().unwrap_or(name).to_string(),
            id: None,
            module_path: name.to_string(),
        }
    }

    /// 获取简短的类型名称（不包含模块路径）
    pub fn short_name(&self) -> &str {
        &self.name
    }

    /// 判断是否描述同一类型：有类型ID时比较ID，否则比较名称
    pub fn same_type(&self, other: &Self) -> bool {
        match (self.id, other.id) {
            (Some(left), Some(right)) => left == right,
            _ => self.name == other.name || self.module_path == other.module_path,
        }
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.module_path)
    }
}

/// 方法签名：声明类型 + 方法名 + 参数类型
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    /// 声明该方法的类型名称
    pub declaring_type: String,
    /// 方法名
    pub name: String,
    /// 参数类型名称列表
    pub parameter_types: Vec<String>,
}

impl MethodSignature {
    /// 创建无参数的方法签名
    pub fn new(declaring_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            name: name.into(),
            parameter_types: Vec::new(),
        }
    }

    /// 添加参数类型
    pub fn with_param(mut self, parameter_type: impl Into<String>) -> Self {
        self.parameter_types.push(parameter_type.into());
        self
    }

    /// 完全限定签名，如 `AccountService.transfer(String,String,i64)`
    pub fn qualified(&self) -> String {
        format!(
            "{}.{}({})",
            self.declaring_type,
            self.name,
            self.parameter_types.join(",")
        )
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified())
    }
}
