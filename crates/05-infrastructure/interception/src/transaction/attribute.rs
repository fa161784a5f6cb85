//! 事务属性

use crate::pointcut::{wildcard_match, Pointcut};
use infrastructure_common::{InvocationError, MethodSignature};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// 事务传播行为
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Propagation {
    /// 加入已有事务，不存在时新建
    #[default]
    Required,
    /// 存在事务时加入，否则以非事务方式执行
    Supports,
    /// 挂起已有事务并新建
    RequiresNew,
    /// 必须存在事务
    Mandatory,
    /// 挂起已有事务，以非事务方式执行
    NotSupported,
    /// 不允许存在事务
    Never,
}

impl Propagation {
    /// 名称
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Required => "REQUIRED",
            Self::Supports => "SUPPORTS",
            Self::RequiresNew => "REQUIRES_NEW",
            Self::Mandatory => "MANDATORY",
            Self::NotSupported => "NOT_SUPPORTED",
            Self::Never => "NEVER",
        }
    }
}

impl fmt::Display for Propagation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Propagation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "REQUIRED" => Ok(Self::Required),
            "SUPPORTS" => Ok(Self::Supports),
            "REQUIRES_NEW" => Ok(Self::RequiresNew),
            "MANDATORY" => Ok(Self::Mandatory),
            "NOT_SUPPORTED" => Ok(Self::NotSupported),
            "NEVER" => Ok(Self::Never),
            _ => Err(format!("未知的传播行为: {}", s)),
        }
    }
}

/// 回滚规则
#[derive(Clone, Default)]
pub enum RollbackRule {
    /// 运行时失败回滚，业务异常提交
    #[default]
    RuntimeFailures,
    /// 任何失败都回滚
    AllFailures,
    /// 除指定业务异常代码外的失败回滚
    NoRollbackFor(Vec<String>),
    /// 自定义判断
    Predicate(Arc<dyn Fn(&InvocationError) -> bool + Send + Sync>),
}

impl RollbackRule {
    /// 该错误是否触发回滚
    pub fn should_rollback(&self, error: &InvocationError) -> bool {
        match self {
            Self::RuntimeFailures => error.is_runtime(),
            Self::AllFailures => true,
            Self::NoRollbackFor(codes) => match error {
                InvocationError::Business { code, .. } => !codes.contains(code),
                _ => true,
            },
            Self::Predicate(predicate) => predicate(error),
        }
    }
}

impl fmt::Debug for RollbackRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RuntimeFailures => f.write_str("RuntimeFailures"),
            Self::AllFailures => f.write_str("AllFailures"),
            Self::NoRollbackFor(codes) => f.debug_tuple("NoRollbackFor").field(codes).finish(),
            Self::Predicate(_) => f.write_str("Predicate"),
        }
    }
}

/// 事务属性
#[derive(Debug, Clone, Default)]
pub struct TransactionAttribute {
    /// 事务名称，未设置时使用方法签名
    pub name: Option<String>,
    /// 传播行为
    pub propagation: Propagation,
    /// 是否只读
    pub read_only: bool,
    /// 回滚规则
    pub rollback_rule: RollbackRule,
}

impl TransactionAttribute {
    /// 以指定传播行为创建属性
    pub fn new(propagation: Propagation) -> Self {
        Self {
            propagation,
            ..Self::default()
        }
    }

    /// `REQUIRED` 属性
    pub fn required() -> Self {
        Self::new(Propagation::Required)
    }

    /// 设置名称
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// 设置为只读
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// 设置回滚规则
    pub fn with_rollback_rule(mut self, rule: RollbackRule) -> Self {
        self.rollback_rule = rule;
        self
    }

    /// 错误是否触发回滚
    pub fn should_rollback(&self, error: &InvocationError) -> bool {
        self.rollback_rule.should_rollback(error)
    }

    /// 事务名称
    pub fn name_for(&self, signature: &MethodSignature) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{}.{}", signature.declaring_type, signature.name))
    }
}

/// 事务属性来源
pub trait TransactionAttributeSource: Send + Sync {
    /// 方法的事务属性，`None` 表示非事务方法
    fn attribute(&self, signature: &MethodSignature) -> Option<TransactionAttribute>;
}

/// 按方法名模式匹配的属性来源，先注册的模式优先
#[derive(Debug, Clone, Default)]
pub struct NameMatchAttributeSource {
    mappings: Vec<(String, TransactionAttribute)>,
}

impl NameMatchAttributeSource {
    /// 创建空的属性来源
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加映射，模式可以是方法名（如 `get*`）或限定名（如 `AccountService.transfer`）
    pub fn with_method(mut self, pattern: impl Into<String>, attribute: TransactionAttribute) -> Self {
        self.mappings.push((pattern.into(), attribute));
        self
    }

    /// 映射数量
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

impl TransactionAttributeSource for NameMatchAttributeSource {
    fn attribute(&self, signature: &MethodSignature) -> Option<TransactionAttribute> {
        let qualified = format!("{}.{}", signature.declaring_type, signature.name);
        self.mappings
            .iter()
            .find(|(pattern, _)| {
                wildcard_match(pattern, &signature.name) || wildcard_match(pattern, &qualified)
            })
            .map(|(_, attribute)| attribute.clone())
    }
}

/// 匹配带事务属性的方法的切点
#[derive(Clone)]
pub struct TransactionAttributePointcut {
    source: Arc<dyn TransactionAttributeSource>,
}

impl TransactionAttributePointcut {
    /// 创建切点
    pub fn new(source: Arc<dyn TransactionAttributeSource>) -> Self {
        Self { source }
    }
}

impl Pointcut for TransactionAttributePointcut {
    fn matches(&self, signature: &MethodSignature) -> bool {
        self.source.attribute(signature).is_some()
    }
}
