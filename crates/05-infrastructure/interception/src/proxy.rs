//! 组件代理
//!
//! 代理是接口分派的包装对象，不生成运行时代码：对命中切点的方法执行固定的通知链，
//! 其余方法直接转发给目标。

use crate::advice::{Advice, Invocation, MethodChain};
use crate::pointcut::Pointcut;
use infrastructure_common::{
    ComponentRef, ConstructorArgs, ExecutionContext, InvocationError, Managed, MethodSignature,
    PropertyError, ResolvedValue, Settable,
};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// 代理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProxyKind {
    /// 接口委托：代理只暴露声明的接口
    #[default]
    Interface,
    /// 目标类型拦截：代理同时以目标的具体类型对外呈现
    TargetType,
}

/// 切点与通知的组合
#[derive(Clone)]
pub struct Advisor {
    name: String,
    pointcut: Arc<dyn Pointcut>,
    advice: Advice,
    priority: i32,
}

impl Advisor {
    /// 创建通知器，优先级数值越小在链中越靠前（越外层）
    pub fn new(
        name: impl Into<String>,
        pointcut: impl Pointcut + 'static,
        advice: Advice,
        priority: i32,
    ) -> Self {
        Self {
            name: name.into(),
            pointcut: Arc::new(pointcut),
            advice,
            priority,
        }
    }

    /// 使用共享切点创建通知器
    pub fn with_shared_pointcut(
        name: impl Into<String>,
        pointcut: Arc<dyn Pointcut>,
        advice: Advice,
        priority: i32,
    ) -> Self {
        Self {
            name: name.into(),
            pointcut,
            advice,
            priority,
        }
    }

    /// 名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 切点
    pub fn pointcut(&self) -> &dyn Pointcut {
        self.pointcut.as_ref()
    }

    /// 通知
    pub const fn advice(&self) -> &Advice {
        &self.advice
    }

    /// 优先级
    pub const fn priority(&self) -> i32 {
        self.priority
    }

    /// 是否匹配给定类型的某个方法
    pub fn matches(&self, type_name: &str, signature: &MethodSignature) -> bool {
        self.pointcut.matches_type(type_name) && self.pointcut.matches(signature)
    }
}

impl fmt::Debug for Advisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Advisor")
            .field("name", &self.name)
            .field("advice", &self.advice)
            .field("priority", &self.priority)
            .finish()
    }
}

/// 将通知器按优先级稳定排序（同优先级保持注册顺序）
pub fn sort_advisors(advisors: &mut [Advisor]) {
    advisors.sort_by_key(Advisor::priority);
}

/// 代理工厂
///
/// ```ignore
/// let proxy = ProxyFactory::new(target)
///     .with_advisor(Advisor::new("log", PatternPointcut::new("*"), Advice::Around(Arc::new(TracingAdvice)), 0))
///     .with_interface("AccountOperations")
///     .build();
/// ```
pub struct ProxyFactory {
    target: ComponentRef,
    advisors: Vec<Advisor>,
    interfaces: Option<Vec<String>>,
    kind: ProxyKind,
}

impl ProxyFactory {
    /// 为目标创建代理工厂
    pub fn new(target: ComponentRef) -> Self {
        Self {
            target,
            advisors: Vec::new(),
            interfaces: None,
            kind: ProxyKind::Interface,
        }
    }

    /// 添加通知器
    pub fn with_advisor(mut self, advisor: Advisor) -> Self {
        self.advisors.push(advisor);
        self
    }

    /// 批量添加通知器
    pub fn with_advisors(mut self, advisors: impl IntoIterator<Item = Advisor>) -> Self {
        self.advisors.extend(advisors);
        self
    }

    /// 添加暴露的接口，未指定时沿用目标的接口
    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interfaces
            .get_or_insert_with(Vec::new)
            .push(interface.into());
        self
    }

    /// 设置代理策略
    pub fn with_kind(mut self, kind: ProxyKind) -> Self {
        self.kind = kind;
        self
    }

    /// 构造代理
    pub fn build(self) -> Arc<ComponentProxy> {
        let interfaces = self
            .interfaces
            .unwrap_or_else(|| self.target.interfaces());
        create_proxy(self.target, self.advisors, interfaces, self.kind)
    }
}

impl fmt::Debug for ProxyFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyFactory")
            .field("target", &self.target.type_name())
            .field("advisors", &self.advisors)
            .field("kind", &self.kind)
            .finish()
    }
}

/// 创建代理：对目标的每个方法求值一次切点，得到固定的方法链
///
/// 调用按方法名分派，参数为无类型的 JSON，因此重载以参数个数区分：
/// 参数个数相同的重载共用一条链（命中其中任一重载的通知器都在链中），
/// 参数个数与所有重载都不符的调用使用该方法名全部命中通知器的合集。
pub fn create_proxy(
    target: ComponentRef,
    mut advisors: Vec<Advisor>,
    exposed_interfaces: Vec<String>,
    kind: ProxyKind,
) -> Arc<ComponentProxy> {
    sort_advisors(&mut advisors);
    let type_name = target.type_name();
    let methods = target.methods();

    let mut names: Vec<&str> = Vec::new();
    for signature in &methods {
        if !names.contains(&signature.name.as_str()) {
            names.push(&signature.name);
        }
    }

    let mut chains: HashMap<String, OverloadSet> = HashMap::new();
    for name in names {
        let overloads: Vec<&MethodSignature> =
            methods.iter().filter(|signature| signature.name == name).collect();
        let Some(fallback) = advised_method(type_name, &overloads, &advisors) else {
            continue;
        };

        let mut by_arity = HashMap::new();
        for signature in &overloads {
            let arity = signature.parameter_types.len();
            if by_arity.contains_key(&arity) {
                continue;
            }
            let group: Vec<&MethodSignature> = overloads
                .iter()
                .copied()
                .filter(|candidate| candidate.parameter_types.len() == arity)
                .collect();
            by_arity.insert(arity, advised_method(type_name, &group, &advisors));
        }
        chains.insert(name.to_string(), OverloadSet { by_arity, fallback });
    }

    debug!(
        "创建代理: 目标 {}, 策略 {:?}, 拦截方法 {} 个",
        type_name,
        kind,
        chains.len()
    );

    Arc::new_cyclic(|weak| ComponentProxy {
        target,
        chains,
        interfaces: exposed_interfaces,
        kind,
        this: weak.clone(),
    })
}

/// 一组重载命中的通知链，按通知器顺序，每个通知器至多一次
fn advised_method(
    type_name: &str,
    overloads: &[&MethodSignature],
    advisors: &[Advisor],
) -> Option<AdvisedMethod> {
    let mut chain = MethodChain::default();
    let mut first_match: Option<&MethodSignature> = None;
    for advisor in advisors {
        let Some(signature) = overloads
            .iter()
            .copied()
            .find(|signature| advisor.matches(type_name, signature))
        else {
            continue;
        };
        trace!("方法 {} 命中通知器 {}", signature, advisor.name());
        chain.push(advisor.advice());
        first_match.get_or_insert(signature);
    }
    first_match.map(|signature| AdvisedMethod {
        signature: signature.clone(),
        chain: Arc::new(chain),
    })
}

/// 被拦截的方法
struct AdvisedMethod {
    signature: MethodSignature,
    chain: Arc<MethodChain>,
}

/// 同名方法的重载
struct OverloadSet {
    /// 未命中任何通知器的参数个数对应 `None`
    by_arity: HashMap<usize, Option<AdvisedMethod>>,
    fallback: AdvisedMethod,
}

impl OverloadSet {
    fn select(&self, arity: usize) -> Option<&AdvisedMethod> {
        match self.by_arity.get(&arity) {
            Some(advised) => advised.as_ref(),
            None => Some(&self.fallback),
        }
    }
}

/// 判断对象的方法是否命中任一通知器
pub fn has_matching_method(target: &ComponentRef, advisors: &[Advisor]) -> bool {
    let type_name = target.type_name();
    target.methods().iter().any(|signature| {
        advisors
            .iter()
            .any(|advisor| advisor.matches(type_name, signature))
    })
}

/// 组件代理
pub struct ComponentProxy {
    target: ComponentRef,
    chains: HashMap<String, OverloadSet>,
    interfaces: Vec<String>,
    kind: ProxyKind,
    this: Weak<ComponentProxy>,
}

impl ComponentProxy {
    /// 被代理的目标
    pub fn target(&self) -> &ComponentRef {
        &self.target
    }

    /// 代理策略
    pub const fn kind(&self) -> ProxyKind {
        self.kind
    }

    /// 方法是否被拦截（任一重载命中即算）
    pub fn is_advised(&self, method: &str) -> bool {
        self.chains.contains_key(method)
    }

    /// 以给定参数个数调用时是否被拦截
    pub fn is_advised_with(&self, method: &str, arity: usize) -> bool {
        self.chains
            .get(method)
            .is_some_and(|overloads| overloads.select(arity).is_some())
    }

    /// 被拦截方法的通知数量（全部重载的合集）
    pub fn advice_count(&self, method: &str) -> usize {
        self.chains
            .get(method)
            .map_or(0, |overloads| overloads.fallback.chain.len())
    }

    fn as_component(&self) -> Option<ComponentRef> {
        self.this.upgrade().map(|proxy| proxy as ComponentRef)
    }
}

impl fmt::Debug for ComponentProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentProxy")
            .field("target", &self.target.type_name())
            .field("kind", &self.kind)
            .field("advised", &self.chains.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Settable for ComponentProxy {
    fn set_property(&self, name: &str, value: ResolvedValue) -> Result<(), PropertyError> {
        self.target.set_property(name, value)
    }
}

impl Managed for ComponentProxy {
    fn type_name(&self) -> &'static str {
        match self.kind {
            ProxyKind::TargetType => self.target.type_name(),
            ProxyKind::Interface => std::any::type_name::<Self>(),
        }
    }

    fn methods(&self) -> Vec<MethodSignature> {
        self.target.methods()
    }

    fn interfaces(&self) -> Vec<String> {
        self.interfaces.clone()
    }

    fn invoke(
        &self,
        ctx: &ExecutionContext,
        method: &str,
        args: &[Value],
    ) -> Result<Value, InvocationError> {
        let _scope = self.as_component().map(|proxy| ctx.enter_proxy(proxy));
        let advised = self
            .chains
            .get(method)
            .and_then(|overloads| overloads.select(args.len()));
        match advised {
            Some(advised) => advised.chain.invoke(&Invocation::new(
                &advised.signature,
                args,
                &self.target,
                ctx,
            )),
            None => self.target.invoke(ctx, method, args),
        }
    }

    fn create_product(
        &self,
        method: &str,
        args: &ConstructorArgs,
    ) -> Result<ComponentRef, InvocationError> {
        self.target.create_product(method, args)
    }

    fn proxied_target(&self) -> Option<ComponentRef> {
        Some(Arc::clone(&self.target))
    }

    fn presents_target_type(&self) -> bool {
        self.kind == ProxyKind::TargetType
    }
}
