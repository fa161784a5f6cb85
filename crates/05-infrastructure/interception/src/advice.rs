//! 通知与方法链
//!
//! 每个被拦截的方法在代理构造时得到一条固定的 [`MethodChain`]：
//! 环绕通知在最外层；其内依次执行前置通知、目标调用、异常通知，
//! 最后无论成功与否按逆序执行后置通知。

use infrastructure_common::{ComponentRef, ExecutionContext, InvocationError, MethodSignature};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// 被拦截的一次方法调用
pub struct Invocation<'a> {
    signature: &'a MethodSignature,
    args: &'a [Value],
    target: &'a ComponentRef,
    context: &'a ExecutionContext,
}

impl<'a> Invocation<'a> {
    /// 创建调用描述
    pub const fn new(
        signature: &'a MethodSignature,
        args: &'a [Value],
        target: &'a ComponentRef,
        context: &'a ExecutionContext,
    ) -> Self {
        Self {
            signature,
            args,
            target,
            context,
        }
    }

    /// 方法签名
    pub const fn signature(&self) -> &'a MethodSignature {
        self.signature
    }

    /// 方法名
    pub fn method(&self) -> &'a str {
        &self.signature.name
    }

    /// 调用参数
    pub const fn args(&self) -> &'a [Value] {
        self.args
    }

    /// 调用目标（被代理对象或下一层代理）
    pub const fn target(&self) -> &'a ComponentRef {
        self.target
    }

    /// 执行上下文
    pub const fn context(&self) -> &'a ExecutionContext {
        self.context
    }

    fn with_args<'b>(&'b self, args: &'b [Value]) -> Invocation<'b> {
        Invocation {
            signature: self.signature,
            args,
            target: self.target,
            context: self.context,
        }
    }
}

impl fmt::Debug for Invocation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("signature", &self.signature.qualified())
            .field("args", &self.args)
            .finish()
    }
}

/// 前置通知，返回错误时跳过目标调用
pub trait BeforeAdvice: Send + Sync {
    /// 目标调用前执行
    fn before(&self, invocation: &Invocation<'_>) -> Result<(), InvocationError>;
}

/// 后置通知，无论调用成功与否都会执行
pub trait AfterAdvice: Send + Sync {
    /// 目标调用后执行
    fn after(&self, invocation: &Invocation<'_>, outcome: &Result<Value, InvocationError>);
}

/// 环绕通知
pub trait AroundAdvice: Send + Sync {
    /// 包裹整个调用，可以继续执行、短路或替换结果
    fn around(
        &self,
        invocation: &Invocation<'_>,
        proceed: Proceed<'_>,
    ) -> Result<Value, InvocationError>;
}

/// 异常通知
///
/// 返回 `Ok` 表示吞掉异常并以该值作为结果；返回原错误为重新抛出，返回其他错误为转换。
pub trait ExceptionAdvice: Send + Sync {
    /// 调用失败时执行
    fn on_exception(
        &self,
        invocation: &Invocation<'_>,
        error: InvocationError,
    ) -> Result<Value, InvocationError>;
}

impl<F> BeforeAdvice for F
where
    F: Fn(&Invocation<'_>) -> Result<(), InvocationError> + Send + Sync,
{
    fn before(&self, invocation: &Invocation<'_>) -> Result<(), InvocationError> {
        self(invocation)
    }
}

impl<F> AfterAdvice for F
where
    F: Fn(&Invocation<'_>, &Result<Value, InvocationError>) + Send + Sync,
{
    fn after(&self, invocation: &Invocation<'_>, outcome: &Result<Value, InvocationError>) {
        self(invocation, outcome);
    }
}

impl<F> AroundAdvice for F
where
    F: Fn(&Invocation<'_>, Proceed<'_>) -> Result<Value, InvocationError> + Send + Sync,
{
    fn around(
        &self,
        invocation: &Invocation<'_>,
        proceed: Proceed<'_>,
    ) -> Result<Value, InvocationError> {
        self(invocation, proceed)
    }
}

impl<F> ExceptionAdvice for F
where
    F: Fn(&Invocation<'_>, InvocationError) -> Result<Value, InvocationError> + Send + Sync,
{
    fn on_exception(
        &self,
        invocation: &Invocation<'_>,
        error: InvocationError,
    ) -> Result<Value, InvocationError> {
        self(invocation, error)
    }
}

/// 通知
#[derive(Clone)]
pub enum Advice {
    /// 前置通知
    Before(Arc<dyn BeforeAdvice>),
    /// 后置通知
    After(Arc<dyn AfterAdvice>),
    /// 环绕通知
    Around(Arc<dyn AroundAdvice>),
    /// 异常通知
    OnException(Arc<dyn ExceptionAdvice>),
}

impl Advice {
    /// 创建前置通知
    pub fn before<F>(f: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> Result<(), InvocationError> + Send + Sync + 'static,
    {
        Self::Before(Arc::new(f))
    }

    /// 创建后置通知
    pub fn after<F>(f: F) -> Self
    where
        F: Fn(&Invocation<'_>, &Result<Value, InvocationError>) + Send + Sync + 'static,
    {
        Self::After(Arc::new(f))
    }

    /// 创建环绕通知
    pub fn around<F>(f: F) -> Self
    where
        F: Fn(&Invocation<'_>, Proceed<'_>) -> Result<Value, InvocationError>
            + Send
            + Sync
            + 'static,
    {
        Self::Around(Arc::new(f))
    }

    /// 创建异常通知
    pub fn on_exception<F>(f: F) -> Self
    where
        F: Fn(&Invocation<'_>, InvocationError) -> Result<Value, InvocationError>
            + Send
            + Sync
            + 'static,
    {
        Self::OnException(Arc::new(f))
    }

    /// 通知类别名称
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Before(_) => "before",
            Self::After(_) => "after",
            Self::Around(_) => "around",
            Self::OnException(_) => "on_exception",
        }
    }
}

impl fmt::Debug for Advice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Advice").field(&self.kind()).finish()
    }
}

/// 单个方法的固定通知链
#[derive(Default, Clone)]
pub struct MethodChain {
    arounds: Vec<Arc<dyn AroundAdvice>>,
    befores: Vec<Arc<dyn BeforeAdvice>>,
    afters: Vec<Arc<dyn AfterAdvice>>,
    on_exceptions: Vec<Arc<dyn ExceptionAdvice>>,
}

impl MethodChain {
    /// 按链顺序追加通知
    pub fn push(&mut self, advice: &Advice) {
        match advice {
            Advice::Before(before) => self.befores.push(Arc::clone(before)),
            Advice::After(after) => self.afters.push(Arc::clone(after)),
            Advice::Around(around) => self.arounds.push(Arc::clone(around)),
            Advice::OnException(handler) => self.on_exceptions.push(Arc::clone(handler)),
        }
    }

    /// 通知总数
    pub fn len(&self) -> usize {
        self.arounds.len() + self.befores.len() + self.afters.len() + self.on_exceptions.len()
    }

    /// 是否没有任何通知
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 执行调用
    pub fn invoke(&self, invocation: &Invocation<'_>) -> Result<Value, InvocationError> {
        self.run(invocation, 0)
    }

    fn run(&self, invocation: &Invocation<'_>, index: usize) -> Result<Value, InvocationError> {
        match self.arounds.get(index) {
            Some(around) => around.around(
                invocation,
                Proceed {
                    chain: self,
                    invocation,
                    index: index + 1,
                },
            ),
            None => self.run_core(invocation),
        }
    }

    fn run_core(&self, invocation: &Invocation<'_>) -> Result<Value, InvocationError> {
        let mut outcome = self
            .befores
            .iter()
            .try_for_each(|before| before.before(invocation))
            .and_then(|()| {
                invocation.target().invoke(
                    invocation.context(),
                    invocation.method(),
                    invocation.args(),
                )
            });

        for handler in &self.on_exceptions {
            match outcome {
                Err(error) => outcome = handler.on_exception(invocation, error),
                Ok(_) => break,
            }
        }

        for after in self.afters.iter().rev() {
            after.after(invocation, &outcome);
        }
        outcome
    }
}

impl fmt::Debug for MethodChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodChain")
            .field("arounds", &self.arounds.len())
            .field("befores", &self.befores.len())
            .field("afters", &self.afters.len())
            .field("on_exceptions", &self.on_exceptions.len())
            .finish()
    }
}

/// 环绕通知中继续执行链的句柄
pub struct Proceed<'a> {
    chain: &'a MethodChain,
    invocation: &'a Invocation<'a>,
    index: usize,
}

impl Proceed<'_> {
    /// 以原参数继续执行，可多次调用
    pub fn proceed(&self) -> Result<Value, InvocationError> {
        self.chain.run(self.invocation, self.index)
    }

    /// 以替换后的参数继续执行
    pub fn proceed_with(&self, args: &[Value]) -> Result<Value, InvocationError> {
        self.chain.run(&self.invocation.with_args(args), self.index)
    }
}

impl fmt::Debug for Proceed<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proceed").field("index", &self.index).finish()
    }
}

/// 基于 `tracing` 的调用日志通知
#[derive(Debug, Clone, Default)]
pub struct TracingAdvice;

impl AroundAdvice for TracingAdvice {
    fn around(
        &self,
        invocation: &Invocation<'_>,
        proceed: Proceed<'_>,
    ) -> Result<Value, InvocationError> {
        let signature = invocation.signature().qualified();
        debug!("进入方法: {} 参数: {:?}", signature, invocation.args());
        let started = Instant::now();
        let outcome = proceed.proceed();
        let elapsed = started.elapsed();
        match &outcome {
            Ok(_) => debug!("方法返回: {} 耗时: {:?}", signature, elapsed),
            Err(e) => warn!("方法失败: {} 耗时: {:?}, 错误: {}", signature, elapsed, e),
        }
        outcome
    }
}
