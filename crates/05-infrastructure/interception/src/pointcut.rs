//! 切点
//!
//! 切点是方法签名上的谓词。代理构造时对目标的每个方法求值一次，
//! 结果固定在代理的方法链中。

use infrastructure_common::MethodSignature;
use std::fmt;
use std::sync::Arc;

/// 切点 trait
pub trait Pointcut: Send + Sync {
    /// 类型级预筛选，返回 `false` 时该类型的所有方法都不匹配
    fn matches_type(&self, type_name: &str) -> bool {
        let _ = type_name;
        true
    }

    /// 方法签名是否匹配
    fn matches(&self, signature: &MethodSignature) -> bool;
}

/// `*` 通配符匹配，`*` 匹配任意长度（含空）的字符序列
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pattern = pattern.as_bytes();
    let text = text.as_bytes();
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == b'*' {
            star = Some((p, t));
            p += 1;
        } else if p < pattern.len() && pattern[p] == text[t] {
            p += 1;
            t += 1;
        } else if let Some((star_p, star_t)) = star {
            p = star_p + 1;
            t = star_t + 1;
            star = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == b'*')
}

/// 按完全限定签名匹配的模式切点，如 `AccountService.transfer*` 或 `*.update(*)`
#[derive(Debug, Clone)]
pub struct PatternPointcut {
    patterns: Vec<String>,
}

impl PatternPointcut {
    /// 创建模式切点
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            patterns: vec![pattern.into()],
        }
    }

    /// 追加模式，任一模式匹配即匹配
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.patterns.push(pattern.into());
        self
    }
}

impl Pointcut for PatternPointcut {
    fn matches(&self, signature: &MethodSignature) -> bool {
        let qualified = signature.qualified();
        self.patterns
            .iter()
            .any(|pattern| wildcard_match(pattern, &qualified))
    }
}

/// 按方法名匹配的切点
#[derive(Debug, Clone)]
pub struct MethodNamePointcut {
    names: Vec<String>,
}

impl MethodNamePointcut {
    /// 创建方法名切点，名称支持 `*` 通配符
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl Pointcut for MethodNamePointcut {
    fn matches(&self, signature: &MethodSignature) -> bool {
        self.names
            .iter()
            .any(|name| wildcard_match(name, &signature.name))
    }
}

/// 按声明类型匹配的切点，匹配该类型的全部方法
#[derive(Debug, Clone)]
pub struct TypePointcut {
    type_pattern: String,
}

impl TypePointcut {
    /// 创建类型切点，类型名支持 `*` 通配符
    pub fn new(type_pattern: impl Into<String>) -> Self {
        Self {
            type_pattern: type_pattern.into(),
        }
    }

    fn matches_name(&self, type_name: &str) -> bool {
        let short = type_name.rsplit("::").next().unwrap_or(type_name);
        wildcard_match(&self.type_pattern, short) || wildcard_match(&self.type_pattern, type_name)
    }
}

impl Pointcut for TypePointcut {
    fn matches_type(&self, type_name: &str) -> bool {
        self.matches_name(type_name)
    }

    fn matches(&self, signature: &MethodSignature) -> bool {
        self.matches_name(&signature.declaring_type)
    }
}

/// 闭包切点
pub struct FnPointcut<F> {
    predicate: F,
}

impl<F> FnPointcut<F>
where
    F: Fn(&MethodSignature) -> bool + Send + Sync,
{
    /// 使用闭包创建切点
    pub const fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<F> Pointcut for FnPointcut<F>
where
    F: Fn(&MethodSignature) -> bool + Send + Sync,
{
    fn matches(&self, signature: &MethodSignature) -> bool {
        (self.predicate)(signature)
    }
}

impl<F> fmt::Debug for FnPointcut<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnPointcut")
    }
}

/// 两个切点同时匹配
pub struct AndPointcut<L, R> {
    left: L,
    right: R,
}

impl<L: Pointcut, R: Pointcut> Pointcut for AndPointcut<L, R> {
    fn matches_type(&self, type_name: &str) -> bool {
        self.left.matches_type(type_name) && self.right.matches_type(type_name)
    }

    fn matches(&self, signature: &MethodSignature) -> bool {
        self.left.matches(signature) && self.right.matches(signature)
    }
}

/// 任一切点匹配
pub struct OrPointcut<L, R> {
    left: L,
    right: R,
}

impl<L: Pointcut, R: Pointcut> Pointcut for OrPointcut<L, R> {
    fn matches_type(&self, type_name: &str) -> bool {
        self.left.matches_type(type_name) || self.right.matches_type(type_name)
    }

    fn matches(&self, signature: &MethodSignature) -> bool {
        self.left.matches(signature) || self.right.matches(signature)
    }
}

/// 切点取反
///
/// 取反不参与类型预筛选：被取反切点排除的类型仍可能有方法匹配。
pub struct NotPointcut<P> {
    inner: P,
}

impl<P: Pointcut> Pointcut for NotPointcut<P> {
    fn matches(&self, signature: &MethodSignature) -> bool {
        !self.inner.matches(signature)
    }
}

impl Pointcut for Arc<dyn Pointcut> {
    fn matches_type(&self, type_name: &str) -> bool {
        (**self).matches_type(type_name)
    }

    fn matches(&self, signature: &MethodSignature) -> bool {
        (**self).matches(signature)
    }
}

/// 切点组合子
pub trait PointcutExt: Pointcut + Sized {
    /// 与另一个切点同时匹配
    fn and<P: Pointcut>(self, other: P) -> AndPointcut<Self, P> {
        AndPointcut {
            left: self,
            right: other,
        }
    }

    /// 与另一个切点任一匹配
    fn or<P: Pointcut>(self, other: P) -> OrPointcut<Self, P> {
        OrPointcut {
            left: self,
            right: other,
        }
    }

    /// 取反
    fn not(self) -> NotPointcut<Self> {
        NotPointcut { inner: self }
    }
}

impl<P: Pointcut> PointcutExt for P {}
