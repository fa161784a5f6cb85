//! 逻辑执行上下文
//!
//! 被拦截的代码通过显式传递的上下文访问"当前代理"与绑定资源（如事务），
//! 而不是依赖线程局部的隐式状态。

use crate::component::ComponentRef;
use parking_lot::Mutex;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// 一次逻辑执行的上下文句柄
pub struct ExecutionContext {
    id: Uuid,
    proxies: Mutex<Vec<ComponentRef>>,
    extensions: Mutex<HashMap<TypeId, Box<dyn Any + Send>>>,
}

impl ExecutionContext {
    /// 创建新的执行上下文
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            proxies: Mutex::new(Vec::new()),
            extensions: Mutex::new(HashMap::new()),
        }
    }

    /// 上下文标识
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// 当前正在执行的代理，用于显式地经由代理进行自调用
    pub fn current_proxy(&self) -> Option<ComponentRef> {
        self.proxies.lock().last().cloned()
    }

    /// 进入代理调用，返回的守卫离开作用域时自动退出
    pub fn enter_proxy(&self, proxy: ComponentRef) -> ProxyScope<'_> {
        self.proxies.lock().push(proxy);
        ProxyScope { context: self }
    }

    /// 访问按类型绑定的扩展数据，不存在时以默认值创建
    ///
    /// 闭包执行期间持有内部锁，闭包内不得再次访问扩展数据。
    pub fn with_extension<T, R>(&self, f: impl FnOnce(&mut T) -> R) -> R
    where
        T: Default + Send + 'static,
    {
        let mut extensions = self.extensions.lock();
        let entry = extensions
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(T::default()));
        match entry.downcast_mut::<T>() {
            Some(extension) => f(extension),
            // 键由 TypeId 派生，类型必然一致
            None => unreachable!("扩展数据类型与键不一致"),
        }
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("id", &self.id)
            .field("proxy_depth", &self.proxies.lock().len())
            .finish()
    }
}

/// 代理调用作用域守卫
pub struct ProxyScope<'a> {
    context: &'a ExecutionContext,
}

impl Drop for ProxyScope<'_> {
    fn drop(&mut self) {
        self.context.proxies.lock().pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Managed, ResolvedValue, Settable};
    use crate::errors::PropertyError;
    use std::sync::Arc;

    struct Marker;

    impl Settable for Marker {
        fn set_property(&self, name: &str, _value: ResolvedValue) -> Result<(), PropertyError> {
            Err(PropertyError::unknown("Marker", name))
        }
    }

    impl Managed for Marker {}

    #[test]
    fn test_proxy_scope_is_restored() {
        let ctx = ExecutionContext::new();
        assert!(ctx.current_proxy().is_none());
        {
            let _outer = ctx.enter_proxy(Arc::new(Marker));
            assert!(ctx.current_proxy().is_some());
            {
                let _inner = ctx.enter_proxy(Arc::new(Marker));
            }
            assert!(ctx.current_proxy().is_some());
        }
        assert!(ctx.current_proxy().is_none());
    }

    #[test]
    fn test_extensions_are_keyed_by_type() {
        let ctx = ExecutionContext::new();
        ctx.with_extension::<Vec<u32>, _>(|stack| stack.push(7));
        let len = ctx.with_extension::<Vec<u32>, _>(|stack| stack.len());
        let other = ctx.with_extension::<Vec<String>, _>(|stack| stack.len());
        assert_eq!(len, 1);
        assert_eq!(other, 0);
    }
}
