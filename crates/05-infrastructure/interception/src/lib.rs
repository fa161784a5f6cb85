//! # 方法拦截与声明式事务
//!
//! - [`pointcut`] - 方法签名上的切点谓词与组合子
//! - [`advice`] - 前置、后置、环绕与异常通知，以及按方法固定的通知链
//! - [`proxy`] - 组件代理与代理工厂
//! - [`auto_proxy`] - 为命中通知器的组件自动创建代理的扩展钩子
//! - [`transaction`] - 事务传播、工作单元与事务性存储
//!
//! ```ignore
//! let creator = Arc::new(AutoProxyCreator::new(false));
//! creator.add_advisor(Advisor::new(
//!     "tracing",
//!     TypePointcut::new("*Service"),
//!     Advice::Around(Arc::new(TracingAdvice)),
//!     0,
//! ));
//! container.add_hook(creator, i32::MIN);
//! ```

pub mod advice;
pub mod auto_proxy;
pub mod pointcut;
pub mod proxy;
pub mod transaction;

pub use advice::*;
pub use auto_proxy::*;
pub use pointcut::*;
pub use proxy::*;
pub use transaction::*;
