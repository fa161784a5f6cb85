//! 声明式事务
//!
//! 以环绕通知划定工作单元边界，提交与回滚由 [`TransactionManager`] 完成，
//! 活动工作单元绑定在 [`ExecutionContext`](infrastructure_common::ExecutionContext) 上。

pub mod attribute;
pub mod interceptor;
pub mod manager;
pub mod store;

pub use attribute::*;
pub use interceptor::*;
pub use manager::*;
pub use store::*;
