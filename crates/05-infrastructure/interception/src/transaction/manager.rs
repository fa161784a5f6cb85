//! 工作单元与事务管理器

use super::attribute::TransactionAttribute;
use chrono::{DateTime, Utc};
use infrastructure_common::{ExecutionContext, TransactionResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// 工作单元
#[derive(Debug)]
pub struct UnitOfWork {
    id: Uuid,
    name: String,
    read_only: bool,
    started_at: DateTime<Utc>,
    rollback_only: AtomicBool,
    completed: AtomicBool,
}

impl UnitOfWork {
    /// 开始新的工作单元
    pub fn begin(name: impl Into<String>, read_only: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            read_only,
            started_at: Utc::now(),
            rollback_only: AtomicBool::new(false),
            completed: AtomicBool::new(false),
        }
    }

    /// 标识
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// 名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 是否只读
    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// 开始时间
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// 标记为仅回滚
    pub fn set_rollback_only(&self) {
        self.rollback_only.store(true, Ordering::Release);
    }

    /// 是否已标记为仅回滚
    pub fn is_rollback_only(&self) -> bool {
        self.rollback_only.load(Ordering::Acquire)
    }

    /// 标记为已完成，返回此前是否已完成
    pub fn complete(&self) -> bool {
        self.completed.swap(true, Ordering::AcqRel)
    }

    /// 是否已完成
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }
}

/// 事务管理器
pub trait TransactionManager: Send + Sync {
    /// 开始新的工作单元
    fn begin(&self, name: &str, attribute: &TransactionAttribute)
        -> TransactionResult<Arc<UnitOfWork>>;

    /// 提交
    fn commit(&self, unit: &UnitOfWork) -> TransactionResult<()>;

    /// 回滚
    fn rollback(&self, unit: &UnitOfWork) -> TransactionResult<()>;
}

/// 执行上下文上的事务栈
///
/// `None` 帧表示已挂起外层事务的非事务作用域。
#[derive(Debug, Default)]
pub struct TransactionStack {
    frames: Vec<Option<Arc<UnitOfWork>>>,
}

impl TransactionStack {
    /// 当前活动的工作单元
    pub fn current(&self) -> Option<Arc<UnitOfWork>> {
        self.frames.last().cloned().flatten()
    }

    /// 压入作用域
    pub fn push(&mut self, frame: Option<Arc<UnitOfWork>>) {
        self.frames.push(frame);
    }

    /// 弹出作用域
    pub fn pop(&mut self) -> Option<Arc<UnitOfWork>> {
        self.frames.pop().flatten()
    }

    /// 作用域深度
    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

/// 上下文中当前活动的工作单元
pub fn current_unit(ctx: &ExecutionContext) -> Option<Arc<UnitOfWork>> {
    ctx.with_extension(|stack: &mut TransactionStack| stack.current())
}

/// 在上下文中压入作用域，返回的守卫离开作用域时弹出
pub fn enter_scope(ctx: &ExecutionContext, frame: Option<Arc<UnitOfWork>>) -> TransactionScope<'_> {
    ctx.with_extension(|stack: &mut TransactionStack| stack.push(frame));
    TransactionScope { ctx }
}

/// 事务作用域守卫
#[derive(Debug)]
pub struct TransactionScope<'a> {
    ctx: &'a ExecutionContext,
}

impl Drop for TransactionScope<'_> {
    fn drop(&mut self) {
        self.ctx.with_extension(|stack: &mut TransactionStack| {
            stack.pop();
        });
    }
}
