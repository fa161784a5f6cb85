//! 事务性内存键值存储
//!
//! 写入按工作单元缓冲，提交时应用到已提交数据，回滚时丢弃。
//! 没有活动工作单元时写入立即生效。

use super::attribute::TransactionAttribute;
use super::manager::{current_unit, TransactionManager, UnitOfWork};
use infrastructure_common::{
    ExecutionContext, Managed, PropertyError, ResolvedValue, Settable, TransactionError,
    TransactionResult,
};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// 事务性键值存储
#[derive(Debug, Default)]
pub struct TransactionalStore {
    committed: RwLock<HashMap<String, Value>>,
    pending: Mutex<HashMap<Uuid, HashMap<String, Value>>>,
    commits: AtomicU64,
    rollbacks: AtomicU64,
}

impl TransactionalStore {
    /// 创建空存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 以初始数据创建存储
    pub fn with_data(data: impl IntoIterator<Item = (String, Value)>) -> Self {
        let store = Self::default();
        store.committed.write().extend(data);
        store
    }

    /// 读取：当前工作单元的未提交写入优先
    pub fn get(&self, ctx: &ExecutionContext, key: &str) -> Option<Value> {
        if let Some(unit) = current_unit(ctx) {
            if let Some(value) = self
                .pending
                .lock()
                .get(&unit.id())
                .and_then(|writes| writes.get(key))
            {
                return Some(value.clone());
            }
        }
        self.committed_value(key)
    }

    /// 写入：有活动工作单元时缓冲，否则立即生效
    pub fn put(&self, ctx: &ExecutionContext, key: &str, value: Value) -> TransactionResult<()> {
        match current_unit(ctx) {
            Some(unit) => {
                if unit.is_read_only() {
                    return Err(TransactionError::ReadOnlyViolation {
                        key: key.to_string(),
                    });
                }
                if unit.is_completed() {
                    return Err(TransactionError::AlreadyCompleted {
                        id: unit.id().to_string(),
                    });
                }
                self.pending
                    .lock()
                    .entry(unit.id())
                    .or_default()
                    .insert(key.to_string(), value);
            }
            None => {
                self.committed.write().insert(key.to_string(), value);
            }
        }
        Ok(())
    }

    /// 已提交的值
    pub fn committed_value(&self, key: &str) -> Option<Value> {
        self.committed.read().get(key).cloned()
    }

    /// 提交次数
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    /// 回滚次数
    pub fn rollback_count(&self) -> u64 {
        self.rollbacks.load(Ordering::Relaxed)
    }

    /// 尚未完成的工作单元数量
    pub fn pending_units(&self) -> usize {
        self.pending.lock().len()
    }

    fn finish(&self, unit: &UnitOfWork) -> TransactionResult<Option<HashMap<String, Value>>> {
        if unit.complete() {
            return Err(TransactionError::AlreadyCompleted {
                id: unit.id().to_string(),
            });
        }
        Ok(self.pending.lock().remove(&unit.id()))
    }
}

impl TransactionManager for TransactionalStore {
    fn begin(
        &self,
        name: &str,
        attribute: &TransactionAttribute,
    ) -> TransactionResult<Arc<UnitOfWork>> {
        let unit = UnitOfWork::begin(name, attribute.read_only);
        debug!(
            "开始工作单元: {} ({}), 传播 {}, 只读 {}",
            unit.name(),
            unit.id(),
            attribute.propagation,
            unit.is_read_only()
        );
        Ok(Arc::new(unit))
    }

    fn commit(&self, unit: &UnitOfWork) -> TransactionResult<()> {
        let writes = self.finish(unit)?.unwrap_or_default();
        let count = writes.len();
        self.committed.write().extend(writes);
        self.commits.fetch_add(1, Ordering::Relaxed);
        debug!("提交工作单元: {} ({}), 写入 {} 项", unit.name(), unit.id(), count);
        Ok(())
    }

    fn rollback(&self, unit: &UnitOfWork) -> TransactionResult<()> {
        let discarded = self.finish(unit)?.map_or(0, |writes| writes.len());
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
        info!(
            "回滚工作单元: {} ({}), 丢弃 {} 项写入",
            unit.name(),
            unit.id(),
            discarded
        );
        Ok(())
    }
}

impl Settable for TransactionalStore {
    fn set_property(&self, name: &str, _value: ResolvedValue) -> Result<(), PropertyError> {
        Err(PropertyError::unknown("TransactionalStore", name))
    }
}

impl Managed for TransactionalStore {}
