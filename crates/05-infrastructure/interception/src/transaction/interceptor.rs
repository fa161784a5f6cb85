//! 声明式事务环绕通知

use super::attribute::{Propagation, TransactionAttribute, TransactionAttributeSource};
use super::manager::{current_unit, enter_scope, TransactionManager, UnitOfWork};
use crate::advice::{AroundAdvice, Invocation, Proceed};
use infrastructure_common::{InvocationError, TransactionError};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// 事务拦截器
///
/// 开启工作单元的调用负责提交或回滚；加入已有工作单元的嵌套调用只在失败时标记仅回滚。
#[derive(Clone)]
pub struct TransactionInterceptor {
    manager: Arc<dyn TransactionManager>,
    source: Arc<dyn TransactionAttributeSource>,
}

impl TransactionInterceptor {
    /// 创建事务拦截器
    pub fn new(
        manager: Arc<dyn TransactionManager>,
        source: Arc<dyn TransactionAttributeSource>,
    ) -> Self {
        Self { manager, source }
    }

    /// 属性来源
    pub fn source(&self) -> Arc<dyn TransactionAttributeSource> {
        Arc::clone(&self.source)
    }

    fn participate(
        invocation: &Invocation<'_>,
        attribute: &TransactionAttribute,
        unit: &UnitOfWork,
        proceed: &Proceed<'_>,
    ) -> Result<Value, InvocationError> {
        let outcome = proceed.proceed();
        if let Err(e) = &outcome {
            if attribute.should_rollback(e) {
                debug!(
                    "方法 {} 失败，工作单元 {} 标记为仅回滚",
                    invocation.signature(),
                    unit.name()
                );
                unit.set_rollback_only();
            }
        }
        outcome
    }

    fn run_in_new_unit(
        &self,
        invocation: &Invocation<'_>,
        attribute: &TransactionAttribute,
        proceed: &Proceed<'_>,
    ) -> Result<Value, InvocationError> {
        let name = attribute.name_for(invocation.signature());
        let unit = self.manager.begin(&name, attribute)?;
        let outcome = {
            let _scope = enter_scope(invocation.context(), Some(Arc::clone(&unit)));
            proceed.proceed()
        };

        match outcome {
            Ok(_) if unit.is_rollback_only() => {
                self.manager.rollback(&unit)?;
                warn!("事务 {} 被参与者标记为仅回滚，已回滚", name);
                Err(TransactionError::Rollback { name }.into())
            }
            Ok(value) => {
                self.manager.commit(&unit)?;
                Ok(value)
            }
            Err(e) => {
                let completion = if attribute.should_rollback(&e) || unit.is_rollback_only() {
                    self.manager.rollback(&unit)
                } else {
                    self.manager.commit(&unit)
                };
                if let Err(completion_error) = completion {
                    error!("事务 {} 完成失败: {}", name, completion_error);
                }
                Err(e)
            }
        }
    }
}

impl fmt::Debug for TransactionInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TransactionInterceptor")
    }
}

impl AroundAdvice for TransactionInterceptor {
    fn around(
        &self,
        invocation: &Invocation<'_>,
        proceed: Proceed<'_>,
    ) -> Result<Value, InvocationError> {
        let Some(attribute) = self.source.attribute(invocation.signature()) else {
            return proceed.proceed();
        };
        let ctx = invocation.context();
        let current = current_unit(ctx);

        match (attribute.propagation, current) {
            (Propagation::Required | Propagation::Supports | Propagation::Mandatory, Some(unit)) => {
                Self::participate(invocation, &attribute, &unit, &proceed)
            }
            (Propagation::Required, None) | (Propagation::RequiresNew, _) => {
                self.run_in_new_unit(invocation, &attribute, &proceed)
            }
            (Propagation::Supports | Propagation::NotSupported, None) => proceed.proceed(),
            (Propagation::Mandatory, None) => Err(TransactionError::NoExistingTransaction {
                method: invocation.signature().qualified(),
            }
            .into()),
            (Propagation::NotSupported, Some(unit)) => {
                debug!("挂起工作单元 {} 以非事务方式执行", unit.name());
                let _suspended = enter_scope(ctx, None);
                proceed.proceed()
            }
            (Propagation::Never, Some(_)) => Err(TransactionError::ExistingTransaction {
                method: invocation.signature().qualified(),
            }
            .into()),
            (Propagation::Never, None) => proceed.proceed(),
        }
    }
}
