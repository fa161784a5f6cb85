//! 示例银行组件

use component_macros::Settable;
use di_abstractions::ComponentDefinition;
use infrastructure_common::{
    ComponentCell, ComponentRef, ExecutionContext, InvocationError, Managed, MethodSignature,
    PropertyCell,
};
use interception::{NameMatchAttributeSource, Propagation, TransactionAttribute, TransactionalStore};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

/// 账户数据访问组件名称
pub const ACCOUNT_DAO: &str = "accountDao";

/// 账户服务组件名称
pub const ACCOUNT_SERVICE: &str = "accountService";

fn account_arg(args: &[Value], index: usize, method: &str) -> Result<String, InvocationError> {
    args.get(index)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| InvocationError::invalid_arguments(method, format!("缺少账户参数 {}", index)))
}

fn amount_arg(args: &[Value], index: usize, method: &str) -> Result<i64, InvocationError> {
    args.get(index)
        .and_then(Value::as_i64)
        .ok_or_else(|| InvocationError::invalid_arguments(method, format!("缺少金额参数 {}", index)))
}

/// 基于事务性存储的账户数据访问组件
#[derive(Default, Settable)]
pub struct AccountDao {
    #[property]
    store: ComponentCell,
}

impl AccountDao {
    fn store(&self, method: &str) -> Result<Arc<TransactionalStore>, InvocationError> {
        self.store
            .get_typed::<TransactionalStore>()
            .ok_or_else(|| InvocationError::runtime(method, "store 未注入"))
    }
}

impl Managed for AccountDao {
    fn methods(&self) -> Vec<MethodSignature> {
        vec![
            MethodSignature::new("AccountDao", "balance").with_param("String"),
            MethodSignature::new("AccountDao", "update")
                .with_param("String")
                .with_param("i64"),
        ]
    }

    fn interfaces(&self) -> Vec<String> {
        vec!["AccountRepository".to_string()]
    }

    fn invoke(
        &self,
        ctx: &ExecutionContext,
        method: &str,
        args: &[Value],
    ) -> Result<Value, InvocationError> {
        match method {
            "balance" => {
                let account = account_arg(args, 0, method)?;
                Ok(self.store(method)?.get(ctx, &account).unwrap_or(Value::Null))
            }
            "update" => {
                let account = account_arg(args, 0, method)?;
                let delta = amount_arg(args, 1, method)?;
                let store = self.store(method)?;
                let current = store
                    .get(ctx, &account)
                    .and_then(|value| value.as_i64())
                    .ok_or_else(|| {
                        InvocationError::runtime(method, format!("账户不存在: {}", account))
                    })?;
                store.put(ctx, &account, json!(current + delta))?;
                Ok(json!(current + delta))
            }
            "close" => {
                info!("账户数据访问组件已关闭");
                Ok(Value::Null)
            }
            other => Err(InvocationError::no_such_method("AccountDao", other)),
        }
    }
}

/// 转账服务
#[derive(Default, Settable)]
#[property(rename_all = "camelCase")]
pub struct AccountService {
    #[property]
    account_dao: ComponentCell,
    #[property]
    transfer_limit: PropertyCell<i64>,
}

impl AccountService {
    fn dao(&self, method: &str) -> Result<ComponentRef, InvocationError> {
        self.account_dao
            .get()
            .ok_or_else(|| InvocationError::runtime(method, "accountDao 未注入"))
    }
}

impl Managed for AccountService {
    fn methods(&self) -> Vec<MethodSignature> {
        vec![
            MethodSignature::new("AccountService", "transfer")
                .with_param("String")
                .with_param("String")
                .with_param("i64"),
            MethodSignature::new("AccountService", "balance").with_param("String"),
        ]
    }

    fn invoke(
        &self,
        ctx: &ExecutionContext,
        method: &str,
        args: &[Value],
    ) -> Result<Value, InvocationError> {
        match method {
            "transfer" => {
                let from = account_arg(args, 0, method)?;
                let to = account_arg(args, 1, method)?;
                let amount = amount_arg(args, 2, method)?;
                if amount <= 0 {
                    return Err(InvocationError::business(
                        "INVALID_AMOUNT",
                        format!("转账金额必须为正数: {}", amount),
                    ));
                }
                if self.transfer_limit.get().is_some_and(|limit| amount > limit) {
                    return Err(InvocationError::business(
                        "LIMIT_EXCEEDED",
                        format!("转账金额超过限额: {}", amount),
                    ));
                }
                let dao = self.dao(method)?;
                dao.invoke(ctx, "update", &[json!(from), json!(-amount)])?;
                dao.invoke(ctx, "update", &[json!(to), json!(amount)])?;
                Ok(Value::Null)
            }
            "balance" => self.dao(method)?.invoke(ctx, "balance", args),
            other => Err(InvocationError::no_such_method("AccountService", other)),
        }
    }
}

/// 写操作 REQUIRED，查询 SUPPORTS 只读
pub fn transaction_attributes() -> Arc<NameMatchAttributeSource> {
    Arc::new(
        NameMatchAttributeSource::new()
            .with_method("AccountService.transfer", TransactionAttribute::required())
            .with_method("AccountDao.update", TransactionAttribute::required())
            .with_method(
                "*.balance",
                TransactionAttribute::new(Propagation::Supports).read_only(),
            ),
    )
}

/// 银行组件定义
pub fn definitions(store_name: &str, transfer_limit: i64) -> Vec<ComponentDefinition> {
    vec![
        ComponentDefinition::from_supplier::<AccountDao, _>(ACCOUNT_DAO, || {
            Ok(AccountDao::default())
        })
        .with_property_ref("store", store_name)
        .with_destroy_method("close")
        .with_description("账户数据访问"),
        ComponentDefinition::from_supplier::<AccountService, _>(ACCOUNT_SERVICE, || {
            Ok(AccountService::default())
        })
        .with_property_ref("accountDao", ACCOUNT_DAO)
        .with_property_value("transferLimit", transfer_limit)
        .with_description("转账服务"),
    ]
}
