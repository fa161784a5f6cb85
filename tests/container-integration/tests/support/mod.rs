//! 集成测试共用的组件与装配函数
#![allow(dead_code)]

use component_macros::Settable;
use di_abstractions::ComponentDefinition;
use infrastructure_common::{
    ComponentCell, ComponentRef, ExecutionContext, InvocationError, Managed, MethodSignature,
    PropertyCell,
};
use infrastructure_composition::{ApplicationContext, TRANSACTION_STORE_COMPONENT};
use interception::{
    NameMatchAttributeSource, Propagation, TransactionAttribute, TransactionalStore,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::{Arc, Once};

static INIT_LOGGER: Once = Once::new();

/// 初始化测试日志
pub fn init_test_logger() {
    INIT_LOGGER.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
            .try_init();
    });
}

/// 事件记录
pub type Events = Arc<Mutex<Vec<String>>>;

/// 创建空的事件记录
pub fn events() -> Events {
    Arc::new(Mutex::new(Vec::new()))
}

fn record(events: Option<&Events>, event: String) {
    if let Some(events) = events {
        events.lock().push(event);
    }
}

fn string_arg(args: &[Value], index: usize, method: &str) -> Result<String, InvocationError> {
    args.get(index)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| InvocationError::invalid_arguments(method, format!("参数 {} 应为字符串", index)))
}

fn int_arg(args: &[Value], index: usize, method: &str) -> Result<i64, InvocationError> {
    args.get(index)
        .and_then(Value::as_i64)
        .ok_or_else(|| InvocationError::invalid_arguments(method, format!("参数 {} 应为整数", index)))
}

/// 可互相引用的节点组件
#[derive(Default, Settable)]
pub struct Node {
    #[property]
    pub peer: ComponentCell,
    #[property]
    pub label: PropertyCell<String>,
    events: Option<Events>,
}

impl Node {
    /// 带事件记录的节点
    pub fn with_events(events: &Events) -> Self {
        Self {
            events: Some(Arc::clone(events)),
            ..Self::default()
        }
    }

    fn label(&self) -> String {
        self.label.get().unwrap_or_default()
    }
}

impl Managed for Node {
    fn methods(&self) -> Vec<MethodSignature> {
        vec![
            MethodSignature::new("Node", "ping"),
            MethodSignature::new("Node", "peerLabel"),
        ]
    }

    fn invoke(
        &self,
        ctx: &ExecutionContext,
        method: &str,
        _args: &[Value],
    ) -> Result<Value, InvocationError> {
        match method {
            "ping" => {
                record(self.events.as_ref(), format!("ping:{}", self.label()));
                Ok(json!(self.label()))
            }
            "peerLabel" => {
                let peer = self
                    .peer
                    .get()
                    .ok_or_else(|| InvocationError::runtime(method, "peer 未注入"))?;
                peer.invoke(ctx, "ping", &[])
            }
            "close" => {
                record(self.events.as_ref(), format!("close:{}", self.label()));
                Ok(Value::Null)
            }
            other => Err(InvocationError::no_such_method("Node", other)),
        }
    }
}

/// 节点定义
pub fn node(name: &'static str, events: &Events) -> ComponentDefinition {
    let events = Arc::clone(events);
    ComponentDefinition::from_supplier::<Node, _>(name, move || Ok(Node::with_events(&events)))
        .with_property_value("label", name)
}

/// 账户数据访问组件
#[derive(Default, Settable)]
pub struct AccountDao {
    #[property]
    store: ComponentCell,
    events: Option<Events>,
}

impl AccountDao {
    fn store(&self, method: &str) -> Result<Arc<TransactionalStore>, InvocationError> {
        self.store
            .get_typed::<TransactionalStore>()
            .ok_or_else(|| InvocationError::runtime(method, "存储未注入"))
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
                let account = string_arg(args, 0, method)?;
                Ok(self.store(method)?.get(ctx, &account).unwrap_or(Value::Null))
            }
            "update" => {
                let account = string_arg(args, 0, method)?;
                let delta = int_arg(args, 1, method)?;
                let store = self.store(method)?;
                let balance = store
                    .get(ctx, &account)
                    .and_then(|value| value.as_i64())
                    .ok_or_else(|| {
                        InvocationError::runtime(method, format!("账户不存在: {}", account))
                    })?;
                store.put(ctx, &account, json!(balance + delta))?;
                Ok(json!(balance + delta))
            }
            "open" | "close" => {
                record(self.events.as_ref(), format!("{}:accountDao", method));
                Ok(Value::Null)
            }
            other => Err(InvocationError::no_such_method("AccountDao", other)),
        }
    }
}

/// 账户服务组件
#[derive(Default, Settable)]
#[property(rename_all = "camelCase")]
pub struct AccountService {
    #[property]
    account_dao: ComponentCell,
    #[property]
    transfer_limit: PropertyCell<i64>,
    events: Option<Events>,
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
                let from = string_arg(args, 0, method)?;
                let to = string_arg(args, 1, method)?;
                let amount = int_arg(args, 2, method)?;
                if let Some(limit) = self.transfer_limit.get() {
                    if amount > limit {
                        return Err(InvocationError::business(
                            "LIMIT_EXCEEDED",
                            format!("转账金额 {} 超过限额 {}", amount, limit),
                        ));
                    }
                }
                let dao = self.dao(method)?;
                dao.invoke(ctx, "update", &[json!(from), json!(-amount)])?;
                dao.invoke(ctx, "update", &[json!(to), json!(amount)])?;
                Ok(Value::Null)
            }
            "balance" => self.dao(method)?.invoke(ctx, "balance", args),
            "close" => {
                record(self.events.as_ref(), "close:accountService".to_string());
                Ok(Value::Null)
            }
            other => Err(InvocationError::no_such_method("AccountService", other)),
        }
    }
}

/// 事务属性：写操作 REQUIRED，查询 SUPPORTS 只读
pub fn bank_attributes() -> Arc<NameMatchAttributeSource> {
    Arc::new(
        NameMatchAttributeSource::new()
            .with_method("transfer", TransactionAttribute::required())
            .with_method("update", TransactionAttribute::required())
            .with_method(
                "balance",
                TransactionAttribute::new(Propagation::Supports).read_only(),
            ),
    )
}

/// 装配银行转账应用
pub fn bank_context(store: &Arc<TransactionalStore>, events: &Events) -> ApplicationContext {
    init_test_logger();
    let dao_events = Arc::clone(events);
    let service_events = Arc::clone(events);
    ApplicationContext::builder()
        .with_transactional_store(Arc::clone(store), bank_attributes())
        .with_definition(
            ComponentDefinition::from_supplier::<AccountDao, _>("accountDao", move || {
                Ok(AccountDao {
                    events: Some(Arc::clone(&dao_events)),
                    ..AccountDao::default()
                })
            })
            .with_property_ref("store", TRANSACTION_STORE_COMPONENT)
            .with_init_method("open")
            .with_destroy_method("close"),
        )
        .with_definition(
            ComponentDefinition::from_supplier::<AccountService, _>("accountService", move || {
                Ok(AccountService {
                    events: Some(Arc::clone(&service_events)),
                    ..AccountService::default()
                })
            })
            .with_property_ref("accountDao", "accountDao")
            .with_property_value("transferLimit", 1000)
            .with_destroy_method("close"),
        )
        .build()
        .expect("装配银行转账应用失败")
}

/// 初始余额 alice=100, bob=20
pub fn seeded_store() -> Arc<TransactionalStore> {
    Arc::new(TransactionalStore::with_data([
        ("alice".to_string(), json!(100)),
        ("bob".to_string(), json!(20)),
    ]))
}
