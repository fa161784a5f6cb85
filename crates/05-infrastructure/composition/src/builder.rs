//! 应用上下文构建器

use crate::context::ApplicationContext;
use crate::errors::{InfrastructureError, InfrastructureResult};
use crate::logging::{initialize_logging, LoggingConfig};
use di_abstractions::{ComponentDefinition, ComponentPostProcessor};
use infrastructure_common::{ComponentRef, ContainerConfig, TypeInfo};
use interception::{
    Advice, Advisor, Pointcut, TracingAdvice, TransactionAttributePointcut,
    TransactionAttributeSource, TransactionInterceptor, TransactionManager, TransactionalStore,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 事务通知器的默认优先级
pub const TRANSACTION_ADVISOR_PRIORITY: i32 = 0;

/// 调用日志通知器的默认优先级，位于事务通知外层
pub const TRACING_ADVISOR_PRIORITY: i32 = -100;

/// 事务性存储注册到容器时使用的组件名称
pub const TRANSACTION_STORE_COMPONENT: &str = "transactionStore";

/// 应用上下文构建器
///
/// 使用建造者模式组装配置、日志、组件定义、扩展钩子与通知器
pub struct ApplicationContextBuilder {
    /// 容器配置
    config: ContainerConfig,
    /// 日志配置，未设置时不初始化日志
    logging: Option<LoggingConfig>,
    /// 组件定义
    definitions: Vec<ComponentDefinition>,
    /// 扩展钩子
    hooks: Vec<(Arc<dyn ComponentPostProcessor>, i32)>,
    /// 通知器
    advisors: Vec<Advisor>,
    /// 是否在构建时验证定义
    validation_enabled: bool,
}

impl ApplicationContextBuilder {
    /// 创建新的构建器
    pub fn new() -> Self {
        Self {
            config: ContainerConfig::default(),
            logging: None,
            definitions: Vec::new(),
            hooks: Vec::new(),
            advisors: Vec::new(),
            validation_enabled: true,
        }
    }

    /// 使用容器配置
    pub fn with_config(mut self, config: ContainerConfig) -> Self {
        self.config = config;
        self
    }

    /// 从配置文件（TOML/JSON）加载容器配置，环境变量覆盖文件中的值
    pub fn with_config_file<P: AsRef<Path>>(mut self, path: P) -> InfrastructureResult<Self> {
        let path = path.as_ref();
        info!("加载容器配置文件: {}", path.display());
        self.config = ContainerConfig::from_file_with_env(path)?;
        Ok(self)
    }

    /// 从环境变量加载容器配置
    pub fn with_env_config(mut self) -> InfrastructureResult<Self> {
        self.config = ContainerConfig::from_env()?;
        Ok(self)
    }

    /// 配置日志
    pub fn with_logging(mut self, config: LoggingConfig) -> Self {
        self.logging = Some(config);
        self
    }

    /// 添加组件定义
    pub fn with_definition(mut self, definition: ComponentDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    /// 批量添加组件定义
    pub fn with_definitions(
        mut self,
        definitions: impl IntoIterator<Item = ComponentDefinition>,
    ) -> Self {
        self.definitions.extend(definitions);
        self
    }

    /// 添加扩展钩子
    pub fn with_hook(mut self, hook: Arc<dyn ComponentPostProcessor>, priority: i32) -> Self {
        self.hooks.push((hook, priority));
        self
    }

    /// 添加通知器
    pub fn with_advisor(mut self, advisor: Advisor) -> Self {
        self.advisors.push(advisor);
        self
    }

    /// 为命中切点的方法添加调用日志
    pub fn with_tracing(self, pointcut: impl Pointcut + 'static) -> Self {
        self.with_advisor(Advisor::new(
            "tracing",
            pointcut,
            Advice::Around(Arc::new(TracingAdvice)),
            TRACING_ADVISOR_PRIORITY,
        ))
    }

    /// 启用声明式事务
    pub fn with_transactions(
        self,
        manager: Arc<dyn TransactionManager>,
        source: Arc<dyn TransactionAttributeSource>,
    ) -> Self {
        let interceptor = TransactionInterceptor::new(manager, Arc::clone(&source));
        self.with_advisor(Advisor::new(
            "transaction",
            TransactionAttributePointcut::new(source),
            Advice::Around(Arc::new(interceptor)),
            TRANSACTION_ADVISOR_PRIORITY,
        ))
    }

    /// 以事务性存储启用声明式事务，并将存储注册为单例组件
    pub fn with_transactional_store(
        self,
        store: Arc<TransactionalStore>,
        source: Arc<dyn TransactionAttributeSource>,
    ) -> Self {
        let shared = Arc::clone(&store);
        let definition = ComponentDefinition::from_static_factory(
            TRANSACTION_STORE_COMPONENT,
            TypeInfo::of::<TransactionalStore>(),
            "TransactionalStore",
            "shared",
            move |_| {
                let component: ComponentRef = shared.clone();
                Ok(component)
            },
        )
        .with_description("事务性键值存储");
        self.with_definition(definition)
            .with_transactions(store, source)
    }

    /// 启用或禁用构建时的定义验证
    pub fn enable_validation(mut self, enabled: bool) -> Self {
        self.validation_enabled = enabled;
        self
    }

    /// 构建应用上下文
    pub fn build(self) -> InfrastructureResult<ApplicationContext> {
        if let Some(logging) = &self.logging {
            // 全局订阅者只能设置一次，重复构建时沿用已有订阅者
            if let Err(e) = initialize_logging(logging) {
                warn!("{}", e);
            }
        }

        info!("开始构建应用上下文");
        self.config.validate()?;
        let preinstantiate = self.config.preinstantiate_singletons;
        let context = ApplicationContext::new(self.config);

        for (hook, priority) in self.hooks {
            context.add_hook(hook, priority);
        }
        for advisor in self.advisors {
            context.add_advisor(advisor);
        }
        for definition in self.definitions {
            context.register_definition(definition)?;
        }

        if self.validation_enabled {
            context
                .container()
                .validate()
                .map_err(|errors| InfrastructureError::Validation { errors })?;
        }

        if preinstantiate {
            let created = context.container().preinstantiate_singletons()?;
            debug!("预实例化单例 {} 个", created);
        }

        info!("应用上下文构建完成");
        Ok(context)
    }
}

impl Default for ApplicationContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use di_abstractions::ComponentLookup;
    use infrastructure_common::{
        Managed, MethodSignature, PropertyError, ResolvedValue, Settable,
    };
    use interception::{MethodNamePointcut, NameMatchAttributeSource, TransactionAttribute};
    use std::io::Write;

    struct Clock;

    impl Settable for Clock {
        fn set_property(&self, name: &str, _value: ResolvedValue) -> Result<(), PropertyError> {
            Err(PropertyError::unknown("Clock", name))
        }
    }

    impl Managed for Clock {
        fn methods(&self) -> Vec<MethodSignature> {
            vec![MethodSignature::new("Clock", "now")]
        }
    }

    fn clock() -> ComponentDefinition {
        ComponentDefinition::from_supplier::<Clock, _>("clock", || Ok(Clock))
    }

    #[test]
    fn test_build_registers_definitions_and_proxies_matches() {
        let context = ApplicationContext::builder()
            .with_definition(clock())
            .with_tracing(MethodNamePointcut::new(["now"]))
            .build()
            .unwrap();

        let component = context.get_component("clock").unwrap();
        assert!(component.proxied_target().is_some());
        assert_eq!(context.auto_proxy().advisor_count(), 1);
    }

    #[test]
    fn test_validation_failure_is_reported() {
        let result = ApplicationContext::builder()
            .with_definition(clock().with_depends_on("missing"))
            .build();
        assert!(matches!(result, Err(InfrastructureError::Validation { .. })));

        let unchecked = ApplicationContext::builder()
            .with_definition(clock().with_depends_on("missing"))
            .enable_validation(false)
            .build();
        assert!(unchecked.is_ok());
    }

    #[test]
    fn test_config_file_drives_preinstantiation() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[container]\npreinstantiate_singletons = true").unwrap();

        let context = ApplicationContext::builder()
            .with_config_file(file.path())
            .unwrap()
            .with_definition(clock())
            .build()
            .unwrap();

        assert_eq!(
            context.state("clock"),
            infrastructure_common::InstanceState::FullyInitialized
        );
    }

    #[test]
    fn test_transactional_store_is_registered() {
        let store = Arc::new(TransactionalStore::new());
        let source = Arc::new(
            NameMatchAttributeSource::new().with_method("transfer", TransactionAttribute::required()),
        );
        let context = ApplicationContext::builder()
            .with_transactional_store(Arc::clone(&store), source)
            .build()
            .unwrap();

        let component = context.get_component(TRANSACTION_STORE_COMPONENT).unwrap();
        let resolved = infrastructure_common::downcast_component::<TransactionalStore>(&component)
            .unwrap();
        assert!(Arc::ptr_eq(&resolved, &store));
    }
}
