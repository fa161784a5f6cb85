//! 受管组件容器的集成测试

use di_abstractions::{
    ComponentDefinition, ComponentLookup, ComponentLookupExt, ComponentPostProcessor,
    PropertyValue, PropertyValues,
};
use di_impl::ManagedContainer;
use infrastructure_common::{
    component_ref, same_component, BoxError, ComponentCell, ComponentRef, Constructible, ConstructorArgs,
    ContainerConfig, ContainerError, CreationPhase, EarlyReferencePolicy, ExecutionContext,
    InstanceState, InvocationError, Managed, PropertyCell, PropertyError, PropertyTarget,
    ResolvedValue, Settable, TypeInfo,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

static INIT_LOGGER: Once = Once::new();

fn init_test_logger() {
    INIT_LOGGER.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
            .try_init();
    });
}

type Log = Arc<Mutex<Vec<String>>>;

/// 测试组件
#[derive(Default)]
struct Node {
    label: PropertyCell<String>,
    peer: ComponentCell,
    log: Option<Log>,
    failures: Option<Arc<AtomicUsize>>,
}

impl Node {
    fn logged(label: &str, log: &Log) -> Self {
        Self {
            label: PropertyCell::with_value(label.to_string()),
            peer: ComponentCell::new(),
            log: Some(Arc::clone(log)),
            failures: None,
        }
    }

    fn label(&self) -> String {
        self.label.get().unwrap_or_default()
    }

    fn record(&self, event: &str) {
        if let Some(log) = &self.log {
            log.lock().push(format!("{}:{}", event, self.label()));
        }
    }
}

impl Settable for Node {
    fn set_property(&self, name: &str, value: ResolvedValue) -> Result<(), PropertyError> {
        match name {
            "label" => self.label.assign(name, value),
            "peer" => self.peer.assign(name, value),
            other => Err(PropertyError::unknown("Node", other)),
        }
    }
}

impl Managed for Node {
    fn invoke(
        &self,
        _ctx: &ExecutionContext,
        method: &str,
        _args: &[Value],
    ) -> Result<Value, InvocationError> {
        match method {
            "init" | "close" => {
                self.record(method);
                Ok(Value::Null)
            }
            "explode" => Err(InvocationError::runtime(method, "初始化失败")),
            "warmup" => {
                let failing = self.failures.as_ref().is_some_and(|failures| {
                    failures
                        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                        .is_ok()
                });
                if failing {
                    return Err(InvocationError::runtime(method, "预热失败"));
                }
                Ok(Value::Null)
            }
            "label" => Ok(json!(self.label())),
            other => Err(InvocationError::no_such_method("Node", other)),
        }
    }

    fn create_product(
        &self,
        method: &str,
        args: &ConstructorArgs,
    ) -> Result<ComponentRef, InvocationError> {
        match method {
            "spawn" => {
                let suffix: String = args
                    .literal(0)
                    .map_err(|e| InvocationError::invalid_arguments(method, e.to_string()))?;
                let child = Node::default();
                child.label.set(format!("{}-{}", self.label(), suffix));
                Ok(Arc::new(child))
            }
            other => Err(InvocationError::no_such_method("Node", other)),
        }
    }
}

impl Constructible for Node {
    fn construct(args: &ConstructorArgs) -> Result<Self, BoxError> {
        let node = Self::default();
        if !args.is_empty() {
            match args.get(0)? {
                ResolvedValue::Component(peer) => node.peer.set(Arc::clone(peer)),
                literal => node.label.set(literal.literal::<String>("arg0")?),
            }
        }
        Ok(node)
    }
}

fn counting_node(label: &'static str, counter: &Arc<AtomicUsize>) -> ComponentDefinition {
    let counter = Arc::clone(counter);
    ComponentDefinition::from_supplier(label, move || {
        counter.fetch_add(1, Ordering::SeqCst);
        let node = Node::default();
        node.label.set(label.to_string());
        Ok(node)
    })
}

/// 前 `failures` 次初始化失败的节点
fn flaky_node(label: &'static str, failures: &Arc<AtomicUsize>, log: &Log) -> ComponentDefinition {
    let failures = Arc::clone(failures);
    let log = Arc::clone(log);
    ComponentDefinition::from_supplier(label, move || {
        Ok(Node {
            failures: Some(Arc::clone(&failures)),
            ..Node::logged(label, &log)
        })
    })
    .with_init_method("warmup")
}

fn node(component: &ComponentRef) -> &Node {
    component_ref::<Node>(component).expect("组件不是 Node")
}

fn peer_of(component: &ComponentRef) -> ComponentRef {
    node(component).peer.get().expect("peer 未注入")
}

#[test]
fn test_singleton_lookups_return_identical_instance() {
    init_test_logger();
    let container = ManagedContainer::default();
    container
        .register_definition(ComponentDefinition::of::<Node>("node").with_property_value("label", "x"))
        .unwrap();

    let first = container.get_component("node").unwrap();
    let second = container.get_component("node").unwrap();
    assert!(same_component(&first, &second));
    assert_eq!(container.state("node"), InstanceState::FullyInitialized);
}

#[test]
fn test_prototype_lookups_return_distinct_instances_with_same_values() {
    init_test_logger();
    let container = ManagedContainer::default();
    container
        .register_definition(
            ComponentDefinition::of::<Node>("node")
                .prototype()
                .with_property_value("label", "fresh"),
        )
        .unwrap();

    let first = container.get_typed::<Node>("node").unwrap();
    let second = container.get_typed::<Node>("node").unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(first.label(), "fresh");
    assert_eq!(second.label(), "fresh");
    assert_eq!(container.stats().active_singletons, 0);
}

#[test]
fn test_singleton_property_cycle_closes_on_same_objects() {
    init_test_logger();
    let container = ManagedContainer::default();
    let counter = Arc::new(AtomicUsize::new(0));
    container
        .register_definition(counting_node("a", &counter).with_property_ref("peer", "b"))
        .unwrap();
    container
        .register_definition(counting_node("b", &counter).with_property_ref("peer", "a"))
        .unwrap();

    let a = container.get_component("a").unwrap();
    let b = container.get_component("b").unwrap();

    assert!(same_component(&peer_of(&a), &b));
    assert!(same_component(&peer_of(&b), &a));
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[test]
fn test_prototype_cycle_fails_with_circular_dependency() {
    init_test_logger();
    let container = ManagedContainer::default();
    container
        .register_definition(
            ComponentDefinition::of::<Node>("a")
                .prototype()
                .with_property_ref("peer", "b"),
        )
        .unwrap();
    container
        .register_definition(
            ComponentDefinition::of::<Node>("b")
                .prototype()
                .with_property_ref("peer", "a"),
        )
        .unwrap();

    let error = container.get_component("a").err().unwrap();
    match error {
        ContainerError::CircularDependency { chain } => {
            assert_eq!(chain, vec!["a", "b", "a"]);
        }
        other => panic!("期望循环依赖错误: {other}"),
    }
}

#[test]
fn test_constructor_cycle_between_singletons_is_unresolvable() {
    init_test_logger();
    let container = ManagedContainer::default();
    container
        .register_definition(
            ComponentDefinition::of::<Node>("a").with_constructor_arg(PropertyValue::reference("b")),
        )
        .unwrap();
    container
        .register_definition(
            ComponentDefinition::of::<Node>("b").with_constructor_arg(PropertyValue::reference("a")),
        )
        .unwrap();

    let error = container.get_component("a").err().unwrap();
    assert!(error.is_circular_dependency());
    assert_eq!(container.state("a"), InstanceState::NotStarted);
    assert_eq!(container.state("b"), InstanceState::NotStarted);
}

#[test]
fn test_missing_reference_reports_phase_and_chain() {
    init_test_logger();
    let container = ManagedContainer::default();
    container
        .register_definition(ComponentDefinition::of::<Node>("a").with_property_ref("peer", "b"))
        .unwrap();
    container
        .register_definition(ComponentDefinition::of::<Node>("b").with_property_ref("peer", "ghost"))
        .unwrap();

    let error = container.get_component("a").err().unwrap();
    assert!(error.is_creation_failure());
    assert_eq!(error.phase(), Some(CreationPhase::Populating));
    assert_eq!(error.chain(), ["a".to_string(), "b".to_string()]);
    assert!(error.root_cause().to_string().contains("ghost"));
    assert_eq!(container.stats().creation_errors, 1);
    assert!(matches!(
        container.get_component("ghost"),
        Err(ContainerError::UnknownComponent { .. })
    ));
}

#[test]
fn test_initializer_failure_rolls_back() {
    init_test_logger();
    let container = ManagedContainer::default();
    container
        .register_definition(ComponentDefinition::of::<Node>("node").with_init_method("explode"))
        .unwrap();

    let error = container.get_component("node").err().unwrap();
    assert!(matches!(error, ContainerError::Initialization { ref method, .. } if method == "explode"));
    assert_eq!(error.phase(), Some(CreationPhase::Initializing));
    assert_eq!(container.state("node"), InstanceState::NotStarted);
    assert_eq!(container.stats().active_singletons, 0);
}

#[test]
fn test_failed_singleton_evicts_holders_of_its_early_reference() {
    init_test_logger();
    let container = ManagedContainer::default();
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let failures = Arc::new(AtomicUsize::new(1));
    container
        .register_definition(flaky_node("a", &failures, &log).with_property_ref("peer", "b"))
        .unwrap();
    let b_log = Arc::clone(&log);
    container
        .register_definition(
            ComponentDefinition::from_supplier("b", move || Ok(Node::logged("b", &b_log)))
                .with_property_ref("peer", "a")
                .with_destroy_method("close"),
        )
        .unwrap();
    container
        .register_definition(ComponentDefinition::of::<Node>("bystander"))
        .unwrap();
    container.get_component("bystander").unwrap();

    let error = container.get_component("a").err().unwrap();
    assert!(matches!(error, ContainerError::Initialization { ref method, .. } if method == "warmup"));
    assert_eq!(container.state("a"), InstanceState::NotStarted);
    assert_eq!(container.state("b"), InstanceState::NotStarted);
    assert_eq!(container.state("bystander"), InstanceState::FullyInitialized);
    assert_eq!(*log.lock(), vec!["close:b"]);

    let a = container.get_component("a").unwrap();
    let b = container.get_component("b").unwrap();
    assert!(same_component(&peer_of(&a), &b));
    assert!(same_component(&peer_of(&b), &a));
    assert_eq!(container.stats().active_singletons, 3);
}

#[test]
fn test_definition_override_rejected_once_singleton_exists() {
    init_test_logger();
    let container =
        ManagedContainer::new(ContainerConfig::default().with_definition_overriding(true));
    container
        .register_definition(ComponentDefinition::of::<Node>("node").with_property_value("label", "old"))
        .unwrap();
    container
        .register_definition(ComponentDefinition::of::<Node>("node").with_property_value("label", "new"))
        .unwrap();
    assert_eq!(container.get_typed::<Node>("node").unwrap().label(), "new");

    let error = container
        .register_definition(ComponentDefinition::of::<Node>("node").with_property_value("label", "late"))
        .err()
        .unwrap();
    assert!(matches!(error, ContainerError::InvalidDefinition { ref name, .. } if name == "node"));
    assert_eq!(container.get_typed::<Node>("node").unwrap().label(), "new");
}

#[test]
fn test_definition_override_allowed_after_failed_creation() {
    init_test_logger();
    let container =
        ManagedContainer::new(ContainerConfig::default().with_definition_overriding(true));
    container
        .register_definition(ComponentDefinition::of::<Node>("node").with_init_method("explode"))
        .unwrap();
    assert!(container.get_component("node").is_err());

    container
        .register_definition(ComponentDefinition::of::<Node>("node").with_property_value("label", "fixed"))
        .unwrap();
    assert_eq!(container.get_typed::<Node>("node").unwrap().label(), "fixed");
}

#[test]
fn test_destroy_runs_in_reverse_creation_order() {
    init_test_logger();
    let container = ManagedContainer::default();
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    for (name, peer) in [("first", None), ("second", Some("first")), ("third", Some("second"))] {
        let component_log = Arc::clone(&log);
        let mut definition = ComponentDefinition::from_supplier(name, move || {
            Ok(Node::logged(name, &component_log))
        })
        .with_init_method("init")
        .with_destroy_method("close");
        if let Some(peer) = peer {
            definition = definition.with_property_ref("peer", peer);
        }
        container.register_definition(definition).unwrap();
    }

    container.get_component("third").unwrap();
    container.destroy();

    assert_eq!(
        *log.lock(),
        vec![
            "init:first",
            "init:second",
            "init:third",
            "close:third",
            "close:second",
            "close:first"
        ]
    );
    assert_eq!(container.state("first"), InstanceState::Destroyed);
    assert!(matches!(
        container.get_component("first"),
        Err(ContainerError::ContainerClosed { .. })
    ));
}

struct Substitute;

impl ComponentPostProcessor for Substitute {
    fn before_instantiation(
        &self,
        definition: &ComponentDefinition,
    ) -> Result<Option<ComponentRef>, BoxError> {
        if definition.name() != "replaced" {
            return Ok(None);
        }
        let node = Node::default();
        node.label.set("substitute".to_string());
        Ok(Some(Arc::new(node)))
    }

    fn after_instantiation(
        &self,
        _instance: &ComponentRef,
        definition: &ComponentDefinition,
    ) -> Result<bool, BoxError> {
        Ok(definition.name() != "frozen")
    }
}

#[test]
fn test_substitute_skips_population_and_initializer() {
    init_test_logger();
    let container = ManagedContainer::default();
    container.add_hook(Arc::new(Substitute), 0);
    container
        .register_definition(
            ComponentDefinition::of::<Node>("replaced")
                .with_property_ref("peer", "missing")
                .with_init_method("explode"),
        )
        .unwrap();
    container
        .register_definition(ComponentDefinition::of::<Node>("frozen").with_property_value("label", "set"))
        .unwrap();

    let replaced = container.get_typed::<Node>("replaced").unwrap();
    assert_eq!(replaced.label(), "substitute");
    assert!(replaced.peer.get().is_none());

    let frozen = container.get_typed::<Node>("frozen").unwrap();
    assert!(!frozen.label.is_set());
}

struct RenameLabel;

impl ComponentPostProcessor for RenameLabel {
    fn property_values(
        &self,
        mut values: PropertyValues,
        _instance: &ComponentRef,
        _definition: &ComponentDefinition,
    ) -> Result<PropertyValues, BoxError> {
        if values.contains("label") {
            values.set("label", ResolvedValue::Literal(json!("rewritten")));
        }
        Ok(values)
    }
}

#[test]
fn test_property_values_hook_rewrites_values() {
    init_test_logger();
    let container = ManagedContainer::default();
    container.add_hook(Arc::new(RenameLabel), 0);
    container
        .register_definition(ComponentDefinition::of::<Node>("node").with_property_value("label", "original"))
        .unwrap();

    assert_eq!(container.get_typed::<Node>("node").unwrap().label(), "rewritten");
}

/// 初始化后把组件替换为新对象的钩子
struct Replace;

impl ComponentPostProcessor for Replace {
    fn after_initialization(
        &self,
        instance: ComponentRef,
        definition: &ComponentDefinition,
    ) -> Result<ComponentRef, BoxError> {
        if definition.name() == "a" {
            return Ok(Arc::new(Node::default()));
        }
        Ok(instance)
    }
}

fn cyclic_container(policy: EarlyReferencePolicy) -> ManagedContainer {
    let container =
        ManagedContainer::new(ContainerConfig::default().with_early_reference_policy(policy));
    container.add_hook(Arc::new(Replace), 0);
    container
        .register_definition(ComponentDefinition::of::<Node>("a").with_property_ref("peer", "b"))
        .unwrap();
    container
        .register_definition(ComponentDefinition::of::<Node>("b").with_property_ref("peer", "a"))
        .unwrap();
    container
}

#[test]
fn test_early_reference_mismatch_rejected_by_default() {
    init_test_logger();
    let container = cyclic_container(EarlyReferencePolicy::Reject);

    let error = container.get_component("a").err().unwrap();
    assert_eq!(error.phase(), Some(CreationPhase::PostProcessing));
    assert_eq!(container.state("a"), InstanceState::NotStarted);
}

#[test]
fn test_early_reference_mismatch_allowed_by_policy() {
    init_test_logger();
    let container = cyclic_container(EarlyReferencePolicy::Allow);

    let a = container.get_component("a").unwrap();
    let b = container.get_component("b").unwrap();
    // b 持有的是 a 的早期引用，而缓存中是替换后的对象
    assert!(!same_component(&peer_of(&b), &a));
}

trait Greeter {}

#[test]
fn test_lookup_by_type_uses_primary() {
    init_test_logger();
    let container = ManagedContainer::default();
    container
        .register_definition(ComponentDefinition::of::<Node>("plain").with_interface("Greeter"))
        .unwrap();

    assert!(container.get_component_of::<dyn Greeter>().is_ok());

    container
        .register_definition(ComponentDefinition::of::<Node>("other").with_interface("Greeter"))
        .unwrap();
    assert!(matches!(
        container.get_component_of::<dyn Greeter>(),
        Err(ContainerError::NoUniqueComponent { ref candidates, .. }) if candidates.len() == 2
    ));

    container
        .register_definition(
            ComponentDefinition::of::<Node>("preferred")
                .with_interface("Greeter")
                .primary()
                .with_property_value("label", "primary"),
        )
        .unwrap();
    let node = container.get_by_type::<Node>().unwrap();
    assert_eq!(node.label(), "primary");

    assert!(matches!(
        container.get_component_by_type(&TypeInfo::of::<String>()),
        Err(ContainerError::UnknownComponentType { .. })
    ));
}

#[test]
fn test_depends_on_creates_dependencies_first() {
    init_test_logger();
    let container = ManagedContainer::default();
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    for (name, depends_on) in [("cache", Some("schema")), ("schema", None)] {
        let component_log = Arc::clone(&log);
        let mut definition =
            ComponentDefinition::from_supplier(name, move || Ok(Node::logged(name, &component_log)))
                .with_init_method("init");
        if let Some(dependency) = depends_on {
            definition = definition.with_depends_on(dependency);
        }
        container.register_definition(definition).unwrap();
    }

    container.get_component("cache").unwrap();
    assert_eq!(*log.lock(), vec!["init:schema", "init:cache"]);
}

#[test]
fn test_depends_on_cycle_is_circular_dependency() {
    init_test_logger();
    let container = ManagedContainer::default();
    container
        .register_definition(ComponentDefinition::of::<Node>("a").with_depends_on("b"))
        .unwrap();
    container
        .register_definition(ComponentDefinition::of::<Node>("b").with_depends_on("a"))
        .unwrap();

    assert!(container.get_component("a").err().unwrap().is_circular_dependency());
    let errors = container.validate().unwrap_err();
    assert!(errors.iter().any(ContainerError::is_circular_dependency));
}

#[test]
fn test_validate_reports_missing_targets_and_prototype_cycles() {
    init_test_logger();
    let container = ManagedContainer::default();
    container
        .register_definition(ComponentDefinition::of::<Node>("orphan").with_property_ref("peer", "ghost"))
        .unwrap();
    container
        .register_definition(ComponentDefinition::of::<Node>("p1").prototype().with_property_ref("peer", "p2"))
        .unwrap();
    container
        .register_definition(ComponentDefinition::of::<Node>("p2").prototype().with_property_ref("peer", "p1"))
        .unwrap();
    container
        .register_definition(ComponentDefinition::of::<Node>("s1").with_property_ref("peer", "s2"))
        .unwrap();
    container
        .register_definition(ComponentDefinition::of::<Node>("s2").with_property_ref("peer", "s1"))
        .unwrap();

    let errors = container.validate().unwrap_err();
    assert_eq!(errors.len(), 2);
    assert!(matches!(errors[0], ContainerError::InvalidDefinition { ref name, .. } if name == "orphan"));
    assert!(matches!(
        errors[1],
        ContainerError::CircularDependency { ref chain } if chain == &vec!["p1", "p2", "p1"]
    ));
}

#[test]
fn test_factory_strategies() {
    init_test_logger();
    let container = ManagedContainer::default();
    container
        .register_definition(ComponentDefinition::of::<Node>("root").with_property_value("label", "root"))
        .unwrap();
    container
        .register_definition(
            ComponentDefinition::from_instance_factory(
                "child",
                TypeInfo::of::<Node>(),
                "root",
                "spawn",
            )
            .with_constructor_arg(PropertyValue::literal("1")),
        )
        .unwrap();
    container
        .register_definition(
            ComponentDefinition::from_static_factory(
                "static",
                TypeInfo::of::<Node>(),
                "NodeFactory",
                "create",
                |args| {
                    let node = Node::default();
                    node.label.set(args.literal::<String>(0)?);
                    Ok(Arc::new(node) as ComponentRef)
                },
            )
            .with_constructor_arg(PropertyValue::literal("made")),
        )
        .unwrap();

    assert_eq!(container.get_typed::<Node>("child").unwrap().label(), "root-1");
    assert_eq!(container.get_typed::<Node>("static").unwrap().label(), "made");
}

#[test]
fn test_preinstantiate_skips_lazy_and_prototypes() {
    init_test_logger();
    let container = ManagedContainer::default();
    let counter = Arc::new(AtomicUsize::new(0));
    container.register_definition(counting_node("eager", &counter)).unwrap();
    container
        .register_definition(counting_node("lazy", &counter).lazy())
        .unwrap();
    container
        .register_definition(counting_node("proto", &counter).prototype())
        .unwrap();

    assert_eq!(container.preinstantiate_singletons().unwrap(), 1);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(container.state("lazy"), InstanceState::NotStarted);
}

#[test]
fn test_max_resolution_depth() {
    init_test_logger();
    let container = ManagedContainer::new(ContainerConfig::default().with_max_resolution_depth(3));
    for (name, peer) in [("n1", "n2"), ("n2", "n3"), ("n3", "n4"), ("n4", "n5")] {
        container
            .register_definition(ComponentDefinition::of::<Node>(name).with_property_ref("peer", peer))
            .unwrap();
    }
    container
        .register_definition(ComponentDefinition::of::<Node>("n5"))
        .unwrap();

    let error = container.get_component("n1").err().unwrap();
    assert!(error.is_creation_failure());
    assert!(error.root_cause().to_string().contains("解析深度"));
}

#[test]
fn test_duplicate_definition_and_closed_container() {
    init_test_logger();
    let container = ManagedContainer::default();
    container
        .register_definition(ComponentDefinition::of::<Node>("node"))
        .unwrap();
    assert!(matches!(
        container.register_definition(ComponentDefinition::of::<Node>("node")),
        Err(ContainerError::DuplicateDefinition { .. })
    ));
    assert_eq!(container.definition_names(), vec!["node"]);

    container.destroy();
    assert!(container.is_closed());
    assert!(matches!(
        container.register_definition(ComponentDefinition::of::<Node>("late")),
        Err(ContainerError::ContainerClosed { .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_lookups_create_singleton_once() {
    init_test_logger();
    let container = Arc::new(ManagedContainer::default());
    let counter = Arc::new(AtomicUsize::new(0));
    container
        .register_definition(counting_node("shared", &counter))
        .unwrap();

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let container = Arc::clone(&container);
            tokio::task::spawn_blocking(move || container.get_component("shared"))
        })
        .collect();

    let mut instances = Vec::new();
    for handle in handles {
        instances.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(instances
        .windows(2)
        .all(|pair| same_component(&pair[0], &pair[1])));
}
