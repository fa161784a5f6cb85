//! 应用上下文端到端测试：通知、循环引用代理、销毁顺序与并发查找

mod support;

use di_abstractions::{ComponentLookup, ComponentLookupExt};
use infrastructure_common::{same_component, ContainerConfig, InstanceState, InvocationError};
use infrastructure_composition::ApplicationContext;
use interception::{Advice, Invocation, MethodNamePointcut, TypePointcut};
use serde_json::{json, Value};
use std::sync::Arc;
use support::{events, init_test_logger, node, Events, Node};

fn recording_advice(context: &ApplicationContext, log: &Events) {
    let before_log = Arc::clone(log);
    context.add_advice(
        TypePointcut::new("Node"),
        Advice::before(move |invocation: &Invocation<'_>| {
            before_log
                .lock()
                .push(format!("before:{}", invocation.method()));
            Ok(())
        }),
        0,
    );
    let after_log = Arc::clone(log);
    context.add_advice(
        TypePointcut::new("Node"),
        Advice::after(move |invocation: &Invocation<'_>, outcome: &Result<Value, InvocationError>| {
            let status = if outcome.is_ok() { "ok" } else { "err" };
            after_log
                .lock()
                .push(format!("after:{}:{}", invocation.method(), status));
        }),
        0,
    );
}

#[test]
fn test_before_method_after_order() -> anyhow::Result<()> {
    init_test_logger();
    let log = events();
    let context = ApplicationContext::default();
    recording_advice(&context, &log);
    context.register_definition(node("node", &log))?;

    let component = context.get_component("node")?;
    let ctx = context.execution_context();
    let result = component.invoke(&ctx, "ping", &[])?;

    assert_eq!(result, json!("node"));
    assert_eq!(
        *log.lock(),
        vec!["before:ping", "ping:node", "after:ping:ok"]
    );
    Ok(())
}

#[test]
fn test_singleton_cycle_closes_on_final_proxy() -> anyhow::Result<()> {
    init_test_logger();
    let log = events();
    let context = ApplicationContext::default();
    recording_advice(&context, &log);
    context.register_definition(node("a", &log).with_property_ref("peer", "b"))?;
    context.register_definition(node("b", &log).with_property_ref("peer", "a"))?;

    let a = context.get_component("a")?;
    let b = context.get_component("b")?;
    assert!(a.proxied_target().is_some());
    assert!(b.proxied_target().is_some());

    // b 持有的 peer 与最终暴露的 a 是同一个代理
    let b_raw = b.proxied_target().expect("b 应被代理");
    let b_node = infrastructure_common::downcast_component::<Node>(&b_raw)
        .expect("b 的目标应为 Node");
    let b_peer = b_node.peer.get().expect("b.peer 应已注入");
    assert!(same_component(&b_peer, &a));

    let a_raw = a.proxied_target().expect("a 应被代理");
    let a_node = infrastructure_common::downcast_component::<Node>(&a_raw)
        .expect("a 的目标应为 Node");
    let a_peer = a_node.peer.get().expect("a.peer 应已注入");
    assert!(same_component(&a_peer, &b));

    // 经 a 的代理调用 peerLabel，再经 b 的代理调用 ping
    let ctx = context.execution_context();
    let label = a.invoke(&ctx, "peerLabel", &[])?;
    assert_eq!(label, json!("b"));
    assert_eq!(
        *log.lock(),
        vec![
            "before:peerLabel",
            "before:ping",
            "ping:b",
            "after:ping:ok",
            "after:peerLabel:ok",
        ]
    );
    Ok(())
}

#[test]
fn test_close_destroys_in_reverse_creation_order() -> anyhow::Result<()> {
    init_test_logger();
    let log = events();
    let context = ApplicationContext::default();
    context.register_definition(node("first", &log).with_destroy_method("close"))?;
    context.register_definition(
        node("second", &log)
            .with_depends_on("first")
            .with_destroy_method("close"),
    )?;
    context.register_definition(
        node("third", &log)
            .with_depends_on("second")
            .with_destroy_method("close"),
    )?;

    context.get_component("third")?;
    assert_eq!(context.state("first"), InstanceState::FullyInitialized);

    context.close();
    assert!(context.is_closed());
    assert_eq!(
        *log.lock(),
        vec!["close:third", "close:second", "close:first"]
    );
    assert!(context.get_component("first").is_err());
    Ok(())
}

fn interface_context(proxy_target_type: bool, log: &Events) -> anyhow::Result<ApplicationContext> {
    let context =
        ApplicationContext::new(ContainerConfig::default().with_proxy_target_type(proxy_target_type));
    context.add_advice(
        MethodNamePointcut::new(["ping"]),
        Advice::before(|_: &Invocation<'_>| Ok(())),
        0,
    );
    context.register_definition(node("node", log).with_interface("Pinger"))?;
    Ok(context)
}

#[test]
fn test_interface_proxy_hides_target_type() -> anyhow::Result<()> {
    init_test_logger();
    let log = events();
    let context = interface_context(false, &log)?;

    let component = context.get_component("node")?;
    assert!(component.proxied_target().is_some());
    assert!(!component.presents_target_type());
    assert!(context.get_typed::<Node>("node").is_err());
    Ok(())
}

#[test]
fn test_target_type_proxy_allows_typed_access() -> anyhow::Result<()> {
    init_test_logger();
    let log = events();
    let context = interface_context(true, &log)?;

    let component = context.get_component("node")?;
    assert!(component.presents_target_type());
    let typed = context.get_typed::<Node>("node")?;
    assert_eq!(typed.label.get().as_deref(), Some("node"));
    Ok(())
}

#[test]
fn test_prototype_lookups_yield_distinct_proxies() -> anyhow::Result<()> {
    init_test_logger();
    let log = events();
    let context = ApplicationContext::default();
    recording_advice(&context, &log);
    context.register_definition(node("scratch", &log).prototype())?;

    let first = context.get_component("scratch")?;
    let second = context.get_component("scratch")?;
    assert!(!same_component(&first, &second));

    let first_target = first.proxied_target().expect("原型也应被代理");
    let second_target = second.proxied_target().expect("原型也应被代理");
    assert!(!same_component(&first_target, &second_target));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_lookups_share_one_singleton() -> anyhow::Result<()> {
    init_test_logger();
    let log = events();
    let context = Arc::new(ApplicationContext::default());
    context.register_definition(node("shared", &log).with_property_ref("peer", "peer"))?;
    context.register_definition(node("peer", &log))?;

    let mut handles = Vec::new();
    for _ in 0..16 {
        let context = Arc::clone(&context);
        handles.push(tokio::task::spawn_blocking(move || {
            context.get_component("shared")
        }));
    }

    let mut resolved = Vec::new();
    for handle in handles {
        resolved.push(handle.await??);
    }

    let first = &resolved[0];
    assert!(resolved.iter().all(|component| same_component(component, first)));
    assert_eq!(context.stats().created_components, 2);
    Ok(())
}
