//! 银行转账端到端测试：组件装配、自动代理与声明式事务

mod support;

use di_abstractions::ComponentLookup;
use infrastructure_common::{InvocationError, TransactionError};
use serde_json::json;
use support::{bank_context, events, seeded_store};

#[test]
fn test_successful_transfer_commits_once() -> anyhow::Result<()> {
    let store = seeded_store();
    let log = events();
    let context = bank_context(&store, &log);

    let service = context.get_component("accountService")?;
    assert!(service.proxied_target().is_some());

    let ctx = context.execution_context();
    service.invoke(&ctx, "transfer", &[json!("alice"), json!("bob"), json!(50)])?;

    assert_eq!(store.committed_value("alice"), Some(json!(50)));
    assert_eq!(store.committed_value("bob"), Some(json!(70)));
    assert_eq!(store.commit_count(), 1);
    assert_eq!(store.rollback_count(), 0);
    assert_eq!(store.pending_units(), 0);
    Ok(())
}

#[test]
fn test_failed_second_update_rolls_back_whole_transfer() -> anyhow::Result<()> {
    let store = seeded_store();
    let log = events();
    let context = bank_context(&store, &log);

    let service = context.get_component("accountService")?;
    let ctx = context.execution_context();
    let result = service.invoke(&ctx, "transfer", &[json!("alice"), json!("carol"), json!(50)]);

    assert!(matches!(result, Err(InvocationError::Runtime { .. })));
    assert_eq!(store.committed_value("alice"), Some(json!(100)));
    assert_eq!(store.committed_value("bob"), Some(json!(20)));
    assert_eq!(store.committed_value("carol"), None);
    assert_eq!(store.rollback_count(), 1);
    assert_eq!(store.commit_count(), 0);
    assert_eq!(store.pending_units(), 0);
    Ok(())
}

#[test]
fn test_business_failure_commits_without_writes() -> anyhow::Result<()> {
    let store = seeded_store();
    let log = events();
    let context = bank_context(&store, &log);

    let service = context.get_component("accountService")?;
    let ctx = context.execution_context();
    let result = service.invoke(&ctx, "transfer", &[json!("alice"), json!("bob"), json!(5000)]);

    match result {
        Err(InvocationError::Business { code, .. }) => assert_eq!(code, "LIMIT_EXCEEDED"),
        other => panic!("应为业务异常: {:?}", other),
    }
    assert_eq!(store.committed_value("alice"), Some(json!(100)));
    assert_eq!(store.commit_count(), 1);
    assert_eq!(store.rollback_count(), 0);
    Ok(())
}

#[test]
fn test_balance_query_runs_without_transaction() -> anyhow::Result<()> {
    let store = seeded_store();
    let log = events();
    let context = bank_context(&store, &log);

    let service = context.get_component("accountService")?;
    let ctx = context.execution_context();
    let balance = service.invoke(&ctx, "balance", &[json!("bob")])?;

    assert_eq!(balance, json!(20));
    assert_eq!(store.commit_count(), 0);
    assert_eq!(store.rollback_count(), 0);
    Ok(())
}

#[test]
fn test_direct_dao_update_outside_service_is_transactional() -> anyhow::Result<()> {
    let store = seeded_store();
    let log = events();
    let context = bank_context(&store, &log);

    let dao = context.get_component("accountDao")?;
    let ctx = context.execution_context();
    let updated = dao.invoke(&ctx, "update", &[json!("bob"), json!(5)])?;

    assert_eq!(updated, json!(25));
    assert_eq!(store.committed_value("bob"), Some(json!(25)));
    assert_eq!(store.commit_count(), 1);

    let missing = dao.invoke(&ctx, "update", &[json!("dave"), json!(5)]);
    assert!(missing.is_err());
    assert_eq!(store.rollback_count(), 1);
    Ok(())
}

#[test]
fn test_lifecycle_methods_bracket_application() -> anyhow::Result<()> {
    let store = seeded_store();
    let log = events();
    let context = bank_context(&store, &log);

    context.get_component("accountService")?;
    assert_eq!(*log.lock(), vec!["open:accountDao"]);

    context.close();
    assert_eq!(
        *log.lock(),
        vec!["open:accountDao", "close:accountService", "close:accountDao"]
    );
    Ok(())
}

#[test]
fn test_rollback_error_converts_into_invocation_error() {
    let error: InvocationError = TransactionError::Rollback {
        name: "AccountService.transfer".to_string(),
    }
    .into();
    assert!(error.is_runtime());
    assert!(error.to_string().contains("AccountService.transfer"));
}
