//! # 示例应用程序
//!
//! 装配账户服务、自动代理与声明式事务，演示一次成功转账与一次回滚转账。

mod bank;

use clap::Parser;
use di_abstractions::ComponentLookup;
use infrastructure_composition::{
    ApplicationContext, ApplicationContextBuilder, LogFormat, LoggingConfig,
    TRANSACTION_STORE_COMPONENT,
};
use interception::{TransactionalStore, TypePointcut};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "example-app")]
#[command(about = "受管组件容器示例应用")]
struct Args {
    /// 配置文件路径
    #[arg(short, long, default_value = "config/app.toml")]
    config: String,

    /// 日志级别
    #[arg(long, default_value = "info")]
    log_level: String,

    /// 以 JSON 格式输出日志
    #[arg(long)]
    json_logs: bool,

    /// 转账金额
    #[arg(long, default_value_t = 50)]
    amount: i64,

    /// 单笔转账限额
    #[arg(long, default_value_t = 1000)]
    transfer_limit: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let store = Arc::new(TransactionalStore::with_data([
        ("alice".to_string(), json!(100)),
        ("bob".to_string(), json!(20)),
    ]));

    let context = build_context(&args, &store)?;
    info!("应用上下文已就绪: {}", context.id());

    let ctx = context.execution_context();
    let service = context.get_component(bank::ACCOUNT_SERVICE)?;

    match service.invoke(&ctx, "transfer", &[json!("alice"), json!("bob"), json!(args.amount)]) {
        Ok(_) => info!("转账成功: alice -> bob, {}", args.amount),
        Err(e) => warn!("转账失败: {}", e),
    }

    match service.invoke(&ctx, "transfer", &[json!("alice"), json!("carol"), json!(args.amount)]) {
        Ok(_) => info!("转账成功: alice -> carol, {}", args.amount),
        Err(e) => error!("转账失败并回滚: {}", e),
    }

    for account in ["alice", "bob"] {
        let balance = service.invoke(&ctx, "balance", &[json!(account)])?;
        info!("{} 余额: {}", account, balance);
    }

    let stats = context.stats();
    info!(
        "提交 {} 次, 回滚 {} 次, 已创建组件 {} 个",
        store.commit_count(),
        store.rollback_count(),
        stats.created_components
    );

    context.close();
    info!("应用已关闭");
    Ok(())
}

/// 装配应用上下文
fn build_context(args: &Args, store: &Arc<TransactionalStore>) -> anyhow::Result<ApplicationContext> {
    let logging = LoggingConfig::development()
        .with_level(args.log_level.clone())
        .with_format(if args.json_logs {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        });

    let mut builder = ApplicationContextBuilder::new().with_logging(logging);

    if Path::new(&args.config).exists() {
        builder = builder.with_config_file(&args.config)?;
    } else {
        builder = builder.with_env_config()?;
    }

    let context = builder
        .with_transactional_store(Arc::clone(store), bank::transaction_attributes())
        .with_tracing(TypePointcut::new("*Service"))
        .with_definitions(bank::definitions(
            TRANSACTION_STORE_COMPONENT,
            args.transfer_limit,
        ))
        .build()?;
    Ok(context)
}
