use anyhow::Context;
use order_engine::{BackgroundTasks, Config, Engine, RedbStore, setup_environment};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 环境 (dotenv, 工作目录, 日志)
    dotenv::dotenv().ok();
    let config = Config::from_env();
    setup_environment(&config).context("failed to prepare work dir")?;

    tracing::info!("🦀 Crab Order Engine starting...");

    // 2. 存储
    let db_path = config.database_path();
    let store = RedbStore::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;

    // 3. Engine + 后台任务
    let engine = Engine::new(Arc::new(store), &config)?;
    let mut tasks = BackgroundTasks::new();
    engine.start_background_tasks(&mut tasks);

    // 4. 等待退出信号
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received");

    tasks.shutdown().await;
    Ok(())
}
