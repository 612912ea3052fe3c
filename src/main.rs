//! Skyhive - Rust 多智能体无人机任务系统
//!
//! 入口：初始化日志、加载配置、启动 Agent 组与操作员控制台，直到退出或收到关闭信号。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use skyhive::config::{load_config, AppConfig, Judgement};
use skyhive::core::{
    run_with_graceful_shutdown, CaseMemoryCleanup, CrewBuilder, ShutdownCoordinator,
    ShutdownManager, ShutdownReason,
};
use skyhive::observability;
use skyhive::operator::{run_console, spawn_status_printer, OperatorJudge};
use tokio::io::BufReader;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    let shutdown = ShutdownManager::new();
    let (judge, queries) = OperatorJudge::channel();
    let mut builder = CrewBuilder::new(cfg.clone()).with_cancel_token(shutdown.token());
    if cfg.mission.judgement == Judgement::Operator {
        builder = builder.with_judge(Arc::new(judge));
    }
    let crew = builder.start().context("Failed to start agents")?;
    let board = crew.board().clone();
    let printer = spawn_status_printer(board.clone(), shutdown.token());

    let mut coordinator = ShutdownCoordinator::new();
    coordinator.register(CaseMemoryCleanup::new(crew.case_memory().clone()));

    let console_shutdown = shutdown.clone();
    let console_cancel = shutdown.token();
    let app = async move {
        let stdin = BufReader::new(tokio::io::stdin());
        if let Err(e) = run_console(board, stdin, tokio::io::stdout(), queries, console_cancel).await {
            tracing::error!("console failed: {}", e);
        }
        console_shutdown.shutdown(ShutdownReason::ConsoleClosed);
    };

    let stopper = shutdown.clone();
    let reason = run_with_graceful_shutdown(&shutdown, app, || async move {
        stopper.shutdown(ShutdownReason::ConsoleClosed);
        crew.shutdown().await;
        let _ = printer.await;
        let failed = coordinator.run_cleanup().await;
        if !failed.is_empty() {
            tracing::error!(tasks = ?failed, "some cleanup tasks did not finish");
        }
    })
    .await;
    tracing::info!(?reason, "skyhive stopped");

    Ok(())
}
