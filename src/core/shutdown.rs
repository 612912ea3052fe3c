//! 优雅关闭
//!
//! Ctrl+C / SIGTERM / 控制台退出都会触发同一个 CancellationToken：
//! 各 Agent 在下一次接收事件时停止，随后在限定时间内执行清理任务（案例库落盘）。

use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::memory::CaseMemory;

/// 关闭原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Ctrl+C
    UserInitiated,
    /// SIGTERM
    Signal,
    /// 控制台输入结束或操作员输入 quit
    ConsoleClosed,
}

/// 关闭信号管理器：第一个触发的原因被保留
#[derive(Clone, Default)]
pub struct ShutdownManager {
    token: CancellationToken,
    reason: Arc<OnceLock<ShutdownReason>>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 关闭 token（子任务用 child_token 派生）
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn shutdown(&self, reason: ShutdownReason) {
        if self.reason.set(reason).is_ok() {
            tracing::info!(?reason, "shutdown requested");
        }
        self.token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        self.reason.get().copied()
    }

    pub async fn wait_for_shutdown(&self) {
        self.token.cancelled().await;
    }

    /// Ctrl+C 与 SIGTERM 都转为 shutdown
    pub fn install_signal_handlers(&self) {
        let manager = self.clone();
        tokio::spawn(async move {
            let reason = tokio::select! {
                result = tokio::signal::ctrl_c() => match result {
                    Ok(()) => ShutdownReason::UserInitiated,
                    Err(e) => {
                        tracing::warn!("cannot listen for Ctrl+C: {}", e);
                        return;
                    }
                },
                _ = terminate() => ShutdownReason::Signal,
                _ = manager.wait_for_shutdown() => return,
            };
            manager.shutdown(reason);
        });
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::warn!("cannot listen for SIGTERM: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}

/// 关闭时需要执行的清理任务
#[async_trait::async_trait]
pub trait ShutdownCleanup: Send + Sync {
    async fn cleanup(&self) -> anyhow::Result<()>;

    fn name(&self) -> &'static str;
}

/// 关闭协调器：按注册顺序执行清理任务，每个任务有超时
pub struct ShutdownCoordinator {
    cleanup_tasks: Vec<Box<dyn ShutdownCleanup>>,
    timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            cleanup_tasks: Vec::new(),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn register<T: ShutdownCleanup + 'static>(&mut self, task: T) {
        self.cleanup_tasks.push(Box::new(task));
    }

    /// 依次执行清理任务，返回失败或超时的任务名
    pub async fn run_cleanup(&self) -> Vec<&'static str> {
        let mut failed = Vec::new();
        for task in &self.cleanup_tasks {
            let name = task.name();
            match tokio::time::timeout(self.timeout, task.cleanup()).await {
                Ok(Ok(())) => tracing::debug!(task = name, "cleanup done"),
                Ok(Err(e)) => {
                    tracing::warn!(task = name, "cleanup failed: {}", e);
                    failed.push(name);
                }
                Err(_) => {
                    tracing::warn!(task = name, timeout_ms = self.timeout.as_millis() as u64, "cleanup timed out");
                    failed.push(name);
                }
            }
        }
        failed
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// 案例库落盘
pub struct CaseMemoryCleanup {
    memory: Arc<dyn CaseMemory>,
}

impl CaseMemoryCleanup {
    pub fn new(memory: Arc<dyn CaseMemory>) -> Self {
        Self { memory }
    }
}

#[async_trait::async_trait]
impl ShutdownCleanup for CaseMemoryCleanup {
    async fn cleanup(&self) -> anyhow::Result<()> {
        let memory = self.memory.clone();
        tokio::task::spawn_blocking(move || memory.flush()).await??;
        tracing::info!(records = self.memory.len(), "case memory flushed");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "case-memory"
    }
}

/// 运行主应用直到其结束或收到关闭信号，然后执行清理；返回关闭原因（应用自行结束时为 None）
pub async fn run_with_graceful_shutdown<F, Fut>(
    shutdown: &ShutdownManager,
    app: F,
    cleanup: impl FnOnce() -> Fut,
) -> Option<ShutdownReason>
where
    F: Future<Output = ()>,
    Fut: Future<Output = ()>,
{
    shutdown.install_signal_handlers();

    tokio::select! {
        _ = app => tracing::info!("operator console finished"),
        _ = shutdown.wait_for_shutdown() => {}
    }

    cleanup().await;
    shutdown.reason()
}
