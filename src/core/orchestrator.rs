//! 编排器：创建 Oracle 后端，运行五类 Agent，并对外暴露任务提交与关闭
//!
//! Crew 由 CrewBuilder 启动；每个 Agent 是一个独立的 tokio 任务，共享同一块黑板，
//! 全部持有同一 CancellationToken 的子 token。

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::agents::{Actor, Planner};
use crate::board::{Blackboard, MessageId};
use crate::config::AppConfig;
use crate::core::MissionPhase;
use crate::llm::{create_deepseek_oracle, MockOracle, OpenAiOracle, Oracle};
use crate::memory::CaseMemory;

/// 根据配置与环境变量选择 Oracle 后端（DeepSeek / OpenAI 兼容 / Mock）
pub fn create_oracle_from_config(cfg: &AppConfig) -> Arc<dyn Oracle> {
    let provider = cfg.llm.provider.to_lowercase();
    if provider == "mock" {
        tracing::info!("Using Mock oracle");
        return Arc::new(MockOracle::new());
    }

    let use_deepseek = provider == "deepseek"
        && (std::env::var("DEEPSEEK_API_KEY").is_ok() || std::env::var("OPENAI_API_KEY").is_ok());
    let use_openai = provider != "deepseek" && std::env::var("OPENAI_API_KEY").is_ok();

    if use_deepseek {
        tracing::info!("Using DeepSeek oracle ({})", cfg.llm.model);
        Arc::new(create_deepseek_oracle(Some(&cfg.llm.model)))
    } else if use_openai {
        tracing::info!(
            "Using OpenAI-compatible oracle ({}, vision: {})",
            cfg.llm.model,
            cfg.llm.vision_model.as_deref().unwrap_or(&cfg.llm.model)
        );
        Arc::new(OpenAiOracle::new(
            cfg.llm.base_url.as_deref(),
            &cfg.llm.model,
            cfg.llm.vision_model.as_deref(),
            None,
        ))
    } else {
        tracing::warn!("No API key set or provider unknown, using Mock oracle");
        Arc::new(MockOracle::new())
    }
}

/// 运行中的 Agent 组
pub struct Crew {
    pub(crate) board: Arc<Blackboard>,
    pub(crate) actor: Arc<Actor>,
    pub(crate) planner: Arc<Planner>,
    pub(crate) case_memory: Arc<dyn CaseMemory>,
    pub(crate) cancel: CancellationToken,
    pub(crate) tasks: Vec<(String, JoinHandle<()>)>,
}

impl Crew {
    /// 提交操作员指令
    pub fn submit(&self, operator_text: impl Into<String>) -> MessageId {
        Planner::submit(&self.board, operator_text)
    }

    pub fn board(&self) -> &Arc<Blackboard> {
        &self.board
    }

    pub fn case_memory(&self) -> &Arc<dyn CaseMemory> {
        &self.case_memory
    }

    pub fn phase(&self) -> MissionPhase {
        MissionPhase::from_snapshot(&self.board.snapshot())
    }

    /// Actor 丢弃的工具调用告警
    pub fn warnings(&self) -> Vec<String> {
        self.actor.warnings()
    }

    pub fn agent_names(&self) -> Vec<&str> {
        self.tasks.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// 等待黑板满足条件（每次变更后检查一次）
    pub async fn wait_until<F>(&self, limit: Duration, mut condition: F) -> bool
    where
        F: FnMut(&Blackboard) -> bool,
    {
        let mut revision = self.board.revision();
        let wait = async {
            loop {
                revision.borrow_and_update();
                if condition(&self.board) {
                    return true;
                }
                if revision.changed().await.is_err() {
                    return false;
                }
            }
        };
        tokio::time::timeout(limit, wait).await.unwrap_or(false)
    }

    /// 停止全部 Agent 并等待其退出（案例库落盘由 CaseMemoryCleanup 负责）
    pub async fn shutdown(self) {
        let outcomes = self.planner.outcomes().len();
        self.cancel.cancel();
        for (name, task) in self.tasks {
            if let Err(e) = task.await {
                tracing::warn!(agent = %name, "agent task ended abnormally: {}", e);
            }
        }
        tracing::info!(outcomes, "crew stopped");
    }
}
