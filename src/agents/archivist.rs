//! Archivist：任务结束检测、成败判定、写入案例库并重置黑板
//!
//! 任务结束条件：没有未执行的 plan-request、mission-plan 与 proposal，且至少有一个 mission-plan；
//! 或者请求已执行却没有计划（规划失败），此时直接按失败归档。
//! 满足时取快照生成摘要，交给 OutcomeJudge（操作员或策略）判定成败，写入 Case Memory，
//! 标记消息已归档后从黑板移除快照中的消息。判定期间新提交的消息保留在黑板上。

use std::sync::Arc;

use async_trait::async_trait;

use crate::agents::runner::Agent;
use crate::board::{
    Blackboard, BoardEvent, Message, MessageId, MessageKind, MissionStep, ValidationResult,
};
use crate::core::AgentError;
use crate::memory::CaseMemory;

/// 任务摘要（来自归档前的黑板快照）
#[derive(Clone, Debug, Default)]
pub struct MissionSummary {
    pub instructions: Vec<String>,
    /// 快照中存在 mission-plan（false 表示规划失败）
    pub planned: bool,
    pub steps: Vec<MissionStep>,
    pub context: Option<String>,
    pub proposals: usize,
    pub results: Vec<ValidationResult>,
    pub notes: Vec<String>,
}

impl MissionSummary {
    pub fn from_snapshot(messages: &[Message]) -> Self {
        let mut summary = Self::default();
        for message in messages {
            if let Some(request) = message.as_plan_request() {
                summary.instructions.push(request.operator_text.clone());
            } else if let Some(plan) = message.as_mission_plan() {
                summary.planned = true;
                summary.steps.extend(plan.steps.iter().cloned());
                if summary.context.is_none() {
                    summary.context = plan.context.clone();
                }
            } else if message.as_proposal().is_some() {
                summary.proposals += 1;
            } else if let Some(result) = message.as_validation() {
                summary.results.push(result.clone());
            } else if let Some(info) = message.as_info() {
                summary.notes.push(format!("{}: {}", info.source, info.text));
            }
        }
        summary
    }

    pub fn all_approved(&self) -> bool {
        self.results.iter().all(|r| r.verdict.is_approved())
    }

    pub fn actuation_failures(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(&r.actuation, Some(a) if !a.ok))
            .count()
    }

    /// 写入案例库的可检索文本
    pub fn to_text(&self) -> String {
        let mut lines = Vec::new();
        lines.push(format!("Instruction: {}", self.instructions.join(" / ")));
        if let Some(context) = &self.context {
            lines.push(format!("Context: {context}"));
        }
        for step in &self.steps {
            lines.push(format!("Step {}: {}", step.id(), step.goal()));
        }
        for result in &self.results {
            let actuation = result
                .actuation
                .as_ref()
                .map(|a| format!(" => {a}"))
                .unwrap_or_default();
            lines.push(format!(
                "Step {} {} -> {}{}",
                result.step.id(),
                result.action,
                result.verdict,
                actuation
            ));
        }
        lines.extend(self.notes.iter().cloned());
        lines.join("\n")
    }
}

/// 任务成败判定
#[async_trait]
pub trait OutcomeJudge: Send + Sync {
    async fn judge(&self, summary: &MissionSummary) -> bool;
}

/// 策略判定：至少有一条结论，全部批准，且 Actuator 没有失败
pub struct PolicyJudge;

#[async_trait]
impl OutcomeJudge for PolicyJudge {
    async fn judge(&self, summary: &MissionSummary) -> bool {
        !summary.results.is_empty() && summary.all_approved() && summary.actuation_failures() == 0
    }
}

pub struct Archivist {
    case_memory: Arc<dyn CaseMemory>,
    judge: Arc<dyn OutcomeJudge>,
}

impl Archivist {
    pub const NAME: &'static str = "archivist";

    pub fn new(case_memory: Arc<dyn CaseMemory>, judge: Arc<dyn OutcomeJudge>) -> Self {
        Self { case_memory, judge }
    }

    /// 快照是否代表一个已结束的任务（包括规划失败的任务）
    ///
    /// Planner 先发布计划再结束请求，所以「请求已执行而没有计划」只会出现在规划失败之后。
    pub fn is_mission_complete(messages: &[Message]) -> bool {
        let mut started = false;
        for message in messages {
            match message.kind() {
                MessageKind::PlanRequest | MessageKind::MissionPlan | MessageKind::ActionProposal => {
                    if !message.executed {
                        return false;
                    }
                    started = true;
                }
                _ => {}
            }
        }
        started
    }

    async fn archive(&self, board: &Blackboard, snapshot: Vec<Message>) -> Result<(), AgentError> {
        let summary = MissionSummary::from_snapshot(&snapshot);
        let success = if summary.planned {
            self.judge.judge(&summary).await
        } else {
            tracing::info!("planning failed, archiving mission as failed");
            false
        };
        let ids: Vec<MessageId> = snapshot.iter().map(|m| m.id).collect();

        // 文件案例库的写入是阻塞 I/O，不在 Agent 任务上执行
        let memory = self.case_memory.clone();
        let text = summary.to_text();
        let stored = tokio::task::spawn_blocking(move || {
            memory.record_outcome(success, &text, &snapshot)
        })
        .await
        .unwrap_or_else(|e| Err(AgentError::CaseMemoryError(format!("store task failed: {e}"))));

        board.mark_logged(&ids);
        let removed = board.retire(&ids);
        match stored {
            Ok(record) => {
                tracing::info!(
                    record = %record.id,
                    success,
                    messages = removed,
                    remaining = board.len(),
                    "mission archived"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(success, messages = removed, "mission not recorded: {}", e);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl Agent for Archivist {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn interests(&self) -> &[MessageKind] {
        &[
            MessageKind::PlanRequest,
            MessageKind::MissionPlan,
            MessageKind::ActionProposal,
            MessageKind::ValidationResult,
        ]
    }

    async fn handle(&self, board: &Blackboard, event: &BoardEvent) -> Result<(), AgentError> {
        if !matches!(event, BoardEvent::Posted { .. } | BoardEvent::Updated { .. }) {
            return Ok(());
        }
        let snapshot = board.snapshot();
        if !Self::is_mission_complete(&snapshot) {
            return Ok(());
        }
        self.archive(board, snapshot).await
    }
}
