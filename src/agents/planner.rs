//! Planner：操作员指令 -> 有序任务步骤
//!
//! 每条未处理的 plan-request 被原子地领取后，连同 PlanningContext（近期步骤结论 + 相似历史任务）
//! 交给 Oracle 生成步骤列表，发布 mission-plan（context 为空）后标记请求已执行。
//! 同时订阅 validation-result，把 Gatekeeper 结论记入有界日志，作为后续规划的显式上下文。

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::agents::prompts::render;
use crate::agents::runner::{try_claim, Agent};
use crate::board::{
    Blackboard, BoardEvent, Info, MessageId, MessageKind, MissionPlan, MissionStep, Payload,
    PlanRequest, ValidationResult,
};
use crate::core::AgentError;
use crate::llm::{extract_json, BoundedOracle, OracleRequest, Purpose};
use crate::memory::{CaseMemory, Message, OutcomeLog, StepOutcome};

/// 一次规划调用的显式上下文
#[derive(Clone, Debug, Default)]
pub struct PlanningContext {
    pub history: Vec<StepOutcome>,
    pub prior_outcomes: Vec<String>,
}

impl PlanningContext {
    pub fn render_history(&self) -> String {
        if self.history.is_empty() {
            return "(none)".to_string();
        }
        self.history
            .iter()
            .map(|o| {
                let status = if o.approved { "approved" } else { "rejected" };
                format!("- {} -> {} [{}: {}]", o.goal, o.action, status, o.verdict)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn render_prior_outcomes(&self) -> String {
        if self.prior_outcomes.is_empty() {
            return "(none)".to_string();
        }
        self.prior_outcomes
            .iter()
            .enumerate()
            .map(|(i, doc)| format!("{}. {}", i + 1, doc.replace('\n', " | ")))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub struct Planner {
    oracle: BoundedOracle,
    template: String,
    outcomes: Mutex<OutcomeLog>,
    case_memory: Option<Arc<dyn CaseMemory>>,
    top_k: usize,
}

impl Planner {
    pub const NAME: &'static str = "planner";

    pub fn new(oracle: BoundedOracle, template: impl Into<String>, history_turns: usize) -> Self {
        Self {
            oracle,
            template: template.into(),
            outcomes: Mutex::new(OutcomeLog::new(history_turns)),
            case_memory: None,
            top_k: 3,
        }
    }

    pub fn with_case_memory(mut self, memory: Arc<dyn CaseMemory>, top_k: usize) -> Self {
        self.case_memory = Some(memory);
        self.top_k = top_k;
        self
    }

    /// 发布一条操作员指令
    pub fn submit(board: &Blackboard, operator_text: impl Into<String>) -> MessageId {
        let id = board.post(PlanRequest {
            operator_text: operator_text.into(),
        });
        tracing::info!(%id, "plan request submitted");
        id
    }

    /// 当前的规划上下文（近期结论 + 相似历史任务）
    pub fn planning_context(&self, instruction: &str) -> PlanningContext {
        let history = self
            .outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries()
            .to_vec();
        let prior_outcomes = self
            .case_memory
            .as_ref()
            .map(|m| m.search(instruction, self.top_k))
            .unwrap_or_default();
        PlanningContext {
            history,
            prior_outcomes,
        }
    }

    /// 调用 Oracle 生成步骤
    pub async fn plan(
        &self,
        instruction: &str,
        context: &PlanningContext,
    ) -> Result<Vec<MissionStep>, AgentError> {
        let prompt = render(
            &self.template,
            &[
                ("instruction", instruction),
                ("history", &context.render_history()),
                ("prior_outcomes", &context.render_prior_outcomes()),
            ],
        );
        let request = OracleRequest::new(Purpose::Plan, vec![Message::user(prompt)]);
        let reply = self.oracle.ask(&request).await?;
        Ok(parse_plan(&reply))
    }

    /// 记录一条结论；结论来自事件负载，黑板已被归档清空时同样有效
    fn record_outcome(&self, result: &ValidationResult) {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(StepOutcome::from(result));
    }

    pub fn outcomes(&self) -> Vec<StepOutcome> {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries()
            .to_vec()
    }

    async fn handle_request(&self, board: &Blackboard, id: MessageId) -> Result<(), AgentError> {
        let Some(message) = try_claim(board, id, Self::NAME)? else {
            return Ok(());
        };
        let Some(request) = message.as_plan_request() else {
            return Ok(());
        };
        let instruction = request.operator_text.clone();
        let context = self.planning_context(&instruction);

        match self.plan(&instruction, &context).await {
            Ok(steps) => {
                // 先发布计划再结束请求：已执行的请求旁边没有计划即表示规划失败
                let step_count = steps.len();
                let plan_id = board.post(MissionPlan::new(steps));
                board.complete(id)?;
                tracing::info!(request = %id, plan = %plan_id, steps = step_count, "mission planned");
                Ok(())
            }
            Err(e) => {
                board.post(Info::new(Self::NAME, format!("planning failed: {e}")));
                board.complete(id)?;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl Agent for Planner {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn interests(&self) -> &[MessageKind] {
        &[MessageKind::PlanRequest, MessageKind::ValidationResult]
    }

    async fn handle(&self, board: &Blackboard, event: &BoardEvent) -> Result<(), AgentError> {
        match event {
            BoardEvent::Posted {
                id,
                kind: MessageKind::PlanRequest,
                ..
            } => self.handle_request(board, *id).await,
            BoardEvent::Posted { payload, .. } => {
                if let Payload::ValidationResult(result) = payload.as_ref() {
                    self.record_outcome(result);
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// 解析 Oracle 返回的步骤列表；无法解析时整段文本作为唯一步骤
pub fn parse_plan(reply: &str) -> Vec<MissionStep> {
    match try_parse_steps(reply) {
        Some(steps) if !steps.is_empty() => steps,
        _ => {
            tracing::warn!("plan reply is not a step list, using raw text as a single step");
            vec![MissionStep::new(1, reply.trim())]
        }
    }
}

fn try_parse_steps(reply: &str) -> Option<Vec<MissionStep>> {
    let json = extract_json(reply)?;
    let value: Value = serde_json::from_str(json).ok()?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("steps") {
            Some(Value::Array(items)) => items,
            _ => return None,
        },
        _ => return None,
    };
    items
        .iter()
        .enumerate()
        .map(|(index, item)| parse_step(index, item))
        .collect()
}

fn parse_step(index: usize, item: &Value) -> Option<MissionStep> {
    let position = u32::try_from(index + 1).ok()?;
    match item {
        Value::String(goal) => Some(MissionStep::new(position, goal.trim())),
        Value::Object(map) => {
            let goal = ["goal", "cel", "step", "description"]
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str))?;
            let id = map
                .get("id")
                .and_then(|v| match v {
                    Value::Number(n) => n.as_u64(),
                    Value::String(s) => s.trim().parse().ok(),
                    _ => None,
                })
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(position);
            Some(MissionStep::new(id, goal.trim()))
        }
        _ => None,
    }
}
