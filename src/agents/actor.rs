//! Actor：逐步执行已标注的任务计划
//!
//! 领取已标注且未执行的 mission-plan，按步骤顺序向 Oracle 询问动作（附带固定动作目录），
//! 把每个合法工具调用规范化为 DroneAction 并发布 action-proposal。
//! 拒绝策略为 halt 时，每个 proposal 都等待结论，遇到第一条拒绝（或等待超时）即停止本计划；
//! 为 continue 时，发布全部 proposal 后立即结束。全部步骤处理完后标记计划已执行。

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{timeout_at, Instant};

use crate::agents::prompts::render;
use crate::agents::runner::{try_claim, Agent};
use crate::board::{
    ActionProposal, Blackboard, BoardEvent, DroneAction, Info, MessageId, MessageKind,
    MissionPlan, MissionStep, Verdict,
};
use crate::config::RejectionPolicy;
use crate::core::AgentError;
use crate::llm::{BoundedOracle, OracleRequest, Purpose};
use crate::memory::Message;
use crate::tools::{normalize, parse_invocations, ActionCatalog};

/// 等待结论的结果
#[derive(Clone, Debug, PartialEq)]
pub enum AwaitedVerdict {
    Verdict(Verdict),
    /// 超时未收到结论
    TimedOut,
    /// proposal 已不在黑板上（例如被清空）
    Gone,
}

pub struct Actor {
    oracle: BoundedOracle,
    template: String,
    catalog: ActionCatalog,
    policy: RejectionPolicy,
    verdict_timeout: Duration,
    warnings: Mutex<Vec<String>>,
}

impl Actor {
    pub const NAME: &'static str = "actor";

    pub fn new(oracle: BoundedOracle, template: impl Into<String>) -> Self {
        Self {
            oracle,
            template: template.into(),
            catalog: ActionCatalog::drone(),
            policy: RejectionPolicy::default(),
            verdict_timeout: Duration::from_secs(120),
            warnings: Mutex::new(Vec::new()),
        }
    }

    pub fn with_policy(mut self, policy: RejectionPolicy, verdict_timeout: Duration) -> Self {
        self.policy = policy;
        self.verdict_timeout = verdict_timeout;
        self
    }

    /// 被丢弃的工具调用与失败步骤的告警（最近的在后）
    pub fn warnings(&self) -> Vec<String> {
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn warn(&self, text: String) {
        tracing::warn!("{}", text);
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text);
    }

    /// 为单个步骤询问动作；未知动作与非法参数被丢弃并记录告警
    pub async fn decide(
        &self,
        step: &MissionStep,
        context: &str,
    ) -> Result<Vec<DroneAction>, AgentError> {
        let prompt = render(
            &self.template,
            &[
                ("goal", step.goal()),
                ("context", context),
                ("actions", &self.catalog.describe()),
                ("schema", &self.catalog.to_schema_json()),
            ],
        );
        let request = OracleRequest::new(Purpose::Decide, vec![Message::user(prompt)]);
        let reply = self.oracle.ask(&request).await?;
        let invocations = parse_invocations(&reply)?;
        if invocations.is_empty() {
            tracing::info!(step = step.id(), "no action chosen for step");
        }

        let mut actions = Vec::with_capacity(invocations.len());
        for invocation in &invocations {
            match normalize(invocation) {
                Ok(action) => actions.push(action),
                Err(AgentError::UnknownAction(name)) => {
                    self.warn(format!("step {}: unknown action '{}' ignored", step.id(), name));
                }
                Err(e) => {
                    self.warn(format!("step {}: {} (args: {})", step.id(), e, invocation.args));
                }
            }
        }
        Ok(actions)
    }

    /// 等待某条 proposal 的 validation-result
    pub async fn await_verdict(
        board: &Blackboard,
        proposal: MessageId,
        limit: Duration,
    ) -> AwaitedVerdict {
        let deadline = Instant::now() + limit;
        let mut revision = board.revision();
        loop {
            revision.borrow_and_update();
            let snapshot = board.snapshot();
            if let Some(result) = snapshot
                .iter()
                .filter_map(|m| m.as_validation())
                .find(|r| r.proposal == proposal)
            {
                return AwaitedVerdict::Verdict(result.verdict.clone());
            }
            if !snapshot.iter().any(|m| m.id == proposal) {
                return AwaitedVerdict::Gone;
            }
            match timeout_at(deadline, revision.changed()).await {
                Ok(Ok(())) => continue,
                Ok(Err(_)) => return AwaitedVerdict::Gone,
                Err(_) => return AwaitedVerdict::TimedOut,
            }
        }
    }

    /// 依次处理计划的全部步骤，返回发布的 proposal
    async fn run_plan(
        &self,
        board: &Blackboard,
        plan_id: MessageId,
        plan: &MissionPlan,
    ) -> Vec<MessageId> {
        let context = plan.context.clone().unwrap_or_default();
        let mut posted = Vec::new();

        for step in &plan.steps {
            let actions = match self.decide(step, &context).await {
                Ok(actions) => actions,
                Err(e) => {
                    self.warn(format!("step {}: {}", step.id(), e));
                    if self.policy == RejectionPolicy::Halt {
                        board.post(Info::new(
                            Self::NAME,
                            format!("mission halted at step {}: {}", step.id(), e),
                        ));
                        return posted;
                    }
                    continue;
                }
            };

            for action in actions {
                let id = board.post(ActionProposal {
                    plan: plan_id,
                    step: step.clone(),
                    context: plan.context.clone(),
                    action,
                });
                tracing::info!(plan = %plan_id, step = step.id(), proposal = %id, "action proposed");
                posted.push(id);

                if self.policy == RejectionPolicy::Continue {
                    continue;
                }
                let halt_reason = match Self::await_verdict(board, id, self.verdict_timeout).await
                {
                    AwaitedVerdict::Verdict(Verdict::Approved) => None,
                    AwaitedVerdict::Verdict(Verdict::Rejected(reason)) => {
                        Some(format!("rejected: {reason}"))
                    }
                    AwaitedVerdict::TimedOut => Some(format!(
                        "no verdict for {} within {}s",
                        id,
                        self.verdict_timeout.as_secs()
                    )),
                    AwaitedVerdict::Gone => Some(format!("{id} left the board")),
                };
                if let Some(reason) = halt_reason {
                    tracing::info!(plan = %plan_id, step = step.id(), "mission halted: {}", reason);
                    board.post(Info::new(
                        Self::NAME,
                        format!("mission halted at step {}: {}", step.id(), reason),
                    ));
                    return posted;
                }
            }
        }
        posted
    }

    async fn act_on(&self, board: &Blackboard, id: MessageId) -> Result<(), AgentError> {
        let Some(message) = board.get(id) else {
            return Ok(());
        };
        match message.as_mission_plan() {
            Some(plan) if plan.is_annotated() && !message.executed => {}
            _ => return Ok(()),
        }
        let Some(message) = try_claim(board, id, Self::NAME)? else {
            return Ok(());
        };
        let Some(plan) = message.as_mission_plan() else {
            return Ok(());
        };

        let posted = self.run_plan(board, id, plan).await;
        board.complete(id)?;
        tracing::info!(plan = %id, proposals = posted.len(), "mission plan dispatched");
        Ok(())
    }
}

#[async_trait]
impl Agent for Actor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn interests(&self) -> &[MessageKind] {
        &[MessageKind::MissionPlan]
    }

    async fn handle(&self, board: &Blackboard, event: &BoardEvent) -> Result<(), AgentError> {
        match event {
            BoardEvent::Posted { id, .. } | BoardEvent::Updated { id, .. } => {
                self.act_on(board, *id).await
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::agents::prompts::PromptSet;
    use crate::board::ValidationResult;
    use crate::llm::MockOracle;

    fn actor(mock: MockOracle, policy: RejectionPolicy) -> (Actor, Arc<MockOracle>) {
        let mock = Arc::new(mock);
        let oracle = BoundedOracle::new(mock.clone(), Duration::from_secs(1));
        let actor = Actor::new(oracle, PromptSet::default().navigator)
            .with_policy(policy, Duration::from_millis(200));
        (actor, mock)
    }

    fn annotated_plan(board: &Blackboard, goals: &[&str]) -> MessageId {
        let steps = goals
            .iter()
            .enumerate()
            .map(|(i, g)| MissionStep::new(i as u32 + 1, *g))
            .collect();
        let id = board.post(MissionPlan::new(steps));
        board.annotate(id, "clear sky").unwrap();
        id
    }

    fn proposals(board: &Blackboard) -> Vec<ActionProposal> {
        board
            .snapshot()
            .into_iter()
            .filter_map(|m| m.as_proposal().cloned())
            .collect()
    }

    fn updated(id: MessageId) -> BoardEvent {
        BoardEvent::Updated {
            id,
            kind: MessageKind::MissionPlan,
        }
    }

    #[tokio::test]
    async fn test_unannotated_plan_is_ignored() {
        let (actor, mock) = actor(MockOracle::new(), RejectionPolicy::Continue);
        let board = Blackboard::new();
        let id = board.post(MissionPlan::new(vec![MissionStep::new(1, "takeoff")]));
        actor.handle(&board, &updated(id)).await.unwrap();
        assert_eq!(mock.calls(Purpose::Decide), 0);
        assert!(!board.get(id).unwrap().executed);
    }

    #[tokio::test]
    async fn test_steps_proposed_in_order_with_context() {
        let mock = MockOracle::new().with_sequence(
            Purpose::Decide,
            [
                r#"{"tool": "takeoff", "args": {"altitude": 3}}"#,
                r#"[{"tool": "fly_to", "args": "5,0,0"}, {"tool": "move", "args": [0, 2, 0]}]"#,
                r#"{"tool": "land", "args": {}}"#,
            ],
        );
        let (actor, _) = actor(mock, RejectionPolicy::Continue);
        let board = Blackboard::new();
        let id = annotated_plan(&board, &["take off", "fly", "land"]);
        actor.handle(&board, &updated(id)).await.unwrap();

        let proposals = proposals(&board);
        let steps: Vec<u32> = proposals.iter().map(|p| p.step.id()).collect();
        assert_eq!(steps, vec![1, 2, 2, 3]);
        assert_eq!(proposals[0].action, DroneAction::Ascend { altitude: 3.0 });
        assert_eq!(
            proposals[1].action,
            DroneAction::Move { north: 5.0, east: 0.0, down: 0.0 }
        );
        assert!(proposals.iter().all(|p| p.context.as_deref() == Some("clear sky")));
        assert!(proposals.iter().all(|p| p.plan == id));
        assert!(board.get(id).unwrap().executed);
    }

    #[tokio::test]
    async fn test_malformed_and_unknown_actions_are_dropped() {
        let mock = MockOracle::new().with_response(
            Purpose::Decide,
            r#"[{"tool": "move", "args": "a,b,c"}, {"tool": "barrel_roll", "args": {}}]"#,
        );
        let (actor, _) = actor(mock, RejectionPolicy::Continue);
        let board = Blackboard::new();
        let id = annotated_plan(&board, &["fly north"]);
        actor.handle(&board, &updated(id)).await.unwrap();

        assert!(proposals(&board).is_empty());
        let warnings = actor.warnings();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("Invalid arguments for move"));
        assert!(warnings[1].contains("barrel_roll"));
        assert!(board.get(id).unwrap().executed);
    }

    #[tokio::test]
    async fn test_halt_stops_after_first_rejection() {
        let (actor, mock) = actor(MockOracle::new(), RejectionPolicy::Halt);
        let board = Arc::new(Blackboard::new());
        let id = annotated_plan(&board, &["take off", "take off again"]);

        // 模拟 Gatekeeper：拒绝第一条 proposal
        let mut rx = board.subscribe("fake-gatekeeper", &[MessageKind::ActionProposal]);
        let gate_board = board.clone();
        let gate = tokio::spawn(async move {
            while let Some(BoardEvent::Posted { id, .. }) = rx.recv().await {
                let proposal = gate_board.claim(id, "fake").unwrap();
                let proposal = proposal.as_proposal().unwrap().clone();
                gate_board.post(ValidationResult {
                    proposal: id,
                    step: proposal.step,
                    action: proposal.action,
                    verdict: Verdict::Rejected("unsafe".into()),
                    actuation: None,
                });
                gate_board.complete(id).unwrap();
            }
        });

        actor.handle(&board, &updated(id)).await.unwrap();
        gate.abort();

        assert_eq!(proposals(&board).len(), 1);
        assert_eq!(mock.calls(Purpose::Decide), 1);
        let info = board
            .snapshot()
            .into_iter()
            .find_map(|m| m.as_info().cloned())
            .unwrap();
        assert!(info.text.contains("mission halted at step 1"));
        assert!(info.text.contains("unsafe"));
        assert!(board.get(id).unwrap().executed);
    }

    #[tokio::test]
    async fn test_halt_times_out_without_gatekeeper() {
        let (actor, _) = actor(MockOracle::new(), RejectionPolicy::Halt);
        let board = Blackboard::new();
        let id = annotated_plan(&board, &["take off", "land"]);
        actor.handle(&board, &updated(id)).await.unwrap();
        assert_eq!(proposals(&board).len(), 1);
        assert!(board.get(id).unwrap().executed);
    }
}
