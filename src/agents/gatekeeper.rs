//! Gatekeeper：proposal 与执行之间的安全闸门
//!
//! 原子领取 action-proposal，请 Oracle 对照步骤目标与场景标注校验；只有整段回复为 "approved"/"OK"
//! 才转发给 Actuator。无论批准与否都先发布唯一的 validation-result，再标记 proposal 已执行。
//! 多个 Gatekeeper 可以并行运行，领取保证每条 proposal 只被校验一次。

use async_trait::async_trait;

use crate::agents::prompts::render;
use crate::agents::runner::{try_claim, Agent};
use crate::board::{
    ActionProposal, Blackboard, BoardEvent, MessageId, MessageKind, ValidationResult, Verdict,
};
use crate::core::AgentError;
use crate::llm::{BoundedOracle, OracleRequest, Purpose};
use crate::memory::Message;
use crate::tools::ActionExecutor;

pub struct Gatekeeper {
    name: String,
    oracle: BoundedOracle,
    template: String,
    executor: ActionExecutor,
}

impl Gatekeeper {
    pub fn new(
        name: impl Into<String>,
        oracle: BoundedOracle,
        template: impl Into<String>,
        executor: ActionExecutor,
    ) -> Self {
        Self {
            name: name.into(),
            oracle,
            template: template.into(),
            executor,
        }
    }

    /// 请 Oracle 校验；Oracle 失败视为拒绝
    pub async fn validate(&self, proposal: &ActionProposal) -> Verdict {
        let parameters = proposal
            .action
            .parameters()
            .map(|p| format!("{p:?}"))
            .unwrap_or_else(|| "none".to_string());
        let prompt = render(
            &self.template,
            &[
                ("goal", proposal.step.goal()),
                ("context", proposal.context.as_deref().unwrap_or("none")),
                ("action", proposal.action.name()),
                ("parameters", &parameters),
            ],
        );
        let request = OracleRequest::new(Purpose::Validate, vec![Message::user(prompt)]);
        match self.oracle.ask(&request).await {
            Ok(reply) => interpret_verdict(&reply),
            Err(e) => Verdict::Rejected(format!("validation unavailable: {e}")),
        }
    }

    async fn gate(&self, board: &Blackboard, id: MessageId) -> Result<(), AgentError> {
        let Some(message) = try_claim(board, id, &self.name)? else {
            return Ok(());
        };
        let Some(proposal) = message.as_proposal() else {
            return Ok(());
        };

        let verdict = self.validate(proposal).await;
        let actuation = if verdict.is_approved() {
            Some(self.executor.execute(&proposal.action).await)
        } else {
            None
        };
        tracing::info!(
            gatekeeper = %self.name,
            proposal = %id,
            action = %proposal.action,
            verdict = %verdict,
            "proposal validated"
        );

        board.post(ValidationResult {
            proposal: id,
            step: proposal.step.clone(),
            action: proposal.action.clone(),
            verdict,
            actuation,
        });
        board.complete(id)?;
        Ok(())
    }
}

#[async_trait]
impl Agent for Gatekeeper {
    fn name(&self) -> &str {
        &self.name
    }

    fn interests(&self) -> &[MessageKind] {
        &[MessageKind::ActionProposal]
    }

    async fn handle(&self, board: &Blackboard, event: &BoardEvent) -> Result<(), AgentError> {
        match event {
            BoardEvent::Posted { id, .. } => self.gate(board, *id).await,
            _ => Ok(()),
        }
    }
}

/// 整段回复为 "approved" 或 "OK"（不区分大小写，可带句号）即批准，其余文本原样作为拒绝理由
pub fn interpret_verdict(reply: &str) -> Verdict {
    let trimmed = reply.trim();
    let word = trimmed.trim_end_matches('.').trim().trim_matches(|c| c == '\'' || c == '"');
    if word.eq_ignore_ascii_case(Verdict::APPROVED) || word.eq_ignore_ascii_case("ok") {
        Verdict::Approved
    } else if trimmed.is_empty() {
        Verdict::Rejected("empty validation reply".to_string())
    } else {
        Verdict::Rejected(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::actuator::RecordingActuator;
    use crate::agents::prompts::PromptSet;
    use crate::board::{DroneAction, MissionStep};
    use crate::llm::MockOracle;

    fn gatekeeper(mock: MockOracle, actuator: Arc<RecordingActuator>) -> Gatekeeper {
        let oracle = BoundedOracle::new(Arc::new(mock), Duration::from_millis(200));
        let executor = ActionExecutor::new(actuator, Duration::from_secs(1));
        Gatekeeper::new("gatekeeper-1", oracle, PromptSet::default().guardian, executor)
    }

    fn propose(board: &Blackboard, action: DroneAction) -> MessageId {
        board.post(ActionProposal {
            plan: MessageId::new(1),
            step: MissionStep::new(1, "fly north"),
            context: Some("open field".into()),
            action,
        })
    }

    fn results(board: &Blackboard) -> Vec<ValidationResult> {
        board
            .snapshot()
            .into_iter()
            .filter_map(|m| m.as_validation().cloned())
            .collect()
    }

    #[test]
    fn test_interpret_verdict() {
        assert_eq!(interpret_verdict("approved"), Verdict::Approved);
        assert_eq!(interpret_verdict("  OK.\n"), Verdict::Approved);
        assert_eq!(interpret_verdict("'Approved'"), Verdict::Approved);
        assert_eq!(
            interpret_verdict("Not OK: tree ahead"),
            Verdict::Rejected("Not OK: tree ahead".into())
        );
        assert_eq!(
            interpret_verdict("approved, but slowly"),
            Verdict::Rejected("approved, but slowly".into())
        );
        assert!(!interpret_verdict("").is_approved());
    }

    #[tokio::test]
    async fn test_approved_proposal_is_actuated() {
        let actuator = Arc::new(RecordingActuator::new());
        let gate = gatekeeper(MockOracle::new(), actuator.clone());
        let board = Blackboard::new();
        let id = propose(&board, DroneAction::Move { north: 5.0, east: 0.0, down: 0.0 });
        gate.handle(&board, &board.get(id).unwrap().posted_event())
            .await
            .unwrap();

        let results = results(&board);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].verdict.as_str(), "approved");
        assert!(results[0].actuation.as_ref().unwrap().ok);
        assert_eq!(actuator.move_calls(), 1);
        assert!(board.get(id).unwrap().executed);
    }

    #[tokio::test]
    async fn test_rejection_is_recorded_verbatim_and_not_actuated() {
        let actuator = Arc::new(RecordingActuator::new());
        let gate = gatekeeper(
            MockOracle::new().with_response(Purpose::Validate, "unsafe"),
            actuator.clone(),
        );
        let board = Blackboard::new();
        let id = propose(&board, DroneAction::Move { north: 5.0, east: 0.0, down: 0.0 });
        gate.handle(&board, &board.get(id).unwrap().posted_event())
            .await
            .unwrap();

        let results = results(&board);
        assert_eq!(results[0].verdict, Verdict::Rejected("unsafe".into()));
        assert!(results[0].actuation.is_none());
        assert!(actuator.calls().is_empty());
        assert!(board.get(id).unwrap().executed);
    }

    #[tokio::test]
    async fn test_oracle_timeout_is_a_rejection() {
        let actuator = Arc::new(RecordingActuator::new());
        let gate = gatekeeper(
            MockOracle::new().with_delay(Duration::from_secs(2)),
            actuator.clone(),
        );
        let board = Blackboard::new();
        let id = propose(&board, DroneAction::Land);
        gate.handle(&board, &board.get(id).unwrap().posted_event())
            .await
            .unwrap();

        let results = results(&board);
        assert!(results[0].verdict.as_str().contains("timeout"));
        assert!(actuator.calls().is_empty());
    }

    #[tokio::test]
    async fn test_actuator_failure_still_completes() {
        let actuator = Arc::new(RecordingActuator::new().failing("link lost"));
        let gate = gatekeeper(MockOracle::new(), actuator);
        let board = Blackboard::new();
        let id = propose(&board, DroneAction::Land);
        gate.handle(&board, &board.get(id).unwrap().posted_event())
            .await
            .unwrap();

        let results = results(&board);
        assert!(results[0].verdict.is_approved());
        let actuation = results[0].actuation.clone().unwrap();
        assert!(!actuation.ok);
        assert!(actuation.detail.contains("link lost"));
        assert!(board.get(id).unwrap().executed);
    }
}
