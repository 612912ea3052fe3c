//! 任务阶段：从黑板快照推导出的投影
//!
//! 阶段不单独存储，任何时刻都可由快照重新计算，供控制台与测试观察任务进度。

use serde::Serialize;

use crate::board::{Message, MessageKind};

/// 当前任务所处阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionPhase {
    /// 黑板为空或只剩告警
    Idle,
    /// 有未处理的 plan-request
    Planning,
    /// 计划等待场景标注
    Annotating,
    /// 计划已标注，正在逐步提出动作
    Acting,
    /// 计划已执行，仍有 proposal 等待结论
    Validating,
    /// 全部处理完毕，等待归档
    Archiving,
}

impl MissionPhase {
    pub fn from_snapshot(messages: &[Message]) -> Self {
        let pending = |kind: MessageKind| {
            messages
                .iter()
                .any(|m| m.kind() == kind && !m.executed)
        };
        if pending(MessageKind::PlanRequest) {
            return MissionPhase::Planning;
        }
        let plans: Vec<_> = messages
            .iter()
            .filter_map(|m| m.as_mission_plan().map(|p| (m.executed, p.is_annotated())))
            .collect();
        if plans.is_empty() {
            return MissionPhase::Idle;
        }
        if plans.iter().any(|(executed, annotated)| !executed && !annotated) {
            return MissionPhase::Annotating;
        }
        if plans.iter().any(|(executed, _)| !executed) {
            return MissionPhase::Acting;
        }
        if pending(MessageKind::ActionProposal) {
            return MissionPhase::Validating;
        }
        MissionPhase::Archiving
    }
}

impl std::fmt::Display for MissionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MissionPhase::Idle => "idle",
            MissionPhase::Planning => "planning",
            MissionPhase::Annotating => "annotating",
            MissionPhase::Acting => "acting",
            MissionPhase::Validating => "validating",
            MissionPhase::Archiving => "archiving",
        };
        f.write_str(s)
    }
}
