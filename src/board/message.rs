//! 黑板消息分类
//!
//! 每种 kind 对应一个强类型 payload（封闭的 tagged union），构造时即完成校验，
//! 各 Agent 访问时无需再猜测字段。序列化为 `{"kind": "mission-plan", ...}`，归档历史可直接阅读。

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 黑板内的消息编号（单调递增，仅在本进程内有效）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(u64);

impl MessageId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 消息类型标签（封闭集合）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageKind {
    PlanRequest,
    MissionPlan,
    ActionProposal,
    ValidationResult,
    Info,
}

impl MessageKind {
    pub const ALL: [MessageKind; 5] = [
        MessageKind::PlanRequest,
        MessageKind::MissionPlan,
        MessageKind::ActionProposal,
        MessageKind::ValidationResult,
        MessageKind::Info,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::PlanRequest => "plan-request",
            MessageKind::MissionPlan => "mission-plan",
            MessageKind::ActionProposal => "action-proposal",
            MessageKind::ValidationResult => "validation-result",
            MessageKind::Info => "info",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 任务步骤：创建后不可变，由 mission-plan 持有，顺序即执行顺序
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionStep {
    id: u32,
    goal: String,
}

impl MissionStep {
    pub fn new(id: u32, goal: impl Into<String>) -> Self {
        Self {
            id,
            goal: goal.into(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }
}

impl fmt::Display for MissionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. {}", self.id, self.goal)
    }
}

/// 操作员指令，等待 Planner 拆解
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub operator_text: String,
}

/// 任务计划：有序步骤 + 一次性写入的场景标注
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MissionPlan {
    pub steps: Vec<MissionStep>,
    /// 场景标注，整个计划共享；只能从 None 变为 Some 一次
    pub context: Option<String>,
}

impl MissionPlan {
    pub fn new(steps: Vec<MissionStep>) -> Self {
        Self {
            steps,
            context: None,
        }
    }

    pub fn is_annotated(&self) -> bool {
        self.context.is_some()
    }
}

/// 规范化后的无人机动作（参数已校验）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "parameters", rename_all = "snake_case")]
pub enum DroneAction {
    /// 起飞并爬升到指定高度（米，> 0）
    Ascend { altitude: f64 },
    /// 相对当前位置移动（米，NED 坐标）
    Move { north: f64, east: f64, down: f64 },
    /// 下降并降落
    Land,
}

impl DroneAction {
    pub fn name(&self) -> &'static str {
        match self {
            DroneAction::Ascend { .. } => "ascend",
            DroneAction::Move { .. } => "move",
            DroneAction::Land => "land",
        }
    }

    /// 动作参数元组；land 无参数
    pub fn parameters(&self) -> Option<Vec<f64>> {
        match self {
            DroneAction::Ascend { altitude } => Some(vec![*altitude]),
            DroneAction::Move { north, east, down } => Some(vec![*north, *east, *down]),
            DroneAction::Land => None,
        }
    }
}

impl fmt::Display for DroneAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DroneAction::Ascend { altitude } => write!(f, "ascend(altitude={altitude})"),
            DroneAction::Move { north, east, down } => {
                write!(f, "move(north={north}, east={east}, down={down})")
            }
            DroneAction::Land => f.write_str("land()"),
        }
    }
}

/// 某一步骤的候选动作，等待 Gatekeeper 校验
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionProposal {
    /// 来源 mission-plan
    pub plan: MessageId,
    pub step: MissionStep,
    pub context: Option<String>,
    pub action: DroneAction,
}

/// 校验结论：字面量 "approved" 为批准，其余文本均为拒绝理由
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Verdict {
    Approved,
    Rejected(String),
}

impl Verdict {
    pub const APPROVED: &'static str = "approved";

    pub fn is_approved(&self) -> bool {
        matches!(self, Verdict::Approved)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Verdict::Approved => Self::APPROVED,
            Verdict::Rejected(reason) => reason,
        }
    }
}

impl From<String> for Verdict {
    fn from(s: String) -> Self {
        if s == Self::APPROVED {
            Verdict::Approved
        } else {
            Verdict::Rejected(s)
        }
    }
}

impl From<Verdict> for String {
    fn from(v: Verdict) -> Self {
        match v {
            Verdict::Approved => Verdict::APPROVED.to_string(),
            Verdict::Rejected(reason) => reason,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gatekeeper 对一条 proposal 的唯一结论
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// 对应的 action-proposal
    pub proposal: MessageId,
    pub step: MissionStep,
    pub action: DroneAction,
    pub verdict: Verdict,
    /// Actuator 执行结果（仅批准时存在）
    pub actuation: Option<Actuation>,
}

/// 一次 Actuator 调用的结果；失败也以文本形式记录，不向上传播
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actuation {
    pub ok: bool,
    pub detail: String,
}

impl Actuation {
    pub fn succeeded(detail: impl Into<String>) -> Self {
        Self {
            ok: true,
            detail: detail.into(),
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Actuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ok {
            f.write_str(&self.detail)
        } else {
            write!(f, "failed: {}", self.detail)
        }
    }
}

/// 面向操作员的状态/告警
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Info {
    pub source: String,
    pub text: String,
}

impl Info {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }
}

/// 消息负载：每个 kind 一个变体
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Payload {
    PlanRequest(PlanRequest),
    MissionPlan(MissionPlan),
    ActionProposal(ActionProposal),
    ValidationResult(ValidationResult),
    Info(Info),
}

impl Payload {
    pub fn kind(&self) -> MessageKind {
        match self {
            Payload::PlanRequest(_) => MessageKind::PlanRequest,
            Payload::MissionPlan(_) => MessageKind::MissionPlan,
            Payload::ActionProposal(_) => MessageKind::ActionProposal,
            Payload::ValidationResult(_) => MessageKind::ValidationResult,
            Payload::Info(_) => MessageKind::Info,
        }
    }
}

impl From<PlanRequest> for Payload {
    fn from(p: PlanRequest) -> Self {
        Payload::PlanRequest(p)
    }
}

impl From<MissionPlan> for Payload {
    fn from(p: MissionPlan) -> Self {
        Payload::MissionPlan(p)
    }
}

impl From<ActionProposal> for Payload {
    fn from(p: ActionProposal) -> Self {
        Payload::ActionProposal(p)
    }
}

impl From<ValidationResult> for Payload {
    fn from(p: ValidationResult) -> Self {
        Payload::ValidationResult(p)
    }
}

impl From<Info> for Payload {
    fn from(p: Info) -> Self {
        Payload::Info(p)
    }
}

/// 黑板快照中的一条消息（副本，不随黑板变化）
#[derive(Clone, Debug, Serialize)]
pub struct Message {
    pub id: MessageId,
    #[serde(flatten)]
    pub payload: Payload,
    /// 终态处理已完成；只会从 false 变为 true
    pub executed: bool,
    /// 已被 Archivist 归档
    pub logged: bool,
    /// 当前持有处理权的 Agent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<String>,
    pub posted_at: DateTime<Utc>,
}

impl Message {
    /// 以「新发布」事件的形式重放该消息（订阅前已存在的消息）
    pub fn posted_event(&self) -> crate::board::BoardEvent {
        crate::board::BoardEvent::posted(self.id, self.payload.clone())
    }

    pub fn kind(&self) -> MessageKind {
        self.payload.kind()
    }

    pub fn as_plan_request(&self) -> Option<&PlanRequest> {
        match &self.payload {
            Payload::PlanRequest(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_mission_plan(&self) -> Option<&MissionPlan> {
        match &self.payload {
            Payload::MissionPlan(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_proposal(&self) -> Option<&ActionProposal> {
        match &self.payload {
            Payload::ActionProposal(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_validation(&self) -> Option<&ValidationResult> {
        match &self.payload {
            Payload::ValidationResult(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_info(&self) -> Option<&Info> {
        match &self.payload {
            Payload::Info(p) => Some(p),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_literal_approved_only() {
        assert!(Verdict::from("approved".to_string()).is_approved());
        assert!(!Verdict::from("Approved".to_string()).is_approved());
        assert_eq!(
            Verdict::from("unsafe".to_string()),
            Verdict::Rejected("unsafe".into())
        );
        assert_eq!(String::from(Verdict::Approved), "approved");
    }

    #[test]
    fn test_action_parameters() {
        assert_eq!(
            DroneAction::Ascend { altitude: 2.0 }.parameters(),
            Some(vec![2.0])
        );
        assert_eq!(
            DroneAction::Move {
                north: 5.0,
                east: 0.0,
                down: -1.0
            }
            .parameters(),
            Some(vec![5.0, 0.0, -1.0])
        );
        assert_eq!(DroneAction::Land.parameters(), None);
        assert_eq!(DroneAction::Land.name(), "land");
    }

    #[test]
    fn test_payload_serializes_with_kind_tag() {
        let payload = Payload::from(MissionPlan::new(vec![MissionStep::new(1, "takeoff")]));
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["kind"], "mission-plan");
        assert_eq!(json["steps"][0]["goal"], "takeoff");
        assert!(json["context"].is_null());
    }

    #[test]
    fn test_validation_result_verdict_serializes_as_text() {
        let result = ValidationResult {
            proposal: MessageId::new(3),
            step: MissionStep::new(1, "land"),
            action: DroneAction::Land,
            verdict: Verdict::Rejected("too windy".into()),
            actuation: None,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["verdict"], "too windy");
        assert_eq!(json["proposal"], 3);
        assert_eq!(json["action"]["action"], "land");
    }
}
