//! 黑板层：消息分类、索引化存储与按 kind 分发的事件队列

pub mod dispatch;
pub mod message;
pub mod store;

pub use dispatch::{BoardEvent, Dispatcher};
pub use message::{
    ActionProposal, Actuation, DroneAction, Info, Message, MessageId, MessageKind, MissionPlan, MissionStep,
    Payload, PlanRequest, ValidationResult, Verdict,
};
pub use store::{Blackboard, BoardError};
