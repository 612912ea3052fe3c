//! 五个协作 Agent 与通用运行循环

pub mod actor;
pub mod annotator;
pub mod archivist;
pub mod gatekeeper;
pub mod planner;
pub mod prompts;
pub mod runner;

pub use actor::{Actor, AwaitedVerdict};
pub use annotator::Annotator;
pub use archivist::{Archivist, MissionSummary, OutcomeJudge, PolicyJudge};
pub use gatekeeper::{interpret_verdict, Gatekeeper};
pub use planner::{parse_plan, Planner, PlanningContext};
pub use prompts::{render, PromptSet};
pub use runner::{run_agent, try_claim, Agent};
