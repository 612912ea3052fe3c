//! 记忆层：Oracle 消息、Planner 结论日志、任务案例库与持久化

pub mod case_memory;
pub mod conversation;
pub mod outcome_log;
pub mod persistence;

pub use case_memory::{CaseMemory, CaseRecord, InMemoryCaseMemory};
pub use conversation::{Message, Role};
pub use outcome_log::{OutcomeLog, StepOutcome};
pub use persistence::FileCaseMemory;
