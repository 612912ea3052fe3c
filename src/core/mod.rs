//! 核心编排层：错误类型、任务阶段投影、Crew 构建与运行、优雅关闭

pub mod builder;
pub mod error;
pub mod orchestrator;
pub mod shutdown;
pub mod state;

pub use builder::CrewBuilder;
pub use error::AgentError;
pub use orchestrator::{create_oracle_from_config, Crew};
pub use shutdown::{
    run_with_graceful_shutdown, CaseMemoryCleanup, ShutdownCleanup, ShutdownCoordinator,
    ShutdownManager, ShutdownReason,
};
pub use state::MissionPhase;
