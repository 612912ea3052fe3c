//! Skyhive - Rust 多智能体无人机任务系统
//!
//! 模块划分：
//! - **board**: 黑板（消息分类、原子领取、按 kind 分发的事件队列）
//! - **agents**: Planner、Annotator、Actor、Gatekeeper、Archivist 与通用运行循环
//! - **actuator**: 无人机控制服务与相机帧来源
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、任务阶段、Crew 构建与运行、优雅关闭
//! - **llm**: Oracle 抽象与实现（OpenAI 兼容 / DeepSeek / Mock）
//! - **memory**: Oracle 消息、步骤结论日志、任务案例库与持久化
//! - **operator**: 操作员控制台
//! - **tools**: 工具调用解析、动作目录与执行器

pub mod actuator;
pub mod agents;
pub mod board;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod operator;
pub mod tools;
