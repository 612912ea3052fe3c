//! Agent 错误类型
//!
//! 每条消息的处理失败都被隔离在该消息内：Worker 循环记录 AgentError 后继续处理下一条事件。

use std::time::Duration;

use thiserror::Error;

use crate::board::BoardError;

/// Agent 处理消息过程中可能出现的错误（Oracle、解析、参数、黑板状态等）
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Oracle timeout after {}ms", .0.as_millis())]
    OracleTimeout(Duration),

    #[error("Oracle error: {0}")]
    OracleError(String),

    #[error("JSON parse error: {0}")]
    JsonParseError(String),

    #[error("Invalid arguments for {action}: {reason}")]
    InvalidArguments { action: String, reason: String },

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error(transparent)]
    Board(#[from] BoardError),

    #[error("Camera error: {0}")]
    CameraError(String),

    #[error("Case memory error: {0}")]
    CaseMemoryError(String),

    #[error("Config error: {0}")]
    ConfigError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{MessageId, MessageKind};

    #[test]
    fn test_sub_second_timeout_display() {
        let err = AgentError::OracleTimeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "Oracle timeout after 250ms");
    }

    #[test]
    fn test_error_display() {
        let err = AgentError::InvalidArguments {
            action: "move".into(),
            reason: "north must be a number".into(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid arguments for move: north must be a number"
        );
        let err = AgentError::from(BoardError::UnexpectedKind {
            id: MessageId::new(7),
            expected: MessageKind::MissionPlan,
            actual: MessageKind::Info,
        });
        assert_eq!(err.to_string(), "Message #7 is info, expected mission-plan");
    }
}
