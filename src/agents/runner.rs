//! Agent 运行循环
//!
//! 每个 Agent 只声明关心的消息 kind 与单条事件的处理逻辑；`run_agent` 负责订阅、
//! 补处理订阅前已存在的消息、按事件驱动调用 handle，并把单条消息的错误隔离在该消息内。

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::board::{Blackboard, BoardError, BoardEvent, Message, MessageId, MessageKind};
use crate::core::AgentError;

#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    /// 关心的消息 kind（决定入站队列收到哪些事件）
    fn interests(&self) -> &[MessageKind];

    /// 处理一个事件；返回错误只会被记录，不会终止循环
    async fn handle(&self, board: &Blackboard, event: &BoardEvent) -> Result<(), AgentError>;
}

/// 运行 Agent 直到取消
pub async fn run_agent(agent: Arc<dyn Agent>, board: Arc<Blackboard>, cancel: CancellationToken) {
    let name = agent.name().to_string();
    // 先订阅再补快照：订阅之后的变更一定会进入队列，重复事件由各 handle 幂等处理
    let mut rx = board.subscribe(name.clone(), agent.interests());
    tracing::info!(agent = %name, "agent started");

    let backlog: Vec<BoardEvent> = board
        .snapshot()
        .into_iter()
        .filter(|m| agent.interests().contains(&m.kind()))
        .map(|m| m.posted_event())
        .collect();
    for event in backlog {
        if !dispatch_one(agent.as_ref(), &board, &event, &cancel).await {
            tracing::info!(agent = %name, "agent stopped");
            return;
        }
    }

    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };
        if !dispatch_one(agent.as_ref(), &board, &event, &cancel).await {
            break;
        }
    }
    tracing::info!(agent = %name, "agent stopped");
}

/// 处理单个事件；返回 false 表示已取消
async fn dispatch_one(
    agent: &dyn Agent,
    board: &Blackboard,
    event: &BoardEvent,
    cancel: &CancellationToken,
) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        result = agent.handle(board, event) => {
            if let Err(e) = result {
                match event.id() {
                    Some(id) => tracing::warn!(agent = agent.name(), %id, "handling failed: {}", e),
                    None => tracing::warn!(agent = agent.name(), "handling failed: {}", e),
                }
            }
            true
        }
    }
}

/// 尝试取得处理权；消息已被他人处理、正在处理或已不存在时返回 None
pub fn try_claim(
    board: &Blackboard,
    id: MessageId,
    claimant: &str,
) -> Result<Option<Message>, AgentError> {
    match board.claim(id, claimant) {
        Ok(message) => Ok(Some(message)),
        Err(BoardError::AlreadyClaimed { .. })
        | Err(BoardError::AlreadyExecuted(_))
        | Err(BoardError::NotFound(_)) => {
            tracing::trace!(%id, claimant, "claim skipped");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}
