//! 操作员通道
//!
//! 控制台读取操作员输入：普通文本作为新指令提交；Archivist 询问任务成败时，下一行输入作为回答。
//! 成败询问经 mpsc + oneshot 传到控制台循环，避免多个任务同时读 stdin。

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::agents::{MissionSummary, OutcomeJudge, Planner, PolicyJudge};
use crate::board::{Blackboard, BoardEvent, MessageKind, Payload};
use crate::core::MissionPhase;

/// 一次成败询问
#[derive(Debug)]
pub struct OperatorQuery {
    pub summary: String,
    pub reply: oneshot::Sender<bool>,
}

/// 由操作员判定成败；控制台不可用时回落到策略判定
pub struct OperatorJudge {
    queries: mpsc::UnboundedSender<OperatorQuery>,
}

impl OperatorJudge {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OperatorQuery>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { queries: tx }, rx)
    }
}

#[async_trait]
impl OutcomeJudge for OperatorJudge {
    async fn judge(&self, summary: &MissionSummary) -> bool {
        let (reply, answer) = oneshot::channel();
        let query = OperatorQuery {
            summary: summary.to_text(),
            reply,
        };
        if self.queries.send(query).is_err() {
            tracing::warn!("operator console unavailable, judging mission by policy");
            return PolicyJudge.judge(summary).await;
        }
        match answer.await {
            Ok(success) => success,
            Err(_) => {
                tracing::warn!("operator query dropped, judging mission by policy");
                PolicyJudge.judge(summary).await
            }
        }
    }
}

/// yes/no（以及 tak/nie）回答
pub fn parse_answer(line: &str) -> Option<bool> {
    match line.trim().to_lowercase().as_str() {
        "y" | "yes" | "t" | "tak" | "true" | "1" => Some(true),
        "n" | "no" | "nie" | "false" | "0" => Some(false),
        _ => None,
    }
}

/// 控制台主循环：输入结束、输入 quit/exit 或取消时返回
pub async fn run_console<R, W>(
    board: Arc<Blackboard>,
    input: R,
    mut output: W,
    mut queries: mpsc::UnboundedReceiver<OperatorQuery>,
    cancel: CancellationToken,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut pending: Option<OperatorQuery> = None;
    output
        .write_all(b"Enter a mission instruction (quit to exit):\n")
        .await?;
    output.flush().await?;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            Some(query) = queries.recv(), if pending.is_none() => {
                let prompt = format!(
                    "\n--- mission finished ---\n{}\nDid the mission succeed? [yes/no]\n",
                    query.summary
                );
                output.write_all(prompt.as_bytes()).await?;
                output.flush().await?;
                pending = Some(query);
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if let Some(query) = pending.take() {
                    match parse_answer(line) {
                        Some(success) => {
                            let _ = query.reply.send(success);
                            output.write_all(b"Recorded.\n").await?;
                        }
                        None => {
                            output.write_all(b"Please answer yes or no.\n").await?;
                            pending = Some(query);
                        }
                    }
                } else if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
                    break;
                } else if line.eq_ignore_ascii_case("status") {
                    let phase = MissionPhase::from_snapshot(&board.snapshot());
                    output
                        .write_all(format!("Mission phase: {phase} ({} messages)\n", board.len()).as_bytes())
                        .await?;
                } else if !line.is_empty() {
                    let id = Planner::submit(&board, line);
                    output.write_all(format!("Submitted {id}\n").as_bytes()).await?;
                }
                output.flush().await?;
            }
        }
    }
    Ok(())
}

/// 把面向操作员的黑板变更打印到 stdout
pub fn spawn_status_printer(
    board: Arc<Blackboard>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let mut rx = board.subscribe(
        "operator-status",
        &[
            MessageKind::MissionPlan,
            MessageKind::ValidationResult,
            MessageKind::Info,
        ],
    );
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            if let Some(line) = status_line(&event) {
                println!("{line}");
            }
        }
    })
}

fn status_line(event: &BoardEvent) -> Option<String> {
    let BoardEvent::Posted { id, payload, .. } = event else {
        return None;
    };
    match payload.as_ref() {
        Payload::MissionPlan(plan) => {
            let steps = plan
                .steps
                .iter()
                .map(|s| format!("  {}. {}", s.id(), s.goal()))
                .collect::<Vec<_>>()
                .join("\n");
            Some(format!("[plan {id}]\n{steps}"))
        }
        Payload::ValidationResult(result) => {
            let actuation = result
                .actuation
                .as_ref()
                .map(|a| format!(" ({a})"))
                .unwrap_or_default();
            Some(format!(
                "[step {}] {} -> {}{}",
                result.step.id(),
                result.action,
                result.verdict,
                actuation
            ))
        }
        Payload::Info(info) => Some(format!("[{}] {}", info.source, info.text)),
        _ => None,
    }
}
