//! Blackboard：所有 Agent 共享的消息存储
//!
//! 索引化存储（MessageId -> Entry），所有读写经同一把互斥锁串行化，快照不会撕裂。
//! `claim` 在锁内完成「检查未执行且未被占用 -> 标记占用」，消除快照后再处理的双消费竞争。
//! 每次变更在锁内通过 Dispatcher 发出事件，保证单个订阅者看到的事件顺序与提交顺序一致。

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{mpsc, watch};

use crate::board::{BoardEvent, Dispatcher, Message, MessageId, MessageKind, Payload};

/// 黑板状态错误（消息不存在、类型不符、重复标注、已被占用）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    #[error("Message {0} not found on board")]
    NotFound(MessageId),

    #[error("Message {id} is {actual}, expected {expected}")]
    UnexpectedKind {
        id: MessageId,
        expected: MessageKind,
        actual: MessageKind,
    },

    #[error("Mission plan {0} already annotated")]
    AlreadyAnnotated(MessageId),

    #[error("Message {0} already executed")]
    AlreadyExecuted(MessageId),

    #[error("Message {id} already claimed by {by}")]
    AlreadyClaimed { id: MessageId, by: String },
}

struct Entry {
    payload: Payload,
    executed: bool,
    logged: bool,
    claimed_by: Option<String>,
    posted_at: DateTime<Utc>,
}

impl Entry {
    fn to_message(&self, id: MessageId) -> Message {
        Message {
            id,
            payload: self.payload.clone(),
            executed: self.executed,
            logged: self.logged,
            claimed_by: self.claimed_by.clone(),
            posted_at: self.posted_at,
        }
    }
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    entries: BTreeMap<MessageId, Entry>,
}

/// 共享黑板（通常以 Arc<Blackboard> 在各 Agent 间共享）
pub struct Blackboard {
    inner: Mutex<Inner>,
    dispatcher: Dispatcher,
    revision: watch::Sender<u64>,
}

impl Default for Blackboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Blackboard {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Mutex::new(Inner::default()),
            dispatcher: Dispatcher::new(),
            revision,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 在持锁状态下发出事件并推进 revision
    fn emit(&self, event: BoardEvent) {
        self.dispatcher.dispatch(&event);
        self.revision.send_modify(|rev| *rev += 1);
    }

    /// 追加一条消息，返回其编号
    pub fn post(&self, payload: impl Into<Payload>) -> MessageId {
        let payload = payload.into();
        let kind = payload.kind();
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = MessageId::new(inner.next_id);
        inner.entries.insert(
            id,
            Entry {
                payload: payload.clone(),
                executed: false,
                logged: false,
                claimed_by: None,
                posted_at: Utc::now(),
            },
        );
        tracing::debug!(%id, %kind, "posted");
        self.emit(BoardEvent::Posted {
            id,
            kind,
            payload: Arc::new(payload),
        });
        id
    }

    /// 当前全部消息的时间点副本（按编号即提交顺序排列）
    pub fn snapshot(&self) -> Vec<Message> {
        let inner = self.lock();
        inner
            .entries
            .iter()
            .map(|(id, entry)| entry.to_message(*id))
            .collect()
    }

    pub fn get(&self, id: MessageId) -> Option<Message> {
        self.lock().entries.get(&id).map(|e| e.to_message(id))
    }

    pub fn remove(&self, id: MessageId) -> Option<Message> {
        let mut inner = self.lock();
        let entry = inner.entries.remove(&id)?;
        let message = entry.to_message(id);
        self.emit(BoardEvent::Removed {
            id,
            kind: message.kind(),
        });
        Some(message)
    }

    /// 在同一把锁内移除给定的消息，返回实际移除条数；其余消息（如归档期间新提交的指令）保持不动
    pub fn retire(&self, ids: &[MessageId]) -> usize {
        let mut inner = self.lock();
        let mut removed = 0;
        for id in ids {
            if let Some(entry) = inner.entries.remove(id) {
                removed += 1;
                self.emit(BoardEvent::Removed {
                    id: *id,
                    kind: entry.payload.kind(),
                });
            }
        }
        removed
    }

    /// 原子清空，返回移除条数
    pub fn clear(&self) -> usize {
        let mut inner = self.lock();
        let removed = inner.entries.len();
        inner.entries.clear();
        self.emit(BoardEvent::Cleared { removed });
        removed
    }

    /// 原子地取得消息处理权：消息存在、未执行、未被占用时标记为 claimant 所有并返回副本
    pub fn claim(&self, id: MessageId, claimant: &str) -> Result<Message, BoardError> {
        let mut inner = self.lock();
        let entry = inner.entries.get_mut(&id).ok_or(BoardError::NotFound(id))?;
        if entry.executed {
            return Err(BoardError::AlreadyExecuted(id));
        }
        if let Some(by) = &entry.claimed_by {
            return Err(BoardError::AlreadyClaimed { id, by: by.clone() });
        }
        entry.claimed_by = Some(claimant.to_string());
        tracing::debug!(%id, claimant, "claimed");
        Ok(entry.to_message(id))
    }

    /// 放弃处理权但不改变 executed（用于只改写内容、不终结消息的处理者）
    pub fn release(&self, id: MessageId) -> Result<(), BoardError> {
        let mut inner = self.lock();
        let entry = inner.entries.get_mut(&id).ok_or(BoardError::NotFound(id))?;
        if entry.claimed_by.take().is_some() {
            let kind = entry.payload.kind();
            self.emit(BoardEvent::Updated { id, kind });
        }
        Ok(())
    }

    /// 标记终态处理完成并释放占用；executed 只会从 false 变为 true
    pub fn complete(&self, id: MessageId) -> Result<(), BoardError> {
        let mut inner = self.lock();
        let entry = inner.entries.get_mut(&id).ok_or(BoardError::NotFound(id))?;
        entry.executed = true;
        entry.claimed_by = None;
        let kind = entry.payload.kind();
        self.emit(BoardEvent::Updated { id, kind });
        Ok(())
    }

    /// 为 mission-plan 写入场景标注；已有标注时返回 AlreadyAnnotated 且不修改
    pub fn annotate(&self, id: MessageId, context: impl Into<String>) -> Result<(), BoardError> {
        let mut inner = self.lock();
        let entry = inner.entries.get_mut(&id).ok_or(BoardError::NotFound(id))?;
        let plan = match &mut entry.payload {
            Payload::MissionPlan(plan) => plan,
            other => {
                return Err(BoardError::UnexpectedKind {
                    id,
                    expected: MessageKind::MissionPlan,
                    actual: other.kind(),
                })
            }
        };
        if plan.context.is_some() {
            return Err(BoardError::AlreadyAnnotated(id));
        }
        plan.context = Some(context.into());
        self.emit(BoardEvent::Updated {
            id,
            kind: MessageKind::MissionPlan,
        });
        Ok(())
    }

    /// 标记已归档；返回实际更新条数
    pub fn mark_logged(&self, ids: &[MessageId]) -> usize {
        let mut inner = self.lock();
        let mut updated = 0;
        for id in ids {
            if let Some(entry) = inner.entries.get_mut(id) {
                if !entry.logged {
                    entry.logged = true;
                    updated += 1;
                }
            }
        }
        updated
    }

    /// 订阅指定 kind 的变更事件
    pub fn subscribe(
        &self,
        name: impl Into<String>,
        kinds: &[MessageKind],
    ) -> mpsc::UnboundedReceiver<BoardEvent> {
        self.dispatcher.subscribe(name, kinds)
    }

    /// 每次变更递增的版本号，供需要「等待某条件成立」的调用方使用
    pub fn revision(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Info, MissionPlan, MissionStep, PlanRequest};

    fn plan() -> MissionPlan {
        MissionPlan::new(vec![MissionStep::new(1, "takeoff")])
    }

    #[test]
    fn test_post_and_snapshot_in_order() {
        let board = Blackboard::new();
        let a = board.post(PlanRequest {
            operator_text: "fly".into(),
        });
        let b = board.post(plan());
        let snapshot = board.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].id, a);
        assert_eq!(snapshot[1].id, b);
        assert_eq!(snapshot[1].kind(), MessageKind::MissionPlan);
        assert!(!snapshot[0].executed);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let board = Blackboard::new();
        board.post(Info::new("test", "hello"));
        let snapshot = board.snapshot();
        board.clear();
        assert_eq!(snapshot.len(), 1);
        assert!(board.is_empty());
    }

    #[test]
    fn test_claim_is_exclusive() {
        let board = Blackboard::new();
        let id = board.post(plan());
        assert!(board.claim(id, "gatekeeper-1").is_ok());
        assert_eq!(
            board.claim(id, "gatekeeper-2").unwrap_err(),
            BoardError::AlreadyClaimed {
                id,
                by: "gatekeeper-1".into()
            }
        );
        board.complete(id).unwrap();
        assert_eq!(
            board.claim(id, "gatekeeper-2").unwrap_err(),
            BoardError::AlreadyExecuted(id)
        );
    }

    #[test]
    fn test_concurrent_claims_single_winner() {
        let board = Arc::new(Blackboard::new());
        let id = board.post(plan());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let board = Arc::clone(&board);
                std::thread::spawn(move || board.claim(id, &format!("worker-{i}")).is_ok())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_release_allows_reclaim() {
        let board = Blackboard::new();
        let id = board.post(plan());
        board.claim(id, "annotator").unwrap();
        board.release(id).unwrap();
        let msg = board.claim(id, "actor").unwrap();
        assert_eq!(msg.claimed_by.as_deref(), Some("actor"));
        assert!(!msg.executed);
    }

    #[test]
    fn test_annotate_only_once() {
        let board = Blackboard::new();
        let id = board.post(plan());
        board.annotate(id, "open field ahead").unwrap();
        assert_eq!(
            board.annotate(id, "something else").unwrap_err(),
            BoardError::AlreadyAnnotated(id)
        );
        let message = board.get(id).unwrap();
        assert_eq!(
            message.as_mission_plan().unwrap().context.as_deref(),
            Some("open field ahead")
        );
    }

    #[test]
    fn test_annotate_rejects_wrong_kind() {
        let board = Blackboard::new();
        let id = board.post(Info::new("test", "x"));
        assert!(matches!(
            board.annotate(id, "ctx"),
            Err(BoardError::UnexpectedKind { .. })
        ));
    }

    #[test]
    fn test_complete_is_monotonic() {
        let board = Blackboard::new();
        let id = board.post(plan());
        board.complete(id).unwrap();
        board.complete(id).unwrap();
        assert!(board.get(id).unwrap().executed);
    }

    #[test]
    fn test_remove_and_clear() {
        let board = Blackboard::new();
        let a = board.post(plan());
        board.post(plan());
        assert!(board.remove(a).is_some());
        assert!(board.remove(a).is_none());
        assert_eq!(board.len(), 1);
        assert_eq!(board.clear(), 1);
        assert!(board.snapshot().is_empty());
    }

    #[test]
    fn test_mark_logged() {
        let board = Blackboard::new();
        let a = board.post(plan());
        let b = board.post(plan());
        assert_eq!(board.mark_logged(&[a, b, MessageId::new(99)]), 2);
        assert_eq!(board.mark_logged(&[a]), 0);
        assert!(board.get(b).unwrap().logged);
    }

    #[test]
    fn test_events_routed_to_subscribers() {
        let board = Blackboard::new();
        let mut rx = board.subscribe("annotator", &[MessageKind::MissionPlan]);
        board.post(Info::new("test", "ignored"));
        let id = board.post(plan());
        board.annotate(id, "ctx").unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            BoardEvent::posted(id, plan())
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            BoardEvent::Updated {
                id,
                kind: MessageKind::MissionPlan
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_revision_advances() {
        let board = Blackboard::new();
        let rx = board.revision();
        let before = *rx.borrow();
        board.post(plan());
        assert!(*rx.borrow() > before);
    }

    #[test]
    fn test_retire_keeps_messages_posted_later() {
        let board = Blackboard::new();
        let old = board.post(PlanRequest {
            operator_text: "old".into(),
        });
        let note = board.post(Info::new("planner", "done"));
        let ids = [old, note];
        let fresh = board.post(PlanRequest {
            operator_text: "fresh".into(),
        });

        let mut rx = board.subscribe("watcher", &[MessageKind::PlanRequest]);
        assert_eq!(board.retire(&ids), 2);
        assert_eq!(board.retire(&ids), 0);
        let left = board.snapshot();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, fresh);
        assert_eq!(
            rx.try_recv().unwrap(),
            BoardEvent::Removed {
                id: old,
                kind: MessageKind::PlanRequest
            }
        );
        assert!(rx.try_recv().is_err());
    }
}
