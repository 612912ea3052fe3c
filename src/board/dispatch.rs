//! 事件分发：按消息 kind 把黑板变更路由到各 Agent 的入站队列
//!
//! 每个订阅者持有一个 mpsc 接收端，只收到其关心的 kind；Cleared 事件广播给所有人。
//! 接收端被丢弃的订阅者在下一次分发时自动移除。

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;

use crate::board::{MessageId, MessageKind, Payload};

/// 黑板变更事件
#[derive(Clone, Debug, PartialEq)]
pub enum BoardEvent {
    /// 新消息；携带发布时的负载，消息被归档移除后订阅者仍能读到
    Posted {
        id: MessageId,
        kind: MessageKind,
        payload: Arc<Payload>,
    },
    Updated { id: MessageId, kind: MessageKind },
    Removed { id: MessageId, kind: MessageKind },
    Cleared { removed: usize },
}

impl BoardEvent {
    pub fn posted(id: MessageId, payload: impl Into<Payload>) -> Self {
        let payload = payload.into();
        BoardEvent::Posted {
            id,
            kind: payload.kind(),
            payload: Arc::new(payload),
        }
    }

    pub fn id(&self) -> Option<MessageId> {
        match self {
            BoardEvent::Posted { id, .. }
            | BoardEvent::Updated { id, .. }
            | BoardEvent::Removed { id, .. } => Some(*id),
            BoardEvent::Cleared { .. } => None,
        }
    }

    pub fn kind(&self) -> Option<MessageKind> {
        match self {
            BoardEvent::Posted { kind, .. }
            | BoardEvent::Updated { kind, .. }
            | BoardEvent::Removed { kind, .. } => Some(*kind),
            BoardEvent::Cleared { .. } => None,
        }
    }
}

struct Subscriber {
    name: String,
    kinds: HashSet<MessageKind>,
    tx: mpsc::UnboundedSender<BoardEvent>,
}

impl Subscriber {
    fn wants(&self, event: &BoardEvent) -> bool {
        match event.kind() {
            Some(kind) => self.kinds.contains(&kind),
            None => true,
        }
    }
}

/// 订阅表
#[derive(Default)]
pub struct Dispatcher {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &self,
        name: impl Into<String>,
        kinds: &[MessageKind],
    ) -> mpsc::UnboundedReceiver<BoardEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let name = name.into();
        tracing::debug!(subscriber = %name, ?kinds, "board subscription");
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscriber {
                name,
                kinds: kinds.iter().copied().collect(),
                tx,
            });
        rx
    }

    /// 投递事件；发送失败（接收端已关闭）的订阅者被移除
    pub fn dispatch(&self, event: &BoardEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|sub| {
            if !sub.wants(event) {
                return !sub.tx.is_closed();
            }
            match sub.tx.send(event.clone()) {
                Ok(()) => true,
                Err(_) => {
                    tracing::debug!(subscriber = %sub.name, "dropping closed subscription");
                    false
                }
            }
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Info, MissionPlan};

    #[test]
    fn test_routes_by_kind() {
        let dispatcher = Dispatcher::new();
        let mut plans = dispatcher.subscribe("plans", &[MessageKind::MissionPlan]);
        let mut proposals = dispatcher.subscribe("proposals", &[MessageKind::ActionProposal]);

        let event = BoardEvent::posted(MessageId::new(1), MissionPlan::new(Vec::new()));
        dispatcher.dispatch(&event);

        assert_eq!(plans.try_recv().unwrap(), event);
        assert!(proposals.try_recv().is_err());
    }

    #[test]
    fn test_cleared_reaches_everyone() {
        let dispatcher = Dispatcher::new();
        let mut a = dispatcher.subscribe("a", &[MessageKind::Info]);
        let mut b = dispatcher.subscribe("b", &[]);
        dispatcher.dispatch(&BoardEvent::Cleared { removed: 3 });
        assert_eq!(a.try_recv().unwrap(), BoardEvent::Cleared { removed: 3 });
        assert_eq!(b.try_recv().unwrap(), BoardEvent::Cleared { removed: 3 });
    }

    #[test]
    fn test_closed_subscriber_pruned() {
        let dispatcher = Dispatcher::new();
        let rx = dispatcher.subscribe("gone", &[MessageKind::Info]);
        let _keep = dispatcher.subscribe("kept", &[MessageKind::Info]);
        drop(rx);
        dispatcher.dispatch(&BoardEvent::posted(MessageId::new(1), Info::new("t", "x")));
        assert_eq!(dispatcher.subscriber_count(), 1);
    }
}
