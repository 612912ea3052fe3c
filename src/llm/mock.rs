//! Mock Oracle（用于测试与无 API Key 的本地运行）
//!
//! 按 Purpose 返回脚本化回复：可设置固定回复、一次性回复序列、失败与延迟，并记录所有请求。

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::{Oracle, OracleRequest, Purpose};

#[derive(Clone, Debug)]
enum Script {
    Reply(String),
    Fail(String),
}

/// Mock Oracle：默认规划一步起飞、场景空旷、选择 ascend、校验通过
pub struct MockOracle {
    sticky: Mutex<HashMap<Purpose, Script>>,
    queued: Mutex<HashMap<Purpose, VecDeque<Script>>>,
    delay: Option<Duration>,
    requests: Mutex<Vec<OracleRequest>>,
}

impl Default for MockOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl MockOracle {
    pub fn new() -> Self {
        let sticky = HashMap::from([
            (
                Purpose::Plan,
                Script::Reply(r#"[{"id": 1, "goal": "takeoff"}]"#.to_string()),
            ),
            (
                Purpose::Describe,
                Script::Reply("Open area straight ahead, no obstacles nearby.".to_string()),
            ),
            (
                Purpose::Decide,
                Script::Reply(r#"{"tool": "ascend", "args": {"altitude": 2.0}}"#.to_string()),
            ),
            (Purpose::Validate, Script::Reply("approved".to_string())),
        ]);
        Self {
            sticky: Mutex::new(sticky),
            queued: Mutex::new(HashMap::new()),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// 设置某一 Purpose 的固定回复
    pub fn with_response(self, purpose: Purpose, reply: impl Into<String>) -> Self {
        self.sticky
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(purpose, Script::Reply(reply.into()));
        self
    }

    /// 追加一次性回复，按顺序消费，用完后回落到固定回复
    pub fn with_sequence<I, S>(self, purpose: Purpose, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.queued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(purpose)
            .or_default()
            .extend(replies.into_iter().map(|r| Script::Reply(r.into())));
        self
    }

    /// 某一 Purpose 始终返回错误
    pub fn failing(self, purpose: Purpose, error: impl Into<String>) -> Self {
        self.sticky
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(purpose, Script::Fail(error.into()));
        self
    }

    /// 追加一次性错误，消费后回落到固定回复
    pub fn failing_once(self, purpose: Purpose, error: impl Into<String>) -> Self {
        self.queued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(purpose)
            .or_default()
            .push_back(Script::Fail(error.into()));
        self
    }

    /// 每次回复前等待
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// 某一 Purpose 被调用的次数
    pub fn calls(&self, purpose: Purpose) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.purpose == purpose)
            .count()
    }

    pub fn requests(&self) -> Vec<OracleRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn next_script(&self, purpose: Purpose) -> Script {
        let queued = self
            .queued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&purpose)
            .and_then(|q| q.pop_front());
        queued.unwrap_or_else(|| {
            self.sticky
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&purpose)
                .cloned()
                .unwrap_or_else(|| Script::Reply(String::new()))
        })
    }
}

#[async_trait]
impl Oracle for MockOracle {
    async fn complete(&self, request: &OracleRequest) -> Result<String, String> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.next_script(request.purpose) {
            Script::Reply(text) => Ok(text),
            Script::Fail(err) => Err(err),
        }
    }
}
