//! 记录调用的 Actuator（测试与 dry-run 使用）

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::actuator::Actuator;
use crate::board::DroneAction;

/// 记录每次命令，按配置返回成功或失败文本
#[derive(Default)]
pub struct RecordingActuator {
    calls: Mutex<Vec<DroneAction>>,
    failure: Option<String>,
    delay: Option<Duration>,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 每次命令都返回该失败文本
    pub fn failing(mut self, reason: impl Into<String>) -> Self {
        self.failure = Some(reason.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<DroneAction> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// move 命令次数
    pub fn move_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|a| matches!(a, DroneAction::Move { .. }))
            .count()
    }

    async fn record(&self, action: DroneAction) -> Result<String, String> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let text = action.to_string();
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(action);
        match &self.failure {
            Some(reason) => Err(format!("{text} failed: {reason}")),
            None => Ok(format!("{text} done")),
        }
    }
}

#[async_trait]
impl Actuator for RecordingActuator {
    async fn ascend(&self, altitude: f64) -> Result<String, String> {
        self.record(DroneAction::Ascend { altitude }).await
    }

    async fn move_by(&self, north: f64, east: f64, down: f64) -> Result<String, String> {
        self.record(DroneAction::Move { north, east, down }).await
    }

    async fn land(&self) -> Result<String, String> {
        self.record(DroneAction::Land).await
    }
}
