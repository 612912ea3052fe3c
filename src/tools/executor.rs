//! 动作执行器
//!
//! 持有 Actuator 与全局超时，execute(action) 在超时内调用 Actuator；
//! 成功、失败与超时都转为 Actuation 文本结果，每次调用输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::actuator::Actuator;
use crate::board::{Actuation, DroneAction};

/// 动作执行器：对每次调用施加超时，结果从不作为错误向上传播
#[derive(Clone)]
pub struct ActionExecutor {
    actuator: Arc<dyn Actuator>,
    timeout: Duration,
}

impl ActionExecutor {
    pub fn new(actuator: Arc<dyn Actuator>, timeout: Duration) -> Self {
        Self { actuator, timeout }
    }

    /// 执行已批准的动作；输出 JSON 审计日志
    pub async fn execute(&self, action: &DroneAction) -> Actuation {
        let start = Instant::now();
        let result = timeout(self.timeout, self.actuator.execute(action)).await;

        let outcome = match &result {
            Ok(Ok(_)) => "ok",
            Ok(Err(_)) => "error",
            Err(_) => "timeout",
        };
        let duration_ms = start.elapsed().as_millis() as u64;
        let audit = serde_json::json!({
            "event": "actuator_audit",
            "action": action.name(),
            "ok": outcome == "ok",
            "outcome": outcome,
            "duration_ms": duration_ms,
            "parameters": parameters_preview(action),
        });
        tracing::info!(audit = %audit.to_string(), "actuator");

        match result {
            Ok(Ok(text)) => Actuation::succeeded(text),
            Ok(Err(text)) => Actuation::failed(text),
            Err(_) => Actuation::failed(format!(
                "{} timed out after {}ms",
                action.name(),
                self.timeout.as_millis()
            )),
        }
    }
}

fn parameters_preview(action: &DroneAction) -> String {
    match action.parameters() {
        Some(params) => params
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(","),
        None => String::new(),
    }
}
