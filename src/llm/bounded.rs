//! 带超时的 Oracle 包装
//!
//! 每次外部调用都有上限；超时映射为 AgentError::OracleTimeout，后端错误映射为 OracleError，
//! 由调用方决定降级（Planner/Annotator）或视为拒绝（Gatekeeper）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::core::AgentError;
use crate::llm::{Oracle, OracleRequest};

#[derive(Clone)]
pub struct BoundedOracle {
    inner: Arc<dyn Oracle>,
    timeout: Duration,
}

impl BoundedOracle {
    pub fn new(inner: Arc<dyn Oracle>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub async fn ask(&self, request: &OracleRequest) -> Result<String, AgentError> {
        let start = Instant::now();
        let result = timeout(self.timeout, self.inner.complete(request)).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        match result {
            Ok(Ok(text)) => {
                tracing::debug!(purpose = ?request.purpose, elapsed_ms, "oracle replied");
                Ok(text)
            }
            Ok(Err(e)) => {
                tracing::warn!(purpose = ?request.purpose, elapsed_ms, "oracle error: {}", e);
                Err(AgentError::OracleError(e))
            }
            Err(_) => {
                tracing::warn!(purpose = ?request.purpose, timeout_ms = self.timeout.as_millis() as u64, "oracle timed out");
                Err(AgentError::OracleTimeout(self.timeout))
            }
        }
    }

    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.inner.token_usage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockOracle, Purpose};
    use crate::memory::Message;

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let mock = MockOracle::new().with_delay(Duration::from_millis(200));
        let oracle = BoundedOracle::new(Arc::new(mock), Duration::from_millis(20));
        let request = OracleRequest::new(Purpose::Validate, vec![Message::user("x")]);
        let err = oracle.ask(&request).await.unwrap_err();
        assert!(matches!(err, AgentError::OracleTimeout(t) if t == Duration::from_millis(20)));
        assert_eq!(err.to_string(), "Oracle timeout after 20ms");
    }

    #[tokio::test]
    async fn test_backend_error_is_mapped() {
        let mock = MockOracle::new().failing(Purpose::Plan, "rate limited");
        let oracle = BoundedOracle::new(Arc::new(mock), Duration::from_secs(1));
        let request = OracleRequest::new(Purpose::Plan, vec![Message::user("x")]);
        match oracle.ask(&request).await {
            Err(AgentError::OracleError(msg)) => assert_eq!(msg, "rate limited"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
