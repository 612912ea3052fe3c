//! HTTP 无人机控制客户端
//!
//! POST /takeoff {altitude}、/goto_relative {north, east, down}、/land；
//! 网络错误与非 2xx 响应都以文本返回，不会让调用方崩溃。

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::actuator::Actuator;
use crate::core::AgentError;

pub struct HttpActuator {
    client: reqwest::Client,
    base_url: String,
}

impl HttpActuator {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::ConfigError(format!("actuator http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post(&self, path: &str, body: Option<Value>, label: &str) -> Result<(), String> {
        let mut request = self.client.post(format!("{}{}", self.base_url, path));
        if let Some(body) = body {
            request = request.json(&body);
        }
        let resp = request
            .send()
            .await
            .map_err(|e| format!("{label} error: {e}"))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            Err(format!("{label} failed ({status}): {text}"))
        }
    }
}

#[async_trait]
impl Actuator for HttpActuator {
    async fn ascend(&self, altitude: f64) -> Result<String, String> {
        self.post("/takeoff", Some(json!({ "altitude": altitude })), "Takeoff")
            .await?;
        Ok(format!("Drone taking off to {altitude} m."))
    }

    async fn move_by(&self, north: f64, east: f64, down: f64) -> Result<String, String> {
        self.post(
            "/goto_relative",
            Some(json!({ "north": north, "east": east, "down": down })),
            "Move",
        )
        .await?;
        Ok(format!("Drone flying to (N:{north}, E:{east}, D:{down})."))
    }

    async fn land(&self) -> Result<String, String> {
        self.post("/land", None, "Land").await?;
        Ok("Drone landing.".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_move_posts_offsets() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/goto_relative"))
            .and(body_json(json!({"north": 5.0, "east": 0.0, "down": -1.0})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let actuator = HttpActuator::new(&server.uri(), Duration::from_secs(2)).unwrap();
        let out = actuator.move_by(5.0, 0.0, -1.0).await.unwrap();
        assert!(out.contains("N:5"));
    }

    #[tokio::test]
    async fn test_server_error_is_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/takeoff"))
            .respond_with(ResponseTemplate::new(503).set_body_string("not armed"))
            .mount(&server)
            .await;

        let actuator = HttpActuator::new(&server.uri(), Duration::from_secs(2)).unwrap();
        let err = actuator.ascend(2.0).await.unwrap_err();
        assert!(err.contains("Takeoff failed"));
        assert!(err.contains("not armed"));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_text() {
        let actuator = HttpActuator::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let err = actuator.land().await.unwrap_err();
        assert!(err.starts_with("Land error"));
    }
}
