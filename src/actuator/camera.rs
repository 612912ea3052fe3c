//! 相机帧来源
//!
//! HttpCamera 从控制服务 GET 一帧 JPEG（默认 /camera_image）；FileCamera 读取本地图片。

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use crate::core::AgentError;
use crate::llm::ImageFrame;

#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn capture(&self) -> Result<ImageFrame, AgentError>;
}

pub struct HttpCamera {
    client: reqwest::Client,
    url: String,
}

impl HttpCamera {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::ConfigError(format!("camera http client: {e}")))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl FrameSource for HttpCamera {
    async fn capture(&self) -> Result<ImageFrame, AgentError> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| AgentError::CameraError(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(AgentError::CameraError(format!(
                "camera returned {}",
                resp.status()
            )));
        }
        let mime = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| v.starts_with("image/"))
            .unwrap_or("image/jpeg")
            .to_string();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| AgentError::CameraError(e.to_string()))?;
        if bytes.is_empty() {
            return Err(AgentError::CameraError("empty frame".to_string()));
        }
        Ok(ImageFrame {
            bytes: bytes.to_vec(),
            mime,
        })
    }
}

pub struct FileCamera {
    path: PathBuf,
}

impl FileCamera {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl FrameSource for FileCamera {
    async fn capture(&self) -> Result<ImageFrame, AgentError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| AgentError::CameraError(format!("{}: {}", self.path.display(), e)))?;
        let mime = match self.path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("png") => "image/png",
            _ => "image/jpeg",
        };
        Ok(ImageFrame {
            bytes,
            mime: mime.to_string(),
        })
    }
}

/// 固定帧（测试用）
#[async_trait]
impl FrameSource for ImageFrame {
    async fn capture(&self) -> Result<ImageFrame, AgentError> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_http_camera_reads_frame() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/camera_image"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(vec![1u8, 2, 3]),
            )
            .mount(&server)
            .await;

        let camera = HttpCamera::new(
            &format!("{}/camera_image", server.uri()),
            Duration::from_secs(2),
        )
        .unwrap();
        let frame = camera.capture().await.unwrap();
        assert_eq!(frame.bytes, vec![1, 2, 3]);
        assert_eq!(frame.mime, "image/png");
    }

    #[tokio::test]
    async fn test_file_camera() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("frame.png");
        std::fs::write(&file, [9u8, 9]).unwrap();
        let frame = FileCamera::new(&file).capture().await.unwrap();
        assert_eq!(frame.mime, "image/png");

        let missing = FileCamera::new(dir.path().join("none.jpg")).capture().await;
        assert!(matches!(missing, Err(AgentError::CameraError(_))));
    }
}
